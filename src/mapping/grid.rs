// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! The per-key grid view of the canonical store.
//!
//! A grid is a projection: it is rebuilt from the store and the key's
//! configuration whenever it is needed and is never written to directly.

use uuid::Uuid;

use super::part::{NoteConfiguration, SamplePart};
use crate::error::MappingError;
use crate::velocity::{layer_for, VelocityRange};

/// A part that could not be shown in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridIssue {
    /// The part's layer already had every round-robin slot occupied.
    Overflow { part: Uuid, layer: usize },
    /// The part's velocity matches none of the configured layers.
    Unmatched { part: Uuid, velocity_min: u8 },
}

/// One velocity layer with its round-robin slots.
#[derive(Clone, Debug)]
pub struct GridLayer {
    range: VelocityRange,
    slots: Vec<Option<SamplePart>>,
}

impl GridLayer {
    pub fn range(&self) -> VelocityRange {
        self.range
    }

    pub fn slots(&self) -> &[Option<SamplePart>] {
        &self.slots
    }

    /// Number of occupied slots.
    pub fn occupancy(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// The layers-by-round-robin view of one key.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    key: u8,
    layers: Vec<GridLayer>,
    issues: Vec<GridIssue>,
}

impl SampleGrid {
    /// Builds the grid for `key` from the parts mapped to it.
    ///
    /// Parts fill the first free slot of their layer in store order. Parts that
    /// don't fit are reported through [`SampleGrid::issues`] and left out.
    pub fn build<'a, I>(
        key: u8,
        config: &NoteConfiguration,
        parts: I,
    ) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = &'a SamplePart>,
    {
        let ranges = config.ranges()?;
        let mut layers: Vec<GridLayer> = ranges
            .iter()
            .map(|&range| GridLayer {
                range,
                slots: vec![None; config.round_robins()],
            })
            .collect();
        let mut issues = Vec::new();

        for part in parts.into_iter().filter(|part| part.key() == key) {
            let velocity_min = part.velocity().min();
            let Some(layer_index) = layer_for(&ranges, velocity_min) else {
                issues.push(GridIssue::Unmatched {
                    part: part.id(),
                    velocity_min,
                });
                continue;
            };

            let layer = &mut layers[layer_index];
            match layer.slots.iter_mut().find(|slot| slot.is_none()) {
                Some(slot) => *slot = Some(part.clone()),
                None => issues.push(GridIssue::Overflow {
                    part: part.id(),
                    layer: layer_index,
                }),
            }
        }

        Ok(Self {
            key,
            layers,
            issues,
        })
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn layers(&self) -> &[GridLayer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn round_robins(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.slots.len())
    }

    /// Returns the occupant of a cell, erroring if the cell doesn't exist.
    pub fn slot(&self, layer: usize, round_robin: usize) -> Result<Option<&SamplePart>, MappingError> {
        let grid_layer = self.layers.get(layer).ok_or(MappingError::IndexOutOfRange {
            what: "layer",
            index: layer,
            count: self.layers.len(),
        })?;
        let slot = grid_layer
            .slots
            .get(round_robin)
            .ok_or(MappingError::IndexOutOfRange {
                what: "round-robin slot",
                index: round_robin,
                count: grid_layer.slots.len(),
            })?;
        Ok(slot.as_ref())
    }

    /// Parts that couldn't be placed.
    pub fn issues(&self) -> &[GridIssue] {
        &self.issues
    }

    pub fn has_overflow(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, GridIssue::Overflow { .. }))
    }
}
