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
//! Velocity zone partitioning.
//!
//! The MIDI velocity space 0-127 is split into one zone per layer. Zones never
//! overlap on their core `[min, max]` range; in crossfade mode each zone also
//! carries extended bounds reaching half a zone into its neighbours.

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Highest MIDI velocity (and key) value.
pub const MIDI_MAX: u8 = 127;

/// Number of distinct velocity values.
const VELOCITY_SPAN: f64 = 128.0;

/// A velocity zone with optional crossfade bounds, all values in 0-127.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VelocityRange {
    min: u8,
    max: u8,
    crossfade_min: u8,
    crossfade_max: u8,
}

impl VelocityRange {
    /// The range covering every velocity with no crossfade.
    pub const FULL: VelocityRange = VelocityRange {
        min: 0,
        max: MIDI_MAX,
        crossfade_min: 0,
        crossfade_max: MIDI_MAX,
    };

    /// Creates a validated range.
    pub fn new(
        min: u8,
        max: u8,
        crossfade_min: u8,
        crossfade_max: u8,
    ) -> Result<Self, MappingError> {
        if max > MIDI_MAX || crossfade_max > MIDI_MAX {
            return Err(MappingError::InvalidInput(format!(
                "velocity values must be at most {}",
                MIDI_MAX
            )));
        }
        if min > max || crossfade_min > min || crossfade_max < max {
            return Err(MappingError::InvalidInput(format!(
                "malformed velocity range {}..{} (crossfade {}..{})",
                min, max, crossfade_min, crossfade_max
            )));
        }
        Ok(Self {
            min,
            max,
            crossfade_min,
            crossfade_max,
        })
    }

    /// Creates a range without crossfade.
    pub fn hard(min: u8, max: u8) -> Result<Self, MappingError> {
        Self::new(min, max, min, max)
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn crossfade_min(&self) -> u8 {
        self.crossfade_min
    }

    pub fn crossfade_max(&self) -> u8 {
        self.crossfade_max
    }

    /// Whether the core range contains the given velocity.
    pub fn contains(&self, velocity: u8) -> bool {
        velocity >= self.min && velocity <= self.max
    }
}

impl Default for VelocityRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl std::fmt::Display for VelocityRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.crossfade_min == self.min && self.crossfade_max == self.max {
            write!(f, "{}-{}", self.min, self.max)
        } else {
            write!(
                f,
                "{}-{} (fade {}-{})",
                self.min, self.max, self.crossfade_min, self.crossfade_max
            )
        }
    }
}

/// How adjacent velocity zones meet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Hard switch between zones.
    #[default]
    Separate,
    /// Zones blend into their neighbours over half a zone width.
    Crossfade,
}

/// Splits 0-127 into `layer_count` zones.
///
/// Zone boundaries are floor-rounded from a running boundary of `128 / n`; the
/// last zone absorbs the rounding remainder.
pub fn partition(layer_count: usize, mode: SplitMode) -> Result<Vec<VelocityRange>, MappingError> {
    if layer_count == 0 {
        return Err(MappingError::InvalidConfiguration(
            "at least one velocity layer is required".to_string(),
        ));
    }
    if layer_count > usize::from(MIDI_MAX) + 1 {
        return Err(MappingError::InvalidConfiguration(format!(
            "{} velocity layers requested, at most {} are possible",
            layer_count,
            usize::from(MIDI_MAX) + 1
        )));
    }
    if layer_count == 1 {
        return Ok(vec![VelocityRange::FULL]);
    }

    let width = VELOCITY_SPAN / layer_count as f64;
    let half = width / 2.0;
    let last = layer_count - 1;

    let ranges = (0..layer_count)
        .map(|i| {
            let min = (i as f64 * width).floor() as u8;
            let max = if i == last {
                MIDI_MAX
            } else {
                ((i + 1) as f64 * width).floor() as u8 - 1
            };

            let (crossfade_min, crossfade_max) = match mode {
                SplitMode::Separate => (min, max),
                SplitMode::Crossfade => {
                    let fade_min = if i == 0 {
                        min
                    } else {
                        (min as f64 - half).floor().max(0.0) as u8
                    };
                    let fade_max = if i == last {
                        max
                    } else {
                        (max as f64 + half).floor().min(MIDI_MAX as f64) as u8
                    };
                    (fade_min, fade_max)
                }
            };

            VelocityRange {
                min,
                max,
                crossfade_min,
                crossfade_max,
            }
        })
        .collect();

    Ok(ranges)
}

/// Finds the layer whose core range contains `velocity_min`.
pub fn layer_for(ranges: &[VelocityRange], velocity_min: u8) -> Option<usize> {
    ranges.iter().position(|range| range.contains(velocity_min))
}
