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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::AudioMetadata;
use crate::error::MappingError;
use crate::segment::Segment;
use crate::util::filename_stem;
use crate::velocity::{partition, SplitMode, VelocityRange, MIDI_MAX};

/// Checks a key number lies in 0-127.
pub fn validate_key(key: u8) -> Result<(), MappingError> {
    if key > MIDI_MAX {
        return Err(MappingError::InvalidInput(format!(
            "key {} is outside 0-{}",
            key, MIDI_MAX
        )));
    }
    Ok(())
}

/// One mapped segment of a source file on a single key.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplePart {
    id: Uuid,
    name: String,
    key: u8,
    velocity: VelocityRange,
    source: PathBuf,
    segment: Segment,
    metadata: Option<AudioMetadata>,
    relative_path: Option<PathBuf>,
    absolute_path: Option<PathBuf>,
}

impl SamplePart {
    /// Creates a part covering `segment` of `source` at full velocity.
    ///
    /// When metadata is known the segment must lie within the file.
    pub fn new(
        key: u8,
        source: &Path,
        segment: Segment,
        metadata: Option<AudioMetadata>,
    ) -> Result<Self, MappingError> {
        validate_key(key)?;
        match metadata {
            Some(metadata) => segment.validate(metadata.frame_count)?,
            None if segment.is_empty() => {
                return Err(MappingError::InvalidInput(format!(
                    "segment {}..{} is empty",
                    segment.start, segment.end
                )))
            }
            None => {}
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: filename_stem(source).to_string(),
            key,
            velocity: VelocityRange::FULL,
            source: source.to_path_buf(),
            segment,
            metadata,
            relative_path: None,
            absolute_path: None,
        })
    }

    /// Creates a part spanning the whole file described by `metadata`.
    pub fn whole_file(
        key: u8,
        source: &Path,
        metadata: AudioMetadata,
    ) -> Result<Self, MappingError> {
        Self::new(
            key,
            source,
            Segment::new(0, metadata.frame_count),
            Some(metadata),
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_velocity(mut self, velocity: VelocityRange) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn velocity(&self) -> VelocityRange {
        self.velocity
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Number of frames covered by this part.
    pub fn segment_len(&self) -> u64 {
        self.segment.len()
    }

    pub fn metadata(&self) -> Option<&AudioMetadata> {
        self.metadata.as_ref()
    }

    /// Path of the exported copy relative to the preset, set after export.
    pub fn relative_path(&self) -> Option<&Path> {
        self.relative_path.as_deref()
    }

    /// Absolute path of the exported copy, set after export.
    pub fn absolute_path(&self) -> Option<&Path> {
        self.absolute_path.as_deref()
    }

    pub(crate) fn set_key(&mut self, key: u8) {
        self.key = key;
    }

    pub(crate) fn set_velocity(&mut self, velocity: VelocityRange) {
        self.velocity = velocity;
    }

    pub(crate) fn set_export_paths(&mut self, relative: PathBuf, absolute: PathBuf) {
        self.relative_path = Some(relative);
        self.absolute_path = Some(absolute);
    }
}

/// How a key's velocity space is divided and how many round-robin
/// alternatives each layer holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteConfiguration {
    layers: usize,
    round_robins: usize,
    #[serde(default)]
    split: SplitMode,
}

impl NoteConfiguration {
    pub fn new(layers: usize, round_robins: usize, split: SplitMode) -> Result<Self, MappingError> {
        if round_robins == 0 {
            return Err(MappingError::InvalidConfiguration(
                "at least one round-robin slot is required".to_string(),
            ));
        }
        // Validates the layer count.
        partition(layers, split)?;
        Ok(Self {
            layers,
            round_robins,
            split,
        })
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn round_robins(&self) -> usize {
        self.round_robins
    }

    pub fn split(&self) -> SplitMode {
        self.split
    }

    /// The velocity ranges of this configuration's layers.
    pub fn ranges(&self) -> Result<Vec<VelocityRange>, MappingError> {
        partition(self.layers, self.split)
    }

    pub(crate) fn with_round_robins(self, round_robins: usize) -> Self {
        Self {
            round_robins,
            ..self
        }
    }
}

impl Default for NoteConfiguration {
    fn default() -> Self {
        Self {
            layers: 1,
            round_robins: 1,
            split: SplitMode::Separate,
        }
    }
}

/// Global playback mode written to the preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Layers are selected by velocity.
    #[default]
    Standard,
    /// Alternatives cycle on successive triggers.
    RoundRobin,
}
