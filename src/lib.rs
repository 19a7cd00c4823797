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
//! Builds multi-sample instrument presets from audio files.
//!
//! Files dropped onto keys become velocity layers, round-robin alternatives or
//! consecutive keys. The resulting mapping is written as a gzip-compressed
//! sampler preset with the referenced audio copied next to it.

pub mod audio;
pub mod config;
pub mod error;
pub mod mapping;
pub mod preset;
pub mod segment;
pub mod util;
pub mod velocity;

#[cfg(test)]
mod testutil;

pub use error::{MappingError, MetadataError, Warning};
pub use mapping::{
    Applied, DropStrategy, MappingEngine, MappingEvent, MappingMode, NoteConfiguration,
    SampleGrid, SamplePart, SegmentStrategy,
};
pub use preset::{ExportReport, PresetExporter};
pub use segment::Segment;
pub use velocity::{SplitMode, VelocityRange};
