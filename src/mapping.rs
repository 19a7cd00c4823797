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
//! The mapping engine and the data it manages.
//!
//! This module provides:
//! - `SamplePart`, the unit stored in the canonical store
//! - Per-key `NoteConfiguration` and the global `MappingMode`
//! - `SampleGrid`, the layer by round-robin projection of a key
//! - `MappingEngine`, which owns the store and applies drop operations

mod engine;
mod grid;
mod part;

#[cfg(test)]
mod tests;

pub use engine::{Applied, DropStrategy, MappingEngine, MappingEvent, SegmentStrategy};
pub use grid::{GridIssue, GridLayer, SampleGrid};
pub use part::{validate_key, MappingMode, NoteConfiguration, SamplePart};
