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
//! Audio file access: the metadata collaborator and envelope extraction.
//!
//! This module provides:
//! - The `MetadataProvider` interface the mapping engine reads sources through
//! - A symphonia-backed provider for WAV, FLAC, MP3 and friends
//! - Decoding to mono for transient detection

mod decode;
mod metadata;

pub use decode::{decode_mono, envelope_for_file, DecodedAudio};
pub use metadata::{AudioMetadata, MetadataProvider, SymphoniaMetadataProvider};
