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
use std::path::PathBuf;

use uuid::Uuid;

/// Errors returned by mapping and export operations.
///
/// Validation failures are returned before any mutation is applied, so a caller
/// that receives one of these can assume the canonical store is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Metadata unavailable for {path}: {source}")]
    MetadataUnavailable {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("{what} index {index} out of range (count {count})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        count: usize,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Part {id} is missing {missing} required for export")]
    SerializationIncomplete { id: Uuid, missing: &'static str },

    #[error("Export I/O failure on {path}: {source}")]
    ExportIOFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compression failed: {0}")]
    CompressionFailure(#[source] std::io::Error),
}

impl MappingError {
    pub(crate) fn metadata(path: impl Into<PathBuf>, source: MetadataError) -> Self {
        MappingError::MetadataUnavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MappingError::ExportIOFailure {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the audio metadata collaborator.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    MissingSampleRate,

    #[error("File contains no audio frames")]
    Empty,

    /// Failure reported by a provider outside this crate, described by its
    /// message.
    #[error("{0}")]
    Other(String),
}

/// A per-item failure inside a batch. Batches collect these instead of aborting.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A file in a batch could not be read and was left out.
    FileSkipped { path: PathBuf, reason: String },
    /// A segment would have landed beyond key 127 and was dropped.
    KeyRangeExceeded { segment: usize, key: usize },
    /// A part could not be exported and was left out of the preset.
    PartSkipped { id: Uuid, reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::FileSkipped { path, reason } => {
                write!(f, "skipped {}: {}", path.display(), reason)
            }
            Warning::KeyRangeExceeded { segment, key } => {
                write!(f, "segment {} dropped: key {} is out of range", segment, key)
            }
            Warning::PartSkipped { id, reason } => write!(f, "part {} not exported: {}", id, reason),
        }
    }
}
