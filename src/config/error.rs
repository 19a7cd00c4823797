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

use crate::error::{MappingError, MetadataError};

/// Typed error for project file failures so callers can tell a parse error
/// from a bad instruction or a failed mapping without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Project serialization error: {0}")]
    Save(#[from] serde_yml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid instruction for key {key}: {reason}")]
    InvalidInstruction { key: u8, reason: String },

    #[error("Unable to slice {path}: {source}")]
    Slice {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error(transparent)]
    Mapping(#[from] MappingError),
}
