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
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use super::decode::OpenTrack;
use crate::error::MetadataError;

/// Facts about a source file that are cached on every part cut from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioMetadata {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Total number of frames (samples per channel).
    pub frame_count: u64,
    /// Size of the file on disk in bytes.
    pub file_size: u64,
    /// Last modification time of the file.
    pub modified_at: SystemTime,
}

/// Reads metadata for audio files. Implementations must be side-effect free so
/// that batches can query several files in parallel.
pub trait MetadataProvider: Send + Sync {
    fn read(&self, path: &Path) -> Result<AudioMetadata, MetadataError>;
}

/// Metadata provider that probes files with symphonia.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaMetadataProvider;

impl SymphoniaMetadataProvider {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataProvider for SymphoniaMetadataProvider {
    fn read(&self, path: &Path) -> Result<AudioMetadata, MetadataError> {
        let fs_metadata = std::fs::metadata(path)?;
        let mut track = OpenTrack::open(path)?;

        let sample_rate = track
            .params
            .sample_rate
            .ok_or(MetadataError::MissingSampleRate)?;

        // Some containers (raw MP3, some OGG) don't carry a frame count.
        let frame_count = match track.params.n_frames {
            Some(n_frames) => n_frames,
            None => {
                debug!(path = ?path, "Frame count not in container, decoding to count");
                let mut frames = 0u64;
                track.decode_all(|interleaved, channels| {
                    frames += (interleaved.len() / channels) as u64;
                })?;
                frames
            }
        };
        if frame_count == 0 {
            return Err(MetadataError::Empty);
        }

        Ok(AudioMetadata {
            sample_rate,
            frame_count,
            file_size: fs_metadata.len(),
            modified_at: fs_metadata.modified()?,
        })
    }
}
