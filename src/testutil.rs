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
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::{AudioMetadata, MetadataProvider};
use crate::error::MetadataError;

/// Writes a WAV file with one inner Vec per channel. Channels must be equal length.
pub fn write_wav<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    write_wav_with_bits(path, samples, sample_rate, 32)
}

pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = samples.first().map_or(0, |c| c.len());
    assert!(
        samples.iter().all(|c| c.len() == frames),
        "Channels must have the same length"
    );

    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel_samples in &samples {
            writer.write_sample(channel_samples[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a mono silent WAV of the given length and returns its path.
pub fn silent_wav(dir: &Path, name: &str, frames: usize) -> PathBuf {
    let path = dir.join(name);
    write_wav_with_bits(path.clone(), vec![vec![0i16; frames]], 44100, 16)
        .expect("failed to write test wav");
    path
}

/// An in-memory metadata provider with canned answers.
#[derive(Default)]
pub struct FakeMetadata {
    files: HashMap<PathBuf, AudioMetadata>,
    failing: HashSet<PathBuf>,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file with the given frame count at 44.1kHz.
    pub fn with_file(mut self, path: impl Into<PathBuf>, frame_count: u64) -> Self {
        self.files.insert(
            path.into(),
            AudioMetadata {
                sample_rate: 44100,
                frame_count,
                file_size: frame_count * 2 + 44,
                modified_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            },
        );
        self
    }

    /// Registers a file that fails to read.
    pub fn with_failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }
}

impl MetadataProvider for FakeMetadata {
    fn read(&self, path: &Path) -> Result<AudioMetadata, MetadataError> {
        if self.failing.contains(path) {
            return Err(MetadataError::Other("unreadable test file".to_string()));
        }
        self.files
            .get(path)
            .copied()
            .ok_or_else(|| MetadataError::Other(format!("unknown test file {}", path.display())))
    }
}
