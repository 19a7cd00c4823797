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
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ConfigError;
use crate::audio::envelope_for_file;
use crate::error::Warning;
use crate::mapping::{Applied, DropStrategy, MappingEngine, MappingMode, SegmentStrategy};
use crate::preset::PresetExporter;
use crate::segment::{segments_from_cuts, transient_cuts, Segment, DEFAULT_BLOCK_SIZE};

/// Transient sensitivity used when a slice doesn't name one.
pub const DEFAULT_SENSITIVITY: f32 = 0.5;

/// How the segments of a sliced file are laid out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLayout {
    #[default]
    Velocity,
    Sequential,
    RoundRobinLayer,
}

/// How a file is cut. Explicit cut positions win over transient detection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceOptions {
    /// Normalized (0-1) cut positions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cuts: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<usize>,
}

impl SliceOptions {
    /// Cuts `file` into segments, decoding it when transients are needed.
    pub fn segments(
        &self,
        engine: &MappingEngine,
        file: &Path,
    ) -> Result<Vec<Segment>, ConfigError> {
        if !self.cuts.is_empty() {
            let metadata = engine.read_metadata(file)?;
            return Ok(segments_from_cuts(&self.cuts, metadata.frame_count));
        }

        let sensitivity = self.sensitivity.unwrap_or(DEFAULT_SENSITIVITY);
        let block_size = self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
        let (envelope, frames) =
            envelope_for_file(file, block_size).map_err(|source| ConfigError::Slice {
                path: file.to_path_buf(),
                source,
            })?;
        let cuts: Vec<f64> = transient_cuts(&envelope, sensitivity).collect();
        debug!(file = ?file, cuts = cuts.len(), sensitivity, "Detected transients");
        Ok(segments_from_cuts(&cuts, frames))
    }
}

/// One drop onto a key. Exactly one of `file`, `files` or `file` + `slice`
/// describes the drop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteInstruction {
    pub key: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<DropStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice: Option<SliceOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<SegmentLayout>,
    /// Target layer for round-robin layer slicing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<usize>,
}

impl NoteInstruction {
    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidInstruction {
            key: self.key,
            reason: reason.to_string(),
        }
    }
}

/// A project file: a list of drops to replay and where to write the result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_mode: Option<MappingMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_robin_seed: Option<u32>,
    #[serde(default)]
    pub notes: Vec<NoteInstruction>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ProjectFile {
    /// Creates an empty project that writes to `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            mapping_mode: None,
            round_robin_seed: None,
            notes: Vec::new(),
            base_dir: PathBuf::new(),
        }
    }

    /// Parse a project from a YAML file.
    pub fn deserialize(path: &Path) -> Result<ProjectFile, ConfigError> {
        let mut project = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<ProjectFile>()?;
        project.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(project)
    }

    /// Writes the project back out as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_yml::to_string(self)?)?;
        Ok(())
    }

    /// Resolves a project-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    /// An exporter honoring the project's seed.
    pub fn exporter(&self) -> PresetExporter {
        match self.round_robin_seed {
            Some(seed) => PresetExporter::new().with_seed(seed),
            None => PresetExporter::new(),
        }
    }

    /// Replays every note instruction against `engine` in order and returns
    /// the warnings collected along the way.
    pub fn apply(&self, engine: &MappingEngine) -> Result<Vec<Warning>, ConfigError> {
        let mut warnings = Vec::new();
        for note in &self.notes {
            let applied = self.apply_note(engine, note)?;
            debug!(key = note.key, added = applied.added.len(), "Applied instruction");
            warnings.extend(applied.warnings);
        }
        if let Some(mode) = self.mapping_mode {
            engine.set_mapping_mode(mode);
        }
        info!(notes = self.notes.len(), warnings = warnings.len(), "Applied project");
        Ok(warnings)
    }

    fn apply_note(
        &self,
        engine: &MappingEngine,
        note: &NoteInstruction,
    ) -> Result<Applied, ConfigError> {
        match (&note.file, note.files.is_empty(), &note.slice) {
            (Some(_), false, _) => Err(note.invalid("both file and files are set")),
            (None, true, _) => Err(note.invalid("no file or files given")),
            (None, false, Some(_)) => Err(note.invalid("slice needs a single file")),
            (None, false, None) => {
                if note.segments.is_some() {
                    return Err(note.invalid("segments needs a sliced file"));
                }
                let files: Vec<PathBuf> = note.files.iter().map(|f| self.resolve(f)).collect();
                let strategy = note.strategy.unwrap_or(DropStrategy::Velocity);
                Ok(engine.assign_files(note.key, &files, strategy)?)
            }
            (Some(file), true, Some(slice)) => {
                if note.strategy.is_some() {
                    return Err(note.invalid("strategy applies to files, use segments"));
                }
                let file = self.resolve(file);
                let segments = slice.segments(engine, &file)?;
                let strategy = match note.segments.unwrap_or_default() {
                    SegmentLayout::Velocity => SegmentStrategy::Velocity,
                    SegmentLayout::Sequential => SegmentStrategy::Sequential,
                    SegmentLayout::RoundRobinLayer => SegmentStrategy::RoundRobinLayer {
                        layer: note.layer.unwrap_or(0),
                    },
                };
                Ok(engine.assign_segments(note.key, &file, &segments, strategy)?)
            }
            (Some(file), true, None) => {
                if note.strategy.is_some() || note.segments.is_some() {
                    return Err(note.invalid("a single file takes no strategy"));
                }
                Ok(engine.assign_file(note.key, &self.resolve(file))?)
            }
        }
    }
}
