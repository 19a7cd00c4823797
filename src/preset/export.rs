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
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::xml::{PresetDocument, PresetPart};
use crate::error::{MappingError, Warning};
use crate::mapping::{MappingMode, SamplePart};
use crate::util::{filename_display, filename_stem};

/// Extension of written presets.
pub const PRESET_EXTENSION: &str = "adv";

/// Where copies of the source audio land, relative to the preset's directory.
pub const SAMPLES_DIR: &str = "Samples/Imported";

/// Paths recorded for one exported part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedPart {
    pub id: Uuid,
    pub relative: PathBuf,
    pub absolute: PathBuf,
}

/// The outcome of a successful export.
#[derive(Clone, Debug)]
pub struct ExportReport {
    /// Path of the written preset.
    pub preset: PathBuf,
    /// Parts that made it into the preset, in document order.
    pub parts: Vec<ExportedPart>,
    /// Parts left out of the preset.
    pub warnings: Vec<Warning>,
    /// Round-robin seed written to the preset.
    pub seed: u32,
}

/// A file copy waiting to be moved into place.
struct StagedCopy {
    staged: PathBuf,
    destination: PathBuf,
}

/// Copies referenced audio next to the preset and writes the compressed
/// preset document. Either everything lands or nothing does.
#[derive(Clone, Debug, Default)]
pub struct PresetExporter {
    round_robin_seed: Option<u32>,
}

impl PresetExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed round-robin seed instead of a random one.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.round_robin_seed = Some(seed);
        self
    }

    /// The preset path for a requested output, with the preset extension added
    /// when missing.
    pub fn preset_path(output: &Path) -> PathBuf {
        if output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PRESET_EXTENSION))
        {
            return output.to_path_buf();
        }
        let mut name = output.as_os_str().to_owned();
        name.push(".");
        name.push(PRESET_EXTENSION);
        PathBuf::from(name)
    }

    /// Exports `parts` to `output`.
    pub fn export(
        &self,
        parts: &[SamplePart],
        mode: MappingMode,
        output: &Path,
    ) -> Result<ExportReport, MappingError> {
        let preset = Self::preset_path(output);
        let parent = match preset.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let samples_dir = parent.join(SAMPLES_DIR);

        info!(preset = ?preset, parts = parts.len(), "Exporting preset");

        // Parts without cached metadata can't be described in the preset.
        let mut warnings = Vec::new();
        let mut exportable: Vec<&SamplePart> = Vec::with_capacity(parts.len());
        for part in parts {
            if part.metadata().is_some() {
                exportable.push(part);
            } else {
                let err = MappingError::SerializationIncomplete {
                    id: part.id(),
                    missing: "source metadata",
                };
                warn!(part = %part.id(), name = part.name(), err = %err, "Skipping part");
                warnings.push(Warning::PartSkipped {
                    id: part.id(),
                    reason: err.to_string(),
                });
            }
        }
        exportable.sort_by_key(|part| (part.key(), part.velocity().min()));

        let created_dir = !samples_dir.exists();
        fs::create_dir_all(&samples_dir).map_err(|e| MappingError::export_io(&samples_dir, e))?;

        let result = self.write_all(&exportable, mode, &preset, &samples_dir);
        match result {
            Ok((exported, seed)) => {
                info!(preset = ?preset, parts = exported.len(), skipped = warnings.len(), "Preset written");
                Ok(ExportReport {
                    preset,
                    parts: exported,
                    warnings,
                    seed,
                })
            }
            Err(e) => {
                error!(preset = ?preset, err = %e, "Export failed, nothing written");
                if created_dir {
                    // Only removes directories that are still empty.
                    let _ = fs::remove_dir(&samples_dir);
                    if let Some(samples_root) = samples_dir.parent() {
                        let _ = fs::remove_dir(samples_root);
                    }
                }
                Err(e)
            }
        }
    }

    fn write_all(
        &self,
        parts: &[&SamplePart],
        mode: MappingMode,
        preset: &Path,
        samples_dir: &Path,
    ) -> Result<(Vec<ExportedPart>, u32), MappingError> {
        let absolute_dir =
            fs::canonicalize(samples_dir).map_err(|e| MappingError::export_io(samples_dir, e))?;

        let destinations = destination_names(parts);

        let mut staged: Vec<StagedCopy> = Vec::with_capacity(destinations.len());
        for (source, file_name) in &destinations {
            let destination = samples_dir.join(file_name);
            let staged_path = staging_path(&destination);
            if let Err(e) = fs::copy(source, &staged_path) {
                let _ = fs::remove_file(&staged_path);
                discard(&staged);
                return Err(MappingError::export_io(*source, e));
            }
            debug!(source = ?source, destination = ?destination, "Staged sample copy");
            staged.push(StagedCopy {
                staged: staged_path,
                destination,
            });
        }

        let relative_dir = PathBuf::from(SAMPLES_DIR);
        let paths: Vec<(PathBuf, PathBuf)> = parts
            .iter()
            .map(|part| {
                let file_name = &destinations[part.source()];
                (relative_dir.join(file_name), absolute_dir.join(file_name))
            })
            .collect();
        let preset_parts: Vec<PresetPart> = parts
            .iter()
            .zip(&paths)
            .filter_map(|(part, (relative, absolute))| {
                part.metadata().map(|metadata| PresetPart {
                    part,
                    metadata,
                    relative_path: relative,
                    absolute_path: absolute,
                })
            })
            .collect();

        let seed = self.round_robin_seed.unwrap_or_else(rand::random);
        let document = PresetDocument::new(preset_parts, mode, seed).to_string();
        let compressed = match compress(document.as_bytes()) {
            Ok(compressed) => compressed,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };

        let staged_preset = staging_path(preset);
        if let Err(e) = fs::write(&staged_preset, &compressed) {
            let _ = fs::remove_file(&staged_preset);
            discard(&staged);
            return Err(MappingError::export_io(preset, e));
        }
        staged.push(StagedCopy {
            staged: staged_preset,
            destination: preset.to_path_buf(),
        });

        // Everything fallible except the renames is done. The preset is the
        // last entry, so it only appears once every sample is in place.
        let mut placed: Vec<Placed> = Vec::with_capacity(staged.len());
        for (index, copy) in staged.iter().enumerate() {
            if let Err(e) = place_staged(copy, &mut placed) {
                roll_back(&placed);
                discard(&staged[index..]);
                return Err(MappingError::export_io(&copy.destination, e));
            }
        }
        for replaced in &placed {
            if let Some(backup) = &replaced.backup {
                let _ = fs::remove_file(backup);
            }
        }

        let exported = parts
            .iter()
            .zip(paths)
            .map(|(part, (relative, absolute))| ExportedPart {
                id: part.id(),
                relative,
                absolute,
            })
            .collect();
        Ok((exported, seed))
    }
}

/// A staged file moved to its destination, with the file it replaced.
struct Placed {
    destination: PathBuf,
    backup: Option<PathBuf>,
}

/// Picks a file name under the samples directory for every source. The first
/// source to claim a name keeps it; later sources with the same name get a
/// numbered one.
fn destination_names<'a>(parts: &[&'a SamplePart]) -> BTreeMap<&'a Path, String> {
    let mut destinations: BTreeMap<&Path, String> = BTreeMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    for &part in parts {
        let source = part.source();
        if destinations.contains_key(source) {
            continue;
        }

        let original = filename_display(source).to_string();
        let mut file_name = original.clone();
        let mut counter = 2;
        while !taken.insert(file_name.to_lowercase()) {
            file_name = numbered_name(source, counter);
            counter += 1;
        }
        if file_name != original {
            warn!(
                source = ?source,
                copied_as = %file_name,
                "Another source already uses this file name"
            );
        }
        destinations.insert(source, file_name);
    }
    destinations
}

fn numbered_name(source: &Path, counter: usize) -> String {
    let stem = filename_stem(source);
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, counter, ext),
        None => format!("{}-{}", stem, counter),
    }
}

/// A hidden sibling path used while a file is being written.
fn staging_path(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(".{}.partial", filename_display(destination)))
}

/// A hidden sibling path holding a file that is about to be replaced.
fn backup_path(destination: &Path) -> PathBuf {
    destination.with_file_name(format!(".{}.previous", filename_display(destination)))
}

/// Moves a staged file into place, keeping any file it replaces until the
/// whole export has landed.
fn place_staged(copy: &StagedCopy, placed: &mut Vec<Placed>) -> std::io::Result<()> {
    let backup = if copy.destination.is_file() {
        let backup = backup_path(&copy.destination);
        fs::rename(&copy.destination, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(&copy.staged, &copy.destination) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, &copy.destination);
        }
        return Err(e);
    }
    placed.push(Placed {
        destination: copy.destination.clone(),
        backup,
    });
    Ok(())
}

/// Undoes placed files in reverse order, restoring what they replaced.
fn roll_back(placed: &[Placed]) {
    for replaced in placed.iter().rev() {
        let _ = fs::remove_file(&replaced.destination);
        if let Some(backup) = &replaced.backup {
            let _ = fs::rename(backup, &replaced.destination);
        }
    }
}

fn discard(staged: &[StagedCopy]) {
    for copy in staged {
        let _ = fs::remove_file(&copy.staged);
    }
}

/// Gzip-compresses the document.
fn compress(data: &[u8]) -> Result<Vec<u8>, MappingError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(MappingError::CompressionFailure)?;
    encoder.finish().map_err(MappingError::CompressionFailure)
}
