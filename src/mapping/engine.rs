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
//! Main mapping engine that owns the canonical store and applies drop operations.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::grid::SampleGrid;
use super::part::{validate_key, MappingMode, NoteConfiguration, SamplePart};
use crate::audio::{AudioMetadata, MetadataProvider, SymphoniaMetadataProvider};
use crate::error::{MappingError, Warning};
use crate::preset::{ExportReport, PresetExporter};
use crate::segment::Segment;
use crate::util::filename_stem;
use crate::velocity::{layer_for, partition, SplitMode, VelocityRange, MIDI_MAX};

/// How a batch of whole files dropped on one key is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStrategy {
    /// One hard-switched velocity layer per file.
    Velocity,
    /// One velocity layer per file, blending into its neighbours.
    Crossfade,
    /// Every file at full velocity, alternating on each trigger.
    RoundRobin,
}

/// How the segments of one file are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStrategy {
    /// One velocity layer per segment on a single key.
    Velocity,
    /// Segment `i` goes to key `key + i` at full velocity.
    Sequential,
    /// Segments are appended as round-robin alternatives of one layer.
    RoundRobinLayer { layer: usize },
}

/// The result of a committed mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Applied {
    /// Keys whose parts or configuration changed.
    pub keys: Vec<u8>,
    /// Parts created by the operation.
    pub added: Vec<Uuid>,
    /// Parts deleted or superseded by the operation.
    pub removed: Vec<Uuid>,
    /// Items of the batch that were skipped.
    pub warnings: Vec<Warning>,
}

impl Applied {
    /// True when the operation left the store untouched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.keys.is_empty()
    }
}

/// Notifications sent to subscribers after each committed change.
#[derive(Clone, Debug, PartialEq)]
pub enum MappingEvent {
    PartsChanged {
        keys: Vec<u8>,
        added: Vec<Uuid>,
        removed: Vec<Uuid>,
    },
    ConfigurationChanged {
        key: u8,
        configuration: NoteConfiguration,
    },
    ModeChanged(MappingMode),
    Exported {
        path: PathBuf,
        parts: usize,
    },
}

/// The canonical store. Only ever touched with the engine's lock held.
#[derive(Default)]
struct Store {
    parts: Vec<SamplePart>,
    notes: HashMap<u8, NoteConfiguration>,
    mode: MappingMode,
}

impl Store {
    fn configuration(&self, key: u8) -> NoteConfiguration {
        self.notes.get(&key).copied().unwrap_or_default()
    }

    /// Drops every part on `key`, appends `parts` and returns the dropped ids.
    fn replace_key(&mut self, key: u8, parts: Vec<SamplePart>) -> Vec<Uuid> {
        let removed = self
            .parts
            .iter()
            .filter(|part| part.key() == key)
            .map(|part| part.id())
            .collect();
        self.parts.retain(|part| part.key() != key);
        self.parts.extend(parts);
        removed
    }

    fn grid(&self, key: u8) -> Result<SampleGrid, MappingError> {
        SampleGrid::build(key, &self.configuration(key), &self.parts)
    }
}

/// Owns the sample parts, per-key configuration and mapping mode, and applies
/// every mutation under a single lock.
pub struct MappingEngine {
    provider: Box<dyn MetadataProvider>,
    store: Mutex<Store>,
    subscribers: Mutex<Vec<Sender<MappingEvent>>>,
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new(SymphoniaMetadataProvider::new())
    }
}

impl MappingEngine {
    /// Creates an engine that reads source files through `provider`.
    pub fn new(provider: impl MetadataProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            store: Mutex::new(Store::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Returns a receiver that gets every event committed from now on.
    pub fn subscribe(&self) -> Receiver<MappingEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends `event` to every subscriber. Takes the locked store so events
    /// leave in the order their mutations were committed.
    fn publish(&self, _store: &Store, event: MappingEvent) {
        // Subscribers that dropped their receiver are forgotten.
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn commit(
        &self,
        store: &Store,
        keys: Vec<u8>,
        added: Vec<Uuid>,
        removed: Vec<Uuid>,
        warnings: Vec<Warning>,
    ) -> Applied {
        if !keys.is_empty() || !added.is_empty() || !removed.is_empty() {
            self.publish(
                store,
                MappingEvent::PartsChanged {
                    keys: keys.clone(),
                    added: added.clone(),
                    removed: removed.clone(),
                },
            );
        }
        Applied {
            keys,
            added,
            removed,
            warnings,
        }
    }

    /// Reads a source file's metadata through the engine's provider.
    pub fn read_metadata(&self, path: &Path) -> Result<AudioMetadata, MappingError> {
        self.provider
            .read(path)
            .map_err(|e| MappingError::metadata(path, e))
    }

    /// Reads metadata for a batch in parallel. A failure on the first file
    /// aborts; later failures are skipped and reported as warnings.
    fn read_batch(
        &self,
        files: &[PathBuf],
    ) -> Result<(Vec<(PathBuf, AudioMetadata)>, Vec<Warning>), MappingError> {
        let results: Vec<_> = files
            .par_iter()
            .map(|path| self.provider.read(path))
            .collect();

        let mut sources = Vec::with_capacity(files.len());
        let mut warnings = Vec::new();
        for (index, (path, result)) in files.iter().zip(results).enumerate() {
            match result {
                Ok(metadata) => {
                    debug!(
                        path = ?path,
                        frames = metadata.frame_count,
                        sample_rate = metadata.sample_rate,
                        "Read source metadata"
                    );
                    sources.push((path.clone(), metadata));
                }
                Err(e) if index == 0 => return Err(MappingError::metadata(path, e)),
                Err(e) => {
                    warn!(path = ?path, err = %e, "Skipping unreadable file");
                    warnings.push(Warning::FileSkipped {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok((sources, warnings))
    }

    /// Maps one whole file onto `key` at full velocity, replacing whatever the
    /// key held and resetting it to a single layer and slot.
    pub fn assign_file(&self, key: u8, file: &Path) -> Result<Applied, MappingError> {
        validate_key(key)?;
        let metadata = self.read_metadata(file)?;
        let part = SamplePart::whole_file(key, file, metadata)?;
        let added = vec![part.id()];

        let mut store = self.store.lock();
        let removed = store.replace_key(key, vec![part]);
        store.notes.insert(key, NoteConfiguration::default());

        info!(key, file = ?file, "Assigned file");
        Ok(self.commit(&store, vec![key], added, removed, Vec::new()))
    }

    /// Maps several whole files onto `key`, either as velocity layers or as
    /// round-robin alternatives.
    pub fn assign_files(
        &self,
        key: u8,
        files: &[PathBuf],
        strategy: DropStrategy,
    ) -> Result<Applied, MappingError> {
        validate_key(key)?;
        if files.is_empty() {
            return Err(MappingError::InvalidInput("no files to assign".to_string()));
        }

        let (sources, warnings) = self.read_batch(files)?;
        let count = sources.len();

        let (ranges, config) = match strategy {
            DropStrategy::Velocity | DropStrategy::Crossfade => {
                let split = if strategy == DropStrategy::Crossfade {
                    SplitMode::Crossfade
                } else {
                    SplitMode::Separate
                };
                (partition(count, split)?, NoteConfiguration::new(count, 1, split)?)
            }
            DropStrategy::RoundRobin => (
                vec![VelocityRange::FULL; count],
                NoteConfiguration::new(1, count, SplitMode::Separate)?,
            ),
        };

        let parts = sources
            .iter()
            .zip(ranges)
            .map(|((path, metadata), range)| {
                Ok(SamplePart::whole_file(key, path, *metadata)?.with_velocity(range))
            })
            .collect::<Result<Vec<_>, MappingError>>()?;
        let added: Vec<Uuid> = parts.iter().map(|part| part.id()).collect();

        let mut store = self.store.lock();
        let removed = store.replace_key(key, parts);
        store.notes.insert(key, config);
        if strategy == DropStrategy::RoundRobin && store.mode != MappingMode::RoundRobin {
            store.mode = MappingMode::RoundRobin;
            self.publish(&store, MappingEvent::ModeChanged(MappingMode::RoundRobin));
        }

        info!(
            key,
            files = count,
            skipped = warnings.len(),
            strategy = ?strategy,
            "Assigned files"
        );
        Ok(self.commit(&store, vec![key], added, removed, warnings))
    }

    /// Maps ordered segments of one file according to `strategy`.
    pub fn assign_segments(
        &self,
        key: u8,
        file: &Path,
        segments: &[Segment],
        strategy: SegmentStrategy,
    ) -> Result<Applied, MappingError> {
        validate_key(key)?;
        if segments.is_empty() {
            return Err(MappingError::InvalidInput("no segments to assign".to_string()));
        }
        let metadata = self.read_metadata(file)?;
        for segment in segments {
            segment.validate(metadata.frame_count)?;
        }

        let stem = filename_stem(file);
        let make_part = |key: u8, index: usize, segment: Segment| {
            SamplePart::new(key, file, segment, Some(metadata))
                .map(|part| part.with_name(format!("{} {}", stem, index + 1)))
        };

        let applied = match strategy {
            SegmentStrategy::Velocity => {
                let ranges = partition(segments.len(), SplitMode::Separate)?;
                let config = NoteConfiguration::new(segments.len(), 1, SplitMode::Separate)?;
                let parts = segments
                    .iter()
                    .zip(ranges)
                    .enumerate()
                    .map(|(index, (segment, range))| {
                        Ok(make_part(key, index, *segment)?.with_velocity(range))
                    })
                    .collect::<Result<Vec<_>, MappingError>>()?;
                let added: Vec<Uuid> = parts.iter().map(|part| part.id()).collect();

                let mut store = self.store.lock();
                let removed = store.replace_key(key, parts);
                store.notes.insert(key, config);
                self.commit(&store, vec![key], added, removed, Vec::new())
            }
            SegmentStrategy::Sequential => {
                let mut assignments = Vec::new();
                let mut warnings = Vec::new();
                for (index, segment) in segments.iter().enumerate() {
                    let target = usize::from(key) + index;
                    if target > usize::from(MIDI_MAX) {
                        warnings.push(Warning::KeyRangeExceeded {
                            segment: index,
                            key: target,
                        });
                        continue;
                    }
                    // target <= 127 so the narrowing is lossless.
                    assignments.push(make_part(target as u8, index, *segment)?);
                }
                if !warnings.is_empty() {
                    warn!(
                        start_key = key,
                        dropped = warnings.len(),
                        "Segments ran past the last key"
                    );
                }

                let keys: Vec<u8> = assignments.iter().map(|part| part.key()).collect();
                let added: Vec<Uuid> = assignments.iter().map(|part| part.id()).collect();
                let mut removed = Vec::new();
                let mut store = self.store.lock();
                for part in assignments {
                    let target = part.key();
                    removed.extend(store.replace_key(target, vec![part]));
                    store.notes.insert(target, NoteConfiguration::default());
                }
                self.commit(&store, keys, added, removed, warnings)
            }
            SegmentStrategy::RoundRobinLayer { layer } => {
                let mut store = self.store.lock();
                let config = store.configuration(key);
                let ranges = config.ranges()?;
                let range = *ranges.get(layer).ok_or(MappingError::IndexOutOfRange {
                    what: "layer",
                    index: layer,
                    count: ranges.len(),
                })?;

                let parts = segments
                    .iter()
                    .enumerate()
                    .map(|(index, segment)| Ok(make_part(key, index, *segment)?.with_velocity(range)))
                    .collect::<Result<Vec<_>, MappingError>>()?;

                let existing = store
                    .parts
                    .iter()
                    .filter(|part| {
                        part.key() == key
                            && layer_for(&ranges, part.velocity().min()) == Some(layer)
                    })
                    .count();
                let occupancy = existing + parts.len();
                let config = config.with_round_robins(config.round_robins().max(occupancy));

                let added: Vec<Uuid> = parts.iter().map(|part| part.id()).collect();
                store.parts.extend(parts);
                store.notes.insert(key, config);
                debug!(
                    key,
                    layer,
                    round_robins = config.round_robins(),
                    "Appended round-robin segments"
                );
                self.commit(&store, vec![key], added, Vec::new(), Vec::new())
            }
        };

        info!(
            key,
            file = ?file,
            segments = segments.len(),
            strategy = ?strategy,
            "Assigned segments"
        );
        Ok(applied)
    }

    /// Puts `part` into a grid cell, taking the target layer's velocity range.
    ///
    /// An occupied cell has its occupant replaced. An empty cell must be the
    /// layer's next free slot, since the grid fills slots in order; any other
    /// empty cell is rejected. A part already in the store is moved.
    pub fn place(
        &self,
        part: SamplePart,
        key: u8,
        layer: usize,
        round_robin: usize,
    ) -> Result<Applied, MappingError> {
        validate_key(key)?;
        let mut store = self.store.lock();
        let (added, removed) = Self::place_locked(&mut store, part, key, layer, round_robin)?;
        debug!(key, layer, round_robin, "Placed part");
        Ok(self.commit(&store, vec![key], added, removed, Vec::new()))
    }

    /// Reads `file` and places the whole of it into a grid cell.
    pub fn place_file(
        &self,
        key: u8,
        layer: usize,
        round_robin: usize,
        file: &Path,
    ) -> Result<Applied, MappingError> {
        validate_key(key)?;
        let metadata = self.read_metadata(file)?;
        let part = SamplePart::whole_file(key, file, metadata)?;
        self.place(part, key, layer, round_robin)
    }

    fn place_locked(
        store: &mut Store,
        mut part: SamplePart,
        key: u8,
        layer: usize,
        round_robin: usize,
    ) -> Result<(Vec<Uuid>, Vec<Uuid>), MappingError> {
        let config = store.configuration(key);
        let ranges = config.ranges()?;
        let range = *ranges.get(layer).ok_or(MappingError::IndexOutOfRange {
            what: "layer",
            index: layer,
            count: ranges.len(),
        })?;
        if round_robin >= config.round_robins() {
            return Err(MappingError::IndexOutOfRange {
                what: "round-robin slot",
                index: round_robin,
                count: config.round_robins(),
            });
        }

        // The grid as it would look without the part being placed, so a move
        // within the key sees its own cell as free.
        let id = part.id();
        let grid = SampleGrid::build(
            key,
            &config,
            store.parts.iter().filter(|existing| existing.id() != id),
        )?;
        let occupant = grid.slot(layer, round_robin)?.map(|occupant| occupant.id());
        let next_free = grid.layers()[layer].occupancy();
        if occupant.is_none() && round_robin != next_free {
            return Err(MappingError::InvalidInput(format!(
                "slot {} of layer {} on key {} is empty; the next free slot is {}",
                round_robin, layer, key, next_free
            )));
        }

        part.set_key(key);
        part.set_velocity(range);
        store.parts.retain(|existing| existing.id() != id);

        let mut removed = Vec::new();
        match occupant.and_then(|occupant| {
            store
                .parts
                .iter()
                .position(|existing| existing.id() == occupant)
        }) {
            Some(index) => {
                removed.push(store.parts[index].id());
                store.parts[index] = part;
            }
            // Appending puts the part after every other part of the layer, so
            // it projects into the next free slot.
            None => store.parts.push(part),
        }

        Ok((vec![id], removed))
    }

    /// Deletes the part occupying a grid cell. Empty cells are left alone.
    pub fn remove(
        &self,
        key: u8,
        layer: usize,
        round_robin: usize,
    ) -> Result<Applied, MappingError> {
        validate_key(key)?;
        let mut store = self.store.lock();
        let config = store.configuration(key);
        if layer >= config.layers() {
            return Err(MappingError::NotFound(format!(
                "layer {} on key {} (key has {} layers)",
                layer,
                key,
                config.layers()
            )));
        }
        let occupant = store.grid(key)?.slot(layer, round_robin)?.map(|p| p.id());
        let Some(removed) = occupant else {
            return Ok(Applied::default());
        };
        store.parts.retain(|part| part.id() != removed);

        debug!(key, layer, round_robin, part = %removed, "Removed part");
        Ok(self.commit(&store, vec![key], Vec::new(), vec![removed], Vec::new()))
    }

    /// Deletes a part by identifier.
    pub fn remove_part(&self, id: Uuid) -> Result<Applied, MappingError> {
        let mut store = self.store.lock();
        let index = store
            .parts
            .iter()
            .position(|part| part.id() == id)
            .ok_or_else(|| MappingError::NotFound(format!("part {}", id)))?;
        let key = store.parts.remove(index).key();
        Ok(self.commit(&store, vec![key], Vec::new(), vec![id], Vec::new()))
    }

    /// Changes the velocity range of one part. The range must sit inside one
    /// of the key's layers.
    pub fn set_velocity_range(
        &self,
        id: Uuid,
        velocity: VelocityRange,
    ) -> Result<Applied, MappingError> {
        let mut store = self.store.lock();
        let index = store
            .parts
            .iter()
            .position(|part| part.id() == id)
            .ok_or_else(|| MappingError::NotFound(format!("part {}", id)))?;
        let key = store.parts[index].key();
        let ranges = store.configuration(key).ranges()?;
        let fits = layer_for(&ranges, velocity.min())
            .is_some_and(|layer| velocity.max() <= ranges[layer].max());
        if !fits {
            return Err(MappingError::InvalidInput(format!(
                "velocity {} spans more than one layer of key {}",
                velocity, key
            )));
        }
        store.parts[index].set_velocity(velocity);
        Ok(self.commit(&store, vec![key], Vec::new(), Vec::new(), Vec::new()))
    }

    /// Removes every part on `key` and resets its configuration.
    pub fn clear_key(&self, key: u8) -> Result<Applied, MappingError> {
        validate_key(key)?;
        let mut store = self.store.lock();
        store.notes.remove(&key);
        let removed = store.replace_key(key, Vec::new());
        Ok(self.commit(&store, vec![key], Vec::new(), removed, Vec::new()))
    }

    /// Sets the layer and round-robin counts of `key`. Existing parts stay in
    /// the store; any that no longer fit show up as grid issues.
    pub fn configure_key(
        &self,
        key: u8,
        layers: usize,
        round_robins: usize,
        split: SplitMode,
    ) -> Result<NoteConfiguration, MappingError> {
        validate_key(key)?;
        let configuration = NoteConfiguration::new(layers, round_robins, split)?;
        let mut store = self.store.lock();
        store.notes.insert(key, configuration);
        self.publish(&store, MappingEvent::ConfigurationChanged { key, configuration });
        Ok(configuration)
    }

    pub fn set_mapping_mode(&self, mode: MappingMode) {
        let mut store = self.store.lock();
        if std::mem::replace(&mut store.mode, mode) != mode {
            self.publish(&store, MappingEvent::ModeChanged(mode));
        }
    }

    pub fn mapping_mode(&self) -> MappingMode {
        self.store.lock().mode
    }

    /// A snapshot of every part in store order.
    pub fn parts(&self) -> Vec<SamplePart> {
        self.store.lock().parts.clone()
    }

    pub fn parts_for_key(&self, key: u8) -> Vec<SamplePart> {
        self.store
            .lock()
            .parts
            .iter()
            .filter(|part| part.key() == key)
            .cloned()
            .collect()
    }

    pub fn configuration(&self, key: u8) -> NoteConfiguration {
        self.store.lock().configuration(key)
    }

    /// Explicitly configured keys, in key order.
    pub fn configurations(&self) -> BTreeMap<u8, NoteConfiguration> {
        self.store
            .lock()
            .notes
            .iter()
            .map(|(key, config)| (*key, *config))
            .collect()
    }

    /// Projects the grid for `key` from the current store.
    pub fn grid(&self, key: u8) -> Result<SampleGrid, MappingError> {
        validate_key(key)?;
        self.store.lock().grid(key)
    }

    /// Writes the current store out as a preset.
    ///
    /// The export works on a snapshot; only once it has fully succeeded are
    /// the exported paths recorded on the parts that still exist.
    pub fn export(
        &self,
        exporter: &PresetExporter,
        output: &Path,
    ) -> Result<ExportReport, MappingError> {
        let (parts, mode) = {
            let store = self.store.lock();
            (store.parts.clone(), store.mode)
        };

        let report = exporter.export(&parts, mode, output)?;

        let mut store = self.store.lock();
        for exported in &report.parts {
            if let Some(part) = store.parts.iter_mut().find(|part| part.id() == exported.id) {
                part.set_export_paths(exported.relative.clone(), exported.absolute.clone());
            }
        }
        self.publish(
            &store,
            MappingEvent::Exported {
                path: report.preset.clone(),
                parts: report.parts.len(),
            },
        );
        Ok(report)
    }

    /// Runs [`MappingEngine::export`] on a worker thread.
    pub fn export_in_background(
        self: &Arc<Self>,
        exporter: PresetExporter,
        output: PathBuf,
    ) -> Result<JoinHandle<Result<ExportReport, MappingError>>, MappingError> {
        let engine = Arc::clone(self);
        let thread_output = output.clone();
        std::thread::Builder::new()
            .name("samplemap-export".to_string())
            .spawn(move || engine.export(&exporter, &thread_output))
            .map_err(|e| MappingError::export_io(output, e))
    }
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.lock();
        f.debug_struct("MappingEngine")
            .field("parts", &store.parts.len())
            .field("configured_keys", &store.notes.len())
            .field("mode", &store.mode)
            .finish()
    }
}
