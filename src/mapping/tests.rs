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
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;

use super::*;
use crate::audio::SymphoniaMetadataProvider;
use crate::error::{MappingError, Warning};
use crate::preset::PresetExporter;
use crate::segment::{segments_from_cuts, Segment};
use crate::testutil::{silent_wav, FakeMetadata};
use crate::velocity::{SplitMode, VelocityRange};

fn fake_engine(files: &[(&str, u64)]) -> MappingEngine {
    let provider = files
        .iter()
        .fold(FakeMetadata::new(), |provider, (path, frames)| {
            provider.with_file(*path, *frames)
        });
    MappingEngine::new(provider)
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn ranges_on(engine: &MappingEngine, key: u8) -> Vec<(u8, u8)> {
    let mut ranges: Vec<(u8, u8)> = engine
        .parts_for_key(key)
        .iter()
        .map(|part| (part.velocity().min(), part.velocity().max()))
        .collect();
    ranges.sort();
    ranges
}

/// Pulls the Min and Max values of `element` out of every sample part in a
/// rendered preset.
fn preset_ranges(text: &str, element: &str) -> Vec<(u8, u8)> {
    let open = format!("<{}>", element);
    text.split("<MultiSamplePart ")
        .skip(1)
        .filter_map(|chunk| {
            let body = &chunk[chunk.find(&open)? + open.len()..];
            Some((attribute(body, "<Min Value=\"")?, attribute(body, "<Max Value=\"")?))
        })
        .collect()
}

fn attribute(body: &str, marker: &str) -> Option<u8> {
    let start = body.find(marker)? + marker.len();
    let end = start + body[start..].find('"')?;
    body[start..end].parse().ok()
}

fn read_preset(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

#[test]
fn test_single_file_full_velocity() {
    let engine = fake_engine(&[("/audio/kick.wav", 1000)]);
    let applied = engine.assign_file(60, Path::new("/audio/kick.wav")).unwrap();

    assert_eq!(applied.keys, vec![60]);
    assert_eq!(applied.added.len(), 1);
    let parts = engine.parts_for_key(60);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].velocity(), VelocityRange::FULL);
    assert_eq!(parts[0].segment(), Segment::new(0, 1000));
    assert_eq!(engine.configuration(60), NoteConfiguration::default());
}

#[test]
fn test_assign_file_replaces_key() {
    let engine = fake_engine(&[("/audio/a.wav", 10), ("/audio/b.wav", 20)]);
    let first = engine.assign_file(60, Path::new("/audio/a.wav")).unwrap();
    let second = engine.assign_file(60, Path::new("/audio/b.wav")).unwrap();

    assert_eq!(second.removed, first.added);
    let parts = engine.parts_for_key(60);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].source(), Path::new("/audio/b.wav"));
}

#[test]
fn test_four_velocity_layers() {
    let engine = fake_engine(&[
        ("/audio/pp.wav", 100),
        ("/audio/p.wav", 100),
        ("/audio/f.wav", 100),
        ("/audio/ff.wav", 100),
    ]);
    let files = paths(&["/audio/pp.wav", "/audio/p.wav", "/audio/f.wav", "/audio/ff.wav"]);
    engine
        .assign_files(60, &files, DropStrategy::Velocity)
        .unwrap();

    assert_eq!(
        ranges_on(&engine, 60),
        vec![(0, 31), (32, 63), (64, 95), (96, 127)]
    );
    let config = engine.configuration(60);
    assert_eq!(config.layers(), 4);
    assert_eq!(config.round_robins(), 1);
    assert_eq!(engine.mapping_mode(), MappingMode::Standard);

    // File order decides the layer.
    let grid = engine.grid(60).unwrap();
    let softest = grid.slot(0, 0).unwrap().unwrap();
    assert_eq!(softest.source(), Path::new("/audio/pp.wav"));
    assert!(!grid.has_overflow());
}

#[test]
fn test_crossfade_layers() {
    let engine = fake_engine(&[("/audio/a.wav", 100), ("/audio/b.wav", 100)]);
    engine
        .assign_files(60, &paths(&["/audio/a.wav", "/audio/b.wav"]), DropStrategy::Crossfade)
        .unwrap();

    let parts = engine.parts_for_key(60);
    let low = parts.iter().find(|p| p.velocity().min() == 0).unwrap();
    let high = parts.iter().find(|p| p.velocity().min() == 64).unwrap();
    assert_eq!(low.velocity().crossfade_min(), 0);
    assert_eq!(low.velocity().crossfade_max(), 95);
    assert_eq!(high.velocity().crossfade_min(), 32);
    assert_eq!(high.velocity().crossfade_max(), 127);
    assert_eq!(engine.configuration(60).split(), SplitMode::Crossfade);
}

#[test]
fn test_round_robin_drop_switches_mode() {
    let engine = fake_engine(&[
        ("/audio/a.wav", 100),
        ("/audio/b.wav", 100),
        ("/audio/c.wav", 100),
    ]);
    let events = engine.subscribe();
    engine
        .assign_files(
            38,
            &paths(&["/audio/a.wav", "/audio/b.wav", "/audio/c.wav"]),
            DropStrategy::RoundRobin,
        )
        .unwrap();

    assert_eq!(engine.mapping_mode(), MappingMode::RoundRobin);
    let config = engine.configuration(38);
    assert_eq!(config.layers(), 1);
    assert_eq!(config.round_robins(), 3);
    assert!(engine
        .parts_for_key(38)
        .iter()
        .all(|part| part.velocity() == VelocityRange::FULL));

    assert_eq!(
        events.try_recv().unwrap(),
        MappingEvent::ModeChanged(MappingMode::RoundRobin)
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        MappingEvent::PartsChanged { ref keys, ref added, .. } if keys == &vec![38] && added.len() == 3
    ));
    assert!(events.try_recv().is_err());

    // A velocity drop elsewhere leaves the mode alone.
    engine
        .assign_files(40, &paths(&["/audio/a.wav"]), DropStrategy::Velocity)
        .unwrap();
    assert_eq!(engine.mapping_mode(), MappingMode::RoundRobin);
}

#[test]
fn test_first_file_failure_aborts() {
    let engine = MappingEngine::new(
        FakeMetadata::new()
            .with_failing("/audio/bad.wav")
            .with_file("/audio/good.wav", 100),
    );
    let result = engine.assign_files(
        60,
        &paths(&["/audio/bad.wav", "/audio/good.wav"]),
        DropStrategy::Velocity,
    );
    assert!(matches!(
        result,
        Err(MappingError::MetadataUnavailable { ref path, .. }) if path == Path::new("/audio/bad.wav")
    ));
    assert!(engine.parts().is_empty());
    assert!(engine.configurations().is_empty());
}

#[test]
fn test_later_failure_skipped() {
    let engine = MappingEngine::new(
        FakeMetadata::new()
            .with_file("/audio/good.wav", 100)
            .with_failing("/audio/bad.wav")
            .with_file("/audio/other.wav", 100),
    );
    let applied = engine
        .assign_files(
            60,
            &paths(&["/audio/good.wav", "/audio/bad.wav", "/audio/other.wav"]),
            DropStrategy::Velocity,
        )
        .unwrap();

    assert_eq!(applied.added.len(), 2);
    assert_eq!(applied.warnings.len(), 1);
    assert!(matches!(
        &applied.warnings[0],
        Warning::FileSkipped { path, .. } if path == Path::new("/audio/bad.wav")
    ));
    assert_eq!(engine.configuration(60).layers(), 2);
    assert_eq!(ranges_on(&engine, 60), vec![(0, 63), (64, 127)]);
}

#[test]
fn test_empty_batch_rejected() {
    let engine = fake_engine(&[]);
    assert!(matches!(
        engine.assign_files(60, &[], DropStrategy::Velocity),
        Err(MappingError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.assign_segments(60, Path::new("/audio/a.wav"), &[], SegmentStrategy::Velocity),
        Err(MappingError::InvalidInput(_))
    ));
}

#[test]
fn test_invalid_key_rejected() {
    let engine = fake_engine(&[("/audio/a.wav", 100)]);
    assert!(matches!(
        engine.assign_file(128, Path::new("/audio/a.wav")),
        Err(MappingError::InvalidInput(_))
    ));
    assert!(engine.parts().is_empty());
}

#[test]
fn test_sequential_segments() {
    let engine = fake_engine(&[("/audio/loop.wav", 1000)]);
    let segments = segments_from_cuts(&[0.3, 0.6], 1000);
    let applied = engine
        .assign_segments(60, Path::new("/audio/loop.wav"), &segments, SegmentStrategy::Sequential)
        .unwrap();

    assert_eq!(applied.keys, vec![60, 61, 62]);
    let expected = [(60, 0, 300), (61, 300, 600), (62, 600, 1000)];
    for (key, start, end) in expected {
        let parts = engine.parts_for_key(key);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].segment(), Segment::new(start, end));
        assert_eq!(parts[0].velocity(), VelocityRange::FULL);
        assert_eq!(engine.configuration(key), NoteConfiguration::default());
    }
    assert_eq!(engine.parts_for_key(60)[0].name(), "loop 1");
    assert_eq!(engine.parts_for_key(62)[0].name(), "loop 3");
}

#[test]
fn test_sequential_past_last_key() {
    let engine = fake_engine(&[("/audio/loop.wav", 400)]);
    let segments = segments_from_cuts(&[0.25, 0.5, 0.75], 400);
    let applied = engine
        .assign_segments(126, Path::new("/audio/loop.wav"), &segments, SegmentStrategy::Sequential)
        .unwrap();

    assert_eq!(applied.keys, vec![126, 127]);
    assert_eq!(
        applied.warnings,
        vec![
            Warning::KeyRangeExceeded { segment: 2, key: 128 },
            Warning::KeyRangeExceeded { segment: 3, key: 129 },
        ]
    );
    assert_eq!(engine.parts().len(), 2);
}

#[test]
fn test_segments_beyond_file_rejected() {
    let engine = fake_engine(&[("/audio/loop.wav", 100)]);
    let result = engine.assign_segments(
        60,
        Path::new("/audio/loop.wav"),
        &[Segment::new(0, 50), Segment::new(50, 150)],
        SegmentStrategy::Velocity,
    );
    assert!(matches!(result, Err(MappingError::InvalidInput(_))));
    assert!(engine.parts().is_empty());
}

#[test]
fn test_velocity_segments() {
    let engine = fake_engine(&[("/audio/hits.wav", 900)]);
    let segments = segments_from_cuts(&[1.0 / 3.0, 2.0 / 3.0], 900);
    engine
        .assign_segments(36, Path::new("/audio/hits.wav"), &segments, SegmentStrategy::Velocity)
        .unwrap();

    assert_eq!(ranges_on(&engine, 36), vec![(0, 41), (42, 84), (85, 127)]);
    assert_eq!(engine.configuration(36).layers(), 3);
    let grid = engine.grid(36).unwrap();
    assert_eq!(grid.slot(2, 0).unwrap().unwrap().segment(), Segment::new(600, 900));
}

#[test]
fn test_round_robin_layer_grows() {
    let engine = fake_engine(&[("/audio/snare.wav", 1000)]);
    engine.configure_key(38, 2, 1, SplitMode::Separate).unwrap();

    let segments = segments_from_cuts(&[0.25, 0.5], 1000);
    engine
        .assign_segments(
            38,
            Path::new("/audio/snare.wav"),
            &segments,
            SegmentStrategy::RoundRobinLayer { layer: 1 },
        )
        .unwrap();
    let config = engine.configuration(38);
    assert_eq!(config.layers(), 2);
    assert_eq!(config.round_robins(), 3);
    let grid = engine.grid(38).unwrap();
    assert_eq!(grid.layers()[1].occupancy(), 3);
    assert_eq!(grid.layers()[0].occupancy(), 0);
    assert!(engine
        .parts_for_key(38)
        .iter()
        .all(|part| part.velocity().min() == 64));

    // A smaller batch on the other layer keeps the slot count.
    engine
        .assign_segments(
            38,
            Path::new("/audio/snare.wav"),
            &[Segment::new(0, 100)],
            SegmentStrategy::RoundRobinLayer { layer: 0 },
        )
        .unwrap();
    assert_eq!(engine.configuration(38).round_robins(), 3);
    assert_eq!(engine.parts_for_key(38).len(), 4);

    let result = engine.assign_segments(
        38,
        Path::new("/audio/snare.wav"),
        &[Segment::new(0, 100)],
        SegmentStrategy::RoundRobinLayer { layer: 2 },
    );
    assert!(matches!(
        result,
        Err(MappingError::IndexOutOfRange { what: "layer", index: 2, count: 2 })
    ));
    assert_eq!(engine.parts_for_key(38).len(), 4);
}

#[test]
fn test_place_replaces_occupant() {
    let engine = fake_engine(&[
        ("/audio/a.wav", 100),
        ("/audio/b.wav", 100),
        ("/audio/c.wav", 100),
    ]);
    engine
        .assign_files(60, &paths(&["/audio/a.wav", "/audio/b.wav"]), DropStrategy::Velocity)
        .unwrap();
    let before = engine.grid(60).unwrap().slot(1, 0).unwrap().unwrap().id();

    let applied = engine
        .place_file(60, 1, 0, Path::new("/audio/c.wav"))
        .unwrap();
    assert_eq!(applied.removed, vec![before]);

    let grid = engine.grid(60).unwrap();
    let placed = grid.slot(1, 0).unwrap().unwrap();
    assert_eq!(placed.source(), Path::new("/audio/c.wav"));
    assert_eq!(placed.velocity().min(), 64);
    assert_eq!(placed.velocity().max(), 127);
    assert_eq!(engine.parts_for_key(60).len(), 2);
}

#[test]
fn test_place_moves_existing_part() {
    let engine = fake_engine(&[("/audio/a.wav", 100)]);
    engine.assign_file(60, Path::new("/audio/a.wav")).unwrap();
    engine.configure_key(62, 2, 1, SplitMode::Separate).unwrap();

    let part = engine.parts_for_key(60).remove(0);
    engine.place(part.clone(), 62, 0, 0).unwrap();

    assert!(engine.parts_for_key(60).is_empty());
    let moved = engine.parts_for_key(62);
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id(), part.id());
    assert_eq!(moved[0].velocity().max(), 63);
}

#[test]
fn test_place_out_of_range() {
    let engine = fake_engine(&[("/audio/a.wav", 100)]);
    engine.assign_file(60, Path::new("/audio/a.wav")).unwrap();
    let part = engine.parts_for_key(60).remove(0);

    assert!(matches!(
        engine.place(part.clone(), 60, 1, 0),
        Err(MappingError::IndexOutOfRange { what: "layer", .. })
    ));
    assert!(matches!(
        engine.place(part, 60, 0, 1),
        Err(MappingError::IndexOutOfRange { what: "round-robin slot", .. })
    ));
    assert_eq!(engine.parts().len(), 1);
}

#[test]
fn test_place_into_empty_slot_past_next_free() {
    let engine = fake_engine(&[("/audio/a.wav", 100), ("/audio/b.wav", 100)]);
    engine.configure_key(60, 1, 2, SplitMode::Separate).unwrap();
    let events = engine.subscribe();

    assert!(matches!(
        engine.place_file(60, 0, 1, Path::new("/audio/a.wav")),
        Err(MappingError::InvalidInput(_))
    ));
    assert!(engine.parts().is_empty());
    assert!(events.try_recv().is_err());

    engine.place_file(60, 0, 0, Path::new("/audio/a.wav")).unwrap();
    let second = engine
        .place_file(60, 0, 1, Path::new("/audio/b.wav"))
        .unwrap();
    let grid = engine.grid(60).unwrap();
    assert_eq!(grid.slot(0, 1).unwrap().unwrap().id(), second.added[0]);

    let applied = engine.remove(60, 0, 1).unwrap();
    assert_eq!(applied.removed, second.added);
    let remaining = engine.parts_for_key(60);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].source(), Path::new("/audio/a.wav"));
}

#[test]
fn test_place_moves_within_layer() {
    let engine = fake_engine(&[("/audio/a.wav", 100), ("/audio/b.wav", 100)]);
    engine
        .assign_files(60, &paths(&["/audio/a.wav", "/audio/b.wav"]), DropStrategy::RoundRobin)
        .unwrap();
    let first = engine.grid(60).unwrap().slot(0, 0).unwrap().unwrap().clone();

    // Without the moved part the layer holds one part, so slot 1 is next free.
    let applied = engine.place(first.clone(), 60, 0, 1).unwrap();
    assert!(applied.removed.is_empty());

    let grid = engine.grid(60).unwrap();
    assert_eq!(grid.slot(0, 1).unwrap().unwrap().id(), first.id());
    assert_eq!(grid.slot(0, 0).unwrap().unwrap().source(), Path::new("/audio/b.wav"));
    assert_eq!(engine.parts_for_key(60).len(), 2);
}

#[test]
fn test_remove_cells() {
    let engine = fake_engine(&[("/audio/a.wav", 100), ("/audio/b.wav", 100)]);
    engine
        .assign_files(60, &paths(&["/audio/a.wav", "/audio/b.wav"]), DropStrategy::Velocity)
        .unwrap();

    assert!(matches!(engine.remove(60, 2, 0), Err(MappingError::NotFound(_))));
    assert!(matches!(
        engine.remove(60, 0, 1),
        Err(MappingError::IndexOutOfRange { .. })
    ));

    let applied = engine.remove(60, 0, 0).unwrap();
    assert_eq!(applied.removed.len(), 1);
    assert_eq!(engine.parts_for_key(60).len(), 1);

    // Emptied cells stay addressable.
    assert!(engine.remove(60, 0, 0).unwrap().is_noop());
    assert_eq!(engine.configuration(60).layers(), 2);
}

#[test]
fn test_part_edits() {
    let engine = fake_engine(&[("/audio/a.wav", 100)]);
    engine.assign_file(60, Path::new("/audio/a.wav")).unwrap();
    let id = engine.parts()[0].id();

    let range = VelocityRange::hard(10, 20).unwrap();
    engine.set_velocity_range(id, range).unwrap();
    assert_eq!(engine.parts()[0].velocity(), range);

    engine.configure_key(60, 2, 1, SplitMode::Separate).unwrap();
    let spanning = VelocityRange::hard(60, 70).unwrap();
    assert!(matches!(
        engine.set_velocity_range(id, spanning),
        Err(MappingError::InvalidInput(_))
    ));
    assert_eq!(engine.parts()[0].velocity(), range);

    engine.remove_part(id).unwrap();
    assert!(engine.parts().is_empty());
    assert!(matches!(engine.remove_part(id), Err(MappingError::NotFound(_))));
}

#[test]
fn test_clear_key_resets_configuration() {
    let engine = fake_engine(&[("/audio/a.wav", 100), ("/audio/b.wav", 100)]);
    engine
        .assign_files(60, &paths(&["/audio/a.wav", "/audio/b.wav"]), DropStrategy::Velocity)
        .unwrap();
    let applied = engine.clear_key(60).unwrap();

    assert_eq!(applied.removed.len(), 2);
    assert!(engine.parts().is_empty());
    assert_eq!(engine.configuration(60), NoteConfiguration::default());
    assert!(engine.configurations().is_empty());
}

#[test]
fn test_configure_key_publishes() {
    let engine = fake_engine(&[]);
    let events = engine.subscribe();
    let config = engine.configure_key(48, 3, 2, SplitMode::Crossfade).unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        MappingEvent::ConfigurationChanged {
            key: 48,
            configuration: config
        }
    );
    assert!(matches!(
        engine.configure_key(48, 0, 2, SplitMode::Separate),
        Err(MappingError::InvalidConfiguration(_))
    ));
    assert_eq!(engine.configuration(48), config);

    engine.set_mapping_mode(MappingMode::RoundRobin);
    engine.set_mapping_mode(MappingMode::RoundRobin);
    assert_eq!(
        events.try_recv().unwrap(),
        MappingEvent::ModeChanged(MappingMode::RoundRobin)
    );
    assert!(events.try_recv().is_err());
}

#[test]
fn test_export_round_trip() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let files: Vec<PathBuf> = ["soft.wav", "medium.wav", "hard.wav"]
        .iter()
        .map(|name| silent_wav(source_dir.path(), name, 500))
        .collect();
    let hat = silent_wav(source_dir.path(), "hat.wav", 800);

    let engine = MappingEngine::new(SymphoniaMetadataProvider::new());
    engine.assign_files(36, &files, DropStrategy::Velocity).unwrap();
    engine.assign_file(42, &hat).unwrap();

    let report = engine
        .export(&PresetExporter::new().with_seed(7), &out_dir.path().join("Drums"))
        .unwrap();
    assert_eq!(report.parts.len(), 4);

    let text = read_preset(&report.preset);
    let keys = preset_ranges(&text, "KeyRange");
    let velocities = preset_ranges(&text, "VelocityRange");
    assert_eq!(keys, vec![(36, 36), (36, 36), (36, 36), (42, 42)]);
    assert_eq!(velocities, vec![(0, 41), (42, 84), (85, 127), (0, 127)]);
    assert!(text.contains("<RoundRobin Value=\"false\" />"));
    assert!(text.contains("<SampleEnd Value=\"800\" />"));

    for name in ["soft.wav", "medium.wav", "hard.wav", "hat.wav"] {
        assert!(out_dir.path().join("Samples/Imported").join(name).exists());
    }
    for part in engine.parts() {
        let relative = part.relative_path().unwrap();
        assert!(relative.starts_with("Samples/Imported"));
        assert!(part.absolute_path().unwrap().is_absolute());
    }
}

#[test]
fn test_failed_export_leaves_store() {
    let out_dir = tempfile::tempdir().unwrap();
    // Metadata is known but the file itself does not exist, so the copy fails.
    let engine = fake_engine(&[("/nonexistent/ghost.wav", 100)]);
    engine.assign_file(60, Path::new("/nonexistent/ghost.wav")).unwrap();
    let events = engine.subscribe();
    let before = engine.parts();

    let result = engine.export(&PresetExporter::new(), &out_dir.path().join("Ghost"));
    assert!(matches!(result, Err(MappingError::ExportIOFailure { .. })));
    assert!(!out_dir.path().join("Ghost.adv").exists());
    assert_eq!(engine.parts(), before);
    assert!(engine.parts()[0].relative_path().is_none());
    assert!(events.try_recv().is_err());
}

#[test]
fn test_export_in_background() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let file = silent_wav(source_dir.path(), "pad.wav", 300);

    let engine = Arc::new(MappingEngine::default());
    engine.assign_file(48, &file).unwrap();
    let events = engine.subscribe();

    let handle = engine
        .export_in_background(PresetExporter::new(), out_dir.path().join("Pad.adv"))
        .unwrap();
    let report = handle.join().unwrap().unwrap();

    assert_eq!(report.preset, out_dir.path().join("Pad.adv"));
    assert_eq!(
        events.try_recv().unwrap(),
        MappingEvent::Exported {
            path: out_dir.path().join("Pad.adv"),
            parts: 1
        }
    );
}

#[test]
fn test_export_same_file_names() {
    let source_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let first_dir = source_dir.path().join("a");
    let second_dir = source_dir.path().join("b");
    std::fs::create_dir(&first_dir).unwrap();
    std::fs::create_dir(&second_dir).unwrap();
    let first = silent_wav(&first_dir, "kick.wav", 100);
    let second = silent_wav(&second_dir, "kick.wav", 200);

    let engine = MappingEngine::new(SymphoniaMetadataProvider::new());
    engine.assign_file(36, &first).unwrap();
    engine.assign_file(38, &second).unwrap();

    let report = engine
        .export(&PresetExporter::new(), &out_dir.path().join("Kicks"))
        .unwrap();
    assert_eq!(report.parts.len(), 2);

    let samples = out_dir.path().join("Samples/Imported");
    for (key, name, source) in [(36, "kick.wav", &first), (38, "kick-2.wav", &second)] {
        let part = engine.parts_for_key(key).remove(0);
        assert_eq!(
            part.relative_path().unwrap(),
            Path::new("Samples/Imported").join(name)
        );
        assert_eq!(
            std::fs::read(samples.join(name)).unwrap(),
            std::fs::read(source).unwrap()
        );
    }

    let text = read_preset(&report.preset);
    assert!(text.contains("Samples/Imported/kick.wav"));
    assert!(text.contains("Samples/Imported/kick-2.wav"));
    let leftovers: Vec<_> = std::fs::read_dir(&samples)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_events_follow_commit_order() {
    let files: Vec<String> = (0..8).map(|i| format!("/audio/{}.wav", i)).collect();
    let engine = Arc::new(fake_engine(
        &files.iter().map(|f| (f.as_str(), 100)).collect::<Vec<_>>(),
    ));
    let events = engine.subscribe();

    let workers: Vec<_> = files
        .chunks(4)
        .map(|chunk| {
            let engine = engine.clone();
            let chunk: Vec<PathBuf> = chunk.iter().map(PathBuf::from).collect();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    for file in &chunk {
                        engine.assign_file(60, file).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Replaying the events must end on the part the store actually holds.
    let mut current = None;
    for event in events.try_iter() {
        if let MappingEvent::PartsChanged { added, removed, .. } = event {
            if let Some(previous) = current {
                assert_eq!(removed, vec![previous]);
            }
            current = added.first().copied();
        }
    }
    let held = engine.parts_for_key(60);
    assert_eq!(held.len(), 1);
    assert_eq!(current, Some(held[0].id()));
}
