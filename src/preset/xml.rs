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
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::audio::AudioMetadata;
use crate::mapping::{MappingMode, SamplePart};
use crate::util::xml_escape;

/// Root element attributes of the preset schema.
const MAJOR_VERSION: u32 = 5;
const MINOR_VERSION: &str = "11.0_433";
const SCHEMA_CHANGE_COUNT: u32 = 4;
const CREATOR: &str = "samplemap";

/// File reference type for a path relative to the project.
const RELATIVE_PATH_TYPE_PROJECT: u32 = 3;

/// Loop mode value meaning no loop.
const LOOP_OFF: u32 = 0;

/// Round-robin mode value for cycling in order.
const ROUND_ROBIN_MODE_CYCLE: u32 = 0;

/// A part ready to render, with the paths of its exported copy.
#[derive(Debug, Clone, Copy)]
pub struct PresetPart<'a> {
    pub part: &'a SamplePart,
    pub metadata: &'a AudioMetadata,
    pub relative_path: &'a Path,
    pub absolute_path: &'a Path,
}

impl PresetPart<'_> {
    /// Placeholder checksum: the file size folded into 16 bits.
    pub fn checksum(&self) -> u64 {
        self.metadata.file_size % 65536
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, id: usize) -> fmt::Result {
        let part = self.part;
        let key = part.key();
        let velocity = part.velocity();
        let segment = part.segment();
        let relative = self.relative_path.to_string_lossy().replace('\\', "/");
        let absolute = self.absolute_path.to_string_lossy();
        let modified = self
            .metadata
            .modified_at
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());

        writeln!(f, "\t\t\t\t\t\t<MultiSamplePart Id=\"{}\" HasImportedSlicePoints=\"false\" NeedsAnalysisData=\"false\">", id)?;
        writeln!(f, "\t\t\t\t\t\t\t<LomId Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<Name Value=\"{}\" />", xml_escape(part.name()))?;
        writeln!(f, "\t\t\t\t\t\t\t<Selection Value=\"false\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<IsActive Value=\"true\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<Solo Value=\"false\" />")?;
        write_range(f, "KeyRange", key, key, key, key)?;
        write_range(
            f,
            "VelocityRange",
            velocity.min(),
            velocity.max(),
            velocity.crossfade_min(),
            velocity.crossfade_max(),
        )?;
        write_range(f, "SelectorRange", 0, 127, 0, 127)?;
        writeln!(f, "\t\t\t\t\t\t\t<RootKey Value=\"{}\" />", key)?;
        writeln!(f, "\t\t\t\t\t\t\t<Detune Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<TuneScale Value=\"100\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<Panorama Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<Volume Value=\"1\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<Link Value=\"false\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t<SampleStart Value=\"{}\" />", segment.start)?;
        writeln!(f, "\t\t\t\t\t\t\t<SampleEnd Value=\"{}\" />", segment.end)?;
        write_loop(f, "SustainLoop", segment.start, segment.end)?;
        write_loop(f, "ReleaseLoop", segment.start, segment.end)?;
        writeln!(f, "\t\t\t\t\t\t\t<SampleRef>")?;
        writeln!(f, "\t\t\t\t\t\t\t\t<FileRef>")?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<RelativePathType Value=\"{}\" />", RELATIVE_PATH_TYPE_PROJECT)?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<RelativePath Value=\"{}\" />", xml_escape(&relative))?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<Path Value=\"{}\" />", xml_escape(&absolute))?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<Type Value=\"1\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<LivePackName Value=\"\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<LivePackId Value=\"\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<OriginalFileSize Value=\"{}\" />", self.metadata.file_size)?;
        writeln!(f, "\t\t\t\t\t\t\t\t\t<OriginalCrc Value=\"{}\" />", self.checksum())?;
        writeln!(f, "\t\t\t\t\t\t\t\t</FileRef>")?;
        writeln!(f, "\t\t\t\t\t\t\t\t<LastModDate Value=\"{}\" />", modified)?;
        writeln!(f, "\t\t\t\t\t\t\t\t<SourceContext />")?;
        writeln!(f, "\t\t\t\t\t\t\t\t<SampleUsageHint Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t\t\t\t\t<DefaultDuration Value=\"{}\" />", part.segment_len())?;
        writeln!(f, "\t\t\t\t\t\t\t\t<DefaultSampleRate Value=\"{}\" />", self.metadata.sample_rate)?;
        writeln!(f, "\t\t\t\t\t\t\t</SampleRef>")?;
        writeln!(f, "\t\t\t\t\t\t</MultiSamplePart>")
    }
}

fn write_range(
    f: &mut fmt::Formatter<'_>,
    element: &str,
    min: u8,
    max: u8,
    crossfade_min: u8,
    crossfade_max: u8,
) -> fmt::Result {
    writeln!(f, "\t\t\t\t\t\t\t<{}>", element)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Min Value=\"{}\" />", min)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Max Value=\"{}\" />", max)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<CrossfadeMin Value=\"{}\" />", crossfade_min)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<CrossfadeMax Value=\"{}\" />", crossfade_max)?;
    writeln!(f, "\t\t\t\t\t\t\t</{}>", element)
}

fn write_loop(f: &mut fmt::Formatter<'_>, element: &str, start: u64, end: u64) -> fmt::Result {
    writeln!(f, "\t\t\t\t\t\t\t<{}>", element)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Start Value=\"{}\" />", start)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<End Value=\"{}\" />", end)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Mode Value=\"{}\" />", LOOP_OFF)?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Crossfade Value=\"0\" />")?;
    writeln!(f, "\t\t\t\t\t\t\t\t<Detune Value=\"0\" />")?;
    writeln!(f, "\t\t\t\t\t\t\t</{}>", element)
}

/// The full preset document. Rendering happens through `Display`.
#[derive(Debug, Clone)]
pub struct PresetDocument<'a> {
    parts: Vec<PresetPart<'a>>,
    mode: MappingMode,
    seed: u32,
}

impl<'a> PresetDocument<'a> {
    /// Creates a document. Parts are rendered in the order given.
    pub fn new(parts: Vec<PresetPart<'a>>, mode: MappingMode, seed: u32) -> Self {
        Self { parts, mode, seed }
    }

    pub fn parts(&self) -> &[PresetPart<'a>] {
        &self.parts
    }
}

impl fmt::Display for PresetDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let round_robin = self.mode == MappingMode::RoundRobin;

        writeln!(f, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(
            f,
            "<Ableton MajorVersion=\"{}\" MinorVersion=\"{}\" SchemaChangeCount=\"{}\" Creator=\"{}\" Revision=\"\">",
            MAJOR_VERSION, MINOR_VERSION, SCHEMA_CHANGE_COUNT, CREATOR
        )?;
        writeln!(f, "\t<MultiSampler>")?;
        writeln!(f, "\t\t<LomId Value=\"0\" />")?;
        writeln!(f, "\t\t<IsExpanded Value=\"true\" />")?;
        writeln!(f, "\t\t<On>")?;
        writeln!(f, "\t\t\t<Manual Value=\"true\" />")?;
        writeln!(f, "\t\t</On>")?;
        writeln!(f, "\t\t<Player>")?;
        writeln!(f, "\t\t\t<MultiSampleMap>")?;
        writeln!(f, "\t\t\t\t<SampleParts>")?;
        for (id, part) in self.parts.iter().enumerate() {
            part.write(f, id)?;
        }
        writeln!(f, "\t\t\t\t</SampleParts>")?;
        writeln!(f, "\t\t\t\t<LoadInRam Value=\"false\" />")?;
        writeln!(f, "\t\t\t\t<LayerCrossfade Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t<SourceContext />")?;
        writeln!(f, "\t\t\t\t<RoundRobin Value=\"{}\" />", round_robin)?;
        writeln!(f, "\t\t\t\t<RoundRobinMode Value=\"{}\" />", ROUND_ROBIN_MODE_CYCLE)?;
        writeln!(f, "\t\t\t\t<RoundRobinResetPeriod Value=\"0\" />")?;
        writeln!(f, "\t\t\t\t<RoundRobinRandomSeed Value=\"{}\" />", self.seed)?;
        writeln!(f, "\t\t\t</MultiSampleMap>")?;
        writeln!(f, "\t\t\t<LoopModulators>")?;
        writeln!(f, "\t\t\t\t<IsModulated Value=\"false\" />")?;
        writeln!(f, "\t\t\t</LoopModulators>")?;
        writeln!(f, "\t\t\t<Reverse Value=\"false\" />")?;
        writeln!(f, "\t\t\t<Snap Value=\"false\" />")?;
        writeln!(f, "\t\t</Player>")?;
        writeln!(f, "\t</MultiSampler>")?;
        writeln!(f, "</Ableton>")
    }
}
