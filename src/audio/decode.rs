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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::error::MetadataError;
use crate::segment::rms_envelope;

/// An opened audio track ready for packet-by-packet decoding.
pub(super) struct OpenTrack {
    pub format_reader: Box<dyn FormatReader>,
    pub track_id: u32,
    pub params: CodecParameters,
}

impl OpenTrack {
    /// Probes the file and selects its first audio track.
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        // Include the path so the caller sees which file failed.
        let file = File::open(path).map_err(|e| {
            MetadataError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(MetadataError::NoAudioTrack)?;

        Ok(Self {
            track_id: track.id,
            params: track.codec_params.clone(),
            format_reader,
        })
    }

    pub fn decoder(&self) -> Result<Box<dyn Decoder>, MetadataError> {
        let decoder_opts: DecoderOptions = Default::default();
        Ok(get_codecs().make(&self.params, &decoder_opts)?)
    }

    /// Reads the next packet belonging to this track. `Ok(None)` means EOF.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, MetadataError> {
        loop {
            match self.format_reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => return Ok(Some(packet)),
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None)
                }
                // Some readers report a decode error at EOF instead of an IO error.
                Err(SymphoniaError::DecodeError(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Decodes every remaining packet, handing each interleaved buffer to `sink`.
    pub fn decode_all<F>(&mut self, mut sink: F) -> Result<(), MetadataError>
    where
        F: FnMut(&[f32], usize),
    {
        let mut decoder = self.decoder()?;
        let mut buffer: Option<SampleBuffer<f32>> = None;

        while let Some(packet) = self.next_packet()? {
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                // Skip corrupt packets rather than failing the whole file.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if channels == 0 || decoded.frames() == 0 {
                continue;
            }

            let capacity = decoded.capacity() as u64;
            let needs_new = buffer
                .as_ref()
                .map_or(true, |b| (b.capacity() as u64) < capacity * channels as u64);
            if needs_new {
                buffer = Some(SampleBuffer::new(capacity, spec));
            }
            if let Some(buffer) = buffer.as_mut() {
                buffer.copy_interleaved_ref(decoded);
                sink(buffer.samples(), channels);
            }
        }

        Ok(())
    }
}

/// A decoded file, folded down to one channel.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples (channel average).
    pub samples: Vec<f32>,
    /// Sample rate of the source.
    pub sample_rate: u32,
}

/// Decodes an audio file to mono by averaging its channels.
pub fn decode_mono(path: &Path) -> Result<DecodedAudio, MetadataError> {
    let mut track = OpenTrack::open(path)?;
    let sample_rate = track
        .params
        .sample_rate
        .ok_or(MetadataError::MissingSampleRate)?;

    let mut samples = Vec::new();
    if let Some(n_frames) = track.params.n_frames {
        samples.reserve(n_frames as usize);
    }
    track.decode_all(|interleaved, channels| {
        samples.extend(
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    })?;

    debug!(
        path = ?path,
        frames = samples.len(),
        sample_rate,
        "Decoded audio to mono"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decodes a file and returns its RMS envelope at the given block size along
/// with the number of frames the envelope covers.
pub fn envelope_for_file(
    path: &Path,
    block_size: usize,
) -> Result<(Vec<f32>, u64), MetadataError> {
    let decoded = decode_mono(path)?;
    let envelope = rms_envelope(&decoded.samples, block_size);
    Ok((envelope, decoded.samples.len() as u64))
}
