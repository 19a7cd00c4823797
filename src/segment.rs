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
//! Turning amplitude envelopes into cut points and frame segments.

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Amplitude below which a rising edge is treated as noise rather than an onset.
pub const NOISE_FLOOR: f32 = 0.01;

/// Minimum spacing between accepted cuts, as a fraction of the envelope length.
pub const MIN_CUT_DISTANCE: f64 = 0.01;

/// Default number of frames summarized by each envelope value.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// A contiguous frame range `[start, end)` within a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
}

impl Segment {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of frames in the segment.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the segment is non-empty and lies inside a file of `total_frames`.
    pub fn validate(&self, total_frames: u64) -> Result<(), MappingError> {
        if self.end <= self.start {
            return Err(MappingError::InvalidInput(format!(
                "segment end {} must be after start {}",
                self.end, self.start
            )));
        }
        if self.end > total_frames {
            return Err(MappingError::InvalidInput(format!(
                "segment end {} is beyond the file length of {} frames",
                self.end, total_frames
            )));
        }
        Ok(())
    }
}

/// Computes the RMS of each `block_size` block of a mono signal.
/// A trailing partial block is included.
pub fn rms_envelope(signal: &[f32], block_size: usize) -> Vec<f32> {
    let block_size = block_size.max(1);
    signal
        .chunks(block_size)
        .map(|block| {
            let sum_squares: f32 = block.iter().map(|&x| x * x).sum();
            (sum_squares / block.len() as f32).sqrt()
        })
        .collect()
}

/// Transient cut positions over an amplitude envelope.
///
/// The iterator is lazy and holds no state beyond its cursor; cloning it or
/// calling [`transient_cuts`] again restarts the scan from the beginning.
#[derive(Clone, Debug)]
pub struct TransientCuts<'a> {
    envelope: &'a [f32],
    threshold: f32,
    max_diff: f32,
    index: usize,
    last_accepted: Option<f64>,
}

/// Detects onsets in `envelope`, returning normalized (0.0-1.0) cut positions.
///
/// A cut is placed where the jump to the next block, relative to the largest
/// jump anywhere in the envelope, exceeds `1 - sensitivity` and the next block
/// is above [`NOISE_FLOOR`]. Sensitivity is clamped into (0, 1].
pub fn transient_cuts(envelope: &[f32], sensitivity: f32) -> TransientCuts<'_> {
    let sensitivity = if sensitivity.is_nan() {
        1.0
    } else {
        sensitivity.clamp(f32::EPSILON, 1.0)
    };
    let max_diff = envelope
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .fold(0.0f32, f32::max);

    TransientCuts {
        envelope,
        threshold: 1.0 - sensitivity,
        max_diff,
        index: 0,
        last_accepted: None,
    }
}

impl Iterator for TransientCuts<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.envelope.len() < 2 || self.max_diff <= 0.0 {
            return None;
        }

        let total = self.envelope.len() as f64;
        while self.index + 1 < self.envelope.len() {
            let i = self.index;
            self.index += 1;

            let current = self.envelope[i];
            let next = self.envelope[i + 1];
            let normalized = (next - current).abs() / self.max_diff;
            if normalized <= self.threshold || next <= NOISE_FLOOR {
                continue;
            }

            let position = (i + 1) as f64 / total;
            if let Some(last) = self.last_accepted {
                if position - last < MIN_CUT_DISTANCE {
                    continue;
                }
            }
            self.last_accepted = Some(position);
            return Some(position);
        }
        None
    }
}

/// Sorts manually placed cut positions, drops anything outside (0, 1) and
/// removes duplicates.
pub fn normalize_cuts(cuts: &[f64]) -> Vec<f64> {
    let mut normalized: Vec<f64> = cuts
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0 && *c < 1.0)
        .collect();
    normalized.sort_by(f64::total_cmp);
    normalized.dedup();
    normalized
}

/// Converts normalized cut positions into contiguous segments spanning the file.
/// Cuts that collapse onto the same frame produce no empty segments.
pub fn segments_from_cuts(cuts: &[f64], total_frames: u64) -> Vec<Segment> {
    let mut boundaries = vec![0u64];
    boundaries.extend(
        normalize_cuts(cuts)
            .into_iter()
            .map(|cut| (cut * total_frames as f64).round() as u64),
    );
    boundaries.push(total_frames);

    boundaries
        .windows(2)
        .map(|pair| Segment::new(pair[0], pair[1]))
        .filter(|segment| !segment.is_empty())
        .collect()
}
