//! Sample table interpretation — maps sample indices to file byte
//! offsets, sizes, timestamps, durations, and keyframe status.
//!
//! Uses the parsed stsc, stsz, stco/co64, stts, ctts, and stss data to
//! build a flat per-track index for efficient random access. The same
//! machinery serves every media kind; audio tracks simply have no stss
//! (every sample is sync) and usually no ctts.

use crate::mp4::boxes::{CttsEntry, ParsedTrack, SttsEntry};
use reel_common::{DemuxError, DemuxResult};
use tracing::debug;

/// Flat entry for a single sample, pre-computed for fast access.
#[derive(Clone, Debug)]
pub struct SampleEntry {
    /// Byte offset in the file where this sample's data starts.
    pub offset: u64,
    /// Byte size of the sample data.
    pub size: u32,
    /// Decoding timestamp in media timescale units.
    pub dts: u64,
    /// Composition (presentation) timestamp in media timescale units.
    pub cts: i64,
    /// Sample duration in media timescale units.
    pub dur: u32,
    /// Whether this sample is a sync sample (keyframe).
    pub is_sync: bool,
}

/// Pre-computed sample table for one track.
#[derive(Clone, Debug)]
pub struct SampleTable {
    /// All samples in decode order.
    pub samples: Vec<SampleEntry>,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Total duration in timescale units.
    pub duration: u64,
}

impl SampleTable {
    /// Build a `SampleTable` from parsed track data.
    pub fn build(track: &ParsedTrack) -> DemuxResult<Self> {
        let sample_count = track.stsz.sample_count as usize;
        if sample_count == 0 {
            return Ok(SampleTable {
                samples: Vec::new(),
                timescale: track.timescale,
                duration: track.duration,
            });
        }

        let offsets_and_sizes = build_sample_offsets(track, sample_count)?;
        let timing = build_timing(&track.stts, sample_count);
        let cts_offsets = if track.ctts.is_empty() {
            vec![0i32; sample_count]
        } else {
            build_cts_offsets(&track.ctts, sample_count)
        };
        let sync = &track.sync_samples;

        let mut samples = Vec::with_capacity(sample_count);
        for i in 0..sample_count {
            let (offset, size) = offsets_and_sizes[i];
            let (dts, dur) = timing[i];
            // stss lists 1-based sample numbers; an absent box means
            // every sample is a sync sample.
            let is_sync = sync.is_empty() || sync.binary_search(&(i as u32 + 1)).is_ok();

            samples.push(SampleEntry {
                offset,
                size,
                dts,
                cts: dts as i64 + cts_offsets[i] as i64,
                dur,
                is_sync,
            });
        }

        debug!(
            "SampleTable: track {} -> {} samples, timescale={}, duration={}",
            track.track_id,
            samples.len(),
            track.timescale,
            track.duration
        );

        Ok(SampleTable {
            samples,
            timescale: track.timescale,
            duration: track.duration,
        })
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        self.duration as f64 / self.timescale as f64
    }

    /// Index of the sample with the greatest presentation timestamp
    /// ≤ `target_ticks`. `None` when the table is empty or every sample
    /// is later than the target.
    pub fn find_at_or_before(&self, target_ticks: i64) -> Option<usize> {
        let mut best: Option<(usize, i64)> = None;
        // CTS is not monotonic when composition offsets reorder frames,
        // so scan the whole table rather than binary-searching DTS.
        for (i, s) in self.samples.iter().enumerate() {
            if s.cts <= target_ticks && best.map_or(true, |(_, cts)| s.cts > cts) {
                best = Some((i, s.cts));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Index of the sample with the smallest presentation timestamp
    /// (the stream's first packet in display order).
    pub fn earliest_sample(&self) -> Option<usize> {
        self.samples
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.cts)
            .map(|(i, _)| i)
    }
}

/// Build (file_offset, size) for each sample using stsc + stco + stsz.
///
/// The stsc table maps chunk ranges to samples-per-chunk counts;
/// combined with chunk offsets and sample sizes this yields the exact
/// byte position of every sample.
fn build_sample_offsets(
    track: &ParsedTrack,
    sample_count: usize,
) -> DemuxResult<Vec<(u64, u32)>> {
    let mut result = Vec::with_capacity(sample_count);
    let mut sample_idx: usize = 0;

    for (chunk_idx, &chunk_offset) in track.chunk_offsets.iter().enumerate() {
        // Chunk numbers are 1-based in stsc.
        let chunk_num = chunk_idx as u32 + 1;
        let samples_in_chunk = samples_per_chunk_for(&track.stsc, chunk_num);

        let mut offset = chunk_offset;
        for _ in 0..samples_in_chunk {
            if sample_idx >= sample_count {
                break;
            }

            let size = if track.stsz.default_sample_size > 0 {
                track.stsz.default_sample_size
            } else if sample_idx < track.stsz.sample_sizes.len() {
                track.stsz.sample_sizes[sample_idx]
            } else {
                return Err(DemuxError::CorruptContainer {
                    offset: 0,
                    reason: format!(
                        "sample index {} exceeds stsz table length {}",
                        sample_idx,
                        track.stsz.sample_sizes.len()
                    ),
                });
            };

            result.push((offset, size));
            offset += size as u64;
            sample_idx += 1;
        }
    }

    if result.len() != sample_count {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!(
                "built {} sample offsets but stsz declares {} (stsc/stco/stsz mismatch)",
                result.len(),
                sample_count
            ),
        });
    }

    Ok(result)
}

/// How many samples the given chunk (1-based) holds, per the stsc
/// entries. Each entry applies from its `first_chunk` until the next
/// entry's `first_chunk`.
fn samples_per_chunk_for(stsc: &[crate::mp4::boxes::StscEntry], chunk_num: u32) -> u32 {
    let mut spc = 1;
    for entry in stsc {
        if entry.first_chunk <= chunk_num {
            spc = entry.samples_per_chunk;
        } else {
            break;
        }
    }
    spc
}

/// Build (dts, duration) per sample from the stts entries. A short
/// stts is padded with its last delta.
fn build_timing(stts: &[SttsEntry], sample_count: usize) -> Vec<(u64, u32)> {
    let mut timing = Vec::with_capacity(sample_count);
    let mut dts: u64 = 0;

    for entry in stts {
        for _ in 0..entry.sample_count {
            if timing.len() >= sample_count {
                break;
            }
            timing.push((dts, entry.sample_delta));
            dts += entry.sample_delta as u64;
        }
    }

    let last_delta = stts.last().map(|e| e.sample_delta).unwrap_or(1);
    while timing.len() < sample_count {
        timing.push((dts, last_delta));
        dts += last_delta as u64;
    }

    timing
}

/// Expand ctts run-length entries to one composition offset per sample.
fn build_cts_offsets(ctts: &[CttsEntry], sample_count: usize) -> Vec<i32> {
    let mut offsets = Vec::with_capacity(sample_count);

    for entry in ctts {
        for _ in 0..entry.sample_count {
            if offsets.len() >= sample_count {
                break;
            }
            offsets.push(entry.sample_offset);
        }
    }

    while offsets.len() < sample_count {
        offsets.push(0);
    }

    offsets
}
