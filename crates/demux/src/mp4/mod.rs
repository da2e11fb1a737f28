//! MP4/MOV (ISO BMFF) demuxer.
//!
//! Parses the moov metadata up front, flattens every track's sample
//! tables, and yields samples as opaque packets in file storage order —
//! the container's arrival order across all streams.

pub mod boxes;
pub mod sample;

use boxes::{parse_ftyp, parse_moov, read_box_header, skip_box, ParsedMoov, FTYP, MOOV};
use reel_common::{
    AudioParams, CodecId, ContainerFormat, DemuxError, DemuxResult, MediaKind, Packet, StreamInfo,
    TimeBase, VideoParams,
};
use sample::SampleTable;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, info};

use crate::probe::FormatDetector;
use crate::source::ByteSource;
use crate::traits::{DemuxOptions, Demuxer, ReaderState};

/// MP4 demuxer — owns its byte source and a flattened sample index.
pub struct Mp4Demuxer {
    source: Box<dyn ByteSource>,
    streams: Vec<StreamInfo>,
    /// Per-stream sample tables, parallel to `streams`.
    tables: Vec<SampleTable>,
    /// Arrival order: (stream index, sample index) sorted by file offset.
    order: Vec<(u32, u32)>,
    /// Inverse of `order`: position of each (stream, sample) pair.
    order_pos: Vec<Vec<u32>>,
    /// Next entry of `order` to read.
    cursor: usize,
    state: ReaderState,
}

impl Mp4Demuxer {
    /// Parse the container structure from a source positioned at 0.
    pub fn new(mut source: Box<dyn ByteSource>, _options: DemuxOptions) -> DemuxResult<Self> {
        let moov = match find_and_parse_moov(&mut source) {
            Ok(moov) => moov,
            Err(DemuxError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let offset = source.seek(SeekFrom::Current(0)).unwrap_or(0);
                return Err(DemuxError::TruncatedStream {
                    offset,
                    reason: "container metadata ends prematurely".into(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut streams = Vec::with_capacity(moov.tracks.len());
        let mut tables = Vec::with_capacity(moov.tracks.len());
        for track in &moov.tracks {
            let table = SampleTable::build(track)?;
            streams.push(stream_info(track));
            tables.push(table);
        }

        // Merge every track's samples into one index ordered by where
        // the payload bytes sit in the file. That is the order an
        // interleaved writer produced them in, and the order packets
        // come out.
        let mut order: Vec<(u32, u32)> = Vec::new();
        for (stream_idx, table) in tables.iter().enumerate() {
            for sample_idx in 0..table.samples.len() {
                order.push((stream_idx as u32, sample_idx as u32));
            }
        }
        order.sort_by_key(|&(t, s)| tables[t as usize].samples[s as usize].offset);

        let mut order_pos: Vec<Vec<u32>> = tables
            .iter()
            .map(|t| vec![0u32; t.samples.len()])
            .collect();
        for (pos, &(t, s)) in order.iter().enumerate() {
            order_pos[t as usize][s as usize] = pos as u32;
        }

        info!(
            "MP4: {} stream(s), {} packets, {:.2}s",
            streams.len(),
            order.len(),
            tables.iter().map(|t| t.duration_secs()).fold(0.0, f64::max)
        );

        Ok(Mp4Demuxer {
            source,
            streams,
            tables,
            order,
            order_pos,
            cursor: 0,
            state: ReaderState::Initialized,
        })
    }

    /// Read one sample's payload. Index corruption (offsets past the
    /// physical end) reports as `CorruptContainer`, not silent
    /// truncation.
    fn read_sample_data(&mut self, offset: u64, size: u32) -> DemuxResult<Vec<u8>> {
        self.source.seek_to(offset).map_err(|e| match e {
            DemuxError::OutOfRange { offset, len } => DemuxError::CorruptContainer {
                offset,
                reason: format!("sample offset beyond the {len}-byte source"),
            },
            other => other,
        })?;

        let mut data = vec![0u8; size as usize];
        self.source.read_exact(&mut data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DemuxError::CorruptContainer {
                    offset,
                    reason: format!("sample of {size} bytes extends past the end of the source"),
                }
            } else {
                DemuxError::Io(e)
            }
        })?;

        Ok(data)
    }
}

impl Demuxer for Mp4Demuxer {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_packet(&mut self) -> DemuxResult<Option<Packet>> {
        match self.state {
            ReaderState::Exhausted => return Ok(None),
            ReaderState::Failed => {
                return Err(DemuxError::CorruptContainer {
                    offset: 0,
                    reason: "demuxer halted on earlier corruption; seek to recover".into(),
                })
            }
            _ => {}
        }

        let Some(&(stream_idx, sample_idx)) = self.order.get(self.cursor) else {
            self.state = ReaderState::Exhausted;
            return Ok(None);
        };

        let entry = self.tables[stream_idx as usize].samples[sample_idx as usize].clone();
        let stream_id = self.streams[stream_idx as usize].id;

        let data = match self.read_sample_data(entry.offset, entry.size) {
            Ok(data) => data,
            Err(e @ DemuxError::CorruptContainer { .. }) => {
                self.state = ReaderState::Failed;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.cursor += 1;
        self.state = ReaderState::Streaming;

        Ok(Some(Packet {
            stream_id,
            data,
            ts: entry.cts,
            dur: entry.dur as u64,
            is_key: entry.is_sync,
        }))
    }

    fn seek(&mut self, stream_id: u32, ts: i64) -> DemuxResult<i64> {
        let stream_idx = self
            .streams
            .iter()
            .position(|s| s.id == stream_id)
            .ok_or(DemuxError::InvalidStream(stream_id))?;

        let table = &self.tables[stream_idx];
        if table.samples.is_empty() {
            // Nothing to land on; park at end of stream.
            self.cursor = self.order.len();
            self.state = ReaderState::Streaming;
            return Ok(ts);
        }

        // Greatest timestamp at or before the target; clamp to the
        // stream's earliest sample when the target precedes it.
        let sample_idx = table
            .find_at_or_before(ts)
            .or_else(|| table.earliest_sample())
            .unwrap_or(0);
        let actual = table.samples[sample_idx].cts;

        self.cursor = self.order_pos[stream_idx][sample_idx] as usize;
        self.state = ReaderState::Streaming;

        debug!(
            "MP4 seek: stream {} ts {} -> sample {} (ts {}, order pos {})",
            stream_id, ts, sample_idx, actual, self.cursor
        );
        Ok(actual)
    }
}

// ─── Probing ────────────────────────────────────────────────────────

/// Detector for ISO BMFF content.
pub struct Mp4Detector;

impl FormatDetector for Mp4Detector {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Mp4
    }

    fn score(&self, window: &[u8]) -> u8 {
        if window.len() < 8 {
            return 0;
        }
        let tag = &window[4..8];
        if tag == b"ftyp" {
            return 100;
        }
        // Some MOV files lead with other top-level boxes.
        if tag == b"moov" || tag == b"mdat" || tag == b"free" || tag == b"skip" || tag == b"wide" {
            return 60;
        }
        0
    }

    fn instantiate(
        &self,
        source: Box<dyn ByteSource>,
        options: DemuxOptions,
    ) -> DemuxResult<Box<dyn Demuxer>> {
        Ok(Box::new(Mp4Demuxer::new(source, options)?))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Scan top-level boxes and parse the moov box.
fn find_and_parse_moov<R: Read + Seek>(reader: &mut R) -> DemuxResult<ParsedMoov> {
    reader.seek(SeekFrom::Start(0))?;

    loop {
        let header = match read_box_header(reader)? {
            Some(h) => h,
            None => {
                return Err(DemuxError::CorruptContainer {
                    offset: 0,
                    reason: "no moov box found in file".into(),
                });
            }
        };

        match header.box_type {
            FTYP => {
                let _ftyp = parse_ftyp(reader, &header)?;
                skip_box(reader, &header)?;
            }
            MOOV => {
                return parse_moov(reader, &header);
            }
            _ => skip_box(reader, &header)?,
        }
    }
}

/// Map a sample entry FourCC to a codec id.
fn codec_from_fourcc(fourcc: u32) -> CodecId {
    match fourcc {
        boxes::AVC1 | boxes::AVC3 => CodecId::H264,
        boxes::HEV1 | boxes::HVC1 => CodecId::H265,
        boxes::VP08 => CodecId::Vp8,
        boxes::VP09 => CodecId::Vp9,
        boxes::AV01 => CodecId::Av1,
        boxes::MP4A => CodecId::Aac,
        boxes::OPUS => CodecId::Opus,
        boxes::FLAC => CodecId::Flac,
        _ => CodecId::Unknown,
    }
}

/// Build the public stream descriptor for a parsed track.
fn stream_info(track: &boxes::ParsedTrack) -> StreamInfo {
    let desc = &track.sample_desc;
    StreamInfo {
        id: track.track_id,
        kind: track.kind,
        codec: codec_from_fourcc(desc.codec_fourcc),
        time_base: TimeBase::from_hz(track.timescale),
        duration: (track.duration > 0).then_some(track.duration),
        extra_data: desc.extra_data.clone(),
        video: (track.kind == MediaKind::Video).then_some(VideoParams {
            width: desc.width as u32,
            height: desc.height as u32,
        }),
        audio: (track.kind == MediaKind::Audio).then_some(AudioParams {
            sample_rate: desc.sample_rate,
            channels: desc.channel_count,
        }),
    }
}
