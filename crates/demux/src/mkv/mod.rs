//! MKV/WebM (Matroska) demuxer.
//!
//! Parses the EBML header and Segment metadata up front, then walks
//! clusters on demand, yielding every block frame as an opaque packet
//! in stored (arrival) order across all tracks. Seeking goes through
//! the Cues index when present, with an optional linear cluster scan
//! as fallback.

pub mod cluster;
pub mod ebml;
pub mod elements;

use cluster::{parse_block, parse_simple_block, BlockInfo};
use ebml::{
    read_element, read_float, read_string, read_uint, skip_element, try_read_element,
    ElementHeader, UNKNOWN_SIZE,
};
use elements::*;
use reel_common::{
    AudioParams, CodecId, ContainerFormat, DemuxError, DemuxResult, MediaKind, Packet, StreamInfo,
    TimeBase, VideoParams,
};
use std::collections::VecDeque;
use std::io::{Seek, SeekFrom};
use tracing::{debug, info, trace, warn};

use crate::probe::FormatDetector;
use crate::source::ByteSource;
use crate::traits::{DemuxOptions, Demuxer, ReaderState};

/// MKV/WebM demuxer — owns its byte source and walks clusters lazily.
pub struct MkvDemuxer {
    source: Box<dyn ByteSource>,
    /// DocType from the EBML header ("matroska" or "webm").
    doc_type: String,
    /// Nanoseconds per timecode tick.
    timecode_scale: u64,
    /// Segment duration in timecode ticks, if declared.
    duration_ticks: Option<u64>,
    /// Byte offset where the Segment payload starts (cue positions are
    /// relative to this).
    segment_data_offset: u64,
    /// Offset of the first cluster, if any.
    first_cluster_offset: Option<u64>,
    tracks: Vec<TrackEntry>,
    streams: Vec<StreamInfo>,
    cues: Vec<CuePoint>,
    /// Packets decoded from the current block(s), in arrival order.
    pending: VecDeque<Packet>,
    /// Timecode of the cluster being read, in ticks.
    cluster_timecode: u64,
    /// Whether the read position is inside a cluster.
    in_cluster: bool,
    /// End offset of the current cluster (`None` for unknown size).
    cluster_end: Option<u64>,
    options: DemuxOptions,
    state: ReaderState,
}

/// Everything gathered from the segment metadata pass.
struct SegmentMeta {
    doc_type: String,
    timecode_scale: u64,
    duration_ticks: Option<u64>,
    segment_data_offset: u64,
    first_cluster_offset: Option<u64>,
    tracks: Vec<TrackEntry>,
    cues: Vec<CuePoint>,
}

impl MkvDemuxer {
    /// Parse the container structure from a source positioned at 0.
    pub fn new(mut source: Box<dyn ByteSource>, options: DemuxOptions) -> DemuxResult<Self> {
        let meta = match parse_segment_meta(&mut source) {
            Ok(meta) => meta,
            Err(DemuxError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let offset = source.seek(SeekFrom::Current(0)).unwrap_or(0);
                return Err(DemuxError::TruncatedStream {
                    offset,
                    reason: "container metadata ends prematurely".into(),
                });
            }
            Err(e) => return Err(e),
        };

        if meta.timecode_scale == 0 || meta.timecode_scale > u32::MAX as u64 {
            return Err(DemuxError::CorruptContainer {
                offset: 0,
                reason: format!("implausible timecode scale {}", meta.timecode_scale),
            });
        }
        let time_base = TimeBase::reduced(meta.timecode_scale as u32, 1_000_000_000);

        let mut streams = Vec::with_capacity(meta.tracks.len());
        for track in &meta.tracks {
            if track.number == 0 || track.number > u32::MAX as u64 {
                return Err(DemuxError::CorruptContainer {
                    offset: 0,
                    reason: format!("implausible track number {}", track.number),
                });
            }
            streams.push(stream_info(track, time_base, meta.duration_ticks));
        }

        info!(
            "MKV: doctype='{}', {} track(s), timecode_scale={}, cues={}",
            meta.doc_type,
            meta.tracks.len(),
            meta.timecode_scale,
            meta.cues.len()
        );

        if let Some(offset) = meta.first_cluster_offset {
            source.seek_to(offset)?;
        }

        Ok(MkvDemuxer {
            source,
            doc_type: meta.doc_type,
            timecode_scale: meta.timecode_scale,
            duration_ticks: meta.duration_ticks,
            segment_data_offset: meta.segment_data_offset,
            first_cluster_offset: meta.first_cluster_offset,
            tracks: meta.tracks,
            streams,
            cues: meta.cues,
            pending: VecDeque::new(),
            cluster_timecode: 0,
            in_cluster: false,
            cluster_end: None,
            options,
            state: ReaderState::Initialized,
        })
    }

    /// Total declared duration in seconds, if known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_ticks
            .map(|d| d as f64 * self.timecode_scale as f64 / 1e9)
    }

    /// Reset the cluster walker to `offset` with nothing buffered.
    fn reposition(&mut self, offset: u64) -> DemuxResult<()> {
        self.pending.clear();
        self.in_cluster = false;
        self.cluster_end = None;
        self.cluster_timecode = 0;
        self.source.seek_to(offset)?;
        Ok(())
    }

    /// Pop the next packet, reading clusters as needed. `Ok(None)` is a
    /// clean end of stream. No state machine here — callers drive it.
    fn next_packet_raw(&mut self) -> DemuxResult<Option<Packet>> {
        loop {
            if let Some(pkt) = self.pending.pop_front() {
                return Ok(Some(pkt));
            }
            if !self.fill_pending()? {
                return Ok(None);
            }
        }
    }

    /// Read cluster elements until packets are queued or the stream
    /// ends. Returns whether anything was queued.
    fn fill_pending(&mut self) -> DemuxResult<bool> {
        match self.fill_pending_inner() {
            Err(DemuxError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let offset = self.source.seek(SeekFrom::Current(0)).unwrap_or(0);
                Err(DemuxError::CorruptContainer {
                    offset,
                    reason: "cluster data ends mid-element".into(),
                })
            }
            other => other,
        }
    }

    fn fill_pending_inner(&mut self) -> DemuxResult<bool> {
        loop {
            if self.in_cluster {
                if let Some(end) = self.cluster_end {
                    if self.source.seek(SeekFrom::Current(0))? >= end {
                        self.in_cluster = false;
                        continue;
                    }
                }

                let elem = match try_read_element(&mut self.source)? {
                    Some(e) => e,
                    None => {
                        self.in_cluster = false;
                        return Ok(false);
                    }
                };

                match elem.id {
                    TIMECODE => {
                        self.cluster_timecode = read_uint(&mut self.source, elem.size)?;
                        trace!("Cluster timecode: {}", self.cluster_timecode);
                    }
                    SIMPLE_BLOCK => {
                        let data = ebml::read_binary(&mut self.source, elem.size)?;
                        let block = parse_simple_block(&data)?;
                        self.enqueue_block(block, None);
                        if !self.pending.is_empty() {
                            return Ok(true);
                        }
                    }
                    BLOCK_GROUP => {
                        self.read_block_group(&elem)?;
                        if !self.pending.is_empty() {
                            return Ok(true);
                        }
                    }
                    CLUSTER => {
                        // An unknown-size cluster ends where the next
                        // one starts.
                        self.enter_cluster(&elem);
                    }
                    CUES | SEEK_HEAD | INFO | TRACKS => {
                        // Top-level metadata: the current cluster is over.
                        self.in_cluster = false;
                        if elem.size == UNKNOWN_SIZE {
                            return Ok(false);
                        }
                        skip_element(&mut self.source, elem.size)?;
                    }
                    _ => skip_element(&mut self.source, elem.size)?,
                }
            } else {
                let elem = match try_read_element(&mut self.source)? {
                    Some(e) => e,
                    None => return Ok(false),
                };

                match elem.id {
                    CLUSTER => self.enter_cluster(&elem),
                    _ if elem.size == UNKNOWN_SIZE => {
                        // Can't skip an unsized non-cluster element;
                        // treat it as the end of usable data.
                        warn!(
                            "Unskippable element 0x{:X} of unknown size at offset {}, stopping",
                            elem.id, elem.position
                        );
                        return Ok(false);
                    }
                    _ => skip_element(&mut self.source, elem.size)?,
                }
            }
        }
    }

    fn enter_cluster(&mut self, elem: &ElementHeader) {
        trace!(
            "Entering cluster at offset {}, end={:?}",
            elem.position,
            elem.end_offset()
        );
        self.in_cluster = true;
        self.cluster_end = elem.end_offset();
    }

    /// Parse a BlockGroup: the Block plus its duration and reference
    /// markers, then enqueue its frames.
    fn read_block_group(&mut self, group: &ElementHeader) -> DemuxResult<()> {
        let group_end = group.end_offset().ok_or(DemuxError::CorruptContainer {
            offset: group.position,
            reason: "BlockGroup with unknown size".into(),
        })?;

        let mut block_data: Option<Vec<u8>> = None;
        let mut block_duration: Option<u64> = None;
        let mut has_reference = false;

        while self.source.seek(SeekFrom::Current(0))? < group_end {
            let elem = read_element(&mut self.source)?;
            match elem.id {
                BLOCK => {
                    block_data = Some(ebml::read_binary(&mut self.source, elem.size)?);
                }
                BLOCK_DURATION => {
                    block_duration = Some(read_uint(&mut self.source, elem.size)?);
                }
                REFERENCE_BLOCK => {
                    has_reference = true;
                    let _ref = ebml::read_sint(&mut self.source, elem.size)?;
                }
                _ => skip_element(&mut self.source, elem.size)?,
            }
        }

        if let Some(data) = block_data {
            let block = parse_block(&data, has_reference)?;
            self.enqueue_block(block, block_duration);
        }
        Ok(())
    }

    /// Turn a block's frames into packets on the pending queue. Blocks
    /// for unknown track numbers are dropped.
    fn enqueue_block(&mut self, block: BlockInfo, block_duration: Option<u64>) {
        let Some(track) = self.tracks.iter().find(|t| t.number == block.track_number) else {
            trace!("Dropping block for unknown track {}", block.track_number);
            return;
        };

        let frame_count = block.frames.len() as u64;
        if frame_count == 0 {
            return;
        }

        // BlockDuration covers the whole block; a declared default
        // duration is per frame.
        let frame_dur = match block_duration {
            Some(total) => total / frame_count,
            None => track
                .default_duration_ns
                .map(|ns| ns / self.timecode_scale)
                .unwrap_or(0),
        };

        let base_ts = self.cluster_timecode as i64 + block.timecode_offset as i64;
        let stream_id = block.track_number as u32;

        for (i, frame) in block.frames.into_iter().enumerate() {
            self.pending.push_back(Packet {
                stream_id,
                data: frame,
                ts: base_ts + i as i64 * frame_dur as i64,
                dur: frame_dur,
                is_key: block.is_keyframe,
            });
        }
    }

    /// The seek work itself; `seek` wraps it for state bookkeeping.
    fn seek_inner(&mut self, stream_id: u32, ts: i64, start: u64) -> DemuxResult<i64> {
        // Pass 1: scan forward to learn which timestamp we can land on —
        // the greatest at or before `ts`, or the stream's first packet
        // when the target precedes it. Per-stream timestamps are
        // monotonic in Matroska, so the first overshoot ends the scan.
        self.reposition(start)?;
        let mut best: Option<i64> = None;
        let mut clamp: Option<i64> = None;
        loop {
            match self.next_packet_raw()? {
                None => break,
                Some(pkt) if pkt.stream_id == stream_id => {
                    if pkt.ts <= ts {
                        best = Some(pkt.ts);
                    } else {
                        if best.is_none() {
                            clamp = Some(pkt.ts);
                        }
                        break;
                    }
                }
                Some(_) => {}
            }
        }

        let Some(target_ts) = best.or(clamp) else {
            // The stream has no packets; park at end of stream.
            self.state = ReaderState::Exhausted;
            return Ok(ts);
        };

        // Pass 2: rewind and stop with the landing packet at the head
        // of the queue, so the next read returns exactly it.
        self.reposition(start)?;
        loop {
            match self.next_packet_raw()? {
                None => {
                    return Err(DemuxError::CorruptContainer {
                        offset: start,
                        reason: "seek target disappeared on rescan".into(),
                    });
                }
                Some(pkt) if pkt.stream_id == stream_id && pkt.ts == target_ts => {
                    self.pending.push_front(pkt);
                    break;
                }
                Some(_) => {}
            }
        }

        self.state = ReaderState::Streaming;
        debug!("MKV seek: stream {} ts {} -> ts {}", stream_id, ts, target_ts);
        Ok(target_ts)
    }
}

impl Demuxer for MkvDemuxer {
    fn format(&self) -> ContainerFormat {
        if self.doc_type == "webm" {
            ContainerFormat::WebM
        } else {
            ContainerFormat::Mkv
        }
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

        match self.next_packet_raw() {
            Ok(Some(pkt)) => {
                self.state = ReaderState::Streaming;
                Ok(Some(pkt))
            }
            Ok(None) => {
                self.state = ReaderState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                if matches!(e, DemuxError::CorruptContainer { .. }) {
                    self.state = ReaderState::Failed;
                }
                Err(e)
            }
        }
    }

    fn seek(&mut self, stream_id: u32, ts: i64) -> DemuxResult<i64> {
        if !self.streams.iter().any(|s| s.id == stream_id) {
            return Err(DemuxError::InvalidStream(stream_id));
        }

        let Some(first_cluster) = self.first_cluster_offset else {
            // No clusters: nothing to land on.
            self.pending.clear();
            self.state = ReaderState::Exhausted;
            return Ok(ts);
        };

        let target_ticks = ts.max(0) as u64;
        let start = if self.cues.is_empty() {
            if !self.options.linear_seek {
                return Err(DemuxError::SeekIndexUnavailable);
            }
            first_cluster
        } else {
            // Best cue for this track, else for any track; cue times at
            // or before the target only.
            let cue = self
                .cues
                .iter()
                .filter(|c| c.track == stream_id as u64 && c.time <= target_ticks)
                .max_by_key(|c| c.time)
                .or_else(|| {
                    self.cues
                        .iter()
                        .filter(|c| c.time <= target_ticks)
                        .max_by_key(|c| c.time)
                });
            match cue {
                Some(c) => self.segment_data_offset + c.cluster_position,
                None => first_cluster,
            }
        };

        match self.seek_inner(stream_id, ts, start) {
            Err(e @ DemuxError::CorruptContainer { .. }) => {
                self.state = ReaderState::Failed;
                Err(e)
            }
            other => other,
        }
    }
}

// ─── Probing ────────────────────────────────────────────────────────

/// EBML magic bytes opening every Matroska/WebM file.
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Detector for Matroska/WebM content.
pub struct MkvDetector;

impl FormatDetector for MkvDetector {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Mkv
    }

    fn score(&self, window: &[u8]) -> u8 {
        if window.len() < 4 || window[..4] != EBML_MAGIC {
            return 0;
        }
        // The DocType string sits within the EBML header, well inside
        // any reasonable lookahead.
        let has_doctype = window.windows(8).any(|w| w == b"matroska")
            || window.windows(4).any(|w| w == b"webm");
        if has_doctype {
            100
        } else {
            75
        }
    }

    fn instantiate(
        &self,
        source: Box<dyn ByteSource>,
        options: DemuxOptions,
    ) -> DemuxResult<Box<dyn Demuxer>> {
        Ok(Box::new(MkvDemuxer::new(source, options)?))
    }
}

// ─── Metadata parsing ───────────────────────────────────────────────

/// Parse the EBML header and the Segment's metadata children, stopping
/// at the first cluster.
fn parse_segment_meta(source: &mut Box<dyn ByteSource>) -> DemuxResult<SegmentMeta> {
    source.seek_to(0)?;

    // EBML header.
    let header = read_element(source)?;
    if header.id != EBML_HEADER {
        return Err(DemuxError::CorruptContainer {
            offset: header.position,
            reason: "missing EBML header".into(),
        });
    }
    let header_end = header.end_offset().ok_or(DemuxError::CorruptContainer {
        offset: header.position,
        reason: "EBML header with unknown size".into(),
    })?;

    let mut doc_type = String::from("matroska");
    while source.seek(SeekFrom::Current(0))? < header_end {
        let elem = read_element(source)?;
        match elem.id {
            DOC_TYPE => doc_type = read_string(source, elem.size)?,
            _ => skip_element(source, elem.size)?,
        }
    }
    source.seek(SeekFrom::Start(header_end))?;
    debug!("EBML doctype: '{doc_type}'");

    // Find the Segment.
    let segment = loop {
        let elem = try_read_element(source)?.ok_or(DemuxError::CorruptContainer {
            offset: 0,
            reason: "no Segment element found".into(),
        })?;
        if elem.id == SEGMENT {
            break elem;
        }
        skip_element(source, elem.size)?;
    };
    let segment_data_offset = segment.data_offset();
    let segment_end = segment.end_offset();

    let mut meta = SegmentMeta {
        doc_type,
        timecode_scale: 1_000_000,
        duration_ticks: None,
        segment_data_offset,
        first_cluster_offset: None,
        tracks: Vec::new(),
        cues: Vec::new(),
    };

    // Walk the Segment's children until data (a cluster) begins.
    loop {
        if let Some(end) = segment_end {
            if source.seek(SeekFrom::Current(0))? >= end {
                break;
            }
        }
        let elem = match try_read_element(source)? {
            Some(e) => e,
            None => break,
        };

        match elem.id {
            INFO => parse_info(source, &elem, &mut meta)?,
            TRACKS => parse_tracks(source, &elem, &mut meta.tracks)?,
            CUES => parse_cues(source, &elem, &mut meta.cues)?,
            CLUSTER => {
                meta.first_cluster_offset = Some(elem.position);
                break;
            }
            _ if elem.size == UNKNOWN_SIZE => break,
            _ => skip_element(source, elem.size)?,
        }
    }

    Ok(meta)
}

/// Parse the Info element: timecode scale and duration.
fn parse_info(
    source: &mut Box<dyn ByteSource>,
    info: &ElementHeader,
    meta: &mut SegmentMeta,
) -> DemuxResult<()> {
    let end = definite_end(info)?;
    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        match elem.id {
            TIMECODE_SCALE => meta.timecode_scale = read_uint(source, elem.size)?,
            DURATION => meta.duration_ticks = Some(read_float(source, elem.size)? as u64),
            _ => skip_element(source, elem.size)?,
        }
    }
    debug!(
        "Info: timecode_scale={}, duration={:?}",
        meta.timecode_scale, meta.duration_ticks
    );
    Ok(())
}

/// Parse the Tracks element into track entries.
fn parse_tracks(
    source: &mut Box<dyn ByteSource>,
    tracks_elem: &ElementHeader,
    tracks: &mut Vec<TrackEntry>,
) -> DemuxResult<()> {
    let end = definite_end(tracks_elem)?;
    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        if elem.id == TRACK_ENTRY {
            if let Some(track) = parse_track_entry(source, &elem)? {
                tracks.push(track);
            }
        } else {
            skip_element(source, elem.size)?;
        }
    }
    Ok(())
}

/// Parse one TrackEntry. Entries without a track number are unusable
/// and dropped with a warning.
fn parse_track_entry(
    source: &mut Box<dyn ByteSource>,
    entry: &ElementHeader,
) -> DemuxResult<Option<TrackEntry>> {
    let end = definite_end(entry)?;

    let mut number: u64 = 0;
    let mut track_type = TrackType::Other(0);
    let mut codec_id = String::new();
    let mut codec_private: Option<Vec<u8>> = None;
    let mut default_duration_ns: Option<u64> = None;
    let mut video: Option<VideoSettings> = None;
    let mut audio: Option<AudioSettings> = None;

    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        match elem.id {
            TRACK_NUMBER => number = read_uint(source, elem.size)?,
            TRACK_TYPE => track_type = TrackType::from_raw(read_uint(source, elem.size)?),
            CODEC_ID => codec_id = read_string(source, elem.size)?,
            CODEC_PRIVATE => codec_private = Some(ebml::read_binary(source, elem.size)?),
            DEFAULT_DURATION => default_duration_ns = Some(read_uint(source, elem.size)?),
            VIDEO => video = Some(parse_video_settings(source, &elem)?),
            AUDIO => audio = Some(parse_audio_settings(source, &elem)?),
            _ => skip_element(source, elem.size)?,
        }
    }

    if number == 0 {
        warn!(
            "TrackEntry at offset {} has no track number, skipping",
            entry.position
        );
        return Ok(None);
    }

    debug!(
        "Track #{number}: type={track_type:?}, codec='{codec_id}', default_duration={default_duration_ns:?}ns"
    );

    Ok(Some(TrackEntry {
        number,
        track_type,
        codec_id,
        codec_private,
        default_duration_ns,
        video,
        audio,
    }))
}

fn parse_video_settings(
    source: &mut Box<dyn ByteSource>,
    video: &ElementHeader,
) -> DemuxResult<VideoSettings> {
    let end = definite_end(video)?;
    let mut settings = VideoSettings::default();
    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        match elem.id {
            PIXEL_WIDTH => settings.pixel_width = read_uint(source, elem.size)? as u32,
            PIXEL_HEIGHT => settings.pixel_height = read_uint(source, elem.size)? as u32,
            _ => skip_element(source, elem.size)?,
        }
    }
    Ok(settings)
}

fn parse_audio_settings(
    source: &mut Box<dyn ByteSource>,
    audio: &ElementHeader,
) -> DemuxResult<AudioSettings> {
    let end = definite_end(audio)?;
    let mut settings = AudioSettings::default();
    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        match elem.id {
            SAMPLING_FREQUENCY => settings.sampling_frequency = read_float(source, elem.size)?,
            CHANNELS => settings.channels = read_uint(source, elem.size)? as u32,
            BIT_DEPTH => settings.bit_depth = Some(read_uint(source, elem.size)? as u32),
            _ => skip_element(source, elem.size)?,
        }
    }
    Ok(settings)
}

/// Parse the Cues element into flat cue points (one per track
/// position).
fn parse_cues(
    source: &mut Box<dyn ByteSource>,
    cues_elem: &ElementHeader,
    cues: &mut Vec<CuePoint>,
) -> DemuxResult<()> {
    let end = definite_end(cues_elem)?;
    while source.seek(SeekFrom::Current(0))? < end {
        let elem = read_element(source)?;
        if elem.id != CUE_POINT {
            skip_element(source, elem.size)?;
            continue;
        }

        let point_end = definite_end(&elem)?;
        let mut time: u64 = 0;
        let mut positions: Vec<(u64, u64)> = Vec::new();

        while source.seek(SeekFrom::Current(0))? < point_end {
            let child = read_element(source)?;
            match child.id {
                CUE_TIME => time = read_uint(source, child.size)?,
                CUE_TRACK_POSITIONS => {
                    let pos_end = definite_end(&child)?;
                    let mut track: u64 = 0;
                    let mut cluster_position: u64 = 0;
                    while source.seek(SeekFrom::Current(0))? < pos_end {
                        let inner = read_element(source)?;
                        match inner.id {
                            CUE_TRACK => track = read_uint(source, inner.size)?,
                            CUE_CLUSTER_POSITION => {
                                cluster_position = read_uint(source, inner.size)?
                            }
                            _ => skip_element(source, inner.size)?,
                        }
                    }
                    positions.push((track, cluster_position));
                }
                _ => skip_element(source, child.size)?,
            }
        }

        for (track, cluster_position) in positions {
            cues.push(CuePoint {
                time,
                track,
                cluster_position,
            });
        }
    }
    debug!("Cues: {} point(s)", cues.len());
    Ok(())
}

/// An element that must have a definite size, or a corruption error.
fn definite_end(elem: &ElementHeader) -> DemuxResult<u64> {
    elem.end_offset().ok_or(DemuxError::CorruptContainer {
        offset: elem.position,
        reason: format!("element 0x{:X} must have a definite size", elem.id),
    })
}

// ─── Codec mapping ──────────────────────────────────────────────────

/// Map a Matroska codec ID string to a codec id.
fn codec_from_id(codec_id: &str) -> CodecId {
    match codec_id {
        "V_MPEG4/ISO/AVC" => CodecId::H264,
        "V_MPEGH/ISO/HEVC" => CodecId::H265,
        "V_VP8" => CodecId::Vp8,
        "V_VP9" => CodecId::Vp9,
        "V_AV1" => CodecId::Av1,
        "A_OPUS" => CodecId::Opus,
        "A_VORBIS" => CodecId::Vorbis,
        "A_FLAC" => CodecId::Flac,
        "A_MPEG/L3" => CodecId::Mp3,
        other if other.starts_with("A_AAC") => CodecId::Aac,
        other if other.starts_with("A_PCM") => CodecId::Pcm,
        _ => CodecId::Unknown,
    }
}

/// Build the public stream descriptor for a track entry.
fn stream_info(track: &TrackEntry, time_base: TimeBase, duration: Option<u64>) -> StreamInfo {
    let kind = match track.track_type {
        TrackType::Video => MediaKind::Video,
        TrackType::Audio => MediaKind::Audio,
        TrackType::Subtitle => MediaKind::Subtitle,
        TrackType::Other(_) => MediaKind::Other,
    };

    StreamInfo {
        id: track.number as u32,
        kind,
        codec: codec_from_id(&track.codec_id),
        time_base,
        duration,
        extra_data: track.codec_private.clone(),
        video: track.video.map(|v| VideoParams {
            width: v.pixel_width,
            height: v.pixel_height,
        }),
        audio: track.audio.map(|a| AudioParams {
            sample_rate: a.sampling_frequency as u32,
            channels: a.channels as u16,
        }),
    }
}
