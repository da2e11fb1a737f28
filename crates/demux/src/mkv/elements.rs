//! Matroska element IDs and parsed structures.

// ─── EBML header ─────────────────────────────────────────────────────

/// EBML Header element (container).
pub const EBML_HEADER: u32 = 0x1A45DFA3;
/// Document type string ("matroska" or "webm").
pub const DOC_TYPE: u32 = 0x4282;

// ─── Segment and its metadata ────────────────────────────────────────

/// Segment: top-level container for all data.
pub const SEGMENT: u32 = 0x18538067;
/// SeekHead: position hints for top-level elements.
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Info: segment information.
pub const INFO: u32 = 0x1549A966;
/// TimecodeScale: nanoseconds per timecode tick (default 1_000_000).
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;
/// Duration: segment duration in TimecodeScale units (float).
pub const DURATION: u32 = 0x4489;

// ─── Tracks ──────────────────────────────────────────────────────────

/// Tracks: container for all track entries.
pub const TRACKS: u32 = 0x1654AE6B;
/// A single track entry.
pub const TRACK_ENTRY: u32 = 0xAE;
/// Track number (referenced by blocks).
pub const TRACK_NUMBER: u32 = 0xD7;
/// Track type (1=video, 2=audio, 17=subtitle).
pub const TRACK_TYPE: u32 = 0x83;
/// Codec ID string (e.g. "V_MPEG4/ISO/AVC").
pub const CODEC_ID: u32 = 0x86;
/// Codec-private initialization data.
pub const CODEC_PRIVATE: u32 = 0x63A2;
/// Default frame duration in nanoseconds.
pub const DEFAULT_DURATION: u32 = 0x23E383;

/// Video settings sub-element.
pub const VIDEO: u32 = 0xE0;
pub const PIXEL_WIDTH: u32 = 0xB0;
pub const PIXEL_HEIGHT: u32 = 0xBA;

/// Audio settings sub-element.
pub const AUDIO: u32 = 0xE1;
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
pub const CHANNELS: u32 = 0x9F;
pub const BIT_DEPTH: u32 = 0x6264;

// ─── Clusters ────────────────────────────────────────────────────────

/// Cluster: container for blocks of frames.
pub const CLUSTER: u32 = 0x1F43B675;
/// Cluster timecode in TimecodeScale units.
pub const TIMECODE: u32 = 0xE7;
/// SimpleBlock: track + timecode offset + flags + frame data.
pub const SIMPLE_BLOCK: u32 = 0xA3;
/// BlockGroup container.
pub const BLOCK_GROUP: u32 = 0xA0;
/// Block within a BlockGroup.
pub const BLOCK: u32 = 0xA1;
/// Block duration in TimecodeScale units (within BlockGroup).
pub const BLOCK_DURATION: u32 = 0x9B;
/// Reference block: presence marks the block as a non-keyframe.
pub const REFERENCE_BLOCK: u32 = 0xFB;

// ─── Cues (seek index) ───────────────────────────────────────────────

/// Cues: the seek index.
pub const CUES: u32 = 0x1C53BB6B;
pub const CUE_POINT: u32 = 0xBB;
/// Cue time in TimecodeScale units.
pub const CUE_TIME: u32 = 0xB3;
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
/// Track number a position applies to.
pub const CUE_TRACK: u32 = 0xF7;
/// Cluster byte offset relative to the Segment data start.
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;

// ─── Parsed structures ──────────────────────────────────────────────

/// The type of a Matroska track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
    Subtitle,
    Other(u64),
}

impl TrackType {
    /// Parse from the TrackType element value.
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            1 => Self::Video,
            2 => Self::Audio,
            17 => Self::Subtitle,
            other => Self::Other(other),
        }
    }
}

/// Video settings from a TrackEntry.
#[derive(Clone, Copy, Debug, Default)]
pub struct VideoSettings {
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Audio settings from a TrackEntry.
#[derive(Clone, Copy, Debug)]
pub struct AudioSettings {
    pub sampling_frequency: f64,
    pub channels: u32,
    pub bit_depth: Option<u32>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            sampling_frequency: 8000.0, // Matroska's default
            channels: 1,
            bit_depth: None,
        }
    }
}

/// Parsed Matroska TrackEntry.
#[derive(Clone, Debug)]
pub struct TrackEntry {
    /// Track number, as referenced by blocks.
    pub number: u64,
    pub track_type: TrackType,
    /// Codec ID string (e.g. "V_VP9", "A_OPUS").
    pub codec_id: String,
    /// Codec initialization data, opaque.
    pub codec_private: Option<Vec<u8>>,
    /// Default frame duration in nanoseconds, if declared.
    pub default_duration_ns: Option<u64>,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
}

/// One entry of the Cues seek index.
#[derive(Clone, Copy, Debug)]
pub struct CuePoint {
    /// Time in TimecodeScale units.
    pub time: u64,
    /// Track number this position applies to.
    pub track: u64,
    /// Cluster byte offset relative to the Segment data start.
    pub cluster_position: u64,
}
