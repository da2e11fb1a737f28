//! Packets and stream descriptors — output of the demuxer.

use crate::codec::{CodecId, MediaKind};
use crate::types::TimeBase;

/// One container-level record of encoded data for a single stream.
///
/// The payload is opaque to the demuxer: exactly the bytes the container
/// stored, with no bitstream rewriting. Timing is in the owning stream's
/// time base units. A packet is an independent value — it carries no
/// reference back to the demuxer that produced it.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Id of the logical stream this packet belongs to.
    pub stream_id: u32,
    /// Encoded payload, as stored in the container.
    pub data: Vec<u8>,
    /// Presentation timestamp in stream time base units.
    pub ts: i64,
    /// Duration in stream time base units (0 if the container doesn't say).
    pub dur: u64,
    /// Whether this packet starts a decodable unit (keyframe/sync sample).
    pub is_key: bool,
}

impl Packet {
    /// Timestamp in seconds, given the owning stream's time base.
    pub fn ts_secs(&self, time_base: TimeBase) -> f64 {
        time_base.ticks_to_secs(self.ts)
    }
}

/// Video-specific stream parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
}

/// Audio-specific stream parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Descriptor for one logical stream within a container.
///
/// Stable for the lifetime of the demuxer that produced it.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    /// Container-assigned stream id (unique within one container instance).
    pub id: u32,
    pub kind: MediaKind,
    pub codec: CodecId,
    /// Unit of this stream's timestamps.
    pub time_base: TimeBase,
    /// Stream duration in time base units, when the container declares one.
    pub duration: Option<u64>,
    /// Opaque codec initialization data (e.g. a decoder config record).
    pub extra_data: Option<Vec<u8>>,
    pub video: Option<VideoParams>,
    pub audio: Option<AudioParams>,
}

impl StreamInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration
            .map(|d| self.time_base.ticks_to_secs(d as i64))
    }
}
