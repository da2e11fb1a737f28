//! Demuxer trait definition and shared options.

use reel_common::{ContainerFormat, DemuxResult, Packet, StreamInfo};

/// Trait for container demuxers (MP4, MKV).
///
/// A demuxer owns its byte source for its whole lifetime; dropping the
/// demuxer releases the source. One instance is single-threaded — share
/// across threads only behind external synchronization.
pub trait Demuxer: Send {
    /// The container format being read.
    fn format(&self) -> ContainerFormat;

    /// Stream descriptors in container declaration order. The slice is
    /// stable for the demuxer's lifetime.
    fn streams(&self) -> &[StreamInfo];

    /// Read the next packet in container arrival order.
    ///
    /// Streams are interleaved exactly as the container stored them; a
    /// caller wanting per-stream order filters on `Packet::stream_id`.
    /// `Ok(None)` means end of stream and repeats on every subsequent
    /// call. A `CorruptContainer` error is terminal until a successful
    /// `seek`.
    fn next_packet(&mut self) -> DemuxResult<Option<Packet>>;

    /// Position stream `stream_id` at the packet with the greatest
    /// timestamp ≤ `ts` (stream time base units) and return that
    /// timestamp. The next `next_packet` call returns that packet.
    fn seek(&mut self, stream_id: u32, ts: i64) -> DemuxResult<i64>;
}

/// Options threaded from probing into demuxer construction.
#[derive(Clone, Copy, Debug)]
pub struct DemuxOptions {
    /// Allow a linear scan of the container when a seek is requested and
    /// no seek index is present. When off, such seeks fail with
    /// `SeekIndexUnavailable`.
    pub linear_seek: bool,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        DemuxOptions { linear_seek: true }
    }
}

/// Lifecycle of a demuxer instance.
///
/// `Initialized` covers "headers parsed, nothing read yet"; iteration
/// moves to `Streaming` and ends in `Exhausted`. `Failed` is entered on
/// container corruption and left only through a successful seek.
/// (Seeking itself is transient and holds no state of its own.)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ReaderState {
    Initialized,
    Streaming,
    Exhausted,
    Failed,
}
