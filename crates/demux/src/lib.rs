//! `reel-demux` — container probing and packet demuxing core.
//!
//! Probes a byte source for a container format (MP4/MOV, Matroska/WebM)
//! and yields the container's records as opaque [`reel_common::Packet`]s
//! in arrival order. No FFmpeg dependency — fully custom parsers.

pub mod mkv;
pub mod mp4;
pub mod probe;
pub mod source;
pub mod traits;

pub use probe::{probe, ProbeResult, Prober};
pub use source::{ByteSource, FileSource, MemorySource, ReadStreamSource};
pub use traits::{DemuxOptions, Demuxer};
