//! `reel-common` — shared value types for the demuxing core.
//!
//! Error taxonomy, time base, codec/container identifiers, and the
//! `Packet`/`StreamInfo` types that cross the demuxer boundary.

pub mod codec;
pub mod error;
pub mod packet;
pub mod types;

pub use codec::{CodecId, ContainerFormat, MediaKind};
pub use error::{DemuxError, DemuxResult};
pub use packet::{AudioParams, Packet, StreamInfo, VideoParams};
pub use types::TimeBase;
