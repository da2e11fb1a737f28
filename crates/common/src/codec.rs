//! Container format and codec identifiers.

use serde::{Deserialize, Serialize};

/// Container format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// ISO BMFF (MP4, MOV, M4V).
    Mp4,
    /// Matroska (MKV).
    Mkv,
    /// WebM (Matroska subset).
    WebM,
}

impl ContainerFormat {
    pub fn file_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v", "mov"],
            Self::Mkv => &["mkv", "mka"],
            Self::WebM => &["webm"],
        }
    }
}

/// The kind of media a stream carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

/// Codec identifier, as declared by the container.
///
/// The demuxing core never touches the bitstream; this is purely the
/// container's label for what the packets contain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecId {
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    Aac,
    Mp3,
    Opus,
    Vorbis,
    Flac,
    Pcm,
    Unknown,
}

impl CodecId {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::H264 => "H.264/AVC",
            Self::H265 => "H.265/HEVC",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Av1 => "AV1",
            Self::Aac => "AAC",
            Self::Mp3 => "MP3",
            Self::Opus => "Opus",
            Self::Vorbis => "Vorbis",
            Self::Flac => "FLAC",
            Self::Pcm => "PCM",
            Self::Unknown => "unknown",
        }
    }
}
