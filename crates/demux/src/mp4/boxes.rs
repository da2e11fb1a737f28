//! ISO BMFF box (atom) parser.
//!
//! Parses the box hierarchy of MP4/MOV/M4V files: ftyp, moov, trak,
//! mdia, minf, stbl, and the sample table boxes. Sample descriptions
//! are read generically — the codec FourCC, basic visual/audio
//! parameters, and any codec configuration payload are captured as
//! opaque data; no bitstream-level structures are interpreted.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

use byteorder::{BigEndian, ReadBytesExt};
use reel_common::{DemuxError, DemuxResult, MediaKind};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

// ─── Box FourCC constants ────────────────────────────────────────────

/// Convert 4 ASCII bytes to a u32 FourCC code.
const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

pub const FTYP: u32 = fourcc(b'f', b't', b'y', b'p');
pub const MOOV: u32 = fourcc(b'm', b'o', b'o', b'v');
pub const MVHD: u32 = fourcc(b'm', b'v', b'h', b'd');
pub const TRAK: u32 = fourcc(b't', b'r', b'a', b'k');
pub const TKHD: u32 = fourcc(b't', b'k', b'h', b'd');
pub const MDIA: u32 = fourcc(b'm', b'd', b'i', b'a');
pub const MDHD: u32 = fourcc(b'm', b'd', b'h', b'd');
pub const HDLR: u32 = fourcc(b'h', b'd', b'l', b'r');
pub const MINF: u32 = fourcc(b'm', b'i', b'n', b'f');
pub const STBL: u32 = fourcc(b's', b't', b'b', b'l');
pub const STSD: u32 = fourcc(b's', b't', b's', b'd');
pub const STTS: u32 = fourcc(b's', b't', b't', b's');
pub const STSC: u32 = fourcc(b's', b't', b's', b'c');
pub const STSZ: u32 = fourcc(b's', b't', b's', b'z');
pub const STCO: u32 = fourcc(b's', b't', b'c', b'o');
pub const CO64: u32 = fourcc(b'c', b'o', b'6', b'4');
pub const STSS: u32 = fourcc(b's', b't', b's', b's');
pub const CTTS: u32 = fourcc(b'c', b't', b't', b's');
pub const MDAT: u32 = fourcc(b'm', b'd', b'a', b't');
pub const FREE: u32 = fourcc(b'f', b'r', b'e', b'e');
pub const SKIP: u32 = fourcc(b's', b'k', b'i', b'p');
pub const WIDE: u32 = fourcc(b'w', b'i', b'd', b'e');

// Handler types (hdlr).
pub const VIDE: u32 = fourcc(b'v', b'i', b'd', b'e');
pub const SOUN: u32 = fourcc(b's', b'o', b'u', b'n');
pub const TEXT: u32 = fourcc(b't', b'e', b'x', b't');
pub const SBTL: u32 = fourcc(b's', b'b', b't', b'l');
pub const SUBT: u32 = fourcc(b's', b'u', b'b', b't');

// Sample entry codec FourCCs.
pub const AVC1: u32 = fourcc(b'a', b'v', b'c', b'1');
pub const AVC3: u32 = fourcc(b'a', b'v', b'c', b'3');
pub const HEV1: u32 = fourcc(b'h', b'e', b'v', b'1');
pub const HVC1: u32 = fourcc(b'h', b'v', b'c', b'1');
pub const VP08: u32 = fourcc(b'v', b'p', b'0', b'8');
pub const VP09: u32 = fourcc(b'v', b'p', b'0', b'9');
pub const AV01: u32 = fourcc(b'a', b'v', b'0', b'1');
pub const MP4A: u32 = fourcc(b'm', b'p', b'4', b'a');
pub const OPUS: u32 = fourcc(b'O', b'p', b'u', b's');
pub const FLAC: u32 = fourcc(b'f', b'L', b'a', b'C');

// Codec configuration child boxes inside a sample entry. Their payloads
// are passed through untouched as stream extra data.
pub const AVCC: u32 = fourcc(b'a', b'v', b'c', b'C');
pub const HVCC: u32 = fourcc(b'h', b'v', b'c', b'C');
pub const VPCC: u32 = fourcc(b'v', b'p', b'c', b'C');
pub const AV1C: u32 = fourcc(b'a', b'v', b'1', b'C');
pub const ESDS: u32 = fourcc(b'e', b's', b'd', b's');
pub const DOPS: u32 = fourcc(b'd', b'O', b'p', b's');
pub const DFLA: u32 = fourcc(b'd', b'f', b'L', b'a');

/// Convert a FourCC u32 to a human-readable string for logging.
pub fn fourcc_to_string(cc: u32) -> String {
    cc.to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        })
        .collect()
}

// ─── Box Header ─────────────────────────────────────────────────────

/// A parsed ISO BMFF box header.
#[derive(Clone, Debug)]
pub struct BoxHeader {
    /// FourCC type code.
    pub box_type: u32,
    /// Total box size (including header). 0 means "extends to EOF".
    pub size: u64,
    /// Offset of the box start in the file.
    pub offset: u64,
    /// Size of the header itself (8 or 16 bytes).
    pub header_size: u8,
}

impl BoxHeader {
    /// Byte offset where the box content (payload) starts.
    pub fn content_offset(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    /// Byte size of the content, excluding the header. `None` if the box
    /// extends to EOF.
    pub fn content_size(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.size - self.header_size as u64)
        }
    }

    /// Byte offset of the first byte after this box. `None` if the box
    /// extends to EOF.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == 0 {
            None
        } else {
            Some(self.offset + self.size)
        }
    }
}

/// Read a box header from the current position. Returns `None` at a
/// clean EOF (no bytes left).
pub fn read_box_header<R: Read + Seek>(reader: &mut R) -> DemuxResult<Option<BoxHeader>> {
    let offset = reader.stream_position()?;

    let size32 = match reader.read_u32::<BigEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let box_type = reader.read_u32::<BigEndian>()?;

    let (size, header_size) = match size32 {
        0 => (0, 8u8),
        1 => {
            let size64 = reader.read_u64::<BigEndian>()?;
            (size64, 16u8)
        }
        n => (n as u64, 8u8),
    };

    if size != 0 && size < header_size as u64 {
        return Err(DemuxError::CorruptContainer {
            offset,
            reason: format!(
                "box '{}' has invalid size {} (less than its header)",
                fourcc_to_string(box_type),
                size
            ),
        });
    }

    trace!(
        "Box '{}' at offset {}, size {}",
        fourcc_to_string(box_type),
        offset,
        size
    );

    Ok(Some(BoxHeader {
        box_type,
        size,
        offset,
        header_size,
    }))
}

/// Skip past the current box (seek to its end).
pub fn skip_box<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<()> {
    match header.end_offset() {
        Some(end) => {
            reader.seek(SeekFrom::Start(end))?;
        }
        None => {
            reader.seek(SeekFrom::End(0))?;
        }
    }
    Ok(())
}

/// A box that must not extend to EOF — its definite end offset, or a
/// corruption error.
fn definite_end(header: &BoxHeader) -> DemuxResult<u64> {
    header.end_offset().ok_or_else(|| DemuxError::CorruptContainer {
        offset: header.offset,
        reason: format!(
            "box '{}' cannot extend to EOF",
            fourcc_to_string(header.box_type)
        ),
    })
}

// ─── ftyp ───────────────────────────────────────────────────────────

/// Parsed ftyp (File Type) box.
#[derive(Clone, Debug)]
pub struct FtypBox {
    pub major_brand: u32,
    pub minor_version: u32,
    pub compatible_brands: Vec<u32>,
}

/// Parse an ftyp box. Reader must be at the content start.
pub fn parse_ftyp<R: Read + Seek>(reader: &mut R, header: &BoxHeader) -> DemuxResult<FtypBox> {
    let content_size = header.content_size().ok_or_else(|| DemuxError::CorruptContainer {
        offset: header.offset,
        reason: "ftyp box cannot extend to EOF".into(),
    })?;

    let major_brand = reader.read_u32::<BigEndian>()?;
    let minor_version = reader.read_u32::<BigEndian>()?;

    let brand_count = content_size.saturating_sub(8) / 4;
    let mut compatible_brands = Vec::with_capacity(brand_count as usize);
    for _ in 0..brand_count {
        compatible_brands.push(reader.read_u32::<BigEndian>()?);
    }

    debug!(
        "ftyp: major_brand='{}', {} compatible brands",
        fourcc_to_string(major_brand),
        compatible_brands.len()
    );

    Ok(FtypBox {
        major_brand,
        minor_version,
        compatible_brands,
    })
}

// ─── mvhd / mdhd ────────────────────────────────────────────────────

/// Timescale and duration shared by the mvhd and mdhd layouts.
#[derive(Clone, Copy, Debug)]
pub struct HeaderTiming {
    pub timescale: u32,
    pub duration: u64,
}

/// Parse the version-dependent timing fields common to mvhd and mdhd.
/// Reader must be at the content start.
pub fn parse_timing_header<R: Read>(reader: &mut R) -> DemuxResult<HeaderTiming> {
    let version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;

    let (timescale, duration) = if version == 1 {
        let _creation_time = reader.read_u64::<BigEndian>()?;
        let _modification_time = reader.read_u64::<BigEndian>()?;
        let timescale = reader.read_u32::<BigEndian>()?;
        let duration = reader.read_u64::<BigEndian>()?;
        (timescale, duration)
    } else {
        let _creation_time = reader.read_u32::<BigEndian>()?;
        let _modification_time = reader.read_u32::<BigEndian>()?;
        let timescale = reader.read_u32::<BigEndian>()?;
        let duration = reader.read_u32::<BigEndian>()? as u64;
        (timescale, duration)
    };

    Ok(HeaderTiming {
        timescale,
        duration,
    })
}

// ─── tkhd ───────────────────────────────────────────────────────────

/// Track id from the tkhd (Track Header) box. Reader must be at the
/// content start. Presentation geometry is taken from the sample
/// description instead, so the rest of the box is ignored.
pub fn parse_tkhd<R: Read>(reader: &mut R) -> DemuxResult<u32> {
    let version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;

    let track_id = if version == 1 {
        let _creation_time = reader.read_u64::<BigEndian>()?;
        let _modification_time = reader.read_u64::<BigEndian>()?;
        reader.read_u32::<BigEndian>()?
    } else {
        let _creation_time = reader.read_u32::<BigEndian>()?;
        let _modification_time = reader.read_u32::<BigEndian>()?;
        reader.read_u32::<BigEndian>()?
    };

    debug!("tkhd: track_id={track_id}");
    Ok(track_id)
}

// ─── hdlr ───────────────────────────────────────────────────────────

/// Media kind from the hdlr (Handler Reference) box. Reader must be at
/// the content start.
pub fn parse_hdlr<R: Read>(reader: &mut R) -> DemuxResult<MediaKind> {
    let _version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;

    let _pre_defined = reader.read_u32::<BigEndian>()?;
    let handler_type = reader.read_u32::<BigEndian>()?;

    let kind = match handler_type {
        VIDE => MediaKind::Video,
        SOUN => MediaKind::Audio,
        TEXT | SBTL | SUBT => MediaKind::Subtitle,
        _ => MediaKind::Other,
    };

    debug!(
        "hdlr: handler='{}' -> {:?}",
        fourcc_to_string(handler_type),
        kind
    );
    Ok(kind)
}

// ─── stsd ───────────────────────────────────────────────────────────

/// Generic sample description: the codec tag plus whatever basic
/// parameters the entry layout carries for its media kind.
#[derive(Clone, Debug, Default)]
pub struct SampleDesc {
    /// Codec FourCC (avc1, vp09, mp4a, Opus, ...). 0 when no entry.
    pub codec_fourcc: u32,
    /// Visual entries only.
    pub width: u16,
    pub height: u16,
    /// Audio entries only.
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Raw payload of the first codec configuration child box
    /// (avcC/hvcC/esds/dOps/vpcC/av1C/dfLa), untouched.
    pub extra_data: Option<Vec<u8>>,
}

/// Parse an stsd box generically for the given media kind. Reader must
/// be at the content start. Only the first sample entry is read; MP4
/// files with per-sample description switching are rare and the extra
/// entries describe the same stream.
pub fn parse_stsd<R: Read + Seek>(
    reader: &mut R,
    header: &BoxHeader,
    kind: MediaKind,
) -> DemuxResult<SampleDesc> {
    let _version = reader.read_u8()?;
    let mut flags = [0u8; 3];
    reader.read_exact(&mut flags)?;

    let entry_count = reader.read_u32::<BigEndian>()?;
    debug!("stsd: {entry_count} entries");
    if entry_count == 0 {
        return Ok(SampleDesc::default());
    }

    let entry_header = read_box_header(reader)?.ok_or_else(|| DemuxError::CorruptContainer {
        offset: header.offset,
        reason: "stsd declares entries but ends before the first".into(),
    })?;
    let entry_end = definite_end(&entry_header)?;

    let mut desc = SampleDesc {
        codec_fourcc: entry_header.box_type,
        ..SampleDesc::default()
    };

    // SampleEntry preamble: 6 reserved bytes + data_reference_index.
    let mut preamble = [0u8; 8];
    reader.read_exact(&mut preamble)?;

    match kind {
        MediaKind::Video => {
            // VisualSampleEntry: 16 predefined/reserved bytes, then
            // width/height, then 50 bytes of resolution/frame-count/
            // compressor/depth fields.
            let mut skip = [0u8; 16];
            reader.read_exact(&mut skip)?;
            desc.width = reader.read_u16::<BigEndian>()?;
            desc.height = reader.read_u16::<BigEndian>()?;
            let mut skip = [0u8; 50];
            reader.read_exact(&mut skip)?;
            desc.extra_data = read_codec_config(reader, entry_end)?;
        }
        MediaKind::Audio => {
            // AudioSampleEntry: 8 reserved bytes, channelcount,
            // samplesize, 4 predefined/reserved bytes, samplerate as
            // 16.16 fixed point.
            let mut skip = [0u8; 8];
            reader.read_exact(&mut skip)?;
            desc.channel_count = reader.read_u16::<BigEndian>()?;
            let _sample_size = reader.read_u16::<BigEndian>()?;
            let mut skip = [0u8; 4];
            reader.read_exact(&mut skip)?;
            desc.sample_rate = reader.read_u32::<BigEndian>()? >> 16;
            desc.extra_data = read_codec_config(reader, entry_end)?;
        }
        _ => {
            // Unknown entry layout; the FourCC is all we take.
        }
    }

    reader.seek(SeekFrom::Start(entry_end))?;
    debug!(
        "stsd: codec='{}' {}x{} {}Hz/{}ch",
        fourcc_to_string(desc.codec_fourcc),
        desc.width,
        desc.height,
        desc.sample_rate,
        desc.channel_count
    );
    Ok(desc)
}

/// Scan a sample entry's child boxes up to `entry_end` and return the
/// payload of the first recognized codec configuration box.
fn read_codec_config<R: Read + Seek>(
    reader: &mut R,
    entry_end: u64,
) -> DemuxResult<Option<Vec<u8>>> {
    while reader.stream_position()? + 8 <= entry_end {
        let child = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };
        let child_end = definite_end(&child)?;
        if child_end > entry_end {
            // Malformed child; stop scanning rather than read past the
            // entry.
            warn!(
                "sample entry child '{}' overruns its entry, ignoring",
                fourcc_to_string(child.box_type)
            );
            break;
        }

        match child.box_type {
            AVCC | HVCC | VPCC | AV1C | ESDS | DOPS | DFLA => {
                let len = child_end - reader.stream_position()?;
                let mut payload = vec![0u8; len as usize];
                reader.read_exact(&mut payload)?;
                trace!(
                    "codec config '{}': {} bytes",
                    fourcc_to_string(child.box_type),
                    payload.len()
                );
                return Ok(Some(payload));
            }
            _ => skip_box(reader, &child)?,
        }
    }
    Ok(None)
}

// ─── Sample table boxes ─────────────────────────────────────────────

/// One stts (decoding time-to-sample) entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// Parse an stts box. Reader must be at the content start.
pub fn parse_stts<R: Read>(reader: &mut R) -> DemuxResult<Vec<SttsEntry>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(SttsEntry {
            sample_count: reader.read_u32::<BigEndian>()?,
            sample_delta: reader.read_u32::<BigEndian>()?,
        });
    }
    Ok(entries)
}

/// One ctts (composition offset) entry. The offset is signed in
/// version 1 boxes; version 0 values fit the same range in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: i32,
}

/// Parse a ctts box. Reader must be at the content start.
pub fn parse_ctts<R: Read>(reader: &mut R) -> DemuxResult<Vec<CttsEntry>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(CttsEntry {
            sample_count: reader.read_u32::<BigEndian>()?,
            sample_offset: reader.read_i32::<BigEndian>()?,
        });
    }
    Ok(entries)
}

/// One stsc (sample-to-chunk) entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Parse an stsc box. Reader must be at the content start.
pub fn parse_stsc<R: Read>(reader: &mut R) -> DemuxResult<Vec<StscEntry>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        entries.push(StscEntry {
            first_chunk: reader.read_u32::<BigEndian>()?,
            samples_per_chunk: reader.read_u32::<BigEndian>()?,
            sample_description_index: reader.read_u32::<BigEndian>()?,
        });
    }
    Ok(entries)
}

/// Parsed stsz (sample size) box.
#[derive(Clone, Debug, Default)]
pub struct StszBox {
    /// When non-zero, every sample has this size and `sample_sizes` is
    /// empty.
    pub default_sample_size: u32,
    pub sample_sizes: Vec<u32>,
    pub sample_count: u32,
}

/// Parse an stsz box. Reader must be at the content start.
pub fn parse_stsz<R: Read>(reader: &mut R) -> DemuxResult<StszBox> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let default_sample_size = reader.read_u32::<BigEndian>()?;
    let sample_count = reader.read_u32::<BigEndian>()?;

    let sample_sizes = if default_sample_size == 0 {
        let mut sizes = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            sizes.push(reader.read_u32::<BigEndian>()?);
        }
        sizes
    } else {
        Vec::new()
    };

    Ok(StszBox {
        default_sample_size,
        sample_sizes,
        sample_count,
    })
}

/// Parse an stco (32-bit chunk offset) box. Reader must be at the
/// content start.
pub fn parse_stco<R: Read>(reader: &mut R) -> DemuxResult<Vec<u64>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(reader.read_u32::<BigEndian>()? as u64);
    }
    Ok(offsets)
}

/// Parse a co64 (64-bit chunk offset) box. Reader must be at the
/// content start.
pub fn parse_co64<R: Read>(reader: &mut R) -> DemuxResult<Vec<u64>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut offsets = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        offsets.push(reader.read_u64::<BigEndian>()?);
    }
    Ok(offsets)
}

/// Parse an stss (sync sample) box: 1-based sample numbers of
/// keyframes. Reader must be at the content start.
pub fn parse_stss<R: Read>(reader: &mut R) -> DemuxResult<Vec<u32>> {
    let _version_flags = reader.read_u32::<BigEndian>()?;
    let entry_count = reader.read_u32::<BigEndian>()?;
    let mut samples = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        samples.push(reader.read_u32::<BigEndian>()?);
    }
    Ok(samples)
}

// ─── trak / moov assembly ───────────────────────────────────────────

/// Everything the demuxer needs about one track, regardless of media
/// kind.
#[derive(Clone, Debug)]
pub struct ParsedTrack {
    pub track_id: u32,
    pub kind: MediaKind,
    /// Media timescale (ticks per second).
    pub timescale: u32,
    /// Track duration in timescale units.
    pub duration: u64,
    pub sample_desc: SampleDesc,
    pub stts: Vec<SttsEntry>,
    pub ctts: Vec<CttsEntry>,
    pub stsc: Vec<StscEntry>,
    pub stsz: StszBox,
    pub chunk_offsets: Vec<u64>,
    /// 1-based keyframe sample numbers; empty means every sample is a
    /// sync sample.
    pub sync_samples: Vec<u32>,
}

/// Parsed moov box data.
#[derive(Clone, Debug)]
pub struct ParsedMoov {
    /// Global (presentation) timescale.
    pub timescale: u32,
    /// Presentation duration in global timescale units.
    pub duration: u64,
    /// All tracks, in declaration order.
    pub tracks: Vec<ParsedTrack>,
}

/// Parse a moov box and all of its tracks. Reader must be at the moov
/// content start.
pub fn parse_moov<R: Read + Seek>(
    reader: &mut R,
    moov_header: &BoxHeader,
) -> DemuxResult<ParsedMoov> {
    let moov_end = definite_end(moov_header)?;

    let mut mvhd: Option<HeaderTiming> = None;
    let mut tracks = Vec::new();

    while reader.stream_position()? < moov_end {
        let child = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };

        match child.box_type {
            MVHD => {
                mvhd = Some(parse_timing_header(reader)?);
                skip_box(reader, &child)?;
            }
            TRAK => {
                if let Some(track) = parse_trak(reader, &child)? {
                    tracks.push(track);
                }
            }
            _ => skip_box(reader, &child)?,
        }
    }

    let mvhd = mvhd.ok_or_else(|| DemuxError::CorruptContainer {
        offset: moov_header.offset,
        reason: "no mvhd box found in moov".into(),
    })?;

    debug!(
        "moov: timescale={}, duration={}, {} track(s)",
        mvhd.timescale,
        mvhd.duration,
        tracks.len()
    );

    Ok(ParsedMoov {
        timescale: mvhd.timescale,
        duration: mvhd.duration,
        tracks,
    })
}

/// Parse one trak box. Returns `None` (with a warning) for tracks
/// missing the pieces needed to demux them.
fn parse_trak<R: Read + Seek>(
    reader: &mut R,
    trak_header: &BoxHeader,
) -> DemuxResult<Option<ParsedTrack>> {
    let trak_end = definite_end(trak_header)?;

    let mut track_id: Option<u32> = None;
    let mut timing: Option<HeaderTiming> = None;
    let mut kind = MediaKind::Other;
    let mut sample_desc = SampleDesc::default();
    let mut stts = Vec::new();
    let mut ctts = Vec::new();
    let mut stsc = Vec::new();
    let mut stsz = StszBox::default();
    let mut chunk_offsets = Vec::new();
    let mut sync_samples = Vec::new();

    while reader.stream_position()? < trak_end {
        let child = match read_box_header(reader)? {
            Some(h) => h,
            None => break,
        };

        match child.box_type {
            // Containers: fall through into their children.
            MDIA | MINF | STBL => {}
            TKHD => {
                track_id = Some(parse_tkhd(reader)?);
                skip_box(reader, &child)?;
            }
            MDHD => {
                timing = Some(parse_timing_header(reader)?);
                skip_box(reader, &child)?;
            }
            HDLR => {
                kind = parse_hdlr(reader)?;
                skip_box(reader, &child)?;
            }
            STSD => {
                sample_desc = parse_stsd(reader, &child, kind)?;
                skip_box(reader, &child)?;
            }
            STTS => {
                stts = parse_stts(reader)?;
                skip_box(reader, &child)?;
            }
            CTTS => {
                ctts = parse_ctts(reader)?;
                skip_box(reader, &child)?;
            }
            STSC => {
                stsc = parse_stsc(reader)?;
                skip_box(reader, &child)?;
            }
            STSZ => {
                stsz = parse_stsz(reader)?;
                skip_box(reader, &child)?;
            }
            STCO => {
                chunk_offsets = parse_stco(reader)?;
                skip_box(reader, &child)?;
            }
            CO64 => {
                chunk_offsets = parse_co64(reader)?;
                skip_box(reader, &child)?;
            }
            STSS => {
                sync_samples = parse_stss(reader)?;
                skip_box(reader, &child)?;
            }
            _ => skip_box(reader, &child)?,
        }
    }
    reader.seek(SeekFrom::Start(trak_end))?;

    let (Some(track_id), Some(timing)) = (track_id, timing) else {
        warn!("trak at offset {} lacks tkhd or mdhd, skipping", trak_header.offset);
        return Ok(None);
    };

    if timing.timescale == 0 {
        return Err(DemuxError::CorruptContainer {
            offset: trak_header.offset,
            reason: format!("track {track_id} has a zero timescale"),
        });
    }

    Ok(Some(ParsedTrack {
        track_id,
        kind,
        timescale: timing.timescale,
        duration: timing.duration,
        sample_desc,
        stts,
        ctts,
        stsc,
        stsz,
        chunk_offsets,
        sync_samples,
    }))
}
