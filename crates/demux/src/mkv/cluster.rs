//! Cluster block parsing for Matroska/WebM containers.
//!
//! Parses `SimpleBlock` and `Block` element bodies: track number,
//! timecode offset, keyframe flag, and every frame the block carries.
//! Laced blocks (Xiph, EBML, fixed-size) are fully expanded — each
//! laced frame is its own packet downstream.
//!
//! ```text
//! [track: vint] [timecode: i16, cluster-relative] [flags: u8] [frames...]
//! ```
//!
//! Flag bits: 0x80 keyframe (SimpleBlock only), 0x08 invisible,
//! 0x06 lacing (00 none, 01 Xiph, 11 EBML, 10 fixed-size).

use reel_common::{DemuxError, DemuxResult};

/// Parsed contents of a SimpleBlock or Block element.
#[derive(Clone, Debug)]
pub struct BlockInfo {
    /// Track number this block belongs to.
    pub track_number: u64,
    /// Timecode offset relative to the cluster timecode.
    pub timecode_offset: i16,
    /// Whether the block's frames are keyframes.
    pub is_keyframe: bool,
    /// Whether the frames should not be rendered.
    pub is_invisible: bool,
    /// All frames in the block, in stored order.
    pub frames: Vec<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Lacing {
    None,
    Xiph,
    Ebml,
    FixedSize,
}

/// Parse a SimpleBlock element body.
pub fn parse_simple_block(data: &[u8]) -> DemuxResult<BlockInfo> {
    if data.is_empty() {
        return Err(corrupt("empty block body"));
    }

    let (track_number, vint_len) = read_vint(data)?;
    let mut offset = vint_len;

    if offset + 3 > data.len() {
        return Err(corrupt("block body ends inside its header"));
    }
    let timecode_offset = i16::from_be_bytes([data[offset], data[offset + 1]]);
    let flags = data[offset + 2];
    offset += 3;

    let lacing = match (flags >> 1) & 0x03 {
        0b00 => Lacing::None,
        0b01 => Lacing::Xiph,
        0b11 => Lacing::Ebml,
        _ => Lacing::FixedSize,
    };

    let frames = split_frames(&data[offset..], lacing)?;

    Ok(BlockInfo {
        track_number,
        timecode_offset,
        is_keyframe: flags & 0x80 != 0,
        is_invisible: flags & 0x08 != 0,
        frames,
    })
}

/// Parse a Block element body (the BlockGroup flavor). The keyframe
/// flag in a Block is unused; keyframe status comes from the absence of
/// ReferenceBlock elements in the enclosing group.
pub fn parse_block(data: &[u8], has_reference: bool) -> DemuxResult<BlockInfo> {
    let mut info = parse_simple_block(data)?;
    info.is_keyframe = !has_reference;
    Ok(info)
}

// ─── Lacing ─────────────────────────────────────────────────────────

/// Split a block's frame area into individual frames.
fn split_frames(data: &[u8], lacing: Lacing) -> DemuxResult<Vec<Vec<u8>>> {
    if lacing == Lacing::None {
        return Ok(vec![data.to_vec()]);
    }

    if data.is_empty() {
        return Err(corrupt("laced block has no lacing header"));
    }
    let frame_count = data[0] as usize + 1;
    let data = &data[1..];

    match lacing {
        Lacing::None => unreachable!(),
        Lacing::FixedSize => {
            if frame_count == 0 || data.len() % frame_count != 0 {
                return Err(corrupt(&format!(
                    "fixed lacing: {} bytes not divisible into {} frames",
                    data.len(),
                    frame_count
                )));
            }
            let frame_size = data.len() / frame_count;
            Ok(data.chunks(frame_size).map(|c| c.to_vec()).collect())
        }
        Lacing::Xiph => {
            // Sizes of the first n-1 frames, each a run of 0xFF bytes
            // terminated by a byte < 0xFF; the last frame takes the rest.
            let mut sizes = Vec::with_capacity(frame_count.saturating_sub(1));
            let mut offset = 0;
            for _ in 0..frame_count.saturating_sub(1) {
                let mut size = 0usize;
                loop {
                    let b = *data
                        .get(offset)
                        .ok_or_else(|| corrupt("Xiph lacing sizes end prematurely"))?;
                    offset += 1;
                    size += b as usize;
                    if b < 0xFF {
                        break;
                    }
                }
                sizes.push(size);
            }
            frames_from_sizes(&data[offset..], &sizes)
        }
        Lacing::Ebml => {
            // First size is an unsigned vint; each following size is the
            // previous plus a signed vint delta; the last frame takes
            // the rest.
            let mut sizes = Vec::with_capacity(frame_count.saturating_sub(1));
            let mut offset = 0;
            if frame_count > 1 {
                let (first, len) = read_vint(&data[offset..])?;
                offset += len;
                let mut prev = first as i64;
                sizes.push(first as usize);
                for _ in 0..frame_count.saturating_sub(2) {
                    let (delta, len) = read_signed_vint(&data[offset..])?;
                    offset += len;
                    prev += delta;
                    if prev < 0 {
                        return Err(corrupt("EBML lacing produced a negative frame size"));
                    }
                    sizes.push(prev as usize);
                }
            }
            frames_from_sizes(&data[offset..], &sizes)
        }
    }
}

/// Slice out `sizes.len() + 1` frames: the listed sizes, then the
/// remainder as the final frame.
fn frames_from_sizes(data: &[u8], sizes: &[usize]) -> DemuxResult<Vec<Vec<u8>>> {
    let mut frames = Vec::with_capacity(sizes.len() + 1);
    let mut offset: usize = 0;
    for &size in sizes {
        let end = offset
            .checked_add(size)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| corrupt("laced frame overruns its block"))?;
        frames.push(data[offset..end].to_vec());
        offset = end;
    }
    frames.push(data[offset..].to_vec());
    Ok(frames)
}

// ─── Block vints ────────────────────────────────────────────────────

/// Read an unsigned vint from a block header (marker bit stripped).
/// Returns `(value, bytes_consumed)`.
fn read_vint(data: &[u8]) -> DemuxResult<(u64, usize)> {
    let first = *data.first().ok_or_else(|| corrupt("vint at end of block"))?;
    if first == 0 {
        return Err(corrupt("block vint wider than 8 bytes"));
    }
    let width = first.leading_zeros() as usize + 1;
    if data.len() < width {
        return Err(corrupt("block vint ends prematurely"));
    }

    let mask = 0xFFu8.checked_shr(width as u32).unwrap_or(0);
    let mut value = (first & mask) as u64;
    for &b in &data[1..width] {
        value = (value << 8) | b as u64;
    }
    Ok((value, width))
}

/// Read a signed vint (EBML lacing delta): the unsigned value minus the
/// width's bias `2^(7w-1) - 1`.
fn read_signed_vint(data: &[u8]) -> DemuxResult<(i64, usize)> {
    let (raw, width) = read_vint(data)?;
    let bias = (1i64 << (7 * width as u32 - 1)) - 1;
    Ok((raw as i64 - bias, width))
}

fn corrupt(reason: &str) -> DemuxError {
    DemuxError::CorruptContainer {
        offset: 0,
        reason: reason.to_string(),
    }
}
