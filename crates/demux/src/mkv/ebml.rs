//! EBML (Extensible Binary Meta Language) parser.
//!
//! Variable-width integer reading and typed element value parsing for
//! Matroska/WebM containers. All integers are big-endian.
//!
//! EBML marks a variable-width integer's length with leading zeros in
//! its first byte:
//!
//! ```text
//! 1xxx xxxx                      1 byte,  7 data bits
//! 01xx xxxx xxxx xxxx            2 bytes, 14 data bits
//! 0000 0001 xxxx .. (7 more)     8 bytes, 56 data bits
//! ```
//!
//! Element IDs keep the marker bit (1-4 bytes); data sizes strip it
//! (1-8 bytes) and reserve the all-ones pattern for "unknown size".

use reel_common::{DemuxError, DemuxResult};
use std::io::{Read, Seek, SeekFrom};

/// Sentinel for elements with unknown (streamed) size.
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Largest binary payload a single element may carry. Anything bigger
/// is treated as a corrupt size field rather than allocated.
const MAX_BINARY_LEN: u64 = 1 << 30;

/// An EBML element header: ID, data size, and position info.
#[derive(Clone, Debug)]
pub struct ElementHeader {
    /// Element ID (1-4 bytes, marker bit kept).
    pub id: u32,
    /// Data size in bytes ([`UNKNOWN_SIZE`] when unknown).
    pub size: u64,
    /// Bytes the header itself (ID + size) consumed.
    pub header_len: u64,
    /// Stream offset of the first header byte.
    pub position: u64,
}

impl ElementHeader {
    /// Offset where the element's payload begins.
    pub fn data_offset(&self) -> u64 {
        self.position + self.header_len
    }

    /// Offset just past the element, or `None` for unknown size.
    pub fn end_offset(&self) -> Option<u64> {
        if self.size == UNKNOWN_SIZE {
            None
        } else {
            Some(self.position + self.header_len + self.size)
        }
    }
}

/// Read an element header at the current position.
pub fn read_element<R: Read + Seek>(reader: &mut R) -> DemuxResult<ElementHeader> {
    match try_read_element(reader)? {
        Some(header) => Ok(header),
        None => Err(DemuxError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "expected an EBML element",
        ))),
    }
}

/// Read an element header, or `None` at a clean end of stream (no bytes
/// left at an element boundary). Running dry *inside* a header is still
/// an `UnexpectedEof` error.
pub fn try_read_element<R: Read + Seek>(reader: &mut R) -> DemuxResult<Option<ElementHeader>> {
    let position = reader.stream_position()?;

    let first = match try_read_byte(reader)? {
        Some(b) => b,
        None => return Ok(None),
    };

    let id = finish_id(first, reader)?;
    let size = read_size(reader)?;

    let header_len = reader.stream_position()? - position;
    Ok(Some(ElementHeader {
        id,
        size,
        header_len,
        position,
    }))
}

/// Read a variable-width element ID (marker bit kept).
pub fn read_id<R: Read>(reader: &mut R) -> DemuxResult<u32> {
    let first = read_byte(reader)?;
    finish_id(first, reader)
}

fn finish_id<R: Read>(first: u8, reader: &mut R) -> DemuxResult<u32> {
    let width = vint_width(first)?;
    if width > 4 {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!("EBML ID wider than 4 bytes (leading byte 0x{first:02X})"),
        });
    }

    let mut id = first as u32;
    for _ in 1..width {
        id = (id << 8) | read_byte(reader)? as u32;
    }
    Ok(id)
}

/// Read a variable-width data size (marker bit stripped, 1-8 bytes).
/// Returns [`UNKNOWN_SIZE`] for the all-ones sentinel.
pub fn read_size<R: Read>(reader: &mut R) -> DemuxResult<u64> {
    let first = read_byte(reader)?;
    let width = vint_width(first)?;

    let mask = 0xFFu8.checked_shr(width).unwrap_or(0);
    let mut value = (first & mask) as u64;
    for _ in 1..width {
        value = (value << 8) | read_byte(reader)? as u64;
    }

    // All data bits set means "size unknown".
    let max_for_width = if width == 8 {
        (1u64 << 56) - 1
    } else {
        (1u64 << (7 * width)) - 1
    };
    if value == max_for_width {
        return Ok(UNKNOWN_SIZE);
    }

    Ok(value)
}

/// Read an unsigned integer value (1-8 bytes).
pub fn read_uint<R: Read>(reader: &mut R, size: u64) -> DemuxResult<u64> {
    if size == 0 || size > 8 {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!("invalid uint element size {size}"),
        });
    }
    let mut value: u64 = 0;
    for _ in 0..size {
        value = (value << 8) | read_byte(reader)? as u64;
    }
    Ok(value)
}

/// Read a signed integer value (1-8 bytes, two's complement).
pub fn read_sint<R: Read>(reader: &mut R, size: u64) -> DemuxResult<i64> {
    if size == 0 || size > 8 {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!("invalid sint element size {size}"),
        });
    }

    let first = read_byte(reader)?;
    let mut value = first as i8 as i64; // sign-extend the first byte
    for _ in 1..size {
        value = (value << 8) | read_byte(reader)? as i64;
    }
    Ok(value)
}

/// Read a float value (0, 4, or 8 bytes).
pub fn read_float<R: Read>(reader: &mut R, size: u64) -> DemuxResult<f64> {
    match size {
        0 => Ok(0.0),
        4 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(f32::from_be_bytes(buf) as f64)
        }
        8 => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            Ok(f64::from_be_bytes(buf))
        }
        _ => Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!("invalid float element size {size} (must be 0, 4, or 8)"),
        }),
    }
}

/// Read a UTF-8 string value. Matroska strings may be null-padded;
/// everything from the first null on is dropped.
pub fn read_string<R: Read>(reader: &mut R, size: u64) -> DemuxResult<String> {
    if size == 0 {
        return Ok(String::new());
    }
    let data = read_binary(reader, size)?;
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8(data[..end].to_vec()).map_err(|e| DemuxError::CorruptContainer {
        offset: 0,
        reason: format!("invalid UTF-8 string element: {e}"),
    })
}

/// Read raw binary payload of the given size.
pub fn read_binary<R: Read>(reader: &mut R, size: u64) -> DemuxResult<Vec<u8>> {
    if size == UNKNOWN_SIZE || size > MAX_BINARY_LEN {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: format!("implausible binary element size {size}"),
        });
    }
    let mut buf = vec![0u8; size as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Skip past `size` payload bytes.
pub fn skip_element<R: Read + Seek>(reader: &mut R, size: u64) -> DemuxResult<()> {
    if size == UNKNOWN_SIZE {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: "cannot skip an element of unknown size".into(),
        });
    }
    reader.seek(SeekFrom::Current(size as i64))?;
    Ok(())
}

// ─── Internal helpers ────────────────────────────────────────────────

fn read_byte<R: Read>(reader: &mut R) -> DemuxResult<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn try_read_byte<R: Read>(reader: &mut R) -> DemuxResult<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Width (1-8 bytes) of a variable-width integer, from its first byte.
fn vint_width(first: u8) -> DemuxResult<u32> {
    if first == 0 {
        return Err(DemuxError::CorruptContainer {
            offset: 0,
            reason: "EBML vint wider than 8 bytes (leading byte 0x00)".into(),
        });
    }
    Ok(first.leading_zeros() + 1)
}
