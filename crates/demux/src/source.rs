//! Byte source abstraction — the readable, seekable input everything
//! else parses through.
//!
//! A demuxer exclusively owns its source's cursor; repositioning the
//! source behind an active demuxer's back corrupts its state.

use reel_common::{DemuxError, DemuxResult};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::info;

/// A readable, optionally seekable stream of bytes.
pub trait ByteSource: Read + Seek + Send {
    /// Whether `seek` is supported at all.
    fn is_seekable(&self) -> bool;

    /// Total length in bytes, if known.
    fn byte_len(&self) -> Option<u64>;

    /// Reposition to an absolute offset, with the seek contract enforced:
    /// fails with `Unseekable` on unseekable sources and `OutOfRange`
    /// when the offset exceeds the known length.
    fn seek_to(&mut self, offset: u64) -> DemuxResult<u64> {
        if !self.is_seekable() {
            return Err(DemuxError::Unseekable);
        }
        if let Some(len) = self.byte_len() {
            if offset > len {
                return Err(DemuxError::OutOfRange { offset, len });
            }
        }
        Ok(self.seek(SeekFrom::Start(offset))?)
    }
}

// ─── File-backed source ─────────────────────────────────────────────

/// Buffered, seekable source over a file.
///
/// The file handle is released when the source (or the demuxer owning
/// it) is dropped — on every exit path, error paths included.
pub struct FileSource {
    reader: BufReader<File>,
    len: u64,
}

impl FileSource {
    /// Open a file. Filesystem failures (not found, permission denied)
    /// surface through `DemuxError::Io` with the kind preserved.
    pub fn open(path: &Path) -> DemuxResult<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        info!("Opened media file: {} ({} bytes)", path.display(), len);
        Ok(FileSource {
            reader: BufReader::new(file),
            len,
        })
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl ByteSource for FileSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}

// ─── In-memory source ───────────────────────────────────────────────

/// Seekable source over an owned byte buffer.
pub struct MemorySource {
    cursor: Cursor<Vec<u8>>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        MemorySource {
            cursor: Cursor::new(data),
        }
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Read for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemorySource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl ByteSource for MemorySource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.cursor.get_ref().len() as u64)
    }
}

// ─── Unseekable wrapper ─────────────────────────────────────────────

/// Adapts a plain `Read` (pipe, socket, decompressor) into a source.
///
/// Seeking always fails; probing requires a rewindable source, so this
/// is only usable where the caller drives a demuxer constructed by
/// other means or buffers the stream first.
pub struct ReadStreamSource<R: Read + Send> {
    inner: R,
    position: u64,
}

impl<R: Read + Send> ReadStreamSource<R> {
    pub fn new(inner: R) -> Self {
        ReadStreamSource { inner, position: 0 }
    }
}

impl<R: Read + Send> Read for ReadStreamSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read + Send> Seek for ReadStreamSource<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        // Querying the current position is the one "seek" a forward-only
        // stream can answer.
        if let SeekFrom::Current(0) = pos {
            return Ok(self.position);
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "source is not seekable",
        ))
    }
}

impl<R: Read + Send> ByteSource for ReadStreamSource<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_read_and_seek() {
        let mut src = MemorySource::new(vec![1, 2, 3, 4, 5]);
        assert!(src.is_seekable());
        assert_eq!(src.byte_len(), Some(5));

        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);

        src.seek_to(4).unwrap();
        let mut buf = [0u8; 1];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [5]);
    }

    #[test]
    fn memory_source_read_stops_at_end() {
        let mut src = MemorySource::new(vec![9; 3]);
        let mut buf = [0u8; 8];
        let n = src.read(&mut buf).unwrap();
        assert_eq!(n, 3);
        let n = src.read(&mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn seek_to_out_of_range() {
        let mut src = MemorySource::new(vec![0; 10]);
        match src.seek_to(11) {
            Err(DemuxError::OutOfRange { offset, len }) => {
                assert_eq!(offset, 11);
                assert_eq!(len, 10);
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
        // Seeking exactly to the end is allowed.
        assert_eq!(src.seek_to(10).unwrap(), 10);
    }

    #[test]
    fn read_stream_source_is_unseekable() {
        let data: &[u8] = &[1, 2, 3];
        let mut src = ReadStreamSource::new(data);
        assert!(!src.is_seekable());
        assert_eq!(src.byte_len(), None);
        assert!(matches!(src.seek_to(0), Err(DemuxError::Unseekable)));

        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).unwrap();
        assert_eq!(src.seek(SeekFrom::Current(0)).unwrap(), 2);
    }

    #[test]
    fn file_source_not_found() {
        let err = FileSource::open(Path::new("/definitely/not/here.mp4")).unwrap_err();
        match err {
            DemuxError::Io(inner) => {
                assert_eq!(inner.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("expected Io(NotFound), got {other:?}"),
        }
    }
}
