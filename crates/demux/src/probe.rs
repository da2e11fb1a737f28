//! Format probing — scored detection over a bounded lookahead window.
//!
//! Each registered detector inspects the same lookahead window and
//! reports a confidence score; the highest score wins and constructs
//! the demuxer. Ties are broken by registration order (first registered
//! wins), so probing the same bytes is fully deterministic.

use crate::mkv::MkvDetector;
use crate::mp4::Mp4Detector;
use crate::source::ByteSource;
use crate::traits::{DemuxOptions, Demuxer};
use reel_common::{ContainerFormat, DemuxError, DemuxResult};
use std::io::Read;
use tracing::{debug, info};

/// Bytes of lookahead made available to detectors.
pub const PROBE_WINDOW_LEN: usize = 4096;

/// Minimum confidence (0-100) required to select a format.
pub const MIN_SCORE: u8 = 40;

/// A container format detector: scores a lookahead window and, when
/// selected, constructs the demuxer for its format.
pub trait FormatDetector: Send + Sync {
    /// The format this detector recognizes (for registry listings; the
    /// constructed demuxer may refine it, e.g. Matroska vs. WebM).
    fn format(&self) -> ContainerFormat;

    /// Confidence 0-100 that `window` starts a stream of this format.
    fn score(&self, window: &[u8]) -> u8;

    /// Build the demuxer. The source is positioned at offset 0.
    fn instantiate(
        &self,
        source: Box<dyn ByteSource>,
        options: DemuxOptions,
    ) -> DemuxResult<Box<dyn Demuxer>>;
}

/// Outcome of a successful probe: the selected format and the demuxer
/// constructed for it.
pub struct ProbeResult {
    pub format: ContainerFormat,
    pub score: u8,
    pub demuxer: Box<dyn Demuxer>,
}

/// Ordered registry of format detectors.
pub struct Prober {
    detectors: Vec<Box<dyn FormatDetector>>,
}

impl Prober {
    /// An empty registry. Most callers want [`Prober::with_default_formats`].
    pub fn new() -> Self {
        Prober {
            detectors: Vec::new(),
        }
    }

    /// Registry with the built-in formats: MP4, then Matroska/WebM.
    pub fn with_default_formats() -> Self {
        let mut prober = Self::new();
        prober.register(Box::new(Mp4Detector));
        prober.register(Box::new(MkvDetector));
        prober
    }

    /// Append a detector. Registration order is the tie-break order.
    pub fn register(&mut self, detector: Box<dyn FormatDetector>) {
        self.detectors.push(detector);
    }

    /// Probe with default options.
    pub fn probe(&self, source: Box<dyn ByteSource>) -> DemuxResult<ProbeResult> {
        self.probe_with(source, DemuxOptions::default())
    }

    /// Inspect the source's lookahead window, select a format, and
    /// construct its demuxer.
    pub fn probe_with(
        &self,
        mut source: Box<dyn ByteSource>,
        options: DemuxOptions,
    ) -> DemuxResult<ProbeResult> {
        source.seek_to(0)?;
        let mut window = vec![0u8; PROBE_WINDOW_LEN];
        let got = read_window(&mut *source, &mut window)?;
        let window = &window[..got];
        // Rewind so the winning demuxer parses from the start.
        source.seek_to(0)?;

        let mut best: Option<(usize, u8)> = None;
        for (idx, detector) in self.detectors.iter().enumerate() {
            let score = detector.score(window);
            debug!(
                "Probe: {:?} scored {} on a {}-byte window",
                detector.format(),
                score,
                got
            );
            // Strictly greater only: first registered wins exact ties.
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((idx, score));
            }
        }

        let (idx, score) = match best {
            Some((idx, score)) if score >= MIN_SCORE => (idx, score),
            _ => {
                return Err(if got < PROBE_WINDOW_LEN {
                    DemuxError::TruncatedStream {
                        offset: got as u64,
                        reason: format!(
                            "lookahead window ended after {got} bytes with no format decided"
                        ),
                    }
                } else {
                    DemuxError::UnrecognizedFormat
                });
            }
        };

        let detector = &self.detectors[idx];
        let demuxer = detector.instantiate(source, options)?;
        let format = demuxer.format();
        info!("Probe selected {:?} (score {})", format, score);

        Ok(ProbeResult {
            format,
            score,
            demuxer,
        })
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::with_default_formats()
    }
}

/// Probe with the built-in format registry and default options.
pub fn probe(source: Box<dyn ByteSource>) -> DemuxResult<ProbeResult> {
    Prober::with_default_formats().probe(source)
}

/// Fill `buf` from the source, stopping early only at end of stream.
/// Returns the number of bytes actually read.
fn read_window(source: &mut dyn ByteSource, buf: &mut [u8]) -> DemuxResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use reel_common::{Packet, StreamInfo};

    /// Detector stub with a fixed score.
    struct FixedScore {
        format: ContainerFormat,
        score: u8,
    }

    impl FormatDetector for FixedScore {
        fn format(&self) -> ContainerFormat {
            self.format
        }

        fn score(&self, _window: &[u8]) -> u8 {
            self.score
        }

        fn instantiate(
            &self,
            _source: Box<dyn ByteSource>,
            _options: DemuxOptions,
        ) -> DemuxResult<Box<dyn Demuxer>> {
            Ok(Box::new(StubDemuxer {
                format: self.format,
            }))
        }
    }

    struct StubDemuxer {
        format: ContainerFormat,
    }

    impl Demuxer for StubDemuxer {
        fn format(&self) -> ContainerFormat {
            self.format
        }

        fn streams(&self) -> &[StreamInfo] {
            &[]
        }

        fn next_packet(&mut self) -> DemuxResult<Option<Packet>> {
            Ok(None)
        }

        fn seek(&mut self, stream_id: u32, _ts: i64) -> DemuxResult<i64> {
            Err(DemuxError::InvalidStream(stream_id))
        }
    }

    fn full_window_source() -> Box<dyn ByteSource> {
        Box::new(MemorySource::new(vec![0xAB; PROBE_WINDOW_LEN]))
    }

    #[test]
    fn highest_score_wins() {
        let mut prober = Prober::new();
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mp4,
            score: 60,
        }));
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mkv,
            score: 90,
        }));

        let result = prober.probe(full_window_source()).unwrap();
        assert_eq!(result.format, ContainerFormat::Mkv);
        assert_eq!(result.score, 90);
    }

    #[test]
    fn exact_tie_goes_to_first_registered() {
        let mut prober = Prober::new();
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mp4,
            score: 80,
        }));
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mkv,
            score: 80,
        }));

        let result = prober.probe(full_window_source()).unwrap();
        assert_eq!(result.format, ContainerFormat::Mp4);
    }

    #[test]
    fn below_threshold_on_full_window_is_unrecognized() {
        let mut prober = Prober::new();
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mp4,
            score: MIN_SCORE - 1,
        }));

        let err = prober.probe(full_window_source()).unwrap_err();
        assert!(matches!(err, DemuxError::UnrecognizedFormat));
    }

    #[test]
    fn undecided_short_window_is_truncated() {
        let prober = Prober::with_default_formats();
        let source = Box::new(MemorySource::new(vec![0x00, 0x01, 0x02]));
        let err = prober.probe(source).unwrap_err();
        assert!(matches!(err, DemuxError::TruncatedStream { .. }));
    }

    #[test]
    fn empty_registry_never_matches() {
        let prober = Prober::new();
        let err = prober.probe(full_window_source()).unwrap_err();
        assert!(matches!(err, DemuxError::UnrecognizedFormat));
    }

    #[test]
    fn short_window_still_selects_when_decidable() {
        // A confident detector must win even when the source is smaller
        // than the lookahead window.
        let mut prober = Prober::new();
        prober.register(Box::new(FixedScore {
            format: ContainerFormat::Mp4,
            score: 100,
        }));
        let source = Box::new(MemorySource::new(vec![0u8; 32]));
        let result = prober.probe(source).unwrap();
        assert_eq!(result.format, ContainerFormat::Mp4);
    }
}
