//! End-to-end probing and demuxing over synthetic in-memory fixtures:
//! probe → stream table → packet iteration → seek.

use reel_common::{CodecId, ContainerFormat, DemuxError, MediaKind, TimeBase};
use reel_demux::{probe, DemuxOptions, Demuxer, FileSource, MemorySource, Prober};

// ─── MP4 fixture construction ───────────────────────────────────────

fn mp4_box(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 8);
    data.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    data.extend_from_slice(fourcc);
    data.extend_from_slice(payload);
    data
}

/// version 0 + zero flags, then the given fields.
fn full_box_payload(fields: &[u8]) -> Vec<u8> {
    let mut data = vec![0u8; 4];
    data.extend_from_slice(fields);
    data
}

fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&0u32.to_be_bytes()); // creation
    fields.extend_from_slice(&0u32.to_be_bytes()); // modification
    fields.extend_from_slice(&timescale.to_be_bytes());
    fields.extend_from_slice(&duration.to_be_bytes());
    mp4_box(b"mvhd", &full_box_payload(&fields))
}

fn tkhd(track_id: u32) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&0u32.to_be_bytes());
    fields.extend_from_slice(&0u32.to_be_bytes());
    fields.extend_from_slice(&track_id.to_be_bytes());
    mp4_box(b"tkhd", &full_box_payload(&fields))
}

fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    fields.extend_from_slice(handler);
    mp4_box(b"hdlr", &full_box_payload(&fields))
}

fn stsd_video(codec: &[u8; 4], width: u16, height: u16) -> Vec<u8> {
    let mut entry = vec![0u8; 8]; // sample entry preamble
    entry.extend_from_slice(&[0u8; 16]);
    entry.extend_from_slice(&width.to_be_bytes());
    entry.extend_from_slice(&height.to_be_bytes());
    entry.extend_from_slice(&[0u8; 50]);

    let mut fields = Vec::new();
    fields.extend_from_slice(&1u32.to_be_bytes()); // entry count
    fields.extend_from_slice(&mp4_box(codec, &entry));
    mp4_box(b"stsd", &full_box_payload(&fields))
}

fn stts(entries: &[(u32, u32)]) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for &(count, delta) in entries {
        fields.extend_from_slice(&count.to_be_bytes());
        fields.extend_from_slice(&delta.to_be_bytes());
    }
    mp4_box(b"stts", &full_box_payload(&fields))
}

fn stsc_one_chunk(samples_per_chunk: u32) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&1u32.to_be_bytes());
    fields.extend_from_slice(&1u32.to_be_bytes()); // first chunk
    fields.extend_from_slice(&samples_per_chunk.to_be_bytes());
    fields.extend_from_slice(&1u32.to_be_bytes()); // description index
    mp4_box(b"stsc", &full_box_payload(&fields))
}

fn stsz(sizes: &[u32]) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&0u32.to_be_bytes()); // no default size
    fields.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    for &size in sizes {
        fields.extend_from_slice(&size.to_be_bytes());
    }
    mp4_box(b"stsz", &full_box_payload(&fields))
}

fn stco(offset: u32) -> Vec<u8> {
    let mut fields = Vec::new();
    fields.extend_from_slice(&1u32.to_be_bytes());
    fields.extend_from_slice(&offset.to_be_bytes());
    mp4_box(b"stco", &full_box_payload(&fields))
}

/// A single-track MP4: `payloads[i]` becomes a sample with timestamp
/// `i * delta` in a 1000 Hz timescale.
fn build_mp4(payloads: &[&[u8]], delta: u32) -> Vec<u8> {
    let build = |chunk_offset: u32| -> Vec<u8> {
        let sizes: Vec<u32> = payloads.iter().map(|p| p.len() as u32).collect();
        let stbl_payload: Vec<u8> = [
            stsd_video(b"vp09", 640, 360),
            stts(&[(payloads.len() as u32, delta)]),
            stsc_one_chunk(payloads.len() as u32),
            stsz(&sizes),
            stco(chunk_offset),
        ]
        .concat();
        let mdia_payload: Vec<u8> = [
            // mdhd shares the mvhd field layout
            {
                let mut fields = Vec::new();
                fields.extend_from_slice(&0u32.to_be_bytes());
                fields.extend_from_slice(&0u32.to_be_bytes());
                fields.extend_from_slice(&1000u32.to_be_bytes()); // timescale
                fields.extend_from_slice(&(delta * payloads.len() as u32).to_be_bytes());
                mp4_box(b"mdhd", &full_box_payload(&fields))
            },
            hdlr(b"vide"),
            mp4_box(b"minf", &mp4_box(b"stbl", &stbl_payload)),
        ]
        .concat();
        let trak = mp4_box(b"trak", &[tkhd(1), mp4_box(b"mdia", &mdia_payload)].concat());
        let moov = mp4_box(b"moov", &[mvhd(1000, delta * payloads.len() as u32), trak].concat());

        let ftyp = {
            let mut payload = Vec::new();
            payload.extend_from_slice(b"isom");
            payload.extend_from_slice(&0u32.to_be_bytes());
            payload.extend_from_slice(b"isom");
            mp4_box(b"ftyp", &payload)
        };

        let mdat = mp4_box(b"mdat", &payloads.concat());
        [ftyp, moov, mdat].concat()
    };

    // Two passes: sizes don't depend on the chunk offset value, so the
    // second pass can point stco at the real mdat payload position.
    let draft = build(0);
    let mdat_payload_len: usize = payloads.iter().map(|p| p.len()).sum();
    let mdat_payload_offset = (draft.len() - mdat_payload_len) as u32;
    build(mdat_payload_offset)
}

/// A valid MP4 whose moov declares no tracks at all.
fn build_empty_mp4() -> Vec<u8> {
    let mut ftyp_payload = Vec::new();
    ftyp_payload.extend_from_slice(b"isom");
    ftyp_payload.extend_from_slice(&0u32.to_be_bytes());
    ftyp_payload.extend_from_slice(b"isom");
    [
        mp4_box(b"ftyp", &ftyp_payload),
        mp4_box(b"moov", &mvhd(1000, 0)),
    ]
    .concat()
}

// ─── MKV fixture construction ───────────────────────────────────────

fn ebml_elem(id: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut data = id.to_vec();
    let len = payload.len();
    if len <= 126 {
        data.push(0x80 | len as u8);
    } else {
        assert!(len <= 16383, "fixture element too large");
        data.push(0x40 | (len >> 8) as u8);
        data.push((len & 0xFF) as u8);
    }
    data.extend_from_slice(payload);
    data
}

fn ebml_uint(id: &[u8], value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    ebml_elem(id, &bytes[start..])
}

fn simple_block(track: u8, rel_ts: i16, keyframe: bool, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80 | track];
    body.extend_from_slice(&rel_ts.to_be_bytes());
    body.push(if keyframe { 0x80 } else { 0x00 });
    body.extend_from_slice(payload);
    ebml_elem(&[0xA3], &body)
}

struct MkvTrackSpec {
    number: u8,
    track_type: u8,
    codec_id: &'static [u8],
}

/// `blocks` are (track number, timestamp in ms, payload), stored in the
/// given order inside a single cluster.
fn build_mkv(doc_type: &[u8], tracks: &[MkvTrackSpec], blocks: &[(u8, i16, &[u8])]) -> Vec<u8> {
    let header = ebml_elem(&[0x1A, 0x45, 0xDF, 0xA3], &ebml_elem(&[0x42, 0x82], doc_type));

    let info = ebml_elem(
        &[0x15, 0x49, 0xA9, 0x66],
        &ebml_uint(&[0x2A, 0xD7, 0xB1], 1_000_000),
    );

    let entries: Vec<u8> = tracks
        .iter()
        .flat_map(|t| {
            ebml_elem(
                &[0xAE],
                &[
                    ebml_uint(&[0xD7], t.number as u64),
                    ebml_uint(&[0x83], t.track_type as u64),
                    ebml_elem(&[0x86], t.codec_id),
                ]
                .concat(),
            )
        })
        .collect();
    let tracks_elem = ebml_elem(&[0x16, 0x54, 0xAE, 0x6B], &entries);

    let mut cluster_payload = ebml_uint(&[0xE7], 0);
    for &(track, ts, payload) in blocks {
        cluster_payload.extend_from_slice(&simple_block(track, ts, true, payload));
    }
    let cluster = ebml_elem(&[0x1F, 0x43, 0xB6, 0x75], &cluster_payload);

    let segment_payload = [info, tracks_elem, cluster].concat();
    let mut out = header;
    out.extend_from_slice(&ebml_elem(&[0x18, 0x53, 0x80, 0x67], &segment_payload));
    out
}

/// Two clusters with a Cues index pointing at each: cluster 1 holds
/// blocks at {0, 10} ms, cluster 2 at {1000, 1010} ms.
fn build_mkv_with_cues() -> Vec<u8> {
    let header = ebml_elem(
        &[0x1A, 0x45, 0xDF, 0xA3],
        &ebml_elem(&[0x42, 0x82], b"matroska"),
    );
    let info = ebml_elem(
        &[0x15, 0x49, 0xA9, 0x66],
        &ebml_uint(&[0x2A, 0xD7, 0xB1], 1_000_000),
    );
    let tracks_elem = ebml_elem(
        &[0x16, 0x54, 0xAE, 0x6B],
        &ebml_elem(
            &[0xAE],
            &[
                ebml_uint(&[0xD7], 1),
                ebml_uint(&[0x83], 1),
                ebml_elem(&[0x86], b"V_VP9"),
            ]
            .concat(),
        ),
    );

    let cluster = |timecode: u64, blocks: &[(i16, &[u8])]| -> Vec<u8> {
        let mut payload = ebml_uint(&[0xE7], timecode);
        for &(rel_ts, data) in blocks {
            payload.extend_from_slice(&simple_block(1, rel_ts, true, data));
        }
        ebml_elem(&[0x1F, 0x43, 0xB6, 0x75], &payload)
    };
    let cluster1 = cluster(0, &[(0, b"c1f0"), (10, b"c1f1")]);
    let cluster2 = cluster(1000, &[(0, b"c2f0"), (10, b"c2f1")]);

    // Cue cluster positions are relative to the Segment payload start;
    // encode them as fixed 2-byte uints so the Cues length is stable.
    let cue_point = |time: u64, position: u64| -> Vec<u8> {
        let positions = ebml_elem(
            &[0xB7],
            &[
                ebml_uint(&[0xF7], 1),
                ebml_elem(&[0xF1], &(position as u16).to_be_bytes()),
            ]
            .concat(),
        );
        ebml_elem(&[0xBB], &[ebml_uint(&[0xB3], time), positions].concat())
    };
    // Two passes: positions depend on the Cues element length only.
    let mut positions = (0u64, 0u64);
    let mut cues = ebml_elem(
        &[0x1C, 0x53, 0xBB, 0x6B],
        &[cue_point(0, positions.0), cue_point(1000, positions.1)].concat(),
    );
    let base = info.len() + tracks_elem.len() + cues.len();
    positions = (base as u64, (base + cluster1.len()) as u64);
    cues = ebml_elem(
        &[0x1C, 0x53, 0xBB, 0x6B],
        &[cue_point(0, positions.0), cue_point(1000, positions.1)].concat(),
    );

    let segment_payload = [info, tracks_elem, cues, cluster1, cluster2].concat();
    let mut out = header;
    out.extend_from_slice(&ebml_elem(&[0x18, 0x53, 0x80, 0x67], &segment_payload));
    out
}

fn video_track(number: u8) -> MkvTrackSpec {
    MkvTrackSpec {
        number,
        track_type: 1,
        codec_id: b"V_VP9",
    }
}

fn source_of(bytes: Vec<u8>) -> Box<MemorySource> {
    Box::new(MemorySource::new(bytes))
}

// ─── MP4 tests ──────────────────────────────────────────────────────

#[test]
fn mp4_probe_and_drain() {
    let bytes = build_mp4(&[b"aaaaa", b"bbbbbb", b"ccccccc"], 10);
    let result = probe(source_of(bytes)).unwrap();
    assert_eq!(result.format, ContainerFormat::Mp4);

    let mut demuxer = result.demuxer;
    let streams = demuxer.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].id, 1);
    assert_eq!(streams[0].kind, MediaKind::Video);
    assert_eq!(streams[0].codec, CodecId::Vp9);
    assert_eq!(streams[0].time_base, TimeBase::from_hz(1000));

    let expected: [(&[u8], i64); 3] = [(b"aaaaa", 0), (b"bbbbbb", 10), (b"ccccccc", 20)];
    for (payload, ts) in expected {
        let pkt = demuxer.next_packet().unwrap().unwrap();
        assert_eq!(pkt.stream_id, 1);
        assert_eq!(pkt.data, payload);
        assert_eq!(pkt.ts, ts);
        assert_eq!(pkt.dur, 10);
        assert!(pkt.is_key);
    }

    // End of stream is idempotent.
    for _ in 0..3 {
        assert!(demuxer.next_packet().unwrap().is_none());
    }
}

#[test]
fn mp4_seek_roundtrip() {
    let bytes = build_mp4(&[b"aaaaa", b"bbbbbb", b"ccccccc"], 10);
    let mut demuxer = probe(source_of(bytes)).unwrap().demuxer;

    // Nearest packet at or before t=15 is the one at t=10, and nothing
    // in (10, 15] was skipped.
    assert_eq!(demuxer.seek(1, 15).unwrap(), 10);
    let pkt = demuxer.next_packet().unwrap().unwrap();
    assert_eq!(pkt.ts, 10);
    assert_eq!(pkt.data, b"bbbbbb");

    // Exact hit.
    assert_eq!(demuxer.seek(1, 20).unwrap(), 20);
    assert_eq!(demuxer.next_packet().unwrap().unwrap().ts, 20);

    // Past the end clamps to the last packet; before the start clamps
    // to the first.
    assert_eq!(demuxer.seek(1, 1_000_000).unwrap(), 20);
    assert_eq!(demuxer.seek(1, -5).unwrap(), 0);
    assert_eq!(demuxer.next_packet().unwrap().unwrap().ts, 0);

    // Seeking re-opens an exhausted demuxer.
    while demuxer.next_packet().unwrap().is_some() {}
    assert_eq!(demuxer.seek(1, 0).unwrap(), 0);
    assert!(demuxer.next_packet().unwrap().is_some());

    // Unknown stream ids are rejected; the demuxer stays usable.
    assert!(matches!(
        demuxer.seek(99, 0),
        Err(DemuxError::InvalidStream(99))
    ));
    assert!(demuxer.next_packet().unwrap().is_some());
}

#[test]
fn mp4_empty_container_is_immediate_end_of_stream() {
    let mut demuxer = probe(source_of(build_empty_mp4())).unwrap().demuxer;
    assert!(demuxer.streams().is_empty());
    for _ in 0..3 {
        assert!(demuxer.next_packet().unwrap().is_none());
    }
}

#[test]
fn probe_is_deterministic() {
    let bytes = build_mp4(&[b"xyz"], 10);
    let first = probe(source_of(bytes.clone())).unwrap();
    let second = probe(source_of(bytes)).unwrap();
    assert_eq!(first.format, second.format);
    assert_eq!(first.score, second.score);
}

#[test]
fn truncated_prefix_never_panics() {
    // Too short for any detector to decide.
    let err = probe(source_of(vec![0x00, 0x00, 0x00, 0x14, b'f', b't'])).unwrap_err();
    assert!(matches!(err, DemuxError::TruncatedStream { .. }));

    // Magic intact but the metadata is cut off mid-moov.
    let full = build_mp4(&[b"aaaaa"], 10);
    let err = probe(source_of(full[..30].to_vec())).unwrap_err();
    assert!(matches!(
        err,
        DemuxError::TruncatedStream { .. } | DemuxError::CorruptContainer { .. }
    ));
}

#[test]
fn garbage_is_unrecognized() {
    let err = probe(source_of(vec![0x55; 8192])).unwrap_err();
    assert!(matches!(err, DemuxError::UnrecognizedFormat));
}

// ─── MKV tests ──────────────────────────────────────────────────────

#[test]
fn mkv_probe_and_drain() {
    let bytes = build_mkv(
        b"matroska",
        &[video_track(1)],
        &[(1, 0, b"frame0"), (1, 10, b"frame1"), (1, 20, b"frame2")],
    );
    let result = probe(source_of(bytes)).unwrap();
    assert_eq!(result.format, ContainerFormat::Mkv);

    let mut demuxer = result.demuxer;
    let streams = demuxer.streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].id, 1);
    assert_eq!(streams[0].codec, CodecId::Vp9);
    // Default 1ms timecode scale.
    assert_eq!(streams[0].time_base, TimeBase::MILLIS);

    for (ts, payload) in [(0i64, b"frame0"), (10, b"frame1"), (20, b"frame2")] {
        let pkt = demuxer.next_packet().unwrap().unwrap();
        assert_eq!(pkt.stream_id, 1);
        assert_eq!(pkt.ts, ts);
        assert_eq!(pkt.data, payload);
        assert!(pkt.is_key);
    }

    for _ in 0..3 {
        assert!(demuxer.next_packet().unwrap().is_none());
    }
}

#[test]
fn mkv_preserves_interleaved_arrival_order() {
    let audio = MkvTrackSpec {
        number: 2,
        track_type: 2,
        codec_id: b"A_OPUS",
    };
    let bytes = build_mkv(
        b"matroska",
        &[video_track(1), audio],
        &[
            (1, 0, b"v0"),
            (2, 0, b"a0"),
            (1, 10, b"v1"),
            (2, 5, b"a1"),
        ],
    );

    let mut demuxer = probe(source_of(bytes)).unwrap().demuxer;
    assert_eq!(demuxer.streams().len(), 2);

    // Exactly the container's storage order, no reordering.
    let order: Vec<(u32, i64)> = std::iter::from_fn(|| demuxer.next_packet().unwrap())
        .map(|p| (p.stream_id, p.ts))
        .collect();
    assert_eq!(order, vec![(1, 0), (2, 0), (1, 10), (2, 5)]);
}

#[test]
fn mkv_linear_seek_roundtrip() {
    let bytes = build_mkv(
        b"matroska",
        &[video_track(1)],
        &[(1, 0, b"frame0"), (1, 10, b"frame1"), (1, 20, b"frame2")],
    );
    let mut demuxer = probe(source_of(bytes)).unwrap().demuxer;

    assert_eq!(demuxer.seek(1, 15).unwrap(), 10);
    let pkt = demuxer.next_packet().unwrap().unwrap();
    assert_eq!(pkt.ts, 10);
    assert_eq!(pkt.data, b"frame1");

    // Forward iteration continues past the landing packet.
    assert_eq!(demuxer.next_packet().unwrap().unwrap().ts, 20);

    // Before the first packet: clamp forward to it.
    assert_eq!(demuxer.seek(1, -100).unwrap(), 0);
    assert_eq!(demuxer.next_packet().unwrap().unwrap().ts, 0);

    assert!(matches!(
        demuxer.seek(7, 0),
        Err(DemuxError::InvalidStream(7))
    ));
}

#[test]
fn mkv_cue_indexed_seek() {
    let bytes = build_mkv_with_cues();
    let options = DemuxOptions { linear_seek: false };
    let mut demuxer = Prober::with_default_formats()
        .probe_with(source_of(bytes), options)
        .unwrap()
        .demuxer;

    // Cues are present, so seeking works even with linear scan off.
    assert_eq!(demuxer.seek(1, 1005).unwrap(), 1000);
    let pkt = demuxer.next_packet().unwrap().unwrap();
    assert_eq!(pkt.ts, 1000);
    assert_eq!(pkt.data, b"c2f0");
    assert_eq!(demuxer.next_packet().unwrap().unwrap().ts, 1010);

    // Back into the first cluster.
    assert_eq!(demuxer.seek(1, 10).unwrap(), 10);
    assert_eq!(demuxer.next_packet().unwrap().unwrap().data, b"c1f1");
}

#[test]
fn mkv_seek_without_index_can_be_disabled() {
    let bytes = build_mkv(b"matroska", &[video_track(1)], &[(1, 0, b"frame0")]);
    let options = DemuxOptions { linear_seek: false };
    let mut demuxer = Prober::with_default_formats()
        .probe_with(source_of(bytes), options)
        .unwrap()
        .demuxer;

    // The fixture has no Cues element.
    assert!(matches!(
        demuxer.seek(1, 0),
        Err(DemuxError::SeekIndexUnavailable)
    ));

    // Forward iteration still works afterwards.
    assert!(demuxer.next_packet().unwrap().is_some());
}

#[test]
fn mkv_empty_segment_is_immediate_end_of_stream() {
    // One track, one cluster, zero blocks: valid but packet-free.
    let bytes = build_mkv(b"matroska", &[video_track(1)], &[]);
    let mut demuxer = probe(source_of(bytes)).unwrap().demuxer;
    for _ in 0..3 {
        assert!(demuxer.next_packet().unwrap().is_none());
    }
}

#[test]
fn webm_doctype_reports_webm() {
    let bytes = build_mkv(b"webm", &[video_track(1)], &[(1, 0, b"frame0")]);
    let result = probe(source_of(bytes)).unwrap();
    assert_eq!(result.format, ContainerFormat::WebM);
}

// ─── File-backed end-to-end ─────────────────────────────────────────

#[test]
fn file_source_end_to_end() {
    let bytes = build_mp4(&[b"aaaaa", b"bbbbbb"], 10);
    let path = std::env::temp_dir().join(format!("reel-demux-test-{}.mp4", std::process::id()));
    std::fs::write(&path, &bytes).unwrap();

    let source = FileSource::open(&path).unwrap();
    let mut demuxer = probe(Box::new(source)).unwrap().demuxer;

    let mut count = 0;
    while demuxer.next_packet().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);

    drop(demuxer); // releases the file handle before deletion
    std::fs::remove_file(&path).unwrap();
}
