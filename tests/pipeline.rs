//! End-to-end probe → plan → split → stitch test against a real fixture.
//!
//! Mirrors the teacher's `muxer.rs` integration test style: skip gracefully
//! with a diagnostic message when the fixture file is absent, rather than
//! failing the suite in environments without test media.

use std::collections::HashMap;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sample.mp4")
}

/// SHA-256 digest of every packet's payload bytes, per stream index, in
/// container order — used to check lossless round-trip fidelity.
fn per_stream_packet_digests(path: &std::path::Path) -> HashMap<usize, String> {
    let mut input = ffmpeg_next::format::input(path).expect("open fixture");
    let mut hashers: HashMap<usize, Sha256> = HashMap::new();
    for (stream, packet) in input.packets() {
        let hasher = hashers.entry(stream.index()).or_insert_with(Sha256::new);
        if let Some(data) = packet.data() {
            hasher.update(data);
        }
    }
    hashers
        .into_iter()
        .map(|(idx, hasher)| (idx, format!("{:x}", hasher.finalize())))
        .collect()
}

#[test]
fn probe_plan_split_stitch_round_trips_packet_bytes() {
    let fixture = fixture_path();
    if !fixture.exists() {
        eprintln!("fixture not found at {:?}, skipping round-trip test", fixture);
        return;
    }

    keyseg::ffmpeg_init().unwrap();

    let probed = keyseg::probe(&fixture).expect("probe should succeed on a valid fixture");
    assert!(!probed.frames.is_empty());
    assert!(probed.duration > 0.0);

    let plan = keyseg::plan_chunks(
        &probed,
        &keyseg::PlanConfig {
            target_duration: (probed.duration / 3.0).max(1.0),
            ..Default::default()
        },
    )
    .expect("plan should succeed");
    assert!(plan.len() >= 1);
    assert_eq!(plan.chunks[0].start, 0.0);
    assert!((plan.chunks.last().unwrap().end - probed.duration).abs() < 1e-3);

    let scratch = tempfile::tempdir().expect("tempdir");
    let chunks_dir = scratch.path().join("chunks");

    keyseg::split_all(
        fixture.as_path(),
        &plan,
        chunks_dir.as_path(),
        &keyseg::SplitOptions::default(),
    )
    .expect("split should succeed on a valid fixture");

    let stitched_path = scratch.path().join("stitched.mp4");
    keyseg::stitch(
        stitched_path.as_path(),
        &plan,
        chunks_dir.as_path(),
        &keyseg::StitchOptions::default(),
    )
    .expect("stitch should succeed");

    let source_digests = per_stream_packet_digests(&fixture);
    let stitched_digests = per_stream_packet_digests(&stitched_path);
    assert_eq!(
        source_digests.len(),
        stitched_digests.len(),
        "stitched output should preserve the source's stream count"
    );
    for digest in source_digests.values() {
        assert!(
            stitched_digests.values().any(|d| d == digest),
            "a source stream's packet digest was not found in the stitched output"
        );
    }
}

#[test]
fn split_all_parallel_matches_sequential_chunk_count() {
    let fixture = fixture_path();
    if !fixture.exists() {
        eprintln!("fixture not found at {:?}, skipping parallel split test", fixture);
        return;
    }

    keyseg::ffmpeg_init().unwrap();

    let probed = keyseg::probe(&fixture).unwrap();
    let plan = keyseg::plan_chunks(
        &probed,
        &keyseg::PlanConfig {
            target_duration: (probed.duration / 4.0).max(1.0),
            ..Default::default()
        },
    )
    .unwrap();

    let sequential_dir = tempfile::tempdir().unwrap();
    let parallel_dir = tempfile::tempdir().unwrap();

    let sequential = keyseg::split_all(
        fixture.as_path(),
        &plan,
        sequential_dir.path(),
        &keyseg::SplitOptions::default(),
    )
    .unwrap();

    let parallel = keyseg::split_all_parallel(
        fixture.as_path(),
        &plan,
        parallel_dir.path(),
        &keyseg::SplitOptions::default(),
        4,
    )
    .unwrap();

    assert_eq!(sequential.len(), parallel.len());
    assert_eq!(sequential.len(), plan.len());
}
