//! Splitter (C3): per-chunk stream-copy remux from the source into
//! independent container files, seeking to the keyframe at or before each
//! chunk's start and copying packets through without re-encoding.

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ffmpeg_utils::{debug_stream_info, helpers, is_mirrorable};
use crate::plan::{Chunk, ChunkPlan};

const FRAGMENTED_MOVFLAGS: &str = "frag_keyframe+empty_moov+omit_tfhd_offset";

/// Splitter configuration: container format selection and fragmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// Forced output container short name (e.g. `"mp4"`, `"matroska"`).
    /// `None` auto-detects from the source file extension.
    pub format: Option<String>,
    /// Emit fragmented mp4 (`frag_keyframe+empty_moov+omit_tfhd_offset`).
    /// Ignored for non-mp4 formats.
    pub fragmented: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            format: None,
            fragmented: false,
        }
    }
}

/// Splits the source at `path` into one file per chunk in `plan`, named
/// `chunk_NNNN.EXT` inside `output_dir`. Creates `output_dir` if absent.
/// Iterates the plan in index order; the first per-chunk failure aborts the
/// whole batch.
pub fn split_all<P: AsRef<Path>>(
    source: P,
    plan: &ChunkPlan,
    output_dir: P,
    options: &SplitOptions,
) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let mut outputs = Vec::with_capacity(plan.len());
    for chunk in &plan.chunks {
        let out = split_one(source, chunk, output_dir, options)?;
        tracing::info!(index = chunk.index, path = %out.display(), "chunk split");
        outputs.push(out);
    }
    Ok(outputs)
}

/// Splits the plan's chunks across up to `workers` threads. Each worker
/// opens its own source handle (no media context is shared across
/// threads) and writes to a distinct output file, per the concurrency
/// model: workers never exceed the chunk count and chunks share no
/// mutable state.
pub fn split_all_parallel<P: AsRef<Path>>(
    source: P,
    plan: &ChunkPlan,
    output_dir: P,
    options: &SplitOptions,
    workers: usize,
) -> Result<Vec<PathBuf>> {
    let source = source.as_ref();
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let worker_count = workers.clamp(1, plan.len().max(1));
    let mut results: Vec<Option<Result<PathBuf>>> = (0..plan.len()).map(|_| None).collect();
    let chunks = &plan.chunks;

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count);
        let chunk_groups: Vec<Vec<usize>> = (0..worker_count)
            .map(|w| (w..chunks.len()).step_by(worker_count).collect())
            .collect();

        for group in chunk_groups {
            let handle = scope.spawn(move || {
                let mut out = Vec::with_capacity(group.len());
                for idx in group {
                    let result = split_one(source, &chunks[idx], output_dir, options);
                    out.push((idx, result));
                }
                out
            });
            handles.push(handle);
        }

        for handle in handles {
            let worker_results = handle.join().expect("split worker thread panicked");
            for (idx, result) in worker_results {
                results[idx] = Some(result);
            }
        }
    });

    results
        .into_iter()
        .map(|r| r.expect("every chunk index is assigned to exactly one worker"))
        .collect()
}

/// Materializes a single chunk: opens the source, seeks to the keyframe at
/// or before `chunk.start`, copies packets through the chunk's end-of-range
/// condition, and writes a standalone container to `output_dir/chunk_NNNN.EXT`.
pub fn split_one(source: &Path, chunk: &Chunk, output_dir: &Path, options: &SplitOptions) -> Result<PathBuf> {
    let (format_name, extension) = resolve_format(source, options)?;
    let out_path = output_dir.join(format!("chunk_{:04}.{}", chunk.index, extension));

    let mut input = ffmpeg::format::input(source)
        .map_err(|e| Error::IoOpen(format!("failed to open source {source:?}: {e}")))?;

    let mut output = ffmpeg::format::output_as(&out_path, format_name)
        .map_err(|e| Error::IoOpen(format!("failed to create {out_path:?}: {e}")))?;

    let mut stream_map = std::collections::HashMap::new();
    let mut video_stream_index = None;
    for stream in input.streams() {
        let medium = stream.parameters().medium();
        if !is_mirrorable(medium) {
            tracing::warn!(index = stream.index(), "skipping non-mirrorable stream");
            continue;
        }
        debug_stream_info(&stream);
        let mut out_stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| Error::StreamSetup(format!("failed to add output stream: {e}")))?;
        out_stream.set_parameters(stream.parameters());
        helpers::stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(stream.time_base());

        if medium == ffmpeg::media::Type::Video && video_stream_index.is_none() {
            video_stream_index = Some(stream.index());
        }
        stream_map.insert(stream.index(), out_stream.index());
    }
    let video_stream_index = video_stream_index.ok_or(Error::NoVideoStream)?;

    let mut mux_opts = ffmpeg::Dictionary::new();
    if options.fragmented && format_name == "mp4" {
        mux_opts.set("movflags", FRAGMENTED_MOVFLAGS);
    }
    output
        .write_header_with(mux_opts)
        .map_err(|e| Error::IoWrite(format!("failed to write header for {out_path:?}: {e}")))?;

    let seek_us = (chunk.start * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    input
        .seek(seek_us, ..seek_us)
        .map_err(|e| Error::Seek(format!("failed to seek to {:.3}s: {e}", chunk.start)))?;

    let mut finished: std::collections::HashSet<usize> = std::collections::HashSet::new();
    for (in_stream, mut packet) in input.packets() {
        let in_index = in_stream.index();
        if finished.contains(&in_index) {
            continue;
        }
        let Some(&out_index) = stream_map.get(&in_index) else {
            continue;
        };

        let pts_time = packet_time(&packet, in_stream.time_base());
        if in_index == video_stream_index {
            if pts_time >= chunk.end && packet.is_key() {
                finished.insert(in_index);
                if finished.len() == stream_map.len() {
                    break;
                }
                continue;
            }
        } else if pts_time >= chunk.end {
            finished.insert(in_index);
            if finished.len() == stream_map.len() {
                break;
            }
            continue;
        }

        let out_time_base = output
            .stream(out_index)
            .expect("output stream was just created above")
            .time_base();
        packet.rescale_ts(in_stream.time_base(), out_time_base);
        packet.set_position(-1);
        packet.set_stream(out_index);
        packet
            .write_interleaved(&mut output)
            .map_err(|e| Error::IoWrite(format!("failed to write packet: {e}")))?;
    }

    output
        .write_trailer()
        .map_err(|e| Error::IoWrite(format!("failed to write trailer for {out_path:?}: {e}")))?;

    Ok(out_path)
}

fn packet_time(packet: &ffmpeg::Packet, time_base: ffmpeg::Rational) -> f64 {
    let ts = packet.pts().or(packet.dts()).unwrap_or(0);
    ts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

fn resolve_format(source: &Path, options: &SplitOptions) -> Result<(&'static str, &'static str)> {
    if let Some(format) = &options.format {
        return Ok(match format.as_str() {
            "mp4" => ("mp4", "mp4"),
            "mov" => ("mov", "mov"),
            "matroska" | "mkv" => ("matroska", "mkv"),
            "webm" => ("webm", "webm"),
            other => {
                return Err(Error::InvalidInput(format!("unsupported forced format: {other}")))
            }
        });
    }

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| Error::InvalidInput(format!("source {source:?} has no file extension")))?;

    match extension.as_str() {
        "mp4" | "m4v" => Ok(("mp4", "mp4")),
        "mov" => Ok(("mov", "mov")),
        "mkv" => Ok(("matroska", "mkv")),
        "webm" => Ok(("webm", "webm")),
        other => Err(Error::InvalidInput(format!(
            "cannot auto-detect container format for extension {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_format_detects_from_extension() {
        let (fmt, ext) = resolve_format(Path::new("movie.mp4"), &SplitOptions::default()).unwrap();
        assert_eq!(fmt, "mp4");
        assert_eq!(ext, "mp4");

        let (fmt, ext) = resolve_format(Path::new("movie.mkv"), &SplitOptions::default()).unwrap();
        assert_eq!(fmt, "matroska");
        assert_eq!(ext, "mkv");
    }

    #[test]
    fn resolve_format_honors_forced_format() {
        let options = SplitOptions {
            format: Some("webm".into()),
            fragmented: false,
        };
        let (fmt, ext) = resolve_format(Path::new("ignored.mp4"), &options).unwrap();
        assert_eq!(fmt, "webm");
        assert_eq!(ext, "webm");
    }

    #[test]
    fn resolve_format_rejects_unknown_extension() {
        assert!(resolve_format(Path::new("movie.avi"), &SplitOptions::default()).is_err());
    }

    #[test]
    fn chunk_filename_is_zero_padded_four_digits() {
        let chunk = Chunk { index: 7, start: 0.0, end: 1.0 };
        let name = format!("chunk_{:04}.mp4", chunk.index);
        assert_eq!(name, "chunk_0007.mp4");
    }
}
