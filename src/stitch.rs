//! Stitcher (C4): concatenates chunk files back into a single container
//! with one monotonically increasing timeline per stream, by tracking a
//! per-stream timestamp offset across chunk boundaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ffmpeg_utils::{debug_stream_info, helpers, is_mirrorable};
use crate::plan::ChunkPlan;

/// Stitcher configuration: same container-selection surface as the
/// Splitter, plus `faststart` for a non-fragmented mp4 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchOptions {
    /// Forced output container short name. `None` auto-detects from `output_path`.
    pub format: Option<String>,
    /// Move the `moov` atom to the front of a non-fragmented mp4 output.
    pub faststart: bool,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            format: None,
            faststart: false,
        }
    }
}

/// Per-output-stream bookkeeping carried across chunk boundaries.
struct StreamState {
    time_base: ffmpeg::Rational,
    media_type: ffmpeg::media::Type,
    avg_frame_rate: Option<ffmpeg::Rational>,
    offset: i64,
    last_pts: Option<i64>,
    last_dts: Option<i64>,
}

/// Concatenates the chunk files named by `plan` (resolved as
/// `chunks_dir/chunk_NNNN.*`) into a single container at `output_path`,
/// rewriting timestamps so the result carries one monotonic timeline per
/// stream.
pub fn stitch(
    output_path: &Path,
    plan: &ChunkPlan,
    chunks_dir: &Path,
    options: &StitchOptions,
) -> Result<PathBuf> {
    if plan.is_empty() {
        return Err(Error::InvalidInput("chunk plan has no chunks".into()));
    }

    let chunk_paths = resolve_chunk_paths(plan, chunks_dir)?;
    let (format_name, _) = resolve_format(output_path, options)?;

    let mut output = ffmpeg::format::output_as(output_path, format_name)
        .map_err(|e| Error::IoOpen(format!("failed to create {output_path:?}: {e}")))?;

    let mut states: Vec<StreamState> = Vec::new();
    // Maps an input stream index (within the *current* chunk) to the output
    // stream position; rebuilt for every chunk since chunk files reopen
    // their own demuxer context with their own stream ordering.
    let mut input_to_output: HashMap<usize, usize> = HashMap::new();
    let output_stream_count;

    {
        let first_path = &chunk_paths[0];
        let mut first_input = ffmpeg::format::input(first_path)
            .map_err(|e| Error::IoOpen(format!("failed to open {first_path:?}: {e}")))?;

        for stream in first_input.streams() {
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
            let (sar_num, sar_den) = helpers::stream_sample_aspect_ratio(&stream);
            helpers::stream_set_sample_aspect_ratio(&mut out_stream, sar_num, sar_den);

            let out_index = out_stream.index();
            input_to_output.insert(stream.index(), out_index);
            states.push(StreamState {
                time_base: stream.time_base(),
                media_type: medium,
                avg_frame_rate: helpers::stream_avg_frame_rate(&stream),
                offset: 0,
                last_pts: None,
                last_dts: None,
            });
        }
        output_stream_count = states.len();
        if output_stream_count == 0 {
            return Err(Error::NoVideoStream);
        }

        let mut mux_opts = ffmpeg::Dictionary::new();
        mux_opts.set("avoid_negative_ts", "disabled");
        if options.faststart && format_name == "mp4" {
            mux_opts.set("movflags", "faststart");
        }
        output
            .write_header_with(mux_opts)
            .map_err(|e| Error::IoWrite(format!("failed to write header: {e}")))?;

        write_chunk_packets(&mut first_input, &mut output, &input_to_output, &mut states, true)?;
    }

    for chunk_path in &chunk_paths[1..] {
        let mut input = ffmpeg::format::input(chunk_path)
            .map_err(|e| Error::IoOpen(format!("failed to open {chunk_path:?}: {e}")))?;

        input_to_output.clear();
        let mirrorable_streams: Vec<_> = input
            .streams()
            .filter(|s| is_mirrorable(s.parameters().medium()))
            .collect();
        if mirrorable_streams.len() != output_stream_count {
            return Err(Error::LayoutMismatch(format!(
                "{chunk_path:?} has {} streams, expected {output_stream_count}",
                mirrorable_streams.len()
            )));
        }
        for (position, stream) in mirrorable_streams.iter().enumerate() {
            if stream.time_base() != states[position].time_base {
                return Err(Error::LayoutMismatch(format!(
                    "{chunk_path:?} stream {} time base {:?} does not match established {:?}",
                    stream.index(),
                    stream.time_base(),
                    states[position].time_base
                )));
            }
            input_to_output.insert(stream.index(), position);
        }

        write_chunk_packets(&mut input, &mut output, &input_to_output, &mut states, false)?;
    }

    output
        .write_trailer()
        .map_err(|e| Error::IoWrite(format!("failed to write trailer: {e}")))?;

    tracing::info!(chunks = chunk_paths.len(), path = %output_path.display(), "stitch complete");

    Ok(output_path.to_path_buf())
}

fn write_chunk_packets(
    input: &mut ffmpeg::format::context::Input,
    output: &mut ffmpeg::format::context::Output,
    input_to_output: &HashMap<usize, usize>,
    states: &mut [StreamState],
    is_first_chunk: bool,
) -> Result<()> {
    // `base`: the first observed timestamp per input stream in this chunk,
    // used to rebase subsequent-chunk packets onto the running offset.
    let mut base: HashMap<usize, i64> = HashMap::new();
    let mut chunk_max: HashMap<usize, i64> = HashMap::new();

    for (stream, mut packet) in input.packets() {
        let Some(&out_position) = input_to_output.get(&stream.index()) else {
            continue;
        };

        let raw_pts = packet.pts();
        let raw_dts = packet.dts();

        let (new_pts, new_dts) = if is_first_chunk {
            (raw_pts, raw_dts)
        } else {
            let b = *base.entry(stream.index()).or_insert_with(|| {
                raw_pts.or(raw_dts).unwrap_or(0)
            });
            let offset = states[out_position].offset;
            let mut pts = raw_pts.map(|p| p - b + offset);
            let mut dts = raw_dts.map(|d| d - b + offset);
            if pts.is_none() {
                pts = dts;
            }
            if dts.is_none() {
                dts = pts;
            }
            if let (Some(p), Some(d)) = (pts, dts) {
                if d > p {
                    pts = Some(d);
                }
            }
            (pts, dts)
        };

        let tail_ts = new_pts.or(new_dts).unwrap_or(0);
        chunk_max
            .entry(stream.index())
            .and_modify(|m| *m = (*m).max(tail_ts))
            .or_insert(tail_ts);

        states[out_position].last_pts = new_pts.or(states[out_position].last_pts);
        states[out_position].last_dts = new_dts.or(states[out_position].last_dts);

        let out_time_base = output
            .stream(out_position)
            .expect("output streams were created in the header phase")
            .time_base();
        // Rescales duration along with pts/dts; the explicit set_pts/set_dts
        // below then overwrite pts/dts with the rebased values.
        packet.rescale_ts(stream.time_base(), out_time_base);
        if let Some(p) = new_pts {
            packet.set_pts(Some(rescale_single(p, stream.time_base(), out_time_base)));
        }
        if let Some(d) = new_dts {
            packet.set_dts(Some(rescale_single(d, stream.time_base(), out_time_base)));
        }
        packet.set_position(-1);
        packet.set_stream(out_position);
        packet
            .write_interleaved(output)
            .map_err(|e| Error::IoWrite(format!("failed to write packet: {e}")))?;
    }

    for (stream_index, &out_position) in input_to_output.iter() {
        let tail = *chunk_max.get(stream_index).unwrap_or(&0);
        let state = &mut states[out_position];
        let one_frame = match (state.media_type, state.avg_frame_rate) {
            (_, Some(fps)) if fps.numerator() > 0 => {
                let inv = ffmpeg::Rational::new(fps.denominator(), fps.numerator());
                crate::ffmpeg_utils::rescale_ts(1, inv, state.time_base)
            }
            _ => 1,
        };
        state.offset = tail + one_frame;
    }

    Ok(())
}

fn rescale_single(ts: i64, from: ffmpeg::Rational, to: ffmpeg::Rational) -> i64 {
    crate::ffmpeg_utils::rescale_ts(ts, from, to)
}

fn resolve_chunk_paths(plan: &ChunkPlan, chunks_dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = chunks_dir
        .canonicalize()
        .map_err(|e| Error::MissingChunk(format!("chunks directory {chunks_dir:?}: {e}")))?;

    let mut paths = Vec::with_capacity(plan.len());
    for chunk in &plan.chunks {
        let matches: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| Error::MissingChunk(format!("reading {dir:?}: {e}")))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s == format!("chunk_{:04}", chunk.index))
            })
            .collect();
        let path = matches
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingChunk(format!("chunk_{:04} in {dir:?}", chunk.index)))?;
        paths.push(path);
    }
    Ok(paths)
}

fn resolve_format(output_path: &Path, options: &StitchOptions) -> Result<(&'static str, &'static str)> {
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

    let extension = output_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| Error::InvalidInput(format!("output {output_path:?} has no file extension")))?;

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
    fn resolve_format_detects_from_output_extension() {
        let (fmt, _) = resolve_format(Path::new("out.mp4"), &StitchOptions::default()).unwrap();
        assert_eq!(fmt, "mp4");
    }

    #[test]
    fn resolve_format_rejects_missing_extension() {
        assert!(resolve_format(Path::new("out"), &StitchOptions::default()).is_err());
    }

    #[test]
    fn empty_plan_is_invalid_input() {
        let plan = ChunkPlan { chunks: vec![] };
        let result = stitch(Path::new("/tmp/out.mp4"), &plan, Path::new("/tmp"), &StitchOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
