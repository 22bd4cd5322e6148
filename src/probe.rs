//! Probe (C1): a packet-only scan of a single video stream, with no
//! decoding, producing ordered per-frame metadata and a trustworthy total
//! duration for the Planner to consume.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{Error, Result};

/// Per-packet metadata recorded for the chosen video stream.
///
/// `complexity` and `is_scene_cut` are left `None` until the Planner
/// computes them into its own analytic view; [`probe`] never populates
/// them, so a probe result is safe to share and re-plan from repeatedly.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Best-effort presentation timestamp, in seconds.
    pub pts_time: f64,
    /// True iff the demuxer flagged the packet as a random-access point.
    pub is_keyframe: bool,
    /// Compressed packet size in bytes, used as a complexity proxy.
    pub packet_size: usize,
    /// Scene-cut score, filled in by the Planner when scene detection runs.
    pub complexity: Option<f64>,
    /// Scene-cut flag, filled in by the Planner when scene detection runs.
    pub is_scene_cut: bool,
}

impl Frame {
    fn new(pts_time: f64, is_keyframe: bool, packet_size: usize) -> Self {
        Self {
            pts_time,
            is_keyframe,
            packet_size,
            complexity: None,
            is_scene_cut: false,
        }
    }
}

/// Ordered per-frame metadata plus total duration, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// Frames in container (presentation-fallback) order.
    pub frames: Vec<Frame>,
    /// Total asset duration in seconds.
    pub duration: f64,
}

impl ProbeResult {
    /// Number of frames flagged as keyframes.
    pub fn keyframe_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_keyframe).count()
    }

    /// Timestamps of every keyframe, in ascending order.
    pub fn keyframe_timestamps(&self) -> Vec<f64> {
        self.frames
            .iter()
            .filter(|f| f.is_keyframe)
            .map(|f| f.pts_time)
            .collect()
    }
}

/// Scans `path` for its best video stream and returns ordered frame metadata
/// plus a trustworthy duration. Performs no codec decoding: only packet
/// headers are read.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<ProbeResult> {
    let path = path.as_ref();

    let mut context = ffmpeg::format::input(path)
        .map_err(|e| Error::IoOpen(format!("failed to open {path:?}: {e}")))?;

    let video_stream_index = context
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(Error::NoVideoStream)?
        .index();

    let video_time_base = context
        .streams()
        .nth(video_stream_index)
        .expect("stream index returned by best() exists")
        .time_base();
    let stream_duration = context
        .streams()
        .nth(video_stream_index)
        .expect("stream index returned by best() exists")
        .duration();
    let stream_declared_secs = if stream_duration > 0 {
        pts_to_seconds(stream_duration, video_time_base)
    } else {
        0.0
    };

    let container_duration = context.duration();
    let container_declared_secs = if container_duration > 0 {
        container_duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        0.0
    };

    let mut frames = Vec::new();
    let mut last_pts_time = 0.0f64;
    let mut observed_end_secs = 0.0f64;

    for (stream, packet) in context.packets() {
        if stream.index() != video_stream_index {
            continue;
        }

        let pts_time = if let Some(pts) = packet.pts() {
            pts_to_seconds(pts, video_time_base)
        } else if let Some(dts) = packet.dts() {
            pts_to_seconds(dts, video_time_base)
        } else {
            last_pts_time
        };
        last_pts_time = pts_time;

        let packet_duration_secs = if packet.duration() > 0 {
            pts_to_seconds(packet.duration(), video_time_base)
        } else {
            0.0
        };
        let end_secs = pts_time + packet_duration_secs;
        if end_secs > observed_end_secs {
            observed_end_secs = end_secs;
        }

        frames.push(Frame::new(pts_time, packet.is_key(), packet.size()));
    }

    let duration = observed_end_secs
        .max(stream_declared_secs)
        .max(container_declared_secs);

    if duration <= 0.0 {
        return Err(Error::InvalidInput(
            "asset has no positive duration from observed packets, stream, or container".into(),
        ));
    }

    tracing::info!(
        path = %path.display(),
        frames = frames.len(),
        keyframes = frames.iter().filter(|f| f.is_keyframe).count(),
        duration,
        "probe complete"
    );

    Ok(ProbeResult { frames, duration })
}

fn pts_to_seconds(pts: i64, time_base: ffmpeg::Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts: f64, keyframe: bool) -> Frame {
        Frame::new(pts, keyframe, 1000)
    }

    #[test]
    fn keyframe_timestamps_filters_non_keyframes() {
        let result = ProbeResult {
            frames: vec![frame(0.0, true), frame(1.0, false), frame(2.0, true)],
            duration: 3.0,
        };
        assert_eq!(result.keyframe_timestamps(), vec![0.0, 2.0]);
        assert_eq!(result.keyframe_count(), 2);
    }

    #[test]
    fn pts_to_seconds_applies_time_base() {
        let tb = ffmpeg::Rational::new(1, 90000);
        assert!((pts_to_seconds(90000, tb) - 1.0).abs() < 1e-9);
        assert!((pts_to_seconds(45000, tb) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn new_frame_has_no_planner_annotations() {
        let f = frame(1.0, true);
        assert!(f.complexity.is_none());
        assert!(!f.is_scene_cut);
    }
}
