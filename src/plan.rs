//! Planner (C2): selects keyframe-aligned cut points under duration and
//! parallelism constraints, with optional scene-cut and complexity scoring.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::probe::ProbeResult;

const SCENE_WINDOW: usize = 5;

/// Planner configuration. Every field is independently meaningful with a
/// documented default, so a caller can build one without a config file.
///
/// `min_duration`/`max_duration` are `Option<f64>` rather than `f64` so an
/// explicit `Some(0.0)` (a real, literal bound used by some callers) is
/// distinguishable from "unset, derive from `target_duration`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Preferred chunk length, in seconds.
    pub target_duration: f64,
    /// Minimum chunk length, in seconds. Defaults to `0.5 * target_duration`.
    pub min_duration: Option<f64>,
    /// Maximum chunk length, in seconds. Defaults to `2.0 * target_duration`.
    pub max_duration: Option<f64>,
    /// Merge a trailing chunk shorter than `0.5 * min_duration` into its predecessor.
    pub avoid_tiny_last: bool,
    /// If set and the plan has fewer chunks, re-plan with a smaller target.
    pub min_chunks: Option<usize>,
    /// If set and the plan has more chunks, merge down to this cap.
    pub max_chunks: Option<usize>,
    /// If > 0, overrides `target_duration` with `duration / ideal_parallel`.
    pub ideal_parallel: usize,
    /// Enables scene-cut scoring (packet-size discontinuity heuristic).
    pub scene_detection: bool,
    /// Enables complexity annotation of frames.
    pub complexity_adapt: bool,
    /// Scene-cut sensitivity in `[0, 1]`.
    pub scene_threshold: f64,
    /// Weight given to scene/quality bonuses vs. raw duration closeness, in `[0, 1]`.
    pub complexity_weight: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            target_duration: 10.0,
            min_duration: None,
            max_duration: None,
            avoid_tiny_last: true,
            min_chunks: None,
            max_chunks: None,
            ideal_parallel: 0,
            scene_detection: false,
            complexity_adapt: false,
            scene_threshold: 0.35,
            complexity_weight: 0.3,
        }
    }
}

/// A single time-bounded segment of the source, half-open `[start, end)`
/// except for the last chunk, which is closed at the asset duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl Chunk {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered, contiguous sequence of chunks covering `[0, duration]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A keyframe candidate annotated with the scoring inputs the cut-selection
/// algorithm needs, computed into a local copy so the caller's probe result
/// is never mutated in place.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    pts_time: f64,
    is_scene_cut: bool,
}

struct Resolved {
    target: f64,
    min_duration: f64,
    max_duration: f64,
    smart: bool,
    complexity_weight: f64,
}

/// Produces a keyframe-aligned chunk plan from a probe result and configuration.
pub fn plan(probe: &ProbeResult, config: &PlanConfig) -> Result<ChunkPlan> {
    if probe.frames.is_empty() {
        return Err(Error::InvalidInput("probe result has no frames".into()));
    }
    if probe.duration <= 0.0 {
        return Err(Error::InvalidInput("probe duration must be positive".into()));
    }

    let candidates = annotate_candidates(probe, config);
    if candidates.is_empty() {
        tracing::warn!(duration = probe.duration, "no keyframes found, falling back to a single chunk");
    }
    let resolved = resolve_params(config, probe.duration, config.target_duration);

    let mut chunks = build_chunks(probe.duration, &candidates, &resolved);

    if let Some(min_chunks) = config.min_chunks {
        if min_chunks > 0 && chunks.len() < min_chunks {
            let retarget = probe.duration / min_chunks as f64;
            let resolved = resolve_params(config, probe.duration, retarget);
            chunks = build_chunks(probe.duration, &candidates, &resolved);
        }
    }

    post_process(&mut chunks, probe.duration, config);

    if let Some(max_chunks) = config.max_chunks {
        if max_chunks > 0 && chunks.len() > max_chunks {
            tracing::warn!(from = chunks.len(), to = max_chunks, "merging chunks to satisfy max_chunks");
            merge_down_to(&mut chunks, max_chunks);
        }
    }

    renumber(&mut chunks);

    tracing::info!(chunks = chunks.len(), duration = probe.duration, "plan complete");

    Ok(ChunkPlan { chunks })
}

fn resolve_params(config: &PlanConfig, duration: f64, target_duration: f64) -> Resolved {
    let mut target = if config.ideal_parallel > 0 {
        duration / config.ideal_parallel as f64
    } else {
        target_duration
    };
    if target <= 0.0 {
        target = 10.0;
    }

    let min_duration = config.min_duration.unwrap_or(0.5 * target);
    let max_duration = config.max_duration.unwrap_or(2.0 * target).max(min_duration);

    Resolved {
        target,
        min_duration,
        max_duration,
        smart: config.scene_detection || config.complexity_adapt,
        complexity_weight: config.complexity_weight,
    }
}

fn annotate_candidates(probe: &ProbeResult, config: &PlanConfig) -> Vec<Candidate> {
    let n = probe.frames.len();
    let mut scene_cut = vec![false; n];

    if config.scene_detection && n > 2 * SCENE_WINDOW {
        for i in SCENE_WINDOW..n - SCENE_WINDOW {
            if !probe.frames[i].is_keyframe {
                continue;
            }
            let before: usize = probe.frames[i - SCENE_WINDOW..i]
                .iter()
                .map(|f| f.packet_size)
                .sum();
            let after: usize = probe.frames[i..i + SCENE_WINDOW]
                .iter()
                .map(|f| f.packet_size)
                .sum();
            let avg_before = before as f64 / SCENE_WINDOW as f64;
            let avg_after = after as f64 / SCENE_WINDOW as f64;
            if avg_before > 0.0 && (avg_after - avg_before).abs() / avg_before > config.scene_threshold {
                scene_cut[i] = true;
            }
        }
    }

    probe
        .frames
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_keyframe)
        .map(|(i, f)| Candidate {
            pts_time: f.pts_time,
            is_scene_cut: scene_cut[i],
        })
        .collect()
}

fn score(candidate: &Candidate, start: f64, resolved: &Resolved) -> f64 {
    let distance = (candidate.pts_time - start - resolved.target).abs();
    if !resolved.smart {
        return distance;
    }
    let w = resolved.complexity_weight;
    let scene_bonus = if candidate.is_scene_cut { -0.3 } else { 0.0 };
    let quality_score = 100.0 + if candidate.is_scene_cut { 50.0 } else { 0.0 };
    let quality_bonus = -(quality_score / 200.0);
    (1.0 - w) * distance / resolved.target + scene_bonus + quality_bonus
}

/// Runs the cut-point selection algorithm once, start to finish, without
/// any post-processing.
fn build_chunks(duration: f64, candidates: &[Candidate], resolved: &Resolved) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start = 0.0f64;
    let mut cursor = 0usize;
    let mut index = 0usize;

    loop {
        if start >= duration - f64::EPSILON {
            break;
        }

        let mut feasible: Option<(f64, f64)> = None;
        let mut fallback: Option<f64> = None;
        let mut terminate_at_duration = false;

        let mut i = cursor;
        while i < candidates.len() {
            let t = candidates[i].pts_time;
            if t <= start {
                i += 1;
                continue;
            }
            if t - start < resolved.min_duration {
                i += 1;
                continue;
            }
            if t >= duration {
                terminate_at_duration = true;
                break;
            }
            if t - start > resolved.max_duration {
                fallback = Some(t);
                break;
            }
            let s = score(&candidates[i], start, resolved);
            if feasible.map_or(true, |(_, best)| s < best) {
                feasible = Some((t, s));
            }
            i += 1;
        }

        let cut = if terminate_at_duration {
            duration
        } else if let Some((t, _)) = feasible {
            t
        } else if let Some(t) = fallback {
            t
        } else {
            duration
        };

        let lower = (start + resolved.min_duration).min(duration);
        let mut end = cut.max(lower).min(duration);
        if end <= start {
            end = (start + resolved.max_duration).min(duration);
        }

        chunks.push(Chunk { index, start, end });
        index += 1;

        while cursor < candidates.len() && candidates[cursor].pts_time <= end {
            cursor += 1;
        }

        start = end;
    }

    if chunks.is_empty() {
        chunks.push(Chunk { index: 0, start: 0.0, end: duration });
    }

    chunks
}

fn post_process(chunks: &mut Vec<Chunk>, duration: f64, config: &PlanConfig) {
    if let Some(last) = chunks.last_mut() {
        last.end = duration;
    }

    if config.avoid_tiny_last && chunks.len() > 1 {
        let resolved_min = resolve_params(config, duration, config.target_duration).min_duration;
        let threshold = 0.5 * resolved_min;
        if let Some(last) = chunks.last() {
            if last.duration() < threshold {
                let last = chunks.pop().unwrap();
                if let Some(prev) = chunks.last_mut() {
                    prev.end = last.end;
                }
            }
        }
    }

    for i in 1..chunks.len() {
        let prev_end = chunks[i - 1].end;
        chunks[i].start = prev_end;
        if chunks[i].end < chunks[i].start {
            chunks[i].end = chunks[i].start;
        }
    }

    let total: f64 = chunks.iter().map(|c| c.duration()).sum();
    if (total - duration).abs() > 0.001 {
        if let Some(last) = chunks.last_mut() {
            last.end = duration;
        }
    }

    renumber(chunks);
}

fn merge_down_to(chunks: &mut Vec<Chunk>, max_chunks: usize) {
    while chunks.len() > max_chunks && chunks.len() > 1 {
        let mut smallest_idx = 0;
        let mut smallest_sum = f64::MAX;
        for i in 0..chunks.len() - 1 {
            let sum = chunks[i].duration() + chunks[i + 1].duration();
            if sum < smallest_sum {
                smallest_sum = sum;
                smallest_idx = i;
            }
        }
        let merged_end = chunks[smallest_idx + 1].end;
        chunks[smallest_idx].end = merged_end;
        chunks.remove(smallest_idx + 1);
    }
    renumber(chunks);
}

fn renumber(chunks: &mut [Chunk]) {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Frame;

    fn synthetic(duration: f64, keyframe_times: &[f64], frame_stride: f64) -> ProbeResult {
        let mut frames = Vec::new();
        let mut t = 0.0;
        while t < duration {
            let is_kf = keyframe_times.iter().any(|kt| (kt - t).abs() < 1e-6);
            frames.push(Frame {
                pts_time: t,
                is_keyframe: is_kf,
                packet_size: 1000,
                complexity: None,
                is_scene_cut: false,
            });
            t += frame_stride;
        }
        ProbeResult { frames, duration }
    }

    fn cfg(target: f64, min: f64, max: f64) -> PlanConfig {
        PlanConfig {
            target_duration: target,
            min_duration: Some(min),
            max_duration: Some(max),
            ..PlanConfig::default()
        }
    }

    #[test]
    fn scenario_1_dense_keyframes_even_spacing() {
        let keyframes: Vec<f64> = (0..=100).step_by(5).map(|x| x as f64).collect();
        let probe = synthetic(100.0, &keyframes, 1.0);
        let plan_result = plan(&probe, &cfg(20.0, 0.0, 40.0)).unwrap();
        let expected = vec![
            (0, 0.0, 20.0),
            (1, 20.0, 40.0),
            (2, 40.0, 60.0),
            (3, 60.0, 80.0),
            (4, 80.0, 100.0),
        ];
        for (chunk, (idx, start, end)) in plan_result.chunks.iter().zip(expected) {
            assert_eq!(chunk.index, idx);
            assert!((chunk.start - start).abs() < 1e-6, "{:?}", chunk);
            assert!((chunk.end - end).abs() < 1e-6, "{:?}", chunk);
        }
    }

    #[test]
    fn scenario_2_sparse_keyframes_force_oversize_fallback() {
        let probe = synthetic(100.0, &[0.0, 55.0, 100.0], 1.0);
        let plan_result = plan(&probe, &cfg(20.0, 0.0, 40.0)).unwrap();
        assert_eq!(plan_result.chunks.len(), 2);
        assert!((plan_result.chunks[0].end - 55.0).abs() < 1e-6);
        assert!((plan_result.chunks[1].end - 100.0).abs() < 1e-6);
    }

    #[test]
    fn scenario_3_ideal_parallel_overrides_target() {
        let keyframes: Vec<f64> = (0..=100).step_by(5).map(|x| x as f64).collect();
        let probe = synthetic(100.0, &keyframes, 1.0);
        let config = PlanConfig {
            ideal_parallel: 4,
            ..PlanConfig::default()
        };
        let plan_result = plan(&probe, &config).unwrap();
        let expected_ends = [25.0, 50.0, 75.0, 100.0];
        assert_eq!(plan_result.chunks.len(), 4);
        for (chunk, end) in plan_result.chunks.iter().zip(expected_ends) {
            assert!((chunk.end - end).abs() < 1e-6, "{:?}", chunk);
        }
    }

    #[test]
    fn scenario_4_max_chunks_merges_down() {
        let keyframes: Vec<f64> = (0..=100).step_by(10).map(|x| x as f64).collect();
        let probe = synthetic(100.0, &keyframes, 1.0);
        let config = PlanConfig {
            max_chunks: Some(3),
            ..cfg(10.0, 5.0, 20.0)
        };
        let plan_result = plan(&probe, &config).unwrap();
        assert_eq!(plan_result.chunks.len(), 3);
        assert!((plan_result.chunks[0].start - 0.0).abs() < 1e-6);
        assert!((plan_result.chunks.last().unwrap().end - 100.0).abs() < 1e-6);
        for (i, chunk) in plan_result.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn scenario_6_scene_detection_prefers_scene_cut_over_nominal() {
        let mut frames = Vec::new();
        let mut t = 0.0;
        while t < 100.0 {
            let is_kf = (t as i64) % 10 == 0;
            let size = if t >= 30.0 { 3000 } else { 1000 };
            frames.push(Frame {
                pts_time: t,
                is_keyframe: is_kf,
                packet_size: size,
                complexity: None,
                is_scene_cut: false,
            });
            t += 1.0;
        }
        let probe = ProbeResult { frames, duration: 100.0 };
        let config = PlanConfig {
            target_duration: 20.0,
            min_duration: Some(5.0),
            max_duration: Some(40.0),
            scene_detection: true,
            scene_threshold: 0.5,
            ..PlanConfig::default()
        };
        let plan_result = plan(&probe, &config).unwrap();
        assert!((plan_result.chunks[0].end - 30.0).abs() < 1e-6, "{:?}", plan_result.chunks);
    }

    #[test]
    fn zero_keyframes_yields_single_chunk() {
        let probe = synthetic(42.0, &[], 1.0);
        let plan_result = plan(&probe, &PlanConfig::default()).unwrap();
        assert_eq!(plan_result.chunks.len(), 1);
        assert_eq!(plan_result.chunks[0].start, 0.0);
        assert_eq!(plan_result.chunks[0].end, 42.0);
    }

    #[test]
    fn empty_probe_is_invalid_input() {
        let probe = ProbeResult { frames: vec![], duration: 0.0 };
        assert!(matches!(plan(&probe, &PlanConfig::default()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn avoid_tiny_last_merges_trailing_sliver() {
        let probe = synthetic(41.0, &[0.0, 20.0, 40.0], 1.0);
        let config = PlanConfig {
            avoid_tiny_last: true,
            ..cfg(20.0, 10.0, 40.0)
        };
        let plan_result = plan(&probe, &config).unwrap();
        assert!((plan_result.chunks.last().unwrap().end - 41.0).abs() < 1e-6);
        for w in plan_result.chunks.windows(2) {
            assert!((w[0].end - w[1].start).abs() < 1e-9);
        }
    }

    #[test]
    fn plan_covers_duration_contiguously() {
        let keyframes: Vec<f64> = (0..=77).step_by(3).map(|x| x as f64).collect();
        let probe = synthetic(77.0, &keyframes, 1.0);
        let plan_result = plan(&probe, &cfg(15.0, 7.0, 30.0)).unwrap();
        assert_eq!(plan_result.chunks[0].start, 0.0);
        assert!((plan_result.chunks.last().unwrap().end - 77.0).abs() < 1e-6);
        for w in plan_result.chunks.windows(2) {
            assert!((w[0].end - w[1].start).abs() < 1e-9);
        }
        for (i, chunk) in plan_result.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn default_target_duration_falls_back_to_ten_seconds() {
        let resolved = resolve_params(&PlanConfig { target_duration: 0.0, ..PlanConfig::default() }, 100.0, 0.0);
        assert_eq!(resolved.target, 10.0);
    }
}
