//! # keyseg
//!
//! `keyseg` plans and materializes keyframe-aligned, lossless segmentations
//! of a single video asset, then reassembles those segments into a
//! bit-faithful reconstruction of the source. It targets parallel-transcode
//! and VOD-ingest pipelines that need fast, deterministic cut planning
//! without decoding video, followed by stream-copy remuxing that preserves
//! the original coded frames and timestamps.
//!
//! ## Pipeline
//!
//! 1. [`probe`] — a packet-only scan that extracts per-frame metadata and a
//!    trustworthy total duration, without codec decoding.
//! 2. [`plan`] — a constraint-driven chunk planner that selects cut points
//!    from the set of keyframes.
//! 3. [`split`] — a remuxer that materializes each planned chunk as an
//!    independent container, stream-copying packets through without
//!    re-encoding.
//! 4. [`stitch`] — a concatenating remuxer that rewrites timestamps across
//!    chunk boundaries so the output carries a single monotonic timeline.
//!
//! ## Usage
//!
//! ```ignore
//! fn main() -> keyseg::Result<()> {
//!     keyseg::ffmpeg_init()?;
//!     keyseg::ffmpeg_log_filter();
//!
//!     let probed = keyseg::probe::probe("input.mp4")?;
//!     let plan = keyseg::plan::plan(&probed, &keyseg::plan::PlanConfig::default())?;
//!     keyseg::split::split_all("input.mp4", &plan, "chunks/", &Default::default())?;
//!     keyseg::stitch::stitch("output.mp4".as_ref(), &plan, "chunks/".as_ref(), &Default::default())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ffmpeg_utils;
pub mod plan;
pub mod probe;
pub mod split;
pub mod stitch;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use ffmpeg_utils::version_info as ffmpeg_version_info;
pub use ffmpeg_utils::{init as ffmpeg_init, install_log_filter as ffmpeg_log_filter};
pub use plan::{plan as plan_chunks, Chunk, ChunkPlan, PlanConfig};
pub use probe::{probe, Frame, ProbeResult};
pub use split::{split_all, split_all_parallel, split_one, SplitOptions};
pub use stitch::{stitch, StitchOptions};
