//! Minimal demonstration binary wiring probe → plan → split → stitch
//! together against a real file. Not a general-purpose CLI: argument
//! parsing, JSON plan export, and verbosity flags are out of scope for
//! this crate and left to an embedding application.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> keyseg::Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let source = args.next().unwrap_or_else(|| "input.mp4".to_string());
    let output = args.next().unwrap_or_else(|| "output.mp4".to_string());
    let chunks_dir = std::env::temp_dir().join("keyseg-demo-chunks");

    tracing::info!(backend = %keyseg::ffmpeg_version_info(), "keyseg-pipeline starting");
    keyseg::ffmpeg_init()?;
    keyseg::ffmpeg_log_filter();

    let probed = keyseg::probe(&source)?;
    tracing::info!(frames = probed.frames.len(), duration = probed.duration, "probed source");

    let plan = keyseg::plan_chunks(&probed, &keyseg::PlanConfig::default())?;
    tracing::info!(chunks = plan.len(), "plan ready");

    keyseg::split_all(
        source.as_ref(),
        &plan,
        chunks_dir.as_path(),
        &keyseg::SplitOptions::default(),
    )?;
    tracing::info!(dir = %chunks_dir.display(), "split complete");

    keyseg::stitch(
        output.as_ref(),
        &plan,
        chunks_dir.as_path(),
        &keyseg::StitchOptions::default(),
    )?;
    tracing::info!(path = %output, "stitch complete");

    Ok(())
}
