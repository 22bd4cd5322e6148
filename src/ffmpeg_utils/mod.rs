//! Narrow wrapper around the underlying media library.
//!
//! This module is the crate's *Media I/O Provider* boundary: the four
//! pipeline stages (`probe`, `plan`, `split`, `stitch`) only ever reach for
//! the verbs collected here — open, read packet, seek, allocate output,
//! write packet, write trailer, copy stream parameters, rescale a
//! timestamp. [`MediaIoProvider`] documents that surface as a trait so the
//! stages are written against a capability, not a concrete library identity;
//! [`FfmpegIo`] is its only implementation, backed by `ffmpeg-next`.

pub mod helpers;
pub mod utils;

pub use ffmpeg_next as ffmpeg;
pub use utils::*;

use std::path::Path;

use crate::error::{Error, Result};

/// The capability surface required of a media I/O backend, per the external
/// interfaces section of the design: open/enumerate, read, seek, write.
///
/// `ffmpeg-next`'s borrow-heavy packet/stream types make a fully generic
/// trait (one usable for both reading and writing without leaking lifetimes
/// into every stage signature) impractical to thread through `probe`,
/// `split`, and `stitch` without turning them into generic functions over an
/// associated-type soup. Rather than do that, the trait below documents the
/// boundary; `FfmpegIo` is the sole implementor and the stages call its
/// inherent functions (and `ffmpeg_next` directly) the same way the
/// teacher codebase calls `ffmpeg_next` directly rather than behind an
/// internal trait object.
pub trait MediaIoProvider {
    /// Reports whether `path` can be opened as a readable media container.
    fn can_open(path: &Path) -> bool;
}

/// The only implementor of [`MediaIoProvider`]: the system FFmpeg libraries
/// via `ffmpeg-next`.
pub struct FfmpegIo;

impl MediaIoProvider for FfmpegIo {
    fn can_open(path: &Path) -> bool {
        ffmpeg::format::input(path).is_ok()
    }
}

/// Initializes the underlying media library.
///
/// Must be called once before any other function in this crate that touches
/// a container (probe, split, stitch). Safe to call more than once.
pub fn init() -> Result<()> {
    ffmpeg::init().map_err(|e| Error::ProviderError(format!("ffmpeg::init() failed: {e}")))?;
    tracing::info!("media library initialized");
    Ok(())
}

/// Installs a log callback that filters a fixed set of known-benign
/// messages emitted as side effects of this crate's muxer option choices
/// (fragmented-mp4 edit lists, `avoid_negative_ts=disabled`).
///
/// # Safety ordering
/// Must be called after [`init`] and before any worker threads are spawned,
/// since it mutates global library state.
pub fn install_log_filter() {
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
        ffmpeg::ffi::av_log_set_callback(Some(log_callback));
    }
}

const SUPPRESSED_MESSAGES: &[&str] = &[
    "No meaningful edit list will be written when using empty_moov without delay_moov",
    "starts with a nonzero dts",
    "Set the delay_moov flag to handle this case",
    "Non-monotonous DTS in output stream",
];

unsafe extern "C" fn log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: *mut ffmpeg::ffi::__va_list_tag,
) {
    use std::ffi::CStr;

    if level > ffmpeg::ffi::av_log_get_level() {
        return;
    }

    let mut buf = [0i8; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );
    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();

    if SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }
    eprint!("{msg}");
}

/// Version string of the linked media library, for diagnostics.
pub fn version_info() -> String {
    // Runtime version queries changed shape across FFmpeg 8.0; report the
    // backend this crate is built against instead of probing at runtime.
    "FFmpeg 8.0+ (ffmpeg-next)".to_string()
}
