//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call. All `unsafe`
//! blocks are contained here with explicit safety arguments. Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use ffmpeg_next as ffmpeg;

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`. Required when splitting/stitching into a different
/// container family than the source (e.g. mov source into a fragmented mp4
/// chunk), where a stale codec tag would otherwise be rejected by the muxer.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream. `codecpar` is set by `set_parameters` and is non-null. Writing
    // 0 to `codec_tag` is always safe — it is a plain u32 field.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

/// Read `sample_aspect_ratio` from a stream, as a rational pair.
///
/// `ffmpeg-next` exposes this on `Parameters` inconsistently across codec
/// types; reading it directly off the stream's codec parameters works for
/// all media types uniformly.
pub fn stream_sample_aspect_ratio(stream: &ffmpeg::format::stream::Stream) -> (i32, i32) {
    // SAFETY: `stream.as_ptr()` is valid for the lifetime of `stream`.
    // `sample_aspect_ratio` is a plain `AVRational` field.
    unsafe {
        let sar = (*stream.as_ptr()).sample_aspect_ratio;
        (sar.num, sar.den)
    }
}

/// Set `sample_aspect_ratio` on a mutable output stream.
pub fn stream_set_sample_aspect_ratio(
    out_stream: &mut ffmpeg::format::stream::StreamMut,
    num: i32,
    den: i32,
) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream. `sample_aspect_ratio` is a plain `AVRational` field with no
    // ownership semantics.
    unsafe {
        (*out_stream.as_mut_ptr()).sample_aspect_ratio = ffmpeg::ffi::AVRational { num, den };
    }
}

/// Read the average frame rate of a stream as a rational, or `None` when the
/// container does not advertise one (`0/1`), per the one-frame-duration
/// estimate used by the stitcher.
pub fn stream_avg_frame_rate(stream: &ffmpeg::format::stream::Stream) -> Option<ffmpeg::Rational> {
    let r = stream.avg_frame_rate();
    if r.numerator() > 0 && r.denominator() > 0 {
        Some(r)
    } else {
        None
    }
}
