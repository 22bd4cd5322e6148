//! Small FFmpeg utility functions shared by every pipeline stage.

use ffmpeg_next as ffmpeg;

/// Convert a timestamp from one time base to another.
///
/// Essential for rescaling packet PTS/DTS between an input stream's time
/// base and the corresponding output stream's time base during split and
/// stitch.
pub fn rescale_ts(ts: i64, from: ffmpeg::Rational, to: ffmpeg::Rational) -> i64 {
    unsafe { ffmpeg::ffi::av_rescale_q(ts, from.into(), to.into()) }
}

/// Get the codec name for a codec ID, for diagnostics.
pub fn codec_name(codec_id: ffmpeg::codec::Id) -> &'static str {
    codec_id.name()
}

/// Get the media type name, for diagnostics.
pub fn media_type_name(media_type: ffmpeg::media::Type) -> &'static str {
    match media_type {
        ffmpeg::media::Type::Video => "video",
        ffmpeg::media::Type::Audio => "audio",
        ffmpeg::media::Type::Subtitle => "subtitle",
        ffmpeg::media::Type::Data => "data",
        ffmpeg::media::Type::Attachment => "attachment",
        _ => "unknown",
    }
}

/// Emits a debug-level log line describing a stream's type and codec, used
/// when a splitter/stitcher stage mirrors a source stream onto its output.
pub fn debug_stream_info(stream: &ffmpeg::format::stream::Stream) {
    let codec_id = stream.parameters().id();
    let media_type = stream.parameters().medium();
    tracing::debug!(
        index = stream.index(),
        kind = media_type_name(media_type),
        codec = codec_name(codec_id),
        "mirroring stream"
    );
}

/// Whether a stream should be mirrored onto a splitter/stitcher output.
///
/// Attachment streams (e.g. embedded fonts) carry no timed packets and are
/// excluded from the non-attachment stream count referenced throughout the
/// component design.
pub fn is_mirrorable(media_type: ffmpeg::media::Type) -> bool {
    !matches!(media_type, ffmpeg::media::Type::Attachment | ffmpeg::media::Type::Unknown)
}
