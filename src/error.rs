//! Error taxonomy for the probe/plan/split/stitch pipeline.

use thiserror::Error;

/// Top-level error type returned by every stage of the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller contract was violated (empty probe, non-positive duration, bad config).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failed to open an input or output container.
    #[error("failed to open container: {0}")]
    IoOpen(String),

    /// Failed to write a packet, header, or trailer to an output container.
    #[error("failed to write container data: {0}")]
    IoWrite(String),

    /// Failed to seek the source to a target timestamp.
    #[error("seek failed: {0}")]
    Seek(String),

    /// Opaque failure surfaced by the underlying media library that doesn't
    /// map to a more specific variant.
    #[error("media provider error: {0}")]
    ProviderError(String),

    /// The source has no usable video stream.
    #[error("no video stream found in source")]
    NoVideoStream,

    /// Allocation failure in the underlying media library.
    #[error("out of memory")]
    OutOfMemory,

    /// Could not create or copy parameters onto an output stream.
    #[error("stream setup failed: {0}")]
    StreamSetup(String),

    /// Chunk files disagree on stream shape (count or time base) during stitching.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// An expected chunk file was not found.
    #[error("missing chunk: {0}")]
    MissingChunk(String),

    /// A filesystem operation performed directly by a stage (directory
    /// creation, path canonicalization) failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
