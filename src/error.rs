//! Error types for the rendering pipeline.
//!
//! Every failure in the core is fatal to the batch job: errors propagate to
//! the caller, which stops the run. Frames already serialized stay on disk.

use std::io;
use std::path::{Path, PathBuf};

use crate::buffer::BufferError;

/// Errors produced while loading inputs, rendering or writing frames.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    /// Pixel format name or channel layout not recognized.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Channel bit depth cannot be written as half or single float.
    #[error("unsupported pixel type: {format} channel {channel} has {bits} bits")]
    UnsupportedPixelType {
        format: &'static str,
        channel: usize,
        bits: u32,
    },

    /// File creation, read or write failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Trajectory file ended early or held a non-numeric token.
    #[error("malformed trajectory: {0}")]
    MalformedTrajectory(String),

    /// Intrinsics file ended early or held a non-numeric token.
    #[error("malformed intrinsics: {0}")]
    MalformedIntrinsics(String),

    /// Mirror surface file is not a JSON array of surfaces.
    #[error("invalid mirror surfaces: {0}")]
    MirrorFile(String),

    /// Mesh file could not be parsed.
    #[error("invalid mesh: {0}")]
    Mesh(String),

    /// Render configuration rejected before any target was created.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Pixel buffer validation failed.
    #[error("pixel buffer: {0}")]
    Buffer(#[from] BufferError),

    /// Floating-point image codec failure other than I/O.
    #[error("EXR encoding failed for {}: {source}", path.display())]
    Exr {
        path: PathBuf,
        #[source]
        source: exr::error::Error,
    },

    /// PNG codec failure other than I/O.
    #[error("PNG encoding failed for {}: {source}", path.display())]
    Png {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}

impl RenderError {
    /// I/O failure on `path`.
    pub fn io(path: &Path, source: io::Error) -> Self {
        RenderError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Map an EXR codec error, keeping I/O failures as [`RenderError::Io`].
    pub fn exr(path: &Path, source: exr::error::Error) -> Self {
        match source {
            exr::error::Error::Io(err) => Self::io(path, err),
            other => RenderError::Exr {
                path: path.to_path_buf(),
                source: other,
            },
        }
    }

    /// Map a PNG codec error, keeping I/O failures as [`RenderError::Io`].
    pub fn png(path: &Path, source: png::EncodingError) -> Self {
        match source {
            png::EncodingError::IoError(err) => Self::io(path, err),
            other => RenderError::Png {
                path: path.to_path_buf(),
                source: other,
            },
        }
    }

    /// Whether this error came from the file system.
    pub fn is_io(&self) -> bool {
        matches!(self, RenderError::Io { .. })
    }
}

/// Result alias for pipeline operations.
pub type RenderResult<T> = Result<T, RenderError>;
