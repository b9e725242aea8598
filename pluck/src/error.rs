//! Error types for layer extraction.

use std::io;
use std::time::Duration;

/// Alias for `Result<T, pluck::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error raised by a [`BlobSource`](crate::BlobSource) implementation.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort an extraction run.
///
/// Every variant is fatal: the pipeline never moves on to the next layer
/// after one of these. A missing path is not an error, see
/// [`Outcome::NotFound`](crate::Outcome::NotFound).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport could not deliver a layer blob.
    #[error("failed to fetch layer {digest}: {source}")]
    Fetch {
        /// Digest of the layer being fetched.
        digest: String,
        /// Transport error.
        source: SourceError,
    },

    /// The layer stream is not a readable (possibly gzipped) tar archive.
    #[error("malformed layer {digest}: {source}")]
    Archive {
        /// Digest of the offending layer.
        digest: String,
        /// Underlying decode error.
        source: io::Error,
    },

    /// The matched entry ended before its declared size.
    #[error("truncated entry {path} in layer {digest}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Digest of the layer holding the entry.
        digest: String,
        /// Entry path.
        path: String,
        /// Size declared by the entry header.
        expected: u64,
        /// Bytes actually copied.
        actual: u64,
    },

    /// The layer uses a compression this tool cannot decode.
    #[error("layer {digest} uses unsupported compression ({media_type})")]
    UnsupportedCompression {
        /// Digest of the layer.
        digest: String,
        /// Declared media type.
        media_type: String,
    },

    /// The destination could not be created or written.
    #[error("output error: {0}")]
    Output(#[source] io::Error),

    /// The global deadline passed before the run finished.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Returns `true` if the run was aborted by the global deadline.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
