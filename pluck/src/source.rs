//! The seam between the pipeline and an image transport.

use std::io::Read;

use crate::BlobInfoCache;

/// Length of [`Layer::short_digest`], enough for `sha256:` plus 12 hex digits.
const SHORT_DIGEST_CHARS: usize = 19;

/// One layer of an image, as listed by its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Layer {
    /// Content digest (e.g. `sha256:...`).
    pub digest: String,
    /// Declared media type, when the manifest carries one.
    pub media_type: Option<String>,
    /// Declared blob size in bytes.
    pub size: Option<u64>,
}

impl Layer {
    /// Creates a layer descriptor with only a digest.
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            media_type: None,
            size: None,
        }
    }

    /// Sets the declared media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Sets the declared blob size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Abbreviated digest for log lines: at most the first 19 characters.
    pub fn short_digest(&self) -> &str {
        match self.digest.char_indices().nth(SHORT_DIGEST_CHARS) {
            Some((end, _)) => &self.digest[..end],
            None => &self.digest,
        }
    }
}

/// A transport that can stream layer blobs.
///
/// Every call to [`fetch`](Self::fetch) must return a fresh stream positioned
/// at the start of the blob; the pipeline relies on this to re-read a layer
/// whose compression turned out to differ from what was declared.
pub trait BlobSource {
    /// Transport error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens the blob for `layer`.
    fn fetch(
        &mut self,
        layer: &Layer,
        cache: &mut BlobInfoCache,
    ) -> Result<Box<dyn Read>, Self::Error>;
}
