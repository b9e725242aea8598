//! Per-run knowledge about blobs, keyed by digest.

use std::collections::HashMap;

use crate::Compression;

/// What has been learned about one blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct BlobInfo {
    /// Compression detected by actually opening the blob.
    pub compression: Option<Compression>,
    /// Blob size reported by the transport.
    pub size: Option<u64>,
}

/// In-memory blob info cache shared between the pipeline and the transport.
///
/// Transports record sizes they observe; the pipeline records the
/// compression it detects, so a digest known to be plain tar is not probed
/// (and re-fetched) a second time.
#[derive(Debug, Default)]
pub struct BlobInfoCache {
    blobs: HashMap<String, BlobInfo>,
}

impl BlobInfoCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything known about `digest`.
    pub fn get(&self, digest: &str) -> Option<BlobInfo> {
        self.blobs.get(digest).copied()
    }

    /// Returns the compression detected for `digest`, if any.
    pub fn compression(&self, digest: &str) -> Option<Compression> {
        self.get(digest).and_then(|i| i.compression)
    }

    /// Records the compression detected for `digest`.
    pub fn record_compression(&mut self, digest: &str, compression: Compression) {
        self.entry(digest).compression = Some(compression);
    }

    /// Records the size of `digest` as reported by a transport.
    pub fn record_size(&mut self, digest: &str, size: u64) {
        self.entry(digest).size = Some(size);
    }

    fn entry(&mut self, digest: &str) -> &mut BlobInfo {
        self.blobs.entry(digest.to_owned()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_merge_per_digest() {
        let mut cache = BlobInfoCache::new();
        assert_eq!(cache.get("sha256:a"), None);

        cache.record_size("sha256:a", 42);
        cache.record_compression("sha256:a", Compression::None);

        let info = cache.get("sha256:a").unwrap();
        assert_eq!(info.size, Some(42));
        assert_eq!(info.compression, Some(Compression::None));
        assert_eq!(cache.compression("sha256:b"), None);
    }
}
