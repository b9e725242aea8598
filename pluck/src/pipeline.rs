//! Layer-by-layer search for a single path.
//!
//! Layers are visited strictly in manifest order, one at a time. Each layer
//! is fetched, unwrapped and scanned entry by entry; the first entry whose
//! path matches is copied to the sink and the run ends there. Later entries
//! and later layers are never read. Only one layer stream is open at any
//! time: it is dropped before the next layer is fetched.

use std::io::{self, Read};

use tar::Archive;
use tracing::{debug, info};

use crate::decompress::{self, Envelope};
use crate::scan::{self, CopyError};
use crate::{
    BlobInfoCache, BlobSource, Compression, Deadline, DeadlineReader, Error, Layer, Result, Sink,
};

/// How a completed run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Outcome {
    /// The path was found and copied.
    Found {
        /// Digest of the layer the entry came from.
        digest: String,
        /// Bytes written to the sink.
        bytes: u64,
    },
    /// No layer contains the path.
    NotFound,
}

/// Sequential extraction over a [`BlobSource`].
#[derive(Debug)]
pub struct Pipeline<'s, S> {
    source: &'s mut S,
    cache: BlobInfoCache,
    deadline: Deadline,
}

impl<'s, S: BlobSource> Pipeline<'s, S> {
    /// Creates a pipeline reading from `source` under `deadline`.
    pub fn new(source: &'s mut S, deadline: Deadline) -> Self {
        Self {
            source,
            cache: BlobInfoCache::new(),
            deadline,
        }
    }

    /// Seeds the pipeline with an existing blob info cache.
    #[must_use]
    pub fn with_cache(mut self, cache: BlobInfoCache) -> Self {
        self.cache = cache;
        self
    }

    /// Blob knowledge gathered so far.
    pub const fn cache(&self) -> &BlobInfoCache {
        &self.cache
    }

    /// Searches `layers` in order for `target` and copies the first match.
    pub fn run(&mut self, layers: &[Layer], target: &str, sink: &mut dyn Sink) -> Result<Outcome> {
        let total = layers.len();
        for (i, layer) in layers.iter().enumerate() {
            self.deadline.check()?;
            info!(layer = i + 1, total, digest = layer.short_digest(), "scanning layer");

            if let Some(bytes) = self.search_layer(layer, target, sink)? {
                info!(digest = layer.short_digest(), bytes, "extracted {target}");
                return Ok(Outcome::Found {
                    digest: layer.digest.clone(),
                    bytes,
                });
            }
        }
        Ok(Outcome::NotFound)
    }

    /// Scans one layer; returns the copied size if it held the target.
    fn search_layer(
        &mut self,
        layer: &Layer,
        target: &str,
        sink: &mut dyn Sink,
    ) -> Result<Option<u64>> {
        let stream = self.open(layer)?;
        let mut archive = Archive::new(DeadlineReader::new(stream, self.deadline));

        let found = scan::find_entry(&mut archive, target.as_bytes())
            .map_err(|e| self.archive_error(layer, e))?;
        let Some(mut entry) = found else {
            debug!(digest = layer.short_digest(), "no match in layer");
            return Ok(None);
        };

        let out = sink.begin().map_err(Error::Output)?;
        let bytes = match scan::copy_entry(&mut entry, out) {
            Ok(n) => n,
            Err(CopyError::Read(e)) => return Err(self.archive_error(layer, e)),
            Err(CopyError::Write(e)) => return Err(Error::Output(e)),
            Err(CopyError::Short { expected, actual }) => {
                return Err(Error::Truncated {
                    digest: layer.digest.clone(),
                    path: target.to_owned(),
                    expected,
                    actual,
                });
            }
        };
        sink.commit().map_err(Error::Output)?;
        Ok(Some(bytes))
    }

    /// Opens a layer as a tar stream, unwrapping gzip when present.
    ///
    /// Compression already observed for this digest wins over the declared
    /// media type. An unknown media type is probed for gzip; a stream that
    /// turns out not to be gzip is fetched once more and read as plain tar.
    fn open(&mut self, layer: &Layer) -> Result<Box<dyn Read>> {
        let declared = layer
            .media_type
            .as_deref()
            .and_then(Compression::from_media_type);

        match self.cache.compression(&layer.digest).or(declared) {
            Some(Compression::Zstd) => Err(Error::UnsupportedCompression {
                digest: layer.digest.clone(),
                media_type: layer.media_type.clone().unwrap_or_default(),
            }),
            Some(Compression::None) => {
                debug!(digest = layer.short_digest(), "reading layer as plain tar");
                self.fetch(layer)
            }
            Some(Compression::Gzip) | None => self.open_gzip(layer),
        }
    }

    fn open_gzip(&mut self, layer: &Layer) -> Result<Box<dyn Read>> {
        let blob = self.fetch(layer)?;
        let envelope = decompress::try_envelope(blob).map_err(|e| self.fetch_error(layer, e))?;

        match envelope {
            Envelope::Decoded(decoder) => {
                self.cache.record_compression(&layer.digest, Compression::Gzip);
                Ok(Box::new(decoder))
            }
            Envelope::Mismatch => {
                debug!(
                    digest = layer.short_digest(),
                    "layer is not gzip-compressed; re-fetching as plain tar"
                );
                self.cache.record_compression(&layer.digest, Compression::None);
                self.fetch(layer)
            }
        }
    }

    fn fetch(&mut self, layer: &Layer) -> Result<Box<dyn Read>> {
        self.deadline.check()?;
        let blob = self.source.fetch(layer, &mut self.cache);
        if let Some(size) = self.cache.get(&layer.digest).and_then(|i| i.size) {
            debug!(digest = layer.short_digest(), size, "fetched layer blob");
        }
        blob.map_err(|e| self.fetch_error(layer, e))
    }

    fn fetch_error<E>(&self, layer: &Layer, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.deadline.expired() {
            return Error::Timeout(self.deadline.budget());
        }
        Error::Fetch {
            digest: layer.digest.clone(),
            source: Box::new(source),
        }
    }

    fn archive_error(&self, layer: &Layer, source: io::Error) -> Error {
        if self.deadline.expired() || source.kind() == io::ErrorKind::TimedOut {
            return Error::Timeout(self.deadline.budget());
        }
        Error::Archive {
            digest: layer.digest.clone(),
            source,
        }
    }
}
