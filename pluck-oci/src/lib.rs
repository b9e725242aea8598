//! Image sources for pluck.
//!
//! Resolves transport-qualified image names to a [`Source`] that lists an
//! image's layers in manifest order and streams individual layer blobs to
//! the [`pluck::Pipeline`]. Two transports are supported: OCI registries
//! (`docker://`, or a bare reference) and local OCI image layouts (`oci:`).

#![allow(clippy::missing_docs_in_private_items)]

mod layout;
mod manifest;
pub mod reference;
mod registry;
mod transport;

use std::io::Read;

use pluck::{BlobInfoCache, BlobSource, Deadline, Layer};
use tracing::info;

pub use layout::Layout;
pub use reference::{Identifier, Reference};
use registry::Client;
pub use transport::ImageName;

/// Result type for pluck-oci operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from resolving images and fetching blobs.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The image name or reference string could not be parsed.
    #[error("invalid image reference: {0}")]
    InvalidReference(String),

    /// The image, manifest or blob does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No manifest matched the current platform.
    #[error("no matching platform for {arch}/{os}")]
    NoPlatform {
        /// CPU architecture.
        arch: String,
        /// Operating system.
        os: String,
    },

    /// The directory is not a usable OCI image layout.
    #[error("layout error: {0}")]
    Layout(String),

    /// HTTP / registry protocol error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Filesystem I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// An opened image: a transport plus the location of one image in it.
#[derive(Debug)]
pub struct Source {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Registry { client: Client, reference: Reference },
    Layout { layout: Layout, tag: Option<String> },
}

impl Source {
    /// Opens the transport for `name`. Registry requests share `deadline`.
    pub fn open(name: &ImageName, deadline: Deadline) -> Result<Self> {
        let inner = match name {
            ImageName::Registry(reference) => Inner::Registry {
                client: Client::new(deadline),
                reference: reference.clone(),
            },
            ImageName::Layout { path, tag } => Inner::Layout {
                layout: Layout::open(path)?,
                tag: tag.clone(),
            },
        };
        Ok(Self { inner })
    }

    /// Loads the image manifest and returns its layers in manifest order.
    pub fn layers(&mut self) -> Result<Vec<Layer>> {
        let (manifest, digest) = match &mut self.inner {
            Inner::Registry { client, reference } => client.pull_manifest(reference)?,
            Inner::Layout { layout, tag } => layout.manifest(tag.as_deref())?,
        };
        info!(%digest, layers = manifest.layers.len(), "resolved manifest");
        manifest.layers()
    }
}

impl BlobSource for Source {
    type Error = Error;

    fn fetch(&mut self, layer: &Layer, cache: &mut BlobInfoCache) -> Result<Box<dyn Read>> {
        match &mut self.inner {
            Inner::Registry { client, reference } => {
                let (blob, size) = client.open_blob(reference, &layer.digest)?;
                if let Some(size) = size {
                    cache.record_size(&layer.digest, size);
                }
                Ok(blob)
            }
            Inner::Layout { layout, .. } => {
                let (file, size) = layout.open_blob(&layer.digest)?;
                cache.record_size(&layer.digest, size);
                Ok(Box::new(file))
            }
        }
    }
}
