//! OCI / Docker v2 manifest and index documents.

use std::collections::HashMap;

use pluck::Layer;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::reference::check_digest;
use crate::{Error, Result};

/// OCI / Docker manifest media types accepted during pull.
pub const ACCEPT_MANIFEST: &str = "\
    application/vnd.oci.image.manifest.v1+json, \
    application/vnd.oci.image.index.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json, \
    application/vnd.docker.distribution.manifest.list.v2+json";

/// Annotation naming an image inside an OCI layout index.
pub const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// OCI content descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

impl From<&Descriptor> for Layer {
    fn from(d: &Descriptor) -> Self {
        let layer = Self::new(d.digest.clone()).with_size(d.size);
        match &d.media_type {
            Some(mt) => layer.with_media_type(mt.clone()),
            None => layer,
        }
    }
}

/// Platform selector in an image index entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
}

/// OCI image manifest (single-platform).
#[derive(Debug, Clone, Deserialize)]
pub struct ImageManifest {
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Layer descriptors in manifest order.
    ///
    /// Fails if any layer carries a malformed digest.
    pub fn layers(&self) -> Result<Vec<Layer>> {
        self.layers
            .iter()
            .map(|d| check_digest(&d.digest).map(|()| Layer::from(d)))
            .collect()
    }
}

/// Image index / manifest list (multi-platform).
#[derive(Debug, Clone, Deserialize)]
pub struct ImageIndex {
    pub manifests: Vec<Descriptor>,
}

/// A manifest document of either kind.
#[derive(Debug)]
pub enum Document {
    Image(ImageManifest),
    Index(ImageIndex),
}

impl Document {
    /// Parses a manifest body, telling indexes from image manifests by shape.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        if value.get("manifests").is_some() {
            Ok(Self::Index(serde_json::from_value(value)?))
        } else {
            Ok(Self::Image(serde_json::from_value(value)?))
        }
    }
}

/// Returns the `sha256:` digest of `data`.
pub fn content_digest(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

/// Maps Rust's architecture names to OCI's.
fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// Selects the manifest entry matching the host architecture and `linux` OS.
pub fn select_platform(index: &ImageIndex) -> Result<&Descriptor> {
    select_for(index, host_arch(), "linux")
}

fn select_for<'a>(index: &'a ImageIndex, arch: &str, os: &str) -> Result<&'a Descriptor> {
    index
        .manifests
        .iter()
        .find(|m| {
            m.platform
                .as_ref()
                .is_some_and(|p| p.architecture == arch && p.os == os)
        })
        .ok_or_else(|| Error::NoPlatform {
            arch: arch.to_owned(),
            os: os.to_owned(),
        })
}
