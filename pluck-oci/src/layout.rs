//! Local OCI image layout directories.
//!
//! ```text
//! {root}/
//!   oci-layout          : {"imageLayoutVersion": "1.0.0"}
//!   index.json          : image index naming one or more manifests
//!   blobs/{alg}/{hex}   : content-addressed manifests, configs and layers
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::manifest::{Document, ImageIndex, ImageManifest, REF_NAME_ANNOTATION, select_platform};
use crate::reference::is_digest;
use crate::{Error, Result};

const LAYOUT_FILE: &str = "oci-layout";
const INDEX_FILE: &str = "index.json";
const BLOBS_DIR: &str = "blobs";

/// Nested indexes followed before giving up.
const MAX_INDEX_DEPTH: usize = 4;

/// An OCI image layout on disk.
#[derive(Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Opens a layout directory, checking for the `oci-layout` marker.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join(LAYOUT_FILE).is_file() {
            return Err(Error::Layout(format!(
                "{} is not an OCI image layout (missing {LAYOUT_FILE})",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Root directory of the layout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads the manifest tagged `tag`, or the only manifest when `tag` is `None`.
    ///
    /// Returns the manifest with its digest.
    pub fn manifest(&self, tag: Option<&str>) -> Result<(ImageManifest, String)> {
        let index: ImageIndex = serde_json::from_slice(&fs::read(self.root.join(INDEX_FILE))?)?;

        let entry = match tag {
            Some(tag) => index
                .manifests
                .iter()
                .find(|m| m.annotations.get(REF_NAME_ANNOTATION).is_some_and(|n| n == tag))
                .ok_or_else(|| Error::NotFound(format!("{}:{tag}", self.root.display())))?,
            None => match index.manifests.as_slice() {
                [only] => only,
                [] => return Err(Error::NotFound(self.root.display().to_string())),
                _ => {
                    return Err(Error::Layout(format!(
                        "{} holds {} images; name one with oci:<dir>:<tag>",
                        self.root.display(),
                        index.manifests.len()
                    )));
                }
            },
        };

        let mut digest = entry.digest.clone();
        for _ in 0..MAX_INDEX_DEPTH {
            match Document::parse(&fs::read(self.blob_path(&digest)?)?)? {
                Document::Image(manifest) => return Ok((manifest, digest)),
                Document::Index(nested) => {
                    let next = select_platform(&nested)?;
                    debug!(from = %digest, to = %next.digest, "following nested index");
                    digest = next.digest.clone();
                }
            }
        }
        Err(Error::Layout(format!(
            "image indexes nested deeper than {MAX_INDEX_DEPTH} levels"
        )))
    }

    /// Opens a blob for reading.
    pub fn open_blob(&self, digest: &str) -> Result<(File, u64)> {
        let path = self.blob_path(digest)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("blob {digest}")),
            _ => Error::Io(e),
        })?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    /// Maps a digest to `blobs/{alg}/{hex}`, refusing anything path-like.
    fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        match digest.split_once(':') {
            Some((alg, hex)) if is_digest(digest) => {
                Ok(self.root.join(BLOBS_DIR).join(alg).join(hex))
            }
            _ => Err(Error::InvalidReference(format!("invalid digest: {digest}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requires_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Layout::open(dir.path()), Err(Error::Layout(_))));

        fs::write(dir.path().join(LAYOUT_FILE), r#"{"imageLayoutVersion":"1.0.0"}"#).unwrap();
        assert_eq!(Layout::open(dir.path()).unwrap().root(), dir.path());
    }

    #[test]
    fn blob_paths_reject_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LAYOUT_FILE), "{}").unwrap();
        let layout = Layout::open(dir.path()).unwrap();

        assert_eq!(
            layout.blob_path("sha256:abc").unwrap(),
            dir.path().join("blobs/sha256/abc")
        );
        assert!(layout.blob_path("sha256:../../etc/passwd").is_err());
        assert!(layout.blob_path("../x:abc").is_err());
        assert!(layout.blob_path("nocolon").is_err());
        assert!(layout.blob_path("..:x").is_err());
        assert!(layout.blob_path(".:x").is_err());
    }

    #[test]
    fn dot_algorithms_cannot_reach_layout_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LAYOUT_FILE), "{}").unwrap();
        fs::create_dir(dir.path().join(BLOBS_DIR)).unwrap();
        let layout = Layout::open(dir.path()).unwrap();

        assert!(matches!(
            layout.open_blob("..:oci-layout"),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LAYOUT_FILE), "{}").unwrap();
        let layout = Layout::open(dir.path()).unwrap();

        assert!(matches!(layout.open_blob("sha256:feed"), Err(Error::NotFound(_))));
    }
}
