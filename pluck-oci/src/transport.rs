//! Transport-qualified image names.
//!
//! - `docker://alpine:3.20` or plain `alpine:3.20` → registry
//! - `oci:/path/to/layout[:tag]` → local OCI image layout

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Reference, Result};

/// Transports recognized by name but not implemented.
const UNSUPPORTED: &[&str] = &[
    "containers-storage",
    "dir",
    "docker-archive",
    "docker-daemon",
    "oci-archive",
];

/// An image name together with the transport that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageName {
    /// Image in a remote registry.
    Registry(Reference),
    /// Image in a local OCI layout directory.
    Layout {
        /// Layout root directory.
        path: PathBuf,
        /// Value of `org.opencontainers.image.ref.name` to select.
        tag: Option<String>,
    },
}

impl ImageName {
    /// Parses a transport-qualified image name.
    ///
    /// A name without a transport prefix is a registry reference.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("docker://") {
            return Ok(Self::Registry(Reference::parse(rest)?));
        }
        if let Some(rest) = input.strip_prefix("oci:") {
            return parse_layout(rest);
        }
        if let Some((scheme, _)) = input.split_once("://") {
            return Err(Error::InvalidReference(format!(
                "unsupported transport: {scheme}"
            )));
        }
        if let Some((transport, _)) = input.split_once(':')
            && UNSUPPORTED.contains(&transport)
        {
            return Err(Error::InvalidReference(format!(
                "unsupported transport: {transport}"
            )));
        }
        Ok(Self::Registry(Reference::parse(input)?))
    }
}

/// Splits `path[:tag]`; a colon followed by a path separator stays in the path.
fn parse_layout(rest: &str) -> Result<ImageName> {
    let (path, tag) = match rest.rsplit_once(':') {
        Some((p, t)) if !t.is_empty() && !t.contains('/') => (p, Some(t.to_owned())),
        _ => (rest, None),
    };
    if path.is_empty() {
        return Err(Error::InvalidReference("oci: transport needs a directory".into()));
    }
    Ok(ImageName::Layout {
        path: PathBuf::from(path),
        tag,
    })
}

impl FromStr for ImageName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(r) => write!(f, "docker://{r}"),
            Self::Layout { path, tag: None } => write!(f, "oci:{}", path.display()),
            Self::Layout {
                path,
                tag: Some(tag),
            } => write!(f, "oci:{}:{tag}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_are_registry_references() {
        let name = ImageName::parse("alpine:3.20").unwrap();
        let ImageName::Registry(r) = &name else {
            panic!("expected registry");
        };
        assert_eq!(r.repository, "library/alpine");
        assert_eq!(name.to_string(), "docker://docker.io/library/alpine:3.20");
    }

    #[test]
    fn docker_prefix_is_stripped() {
        assert_eq!(
            ImageName::parse("docker://ghcr.io/org/app:v1").unwrap(),
            ImageName::parse("ghcr.io/org/app:v1").unwrap()
        );
    }

    #[test]
    fn registry_with_port_is_not_a_transport() {
        assert!(matches!(
            ImageName::parse("localhost:5000/app").unwrap(),
            ImageName::Registry(_)
        ));
    }

    #[test]
    fn oci_layouts() {
        assert_eq!(
            ImageName::parse("oci:/var/images/app:v2").unwrap(),
            ImageName::Layout {
                path: "/var/images/app".into(),
                tag: Some("v2".into())
            }
        );
        assert_eq!(
            ImageName::parse("oci:./app").unwrap(),
            ImageName::Layout {
                path: "./app".into(),
                tag: None
            }
        );
        assert!(ImageName::parse("oci:").is_err());
    }

    #[test]
    fn unsupported_transports_are_rejected() {
        assert!(ImageName::parse("docker-archive:/tmp/a.tar").is_err());
        assert!(ImageName::parse("containers-storage:alpine").is_err());
        assert!(ImageName::parse("ftp://example.com/img").is_err());
    }
}
