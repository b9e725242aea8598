//! Registry image reference parsing.
//!
//! Handles Docker-style image references:
//! - `alpine` → `docker.io/library/alpine:latest`
//! - `alpine:3.20` → `docker.io/library/alpine:3.20`
//! - `ghcr.io/org/app:v1` → `ghcr.io/org/app:v1`
//! - `alpine:3.20@sha256:...` → pinned by digest; the tag is informational

use std::fmt;

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";
const OFFICIAL_REPO_PREFIX: &str = "library";

/// A parsed registry image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Reference {
    /// Registry hostname, possibly with a port (e.g. `docker.io`, `localhost:5000`).
    pub registry: String,
    /// Repository path (e.g. `library/alpine`, `org/app`).
    pub repository: String,
    /// Tag or digest to resolve.
    pub identifier: Identifier,
}

/// Tag or digest identifier for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Identifier {
    /// Named tag (e.g. `latest`, `v1.0`).
    Tag(String),
    /// Content-addressable digest (e.g. `sha256:abc123...`).
    Digest(String),
}

impl Reference {
    /// Parses an image reference string.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidReference("empty reference".into()));
        }

        let (name, digest) = match trimmed.split_once('@') {
            Some((n, d)) if is_digest(d) => (n, Some(d.to_owned())),
            Some((_, d)) => {
                return Err(crate::Error::InvalidReference(format!("invalid digest: {d}")));
            }
            None => (trimmed, None),
        };

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest)) if is_registry(first) => (first.to_owned(), rest),
            _ => (DEFAULT_REGISTRY.to_owned(), name),
        };

        // A colon after the last slash separates the tag.
        let (path, tag) = match remainder.rsplit_once(':') {
            Some((p, t)) if !t.contains('/') => (p, Some(t)),
            _ => (remainder, None),
        };
        if path.is_empty() || tag.is_some_and(str::is_empty) {
            return Err(crate::Error::InvalidReference(format!(
                "missing repository or tag: {trimmed}"
            )));
        }

        let repository = if registry == DEFAULT_REGISTRY && !path.contains('/') {
            format!("{OFFICIAL_REPO_PREFIX}/{path}")
        } else {
            path.to_owned()
        };

        let identifier = match digest {
            Some(d) => Identifier::Digest(d),
            None => Identifier::Tag(tag.unwrap_or(DEFAULT_TAG).to_owned()),
        };

        Ok(Self {
            registry,
            repository,
            identifier,
        })
    }

    /// Returns the registry API base URL.
    ///
    /// Loopback registries are spoken to over plain HTTP.
    pub fn api_base(&self) -> String {
        let host = match self.registry.as_str() {
            "docker.io" => "registry-1.docker.io",
            other => other,
        };
        let scheme = if is_loopback(host) { "http" } else { "https" };
        format!("{scheme}://{host}/v2")
    }

    /// Returns the tag or digest string for API requests.
    pub fn reference_str(&self) -> &str {
        match &self.identifier {
            Identifier::Tag(t) | Identifier::Digest(t) => t,
        }
    }
}

/// Returns `true` if the string looks like a registry hostname.
fn is_registry(s: &str) -> bool {
    s.contains('.') || s.contains(':') || s == "localhost"
}

/// Returns `true` for `localhost` and `127.0.0.1`, with or without a port.
fn is_loopback(host: &str) -> bool {
    let bare = host.rsplit_once(':').map_or(host, |(h, _)| h);
    matches!(bare, "localhost" | "127.0.0.1")
}

/// Returns `true` for `<algorithm>:<encoded>` digests.
///
/// The algorithm is lowercase alphanumeric components joined by single
/// `+`, `.`, `_` or `-` separators, so it can never be `.` or `..`.
pub(crate) fn is_digest(s: &str) -> bool {
    s.split_once(':').is_some_and(|(alg, enc)| {
        alg.split(['+', '.', '_', '-']).all(|component| {
            !component.is_empty()
                && component
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        }) && !enc.is_empty()
            && enc
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "=_-".contains(c))
    })
}

/// Fails unless `digest` is a well-formed content digest.
pub(crate) fn check_digest(digest: &str) -> crate::Result<()> {
    if is_digest(digest) {
        Ok(())
    } else {
        Err(crate::Error::InvalidReference(format!(
            "invalid digest: {digest:?}"
        )))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        match &self.identifier {
            Identifier::Tag(t) => write!(f, ":{t}"),
            Identifier::Digest(d) => write!(f, "@{d}"),
        }
    }
}
