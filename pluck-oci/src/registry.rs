//! OCI Distribution protocol client.
//!
//! Supports pulling manifests and streaming blobs from OCI-compliant
//! registries including Docker Hub and GHCR. Every request is bounded by the
//! time left on the run's [`Deadline`].

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use pluck::Deadline;
use serde::Deserialize;
use tracing::debug;
use ureq::Agent;
use ureq::http::Response;

use crate::manifest::{ACCEPT_MANIFEST, Document, ImageManifest, content_digest, select_platform};
use crate::reference::check_digest;
use crate::{Error, Reference, Result};

/// Upper bound on manifest and token bodies.
const MAX_DOCUMENT: u64 = 4 * 1024 * 1024;

/// OCI registry client with per-repository bearer token caching.
pub struct Client {
    agent: Agent,
    deadline: Deadline,
    tokens: HashMap<String, String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("deadline", &self.deadline)
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(deadline: Deadline) -> Self {
        Self {
            agent: Agent::new_with_defaults(),
            deadline,
            tokens: HashMap::new(),
        }
    }

    /// Pulls and resolves the image manifest, returning it with its content digest.
    ///
    /// An image index is resolved to the entry for the host platform.
    pub fn pull_manifest(&mut self, reference: &Reference) -> Result<(ImageManifest, String)> {
        let (body, digest) = self.fetch_manifest(reference, reference.reference_str())?;

        match Document::parse(&body)? {
            Document::Image(manifest) => Ok((manifest, digest)),
            Document::Index(index) => {
                let entry = select_platform(&index)?;
                check_digest(&entry.digest)?;
                debug!(digest = %entry.digest, "resolved image index to platform manifest");
                let (platform_body, platform_digest) =
                    self.fetch_manifest(reference, &entry.digest)?;
                match Document::parse(&platform_body)? {
                    Document::Image(manifest) => Ok((manifest, platform_digest)),
                    Document::Index(_) => Err(Error::NotFound(format!(
                        "{reference}: nested image index {}",
                        entry.digest
                    ))),
                }
            }
        }
    }

    /// Opens a streaming reader over a blob, with its size when known.
    pub fn open_blob(
        &mut self,
        reference: &Reference,
        digest: &str,
    ) -> Result<(Box<dyn Read>, Option<u64>)> {
        check_digest(digest)?;
        let url = format!(
            "{}/{}/blobs/{}",
            reference.api_base(),
            reference.repository,
            digest
        );
        let resp = self.get(reference, &url, None)?;
        let size = header(&resp, "content-length").and_then(|v| v.parse().ok());
        Ok((Box::new(resp.into_body().into_reader()), size))
    }

    /// Fetches a manifest body and its digest.
    fn fetch_manifest(&mut self, reference: &Reference, id: &str) -> Result<(Vec<u8>, String)> {
        let url = format!(
            "{}/{}/manifests/{}",
            reference.api_base(),
            reference.repository,
            id
        );
        let resp = self.get(reference, &url, Some(ACCEPT_MANIFEST))?;
        let advertised = header(&resp, "docker-content-digest").map(str::to_owned);
        let body = read_document(resp.into_body().into_reader())?;
        let digest = advertised.unwrap_or_else(|| content_digest(&body));
        Ok((body, digest))
    }

    /// Performs an authenticated GET bounded by the remaining deadline.
    fn get(
        &mut self,
        reference: &Reference,
        url: &str,
        accept: Option<&str>,
    ) -> Result<Response<ureq::Body>> {
        let token = self.ensure_token(reference);

        let mut req = self
            .agent
            .get(url)
            .config()
            .timeout_global(Some(self.deadline.remaining()))
            .build();
        if let Some(accept) = accept {
            req = req.header("Accept", accept);
        }
        if let Some(ref t) = token {
            req = req.header("Authorization", &format!("Bearer {t}"));
        }

        req.call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => Error::NotFound(url.to_owned()),
            other => Error::Http(format!("{url}: {other}")),
        })
    }

    /// Returns a cached bearer token, fetching one if needed for known registries.
    fn ensure_token(&mut self, reference: &Reference) -> Option<String> {
        let key = format!("{}/{}", reference.registry, reference.repository);
        if let Some(token) = self.tokens.get(&key) {
            return Some(token.clone());
        }

        let (realm, service) = match reference.registry.as_str() {
            "docker.io" => ("https://auth.docker.io/token", "registry.docker.io"),
            "ghcr.io" => ("https://ghcr.io/token", "ghcr.io"),
            _ => return None,
        };

        match self.fetch_bearer_token(realm, service, &reference.repository) {
            Ok(token) => {
                self.tokens.insert(key, token.clone());
                Some(token)
            }
            Err(e) => {
                debug!(%realm, error = %e, "anonymous token request failed");
                None
            }
        }
    }

    /// Fetches an anonymous pull token from a token endpoint.
    fn fetch_bearer_token(&self, realm: &str, service: &str, repository: &str) -> Result<String> {
        let url = format!("{realm}?service={service}&scope=repository:{repository}:pull");

        let resp = self
            .agent
            .get(&url)
            .config()
            .timeout_global(Some(self.deadline.remaining()))
            .build()
            .call()
            .map_err(|e| Error::Http(e.to_string()))?;
        let body = read_document(resp.into_body().into_reader())?;

        let t: TokenResp = serde_json::from_slice(&body)?;
        Ok(t.token)
    }
}

/// Bearer token response from a registry auth endpoint.
#[derive(Deserialize)]
struct TokenResp {
    token: String,
}

/// Returns a response header as a string, if present and valid.
fn header<'r>(resp: &'r Response<ureq::Body>, name: &str) -> Option<&'r str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Reads a small JSON document, refusing anything larger than [`MAX_DOCUMENT`].
fn read_document(reader: impl Read) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader
        .take(MAX_DOCUMENT + 1)
        .read_to_end(&mut body)
        .map_err(|e| Error::Http(e.to_string()))?;
    if body.len() as u64 > MAX_DOCUMENT {
        return Err(Error::Http(format!(
            "document exceeds {MAX_DOCUMENT} bytes"
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_documents_are_read_whole() {
        assert_eq!(read_document(&b"{}"[..]).unwrap(), b"{}");
    }

    #[test]
    fn malformed_blob_digests_are_refused_before_any_request() {
        let mut client = Client::new(Deadline::default());
        let reference = Reference::parse("localhost:1/app").unwrap();
        for digest in ["..:x", "sha256:../../v2", "sha256:01234567890\u{e9}"] {
            assert!(
                matches!(
                    client.open_blob(&reference, digest),
                    Err(Error::InvalidReference(_))
                ),
                "{digest}"
            );
        }
    }

    #[test]
    fn oversized_documents_are_refused() {
        let big = vec![b' '; usize::try_from(MAX_DOCUMENT).unwrap() + 1];
        assert!(matches!(read_document(&big[..]), Err(Error::Http(_))));
    }
}
