//! Layer decompression with an uncompressed-tar fallback.
//!
//! Layers are expected to be gzip-compressed tarballs, but some registries
//! serve plain tar under a gzip media type. [`try_envelope`] reports such a
//! stream as a mismatch instead of failing; the caller then re-fetches the
//! blob and scans it raw. Streams are never assumed to be rewindable.

use std::io::{self, Cursor, Read};

use flate2::read::MultiGzDecoder;

/// Magic bytes opening every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Media types recognized as gzip-compressed layers.
const GZIP_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.layer.v1.tar+gzip",
    "application/vnd.oci.image.layer.nondistributable.v1.tar+gzip",
    "application/vnd.docker.image.rootfs.diff.tar.gzip",
    "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip",
];

/// Media types recognized as uncompressed tar layers.
const TAR_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.layer.v1.tar",
    "application/vnd.oci.image.layer.nondistributable.v1.tar",
    "application/vnd.docker.image.rootfs.diff.tar",
];

/// Compression applied to a layer blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Compression {
    /// gzip envelope around a tar archive.
    Gzip,
    /// zstd envelope; recognized but not decodable.
    Zstd,
    /// Plain tar archive.
    None,
}

impl Compression {
    /// Infers compression from a layer media type, if the type is known.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        if GZIP_MEDIA_TYPES.contains(&media_type) || media_type.ends_with("+gzip") {
            Some(Self::Gzip)
        } else if media_type.ends_with("+zstd") {
            Some(Self::Zstd)
        } else if TAR_MEDIA_TYPES.contains(&media_type) {
            Some(Self::None)
        } else {
            None
        }
    }
}

/// Gzip header bytes read during probing, replayed ahead of the rest.
pub type Probed<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// Result of probing a stream for the gzip envelope.
#[derive(Debug)]
pub enum Envelope<R> {
    /// The stream is gzip; reads yield the decompressed tar across every member.
    Decoded(MultiGzDecoder<Probed<R>>),
    /// The stream does not start with a gzip header. Its leading bytes were
    /// consumed and the stream dropped, so the blob must be fetched again.
    Mismatch,
}

/// Probes `reader` for a gzip header and wraps it in a decoder on success.
///
/// Only I/O failures while probing are errors. A short or non-gzip stream
/// yields [`Envelope::Mismatch`].
pub fn try_envelope<R: Read>(mut reader: R) -> io::Result<Envelope<R>> {
    let mut head = Vec::with_capacity(GZIP_MAGIC.len());
    (&mut reader)
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut head)?;

    if head == GZIP_MAGIC {
        Ok(Envelope::Decoded(MultiGzDecoder::new(
            Cursor::new(head).chain(reader),
        )))
    } else {
        Ok(Envelope::Mismatch)
    }
}
