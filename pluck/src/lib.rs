//! Stream a single file out of a container image's layers.
//!
//! `pluck` walks an image's layer blobs in manifest order, unwraps each one
//! (gzip, with a fallback for layers that are really plain tar), scans its
//! tar entries for an exact path and copies the first match to a [`Sink`].
//! Nothing else is unpacked and no layer after the match is fetched.
//!
//! Transports live behind the [`BlobSource`] trait; see the `pluck-oci`
//! crate for registry and OCI image-layout sources.
//!
//! ```no_run
//! use pluck::{BlobInfoCache, BlobSource, Deadline, Destination, Layer, Outcome, Pipeline};
//!
//! # fn demo<S: BlobSource>(source: &mut S, layers: &[Layer]) -> pluck::Result<()> {
//! let mut out = Destination::file("os-release");
//! match Pipeline::new(source, Deadline::default()).run(layers, "etc/os-release", &mut out)? {
//!     Outcome::Found { bytes, .. } => println!("copied {bytes} bytes"),
//!     _ => println!("not found"),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod deadline;
pub mod decompress;
mod error;
mod pipeline;
pub mod scan;
mod sink;
mod source;

pub use cache::{BlobInfo, BlobInfoCache};
pub use deadline::{DEFAULT_TIMEOUT, Deadline, DeadlineReader};
pub use decompress::Compression;
pub use error::{Error, Result, SourceError};
pub use pipeline::{Outcome, Pipeline};
pub use sink::{Destination, Sink};
pub use source::{BlobSource, Layer};
