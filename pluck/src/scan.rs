//! Sequential tar entry scanning.
//!
//! Entries are visited in storage order with a single cursor: an entry's
//! content must be consumed (or abandoned) before the archive advances.
//! Paths are compared byte-for-byte as stored, including GNU long names and
//! PAX `path` records, with no normalization of `./` prefixes or slashes.

use std::io::{self, Read, Write};

use tar::{Archive, Entry, EntryType};
use tracing::warn;

/// Advances `archive` until an entry whose path equals `target`.
///
/// Returns `Ok(None)` at a clean end of archive. Malformed headers and read
/// failures surface as errors.
pub fn find_entry<'a, R: Read>(
    archive: &'a mut Archive<R>,
    target: &[u8],
) -> io::Result<Option<Entry<'a, R>>> {
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.path_bytes().as_ref() == target {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

/// Size of the copy buffer.
const COPY_BUF: usize = 64 * 1024;

/// Why copying a matched entry stopped early.
#[derive(Debug)]
pub enum CopyError {
    /// Reading the entry failed (corrupt or unreadable layer).
    Read(io::Error),
    /// Writing to the destination failed.
    Write(io::Error),
    /// The entry ended before its declared size.
    Short {
        /// Declared size.
        expected: u64,
        /// Bytes delivered before the stream ended.
        actual: u64,
    },
}

/// Copies the content of `entry` into `out`, returning the byte count.
///
/// The tar reader does not notice an entry cut short by a truncated stream,
/// so the copied length is checked against the header.
pub fn copy_entry<R: Read>(
    entry: &mut Entry<'_, R>,
    out: &mut dyn Write,
) -> Result<u64, CopyError> {
    let kind = entry.header().entry_type();
    if !matches!(kind, EntryType::Regular | EntryType::Continuous) {
        warn!(?kind, "matched entry is not a regular file; its body is copied as-is");
    }

    let expected = entry.size();
    let mut buf = vec![0u8; COPY_BUF];
    let mut actual = 0u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        out.write_all(&buf[..n]).map_err(CopyError::Write)?;
        actual += n as u64;
    }
    out.flush().map_err(CopyError::Write)?;

    if actual == expected {
        Ok(actual)
    } else {
        Err(CopyError::Short { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use tar::{Builder, Header};

    use super::*;

    fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Builds a single-entry tar whose stored name is written verbatim.
    fn raw_name_tarball(name: &[u8], kind: EntryType, content: &[u8]) -> Vec<u8> {
        let mut header = Header::new_gnu();
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(kind);
        header.set_cksum();
        let mut builder = Builder::new(Vec::new());
        builder.append(&header, content).unwrap();
        builder.into_inner().unwrap()
    }

    fn content_of(data: &[u8], target: &str) -> Option<Vec<u8>> {
        let mut archive = Archive::new(data);
        let mut entry = find_entry(&mut archive, target.as_bytes()).unwrap()?;
        let mut out = Vec::new();
        copy_entry(&mut entry, &mut out).unwrap();
        Some(out)
    }

    #[test]
    fn finds_exact_path() {
        let tar = tarball(&[("etc/hostname", b"box"), ("etc/os-release", b"ID=test")]);
        assert_eq!(content_of(&tar, "etc/os-release").unwrap(), b"ID=test");
    }

    #[test]
    fn missing_path_is_none() {
        let tar = tarball(&[("etc/hostname", b"box")]);
        assert!(content_of(&tar, "etc/passwd").is_none());
    }

    #[test]
    fn no_path_normalization() {
        let tar = raw_name_tarball(b"./a.txt", EntryType::Regular, b"dot");
        assert!(content_of(&tar, "a.txt").is_none());
        assert!(content_of(&tar, "/a.txt").is_none());
        assert_eq!(content_of(&tar, "./a.txt").unwrap(), b"dot");
    }

    #[test]
    fn directory_paths_keep_trailing_slash() {
        let tar = raw_name_tarball(b"etc/", EntryType::Directory, b"");

        assert!(content_of(&tar, "etc").is_none());
        assert_eq!(content_of(&tar, "etc/").unwrap(), b"");
    }

    #[test]
    fn long_names_match() {
        let long = format!("usr/share/{}/file.txt", "deep".repeat(40));
        let tar = tarball(&[(long.as_str(), b"far down")]);
        assert_eq!(content_of(&tar, &long).unwrap(), b"far down");
    }

    #[test]
    fn empty_stream_is_clean_end() {
        assert!(content_of(&[], "anything").is_none());
    }

    #[test]
    fn corrupt_header_is_an_error() {
        let garbage = vec![0x5a; 1024];
        let mut archive = Archive::new(&garbage[..]);
        assert!(find_entry(&mut archive, b"a").is_err());
    }

    #[test]
    fn write_failures_are_distinguished() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("disk full"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let tar = tarball(&[("f", b"data")]);
        let mut archive = Archive::new(&tar[..]);
        let mut entry = find_entry(&mut archive, b"f").unwrap().unwrap();
        assert!(matches!(copy_entry(&mut entry, &mut Full), Err(CopyError::Write(_))));
    }

    #[test]
    fn truncated_content_is_reported() {
        let mut tar = tarball(&[("big.bin", &[7u8; 2000])]);
        tar.truncate(512 + 300);

        let mut archive = Archive::new(&tar[..]);
        let mut entry = find_entry(&mut archive, b"big.bin").unwrap().unwrap();
        match copy_entry(&mut entry, &mut io::sink()) {
            Err(CopyError::Short { expected, actual }) => {
                assert_eq!((expected, actual), (2000, 300));
            }
            other => panic!("expected short entry, got {other:?}"),
        }
    }
}
