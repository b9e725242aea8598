//! Output destinations for the matched entry.
//!
//! Nothing is created until a match is confirmed. File output is staged in a
//! temporary sibling and renamed over the target only after the whole entry
//! has been copied, so a not-found or failed run leaves no file behind.

use std::io::{self, BufWriter, StdoutLock, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Receiver for exactly one matched entry.
pub trait Sink {
    /// Opens the destination for writing. Called once, after a match.
    fn begin(&mut self) -> io::Result<&mut dyn Write>;

    /// Makes the written content final.
    fn commit(&mut self) -> io::Result<()>;
}

impl Sink for Vec<u8> {
    fn begin(&mut self) -> io::Result<&mut dyn Write> {
        Ok(self)
    }

    fn commit(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where the extracted file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Stdout,
    File(PathBuf),
}

/// Open handle for an in-progress write.
#[derive(Debug)]
enum Staged {
    Stdout(StdoutLock<'static>),
    File(BufWriter<NamedTempFile>),
}

/// Standard output or a file path.
#[derive(Debug)]
pub struct Destination {
    target: Target,
    staged: Option<Staged>,
}

impl Destination {
    /// Writes to the process's standard output.
    pub const fn stdout() -> Self {
        Self {
            target: Target::Stdout,
            staged: None,
        }
    }

    /// Writes to `path`, replacing any existing file on success.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
            staged: None,
        }
    }

    /// Maps an optional CLI argument to a destination; `-` means stdout.
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(p) if p != Path::new("-") => Self::file(p),
            _ => Self::stdout(),
        }
    }

    /// Target path for file destinations.
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(p) => Some(p),
            Target::Stdout => None,
        }
    }
}

impl Sink for Destination {
    fn begin(&mut self) -> io::Result<&mut dyn Write> {
        let staged = match &self.target {
            Target::Stdout => Staged::Stdout(io::stdout().lock()),
            Target::File(path) => Staged::File(BufWriter::new(stage_beside(path)?)),
        };
        let out: &mut dyn Write = match self.staged.insert(staged) {
            Staged::Stdout(out) => out,
            Staged::File(out) => out,
        };
        Ok(out)
    }

    fn commit(&mut self) -> io::Result<()> {
        match (self.staged.take(), &self.target) {
            (Some(Staged::Stdout(mut out)), _) => out.flush(),
            (Some(Staged::File(out)), Target::File(path)) => {
                let tmp = out.into_inner().map_err(io::IntoInnerError::into_error)?;
                tmp.as_file().sync_all()?;
                tmp.persist(path)?;
                Ok(())
            }
            _ => Err(io::Error::other("commit without an open destination")),
        }
    }
}

/// Creates a hidden temporary file in the same directory as `path`.
fn stage_beside(path: &Path) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(".pluck-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_arg_dash_is_stdout() {
        assert_eq!(Destination::from_arg(None).path(), None);
        assert_eq!(Destination::from_arg(Some(Path::new("-"))).path(), None);
        assert_eq!(
            Destination::from_arg(Some(Path::new("out.txt"))).path(),
            Some(Path::new("out.txt"))
        );
    }

    #[test]
    fn file_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut dest = Destination::file(&path);

        dest.begin().unwrap().write_all(b"payload").unwrap();
        assert!(!path.exists());

        dest.commit().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn abandoned_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut dest = Destination::file(&path);
            dest.begin().unwrap().write_all(b"partial").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn commit_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        let mut dest = Destination::file(&path);
        dest.begin().unwrap().write_all(b"new").unwrap();
        dest.commit().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn missing_parent_fails_on_begin() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = Destination::file(dir.path().join("no/such/dir/out.txt"));
        assert!(dest.begin().is_err());
    }

    #[test]
    fn commit_without_begin_is_an_error() {
        assert!(Destination::file("x").commit().is_err());
    }
}
