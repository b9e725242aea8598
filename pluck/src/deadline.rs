//! Global run deadline.
//!
//! A single [`Deadline`] is created when the driver starts and bounds
//! everything that follows: reference resolution, manifest loading, every
//! blob fetch and every byte read from a layer. There is no per-layer budget.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::{Error, Result};

/// Default budget for a whole run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Point in time after which a run is considered failed.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// `None` when the budget is too large to represent.
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    /// Starts a deadline `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget,
        }
    }

    /// Total budget this deadline was created with.
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.at
            .map_or(Duration::MAX, |at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fails with [`Error::Timeout`] if the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.expired() {
            return Err(Error::Timeout(self.budget));
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

/// Reader that fails with [`io::ErrorKind::TimedOut`] once a deadline passes.
#[derive(Debug)]
pub struct DeadlineReader<R> {
    inner: R,
    deadline: Deadline,
}

impl<R: Read> DeadlineReader<R> {
    /// Wraps `inner` so every read first checks `deadline`.
    pub const fn new(inner: R, deadline: Deadline) -> Self {
        Self { inner, deadline }
    }
}

impl<R: Read> Read for DeadlineReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.deadline.expired() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "deadline exceeded",
            ));
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_deadline_passes_check() {
        let d = Deadline::new(Duration::from_secs(60));
        assert!(d.check().is_ok());
        assert!(d.remaining() > Duration::from_secs(50));
    }

    #[test]
    fn zero_budget_is_expired() {
        let d = Deadline::new(Duration::ZERO);
        assert!(d.expired());
        assert_eq!(d.remaining(), Duration::ZERO);
        assert!(d.check().unwrap_err().is_timeout());
    }

    #[test]
    fn huge_budget_never_expires() {
        let d = Deadline::new(Duration::MAX);
        assert!(!d.expired());
        assert_eq!(d.remaining(), Duration::MAX);
    }

    #[test]
    fn reader_fails_after_expiry() {
        let mut r = DeadlineReader::new(&b"data"[..], Deadline::new(Duration::ZERO));
        let err = r.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn reader_passes_through_before_expiry() {
        let mut r = DeadlineReader::new(&b"data"[..], Deadline::new(Duration::from_secs(60)));
        let mut out = String::new();
        r.read_to_string(&mut out).unwrap();
        assert_eq!(out, "data");
    }
}
