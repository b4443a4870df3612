//! Clock abstraction so event and snapshot timestamps stay deterministic in tests.

use chrono::{DateTime, Utc};

/// Source of the current time for everything this crate persists.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
