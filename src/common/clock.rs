// Time source shared by components that make expiry decisions

use chrono::{DateTime, Utc};

/// Source of the current time
///
/// Production code uses [`SystemClock`]; tests substitute a clock they can
/// move forward to exercise expiry without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
