//! Cached pre-rendered timestamps
//!
//! Time reads are frequent and formatting is not free, so the clock
//! renders every string representation once per [`CachedClock::update`]
//! and publishes the whole set atomically. Readers are lock-free: they
//! load the current snapshot and see a consistent second across all
//! formats. The host's event loop decides how often `update` runs —
//! typically once per loop iteration or timer tick.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, FixedOffset, Local, Utc};

/// One consistent, pre-rendered view of the current time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSnapshot {
    /// Unix time in whole seconds
    pub sec: i64,
    /// Milliseconds within the current second
    pub msec: u32,
    /// Error-log format, local time: `1970/09/28 12:00:00`
    pub err_log: String,
    /// HTTP (RFC 1123) format, UTC: `Mon, 28 Sep 1970 06:00:00 GMT`
    pub http: String,
    /// HTTP access-log format, local time: `28/Sep/1970:12:00:00 +0600`
    pub http_log: String,
    /// ISO 8601 format, local time: `1970-09-28T12:00:00+06:00`
    pub iso8601: String,
    /// Syslog format, local time: `Sep 28 12:00:00`
    pub syslog: String,
}

impl TimeSnapshot {
    fn render(utc: DateTime<Utc>, local: DateTime<FixedOffset>) -> Self {
        Self {
            sec: utc.timestamp(),
            msec: utc.timestamp_subsec_millis(),
            err_log: local.format("%Y/%m/%d %H:%M:%S").to_string(),
            http: utc.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            http_log: local.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
            iso8601: local.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            syslog: local.format("%b %e %H:%M:%S").to_string(),
        }
    }
}

/// Lock-free cache of pre-rendered timestamps
///
/// Created with the current time; refreshed explicitly via
/// [`CachedClock::update`]. Readers never block and never observe a
/// half-updated snapshot.
///
/// ```
/// use keel_clock::CachedClock;
///
/// let clock = CachedClock::new();
/// let t = clock.get();
/// assert_eq!(t.err_log.len(), "1970/09/28 12:00:00".len());
/// ```
pub struct CachedClock {
    current: ArcSwap<TimeSnapshot>,
}

impl CachedClock {
    /// Creates a clock initialized to the current time
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Self::now()),
        }
    }

    /// Re-renders the snapshot from the current system time
    pub fn update(&self) {
        self.current.store(Arc::new(Self::now()));
    }

    /// Returns the current snapshot
    pub fn get(&self) -> Arc<TimeSnapshot> {
        self.current.load_full()
    }

    fn now() -> TimeSnapshot {
        let utc = Utc::now();
        let local = utc.with_timezone(&Local).fixed_offset();
        TimeSnapshot::render(utc, local)
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}
