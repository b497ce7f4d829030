//! Timestamp prefixing from the cached clock

use std::fmt::Write as _;
use std::sync::Arc;

use keel_clock::CachedClock;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// `FormatTime` that reads the pre-rendered error-log timestamp
///
/// Events within the same clock tick share one formatting pass instead of
/// rendering a timestamp each. The host decides the resolution by how
/// often it calls [`CachedClock::update`].
#[derive(Clone)]
pub struct CachedTimer {
    clock: Arc<CachedClock>,
}

impl CachedTimer {
    /// Prefixes events with timestamps read from `clock`
    pub fn new(clock: Arc<CachedClock>) -> Self {
        Self { clock }
    }
}

impl FormatTime for CachedTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        w.write_str(&self.clock.get().err_log)
    }
}
