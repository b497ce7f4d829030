//! Cached time for the keel runtime
//!
//! Rendering a timestamp for every log line or response header is wasted
//! work when thousands of events share the same second. [`CachedClock`]
//! renders each supported format once per [`CachedClock::update`] and lets
//! readers grab the whole set lock-free. [`parse_http_time`] goes the other
//! way, accepting the three date formats HTTP traffic carries.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cached;
mod parse;

pub use cached::{CachedClock, TimeSnapshot};
pub use parse::parse_http_time;
