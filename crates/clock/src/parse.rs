//! HTTP date parsing
//!
//! Accepts the three date formats HTTP clients send:
//!
//! - RFC 1123: `Tue, 10 Dec 2002 23:50:13 GMT`
//! - RFC 850:  `Tuesday, 10-Dec-02 23:50:13 GMT`
//! - asctime:  `Tue Dec 10 23:50:13 2002`

use chrono::{DateTime, NaiveDateTime, Utc};

const RFC1123: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parses an HTTP date in any of the three accepted formats
///
/// All formats denote UTC. Returns `None` for anything malformed.
///
/// ```
/// use keel_clock::parse_http_time;
///
/// let t = parse_http_time("Tue, 10 Dec 2002 23:50:13 GMT").unwrap();
/// assert_eq!(t.timestamp(), 1039564213);
/// ```
pub fn parse_http_time(value: &str) -> Option<DateTime<Utc>> {
    for format in [RFC1123, RFC850, ASCTIME] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
