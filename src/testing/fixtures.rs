//! Sample inputs and helpers shared by tests.

use crate::sink::retry::RetryConfig;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Two CSV rows without a header: `name,n`.
pub const SAMPLE_CSV: &str = "a,1\nb,2\n";

/// JSON lines with an ISO-8601 `ts` column.
pub const SAMPLE_JSONL: &str = concat!(
    r#"{"ts":"2020-01-01T00:00:00Z","user":"alice","n":1}"#,
    "\n",
    r#"{"ts":"2020-01-01T00:00:01Z","user":"bob","n":2}"#,
    "\n",
);

/// Apache combined log lines.
pub const SAMPLE_APACHE: &str = concat!(
    r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08""#,
    "\n",
    r#"10.0.0.2 - - [10/Oct/2000:13:55:37 -0700] "POST /login HTTP/1.1" 302 - "-" "curl/7.1""#,
    "\n",
);

/// Syslog lines (no year).
pub const SAMPLE_SYSLOG: &str = concat!(
    "Jan  1 00:00:10 host1 sshd[1234]: Accepted publickey for root\n",
    "Jan  1 00:00:11 host1 cron: job started\n",
);

/// Gzip `data` into a single member.
#[must_use]
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// Retry policy with no delays, for tests that exercise failures.
#[must_use]
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 0,
        max_delay_ms: 0,
    }
}

/// Encode `values` back to back as a MessagePack stream.
#[must_use]
pub fn msgpack_stream(values: &[rmpv::Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        let _ = rmpv::encode::write_value(&mut out, value);
    }
    out
}
