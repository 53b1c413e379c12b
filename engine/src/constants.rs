//! Measurement constants

use std::time::Duration;

/// Round trips issued by the latency probe
pub const PING_ATTEMPTS: usize = 5;

/// Upper bound for a single latency round trip
pub const PING_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upload payload size (2 MiB)
pub const UPLOAD_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Link simulator iterations and pacing
pub const LINK_ITERATIONS: usize = 20;
pub const LINK_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Simulated local link sample range in Mbps, upper bound exclusive
pub const LINK_SAMPLE_MIN_MBPS: f64 = 800.0;
pub const LINK_SAMPLE_MAX_MBPS: f64 = 1200.0;

/// Multiplier applied to a platform downlink hint
pub const LINK_HINT_SCALE: f64 = 10.0;

/// Link speed reported when no hint is available (WiFi 5 ceiling)
pub const LINK_FALLBACK_MBPS: f64 = 866.0;

/// Simulated signal strength bounds in dBm
pub const SIGNAL_MIN_DBM: f64 = -70.0;
pub const SIGNAL_MAX_DBM: f64 = -30.0;

/// 2.4 GHz channel bounds
pub const CHANNEL_MIN: u8 = 1;
pub const CHANNEL_MAX: u8 = 11;

/// Simulated local latency bounds in milliseconds
pub const LOCAL_LATENCY_MIN_MS: f64 = 2.0;
pub const LOCAL_LATENCY_MAX_MS: f64 = 7.0;

/// Points kept by the live progress buffer
pub const LIVE_BUFFER_POINTS: usize = 30;

/// Entries kept in persisted speed history
pub const HISTORY_LIMIT: usize = 10;

/// Storage key of the persisted history list
pub const HISTORY_KEY: &str = "speed_history";

/// Shortest elapsed time used in rate computation, keeps instantaneous
/// transfers finite
pub const MIN_RATE_ELAPSED: Duration = Duration::from_micros(1);
