//! Utility functions and helpers

use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

/// Initialize logging based on configuration
///
/// `format` is `json` or anything else for plain text. An unparsable level
/// falls back to `info`.
pub fn init_logging(level: &str, format: &str) {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
    }
}

/// Get current timestamp in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Rough pool hashrate from accepted work over a window
///
/// Each share at difficulty `d` stands for about `d` decode attempts.
pub fn estimate_hashrate(total_difficulty: f64, window_secs: u64) -> u64 {
    if window_secs == 0 || !total_difficulty.is_finite() || total_difficulty <= 0.0 {
        return 0;
    }
    (total_difficulty / window_secs as f64) as u64
}

/// Format hashrate for display
pub fn format_hashrate(hashrate: u64) -> String {
    if hashrate >= 1_000_000_000_000 {
        format!("{:.2} TH/s", hashrate as f64 / 1_000_000_000_000.0)
    } else if hashrate >= 1_000_000_000 {
        format!("{:.2} GH/s", hashrate as f64 / 1_000_000_000.0)
    } else if hashrate >= 1_000_000 {
        format!("{:.2} MH/s", hashrate as f64 / 1_000_000.0)
    } else if hashrate >= 1_000 {
        format!("{:.2} KH/s", hashrate as f64 / 1_000.0)
    } else {
        format!("{} H/s", hashrate)
    }
}
