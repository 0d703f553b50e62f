//! Timestamp utilities

use chrono::{DateTime, Local};

/// Layout of audit log timestamps
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current local timestamp
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Render a timestamp the way audit log lines carry it
pub fn format_log_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(LOG_TIMESTAMP_FORMAT).to_string()
}
