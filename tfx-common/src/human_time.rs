//! Human-readable media duration formatting
//!
//! Used in audit log lines so that skipped and failed items read naturally.

/// Format selection thresholds (seconds)
const SHORT_FORMAT_MAX: f64 = 100.0; // < 100s → X.XXs
const MEDIUM_FORMAT_MAX: f64 = 6000.0; // < 100m → M:SS.Xs
                                        // otherwise → H:MM:SS

/// Format a media duration in seconds
///
/// - Short format (`X.XXs`): below 100 seconds
/// - Medium format (`M:SS.Xs`): below 100 minutes
/// - Long format (`H:MM:SS`): anything longer
///
/// Negative and non-finite values are rendered as `"unknown"`.
///
/// # Examples
///
/// ```
/// use tfx_common::human_time::format_media_duration;
///
/// assert_eq!(format_media_duration(45.0), "45.00s");
/// assert_eq!(format_media_duration(1200.0), "20:00.0s");
/// assert_eq!(format_media_duration(7261.0), "2:01:01");
/// ```
pub fn format_media_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "unknown".to_string();
    }

    if seconds < SHORT_FORMAT_MAX {
        format!("{:.2}s", seconds)
    } else if seconds < MEDIUM_FORMAT_MAX {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds - minutes * 60.0;
        format!("{}:{:04.1}s", minutes as u64, secs)
    } else {
        let total = seconds.round() as u64;
        let hours = total / 3600;
        let mins = (total % 3600) / 60;
        let secs = total % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}
