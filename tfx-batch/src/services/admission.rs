//! Duration-based admission filter
//!
//! Stateless predicate deciding whether a probed reference proceeds to
//! acquisition. Rejections are a normal outcome, not an error.

use std::fmt;
use std::str::FromStr;

use crate::config::RunConfig;
use crate::types::ProbeOutcome;
use tfx_common::human_time::format_media_duration;

/// What to do with a reference whose duration could not be probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownDurationPolicy {
    /// Treat as short and proceed
    #[default]
    Admit,
    /// Skip with reason "duration unknown"
    Reject,
}

impl FromStr for UnknownDurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admit" => Ok(Self::Admit),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown duration policy '{}' (expected 'admit' or 'reject')",
                other
            )),
        }
    }
}

/// Why a reference was not admitted
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    ExceedsCeiling { duration_secs: f64, ceiling_secs: u64 },
    DurationUnknown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ExceedsCeiling {
                duration_secs,
                ceiling_secs,
            } => write!(
                f,
                "exceeds ceiling ({} > {})",
                format_media_duration(*duration_secs),
                format_media_duration(*ceiling_secs as f64)
            ),
            RejectReason::DurationUnknown => f.write_str("duration unknown"),
        }
    }
}

/// Admission verdict
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Admit,
    Reject(RejectReason),
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }
}

/// Decide admission for one probe outcome
///
/// Known durations are rejected iff `!allow_long_media && duration > ceiling`.
/// Unknown durations follow `unknown_duration_policy`, unless long media is
/// allowed outright.
pub fn evaluate(outcome: &ProbeOutcome, config: &RunConfig) -> AdmissionDecision {
    if config.allow_long_media {
        return AdmissionDecision::Admit;
    }

    match outcome.duration_seconds() {
        Some(duration) if duration > config.duration_ceiling_secs as f64 => {
            AdmissionDecision::Reject(RejectReason::ExceedsCeiling {
                duration_secs: duration,
                ceiling_secs: config.duration_ceiling_secs,
            })
        }
        Some(_) => AdmissionDecision::Admit,
        None => match config.unknown_duration_policy {
            UnknownDurationPolicy::Admit => AdmissionDecision::Admit,
            UnknownDurationPolicy::Reject => AdmissionDecision::Reject(RejectReason::DurationUnknown),
        },
    }
}
