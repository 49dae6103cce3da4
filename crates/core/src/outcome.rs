//! Classification of remote responses into [`SubmissionOutcome`]s.
//!
//! The thresholds below are a contract with the remote service:
//!
//! | Response                                   | Outcome                    |
//! |--------------------------------------------|----------------------------|
//! | status `422`                               | `AuthExpired`, wait 5 s    |
//! | status `400`                               | `Rejected`, wait 10 s      |
//! | any other non-2xx status                   | `TransientError`, wait 5 s |
//! | 2xx, non-zero `waitSeconds`, `success`     | `Accepted`, that wait      |
//! | 2xx, non-zero `waitSeconds`, no `success`  | `Throttled`, that wait     |
//! | 2xx, `success: true`                       | `Accepted`, wait 0         |
//! | 2xx, anything else                         | `Rejected`, wait 5 s       |
//! | 2xx, body is not a JSON object             | `TransientError`, wait 5 s |
//!
//! The `waitSeconds` override is checked before the success flag so the
//! server can slow a worker down even on a successful call.

use std::time::Duration;

use serde::Deserialize;

/// Status the remote API uses for an expired authorization token.
pub const STATUS_AUTH_EXPIRED: u16 = 422;

/// Status the remote API uses for a rejected request.
pub const STATUS_REJECTED: u16 = 400;

pub const AUTH_EXPIRED_WAIT_SECS: f64 = 5.0;
pub const REJECTED_STATUS_WAIT_SECS: f64 = 10.0;
pub const TRANSIENT_WAIT_SECS: f64 = 5.0;
pub const REJECTED_BODY_WAIT_SECS: f64 = 5.0;

/// Longest pacing delay honored; larger server waits are capped here.
pub const MAX_PACING_SECS: f64 = 3600.0;

// ---------------------------------------------------------------------------
// SubmissionOutcome
// ---------------------------------------------------------------------------

/// Result of one submission attempt. Never carries partial success.
///
/// Every variant carries the pacing delay, in seconds, the worker must
/// observe before its next action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmissionOutcome {
    Accepted { retry_after_secs: f64 },
    Rejected { retry_after_secs: f64 },
    Throttled { retry_after_secs: f64 },
    AuthExpired { retry_after_secs: f64 },
    TransientError { retry_after_secs: f64 },
}

impl SubmissionOutcome {
    pub const fn transient() -> Self {
        Self::TransientError {
            retry_after_secs: TRANSIENT_WAIT_SECS,
        }
    }

    pub fn retry_after_secs(&self) -> f64 {
        match *self {
            Self::Accepted { retry_after_secs }
            | Self::Rejected { retry_after_secs }
            | Self::Throttled { retry_after_secs }
            | Self::AuthExpired { retry_after_secs }
            | Self::TransientError { retry_after_secs } => retry_after_secs,
        }
    }

    /// Pacing delay as a [`Duration`]; see [`pacing_delay`].
    pub fn retry_after(&self) -> Duration {
        pacing_delay(self.retry_after_secs())
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short name for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Throttled { .. } => "throttled",
            Self::AuthExpired { .. } => "auth_expired",
            Self::TransientError { .. } => "transient_error",
        }
    }
}

/// `secs` clamped to `0..=MAX_PACING_SECS` as a [`Duration`]. NaN is zero.
pub fn pacing_delay(secs: f64) -> Duration {
    if secs.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.clamp(0.0, MAX_PACING_SECS))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Body of a 2xx response from the mutation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitResponseBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "waitSeconds")]
    pub wait_seconds: Option<f64>,
}

/// Outcome implied by the status line alone, or `None` for a 2xx status
/// whose body must be inspected.
pub fn classify_status(status: u16) -> Option<SubmissionOutcome> {
    match status {
        STATUS_AUTH_EXPIRED => Some(SubmissionOutcome::AuthExpired {
            retry_after_secs: AUTH_EXPIRED_WAIT_SECS,
        }),
        STATUS_REJECTED => Some(SubmissionOutcome::Rejected {
            retry_after_secs: REJECTED_STATUS_WAIT_SECS,
        }),
        200..=299 => None,
        _ => Some(SubmissionOutcome::transient()),
    }
}

/// Outcome of a parsed 2xx body.
pub fn classify_body(body: &SubmitResponseBody) -> SubmissionOutcome {
    if let Some(wait) = body.wait_seconds.filter(|wait| *wait != 0.0) {
        return if body.success {
            SubmissionOutcome::Accepted {
                retry_after_secs: wait,
            }
        } else {
            SubmissionOutcome::Throttled {
                retry_after_secs: wait,
            }
        };
    }

    if body.success {
        SubmissionOutcome::Accepted {
            retry_after_secs: 0.0,
        }
    } else {
        SubmissionOutcome::Rejected {
            retry_after_secs: REJECTED_BODY_WAIT_SECS,
        }
    }
}

/// Classify a complete response: status first, then the raw body.
pub fn classify(status: u16, body: &[u8]) -> SubmissionOutcome {
    if let Some(outcome) = classify_status(status) {
        return outcome;
    }
    match serde_json::from_slice::<SubmitResponseBody>(body) {
        Ok(parsed) => classify_body(&parsed),
        Err(_) => SubmissionOutcome::transient(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn status_422_is_auth_expired() {
        assert_eq!(
            classify(422, b""),
            SubmissionOutcome::AuthExpired { retry_after_secs: 5.0 }
        );
    }

    #[test]
    fn status_400_is_rejected_for_ten_seconds() {
        assert_eq!(
            classify(400, br#"{"success": true}"#),
            SubmissionOutcome::Rejected { retry_after_secs: 10.0 }
        );
    }

    #[test]
    fn other_failure_statuses_are_transient() {
        for status in [301, 401, 403, 404, 429, 500, 502, 503] {
            assert_eq!(classify(status, b""), SubmissionOutcome::transient(), "status {status}");
        }
    }

    #[test]
    fn wait_seconds_overrides_failed_success_flag() {
        assert_eq!(
            classify(200, br#"{"success": false, "waitSeconds": 7}"#),
            SubmissionOutcome::Throttled { retry_after_secs: 7.0 }
        );
    }

    #[test]
    fn wait_seconds_is_kept_on_accepted() {
        assert_eq!(
            classify(200, br#"{"success": true, "waitSeconds": 2.5}"#),
            SubmissionOutcome::Accepted { retry_after_secs: 2.5 }
        );
    }

    #[test]
    fn success_without_wait_is_accepted_immediately() {
        let outcome = classify(200, br#"{"success": true}"#);
        assert_eq!(outcome, SubmissionOutcome::Accepted { retry_after_secs: 0.0 });
        assert_eq!(outcome.retry_after(), Duration::ZERO);
    }

    #[test]
    fn zero_wait_falls_through_to_success_flag() {
        assert!(classify(201, br#"{"success": true, "waitSeconds": 0}"#).is_accepted());
        assert_eq!(
            classify(200, br#"{"success": false, "waitSeconds": 0}"#),
            SubmissionOutcome::Rejected { retry_after_secs: 5.0 }
        );
    }

    #[test]
    fn missing_success_defaults_to_rejected() {
        assert_matches!(
            classify(200, br#"{"errors": ["nope"]}"#),
            SubmissionOutcome::Rejected { retry_after_secs } if retry_after_secs == 5.0
        );
    }

    #[test]
    fn null_wait_seconds_is_absent() {
        assert!(classify(200, br#"{"success": true, "waitSeconds": null}"#).is_accepted());
    }

    #[test]
    fn unparsable_success_body_is_transient() {
        assert_eq!(classify(200, b"<html>"), SubmissionOutcome::transient());
        assert_eq!(classify(200, br#""ok""#), SubmissionOutcome::transient());
    }

    #[test]
    fn negative_wait_paces_as_zero() {
        let outcome = classify(200, br#"{"success": false, "waitSeconds": -3}"#);
        assert_eq!(outcome, SubmissionOutcome::Throttled { retry_after_secs: -3.0 });
        assert_eq!(outcome.retry_after(), Duration::ZERO);
    }

    #[test]
    fn huge_wait_is_capped_not_dropped() {
        let outcome = classify(200, br#"{"success": false, "waitSeconds": 1e20}"#);
        assert_eq!(outcome.retry_after(), Duration::from_secs(3600));
        assert_eq!(pacing_delay(f64::INFINITY), Duration::from_secs(3600));
        assert_eq!(pacing_delay(f64::NAN), Duration::ZERO);
        assert_eq!(pacing_delay(2.5), Duration::from_millis(2500));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(SubmissionOutcome::transient().label(), "transient_error");
        assert_eq!(classify(422, b"").label(), "auth_expired");
    }
}
