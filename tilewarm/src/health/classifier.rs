//! Error classification and recovery policy.
//!
//! Maps raw failure signals onto four user-visible categories. The mapping is
//! a pure function: it keeps no history, so the same signal always produces
//! the same category and retry flag.
//!
//! ```text
//! category             retryable  action
//! tile-failure         yes        silent retry, then visible retry if it recurs
//! service-unavailable  yes        visible retry
//! auth-expired         no         force re-authentication (not cleared by retry)
//! superseded           no         dismissible notice, viewing continues
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::tracker::HealthState;

/// Metadata keys that reference a newer replacement slide or case.
const SUPERSESSION_KEYS: [&str; 5] = [
    "replaced_by",
    "replacedBy",
    "replaced-by",
    "superseded_by",
    "supersededBy",
];

/// The four user-visible error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Too many rendered tiles are failing.
    TileFailure,
    /// A control-plane request (metadata, health check) failed.
    ServiceUnavailable,
    /// The session token is no longer accepted.
    AuthExpired,
    /// The slide or case has been replaced by a newer one.
    Superseded,
}

impl ErrorCategory {
    /// Stable identifier used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::TileFailure => "tile-failure",
            ErrorCategory::ServiceUnavailable => "service-unavailable",
            ErrorCategory::AuthExpired => "auth-expired",
            ErrorCategory::Superseded => "superseded",
        }
    }

    /// Static recovery policy for this category.
    pub fn policy(&self) -> RecoveryPolicy {
        match self {
            ErrorCategory::TileFailure => RecoveryPolicy {
                action: RecoveryAction::SilentRetry,
                retryable: true,
                blocks_viewing: false,
                dismissible: false,
                cleared_by_retry: true,
            },
            ErrorCategory::ServiceUnavailable => RecoveryPolicy {
                action: RecoveryAction::UserRetry,
                retryable: true,
                blocks_viewing: true,
                dismissible: false,
                cleared_by_retry: true,
            },
            ErrorCategory::AuthExpired => RecoveryPolicy {
                action: RecoveryAction::Reauthenticate,
                retryable: false,
                blocks_viewing: true,
                dismissible: false,
                cleared_by_retry: false,
            },
            ErrorCategory::Superseded => RecoveryPolicy {
                action: RecoveryAction::DismissibleNotice,
                retryable: false,
                blocks_viewing: false,
                dismissible: true,
                cleared_by_retry: false,
            },
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the viewer shell should do about a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry automatically; escalate to a visible retry if the error recurs.
    SilentRetry,
    /// Offer the user a retry affordance.
    UserRetry,
    /// Send the user through authentication again.
    Reauthenticate,
    /// Show an informational notice the user can dismiss.
    DismissibleNotice,
}

impl RecoveryAction {
    /// User-facing description of the action.
    pub fn display_status(&self) -> &'static str {
        match self {
            RecoveryAction::SilentRetry => "Retrying automatically",
            RecoveryAction::UserRetry => "Retry available",
            RecoveryAction::Reauthenticate => "Sign in again",
            RecoveryAction::DismissibleNotice => "Notice",
        }
    }
}

/// Static recovery behavior attached to a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub action: RecoveryAction,
    pub retryable: bool,
    /// Whether viewing must stop until the error is resolved.
    pub blocks_viewing: bool,
    /// Whether the user may dismiss the notice and carry on.
    pub dismissible: bool,
    /// Whether a successful retry clears the state.
    pub cleared_by_retry: bool,
}

/// Raw failure signals observed by the viewer shell or this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorSignal {
    /// The rendered-tile failure rate crossed the degraded threshold.
    HealthDegraded { state: HealthState, threshold: f64 },
    /// A control-plane request produced no response.
    NetworkFailure { endpoint: String, message: String },
    /// A request was answered with a non-success HTTP status.
    HttpStatus {
        endpoint: String,
        status: u16,
        /// Response indicated that the token expired (vs. missing/invalid).
        token_expired: bool,
    },
    /// Slide or case metadata references a replacement.
    Superseded { replaced_by: String },
}

/// Immutable classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorState {
    pub category: ErrorCategory,
    pub message: String,
    pub retryable: bool,
    pub details: BTreeMap<String, String>,
}

impl ErrorState {
    fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retryable: category.policy().retryable,
            details: BTreeMap::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    /// Recovery policy for this error's category.
    pub fn policy(&self) -> RecoveryPolicy {
        self.category.policy()
    }
}

impl fmt::Display for ErrorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Classify a raw signal.
pub fn classify(signal: &ErrorSignal) -> ErrorState {
    match signal {
        ErrorSignal::HealthDegraded { state, threshold } => ErrorState::new(
            ErrorCategory::TileFailure,
            format!(
                "{} of {} tile requests failed",
                state.failed_requests, state.total_requests
            ),
        )
        .with_detail("failure_rate", format!("{:.3}", state.failure_rate()))
        .with_detail("threshold", format!("{:.3}", threshold))
        .with_detail("total_requests", state.total_requests)
        .with_detail("failed_requests", state.failed_requests),

        ErrorSignal::NetworkFailure { endpoint, message } => {
            ErrorState::new(ErrorCategory::ServiceUnavailable, "Image service is unreachable")
                .with_detail("endpoint", endpoint)
                .with_detail("cause", message)
        }

        ErrorSignal::HttpStatus {
            endpoint,
            status: 401,
            token_expired,
        } => {
            let message = if *token_expired {
                "Session has expired"
            } else {
                "Session is no longer authorized"
            };
            let state = ErrorState::new(ErrorCategory::AuthExpired, message)
                .with_detail("endpoint", endpoint)
                .with_detail("status", 401);
            if *token_expired {
                state.with_detail("reason", "token-expired")
            } else {
                state
            }
        }

        ErrorSignal::HttpStatus {
            endpoint, status, ..
        } => ErrorState::new(
            ErrorCategory::ServiceUnavailable,
            format!("Image service returned HTTP {}", status),
        )
        .with_detail("endpoint", endpoint)
        .with_detail("status", status),

        ErrorSignal::Superseded { replaced_by } => ErrorState::new(
            ErrorCategory::Superseded,
            "A newer version of this slide is available",
        )
        .with_detail("replaced_by", replaced_by),
    }
}

/// Extract a supersession signal from slide or case metadata.
///
/// Looks for a non-null replacement reference at the top level of the
/// metadata object. Strings are used as-is; other values are rendered as JSON.
pub fn supersession_signal(metadata: &Value) -> Option<ErrorSignal> {
    let object = metadata.as_object()?;

    SUPERSESSION_KEYS.iter().find_map(|key| match object.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(ErrorSignal::Superseded {
            replaced_by: s.clone(),
        }),
        Some(other) => Some(ErrorSignal::Superseded {
            replaced_by: other.to_string(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn all_signals() -> Vec<ErrorSignal> {
        vec![
            ErrorSignal::HealthDegraded {
                state: HealthState {
                    total_requests: 10,
                    failed_requests: 6,
                },
                threshold: 0.5,
            },
            ErrorSignal::NetworkFailure {
                endpoint: "http://host/deepzoom/a/info".to_string(),
                message: "connection refused".to_string(),
            },
            ErrorSignal::HttpStatus {
                endpoint: "http://host/deepzoom/a/info".to_string(),
                status: 401,
                token_expired: true,
            },
            ErrorSignal::HttpStatus {
                endpoint: "http://host/deepzoom/a/info".to_string(),
                status: 401,
                token_expired: false,
            },
            ErrorSignal::HttpStatus {
                endpoint: "http://host/health".to_string(),
                status: 503,
                token_expired: false,
            },
            ErrorSignal::Superseded {
                replaced_by: "slide-2".to_string(),
            },
        ]
    }

    #[test]
    fn test_health_degraded_is_tile_failure() {
        let state = classify(&all_signals()[0]);
        assert_eq!(state.category, ErrorCategory::TileFailure);
        assert!(state.retryable);
        assert_eq!(state.details.get("failure_rate").unwrap(), "0.600");
        assert_eq!(state.policy().action, RecoveryAction::SilentRetry);
    }

    #[test]
    fn test_network_failure_is_service_unavailable() {
        let state = classify(&all_signals()[1]);
        assert_eq!(state.category, ErrorCategory::ServiceUnavailable);
        assert!(state.retryable);
        assert_eq!(state.policy().action, RecoveryAction::UserRetry);
        assert_eq!(state.details.get("cause").unwrap(), "connection refused");
    }

    #[test]
    fn test_401_is_auth_expired() {
        let expired = classify(&all_signals()[2]);
        assert_eq!(expired.category, ErrorCategory::AuthExpired);
        assert!(!expired.retryable);
        assert_eq!(expired.details.get("reason").unwrap(), "token-expired");
        assert_eq!(expired.message, "Session has expired");

        let unauthorized = classify(&all_signals()[3]);
        assert_eq!(unauthorized.category, ErrorCategory::AuthExpired);
        assert!(!unauthorized.details.contains_key("reason"));
    }

    #[test]
    fn test_auth_expired_is_not_cleared_by_retry() {
        let policy = ErrorCategory::AuthExpired.policy();
        assert!(!policy.cleared_by_retry);
        assert_eq!(policy.action, RecoveryAction::Reauthenticate);
    }

    #[test]
    fn test_other_status_is_service_unavailable() {
        let state = classify(&all_signals()[4]);
        assert_eq!(state.category, ErrorCategory::ServiceUnavailable);
        assert_eq!(state.details.get("status").unwrap(), "503");
    }

    #[test]
    fn test_superseded_is_dismissible_and_non_blocking() {
        let state = classify(&all_signals()[5]);
        assert_eq!(state.category, ErrorCategory::Superseded);
        assert!(!state.retryable);
        let policy = state.policy();
        assert!(policy.dismissible);
        assert!(!policy.blocks_viewing);
        assert_eq!(state.details.get("replaced_by").unwrap(), "slide-2");
    }

    #[test]
    fn test_classification_is_pure() {
        for signal in all_signals() {
            let first = classify(&signal);
            let second = classify(&signal);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_retryable_follows_category() {
        for signal in all_signals() {
            let state = classify(&signal);
            let expected = matches!(
                state.category,
                ErrorCategory::TileFailure | ErrorCategory::ServiceUnavailable
            );
            assert_eq!(state.retryable, expected, "{}", state);
        }
    }

    #[test]
    fn test_supersession_from_metadata() {
        let metadata = json!({"id": "slide-1", "replaced_by": "slide-9"});
        assert_eq!(
            supersession_signal(&metadata),
            Some(ErrorSignal::Superseded {
                replaced_by: "slide-9".to_string()
            })
        );

        let camel = json!({"replacedBy": 42});
        assert_eq!(
            supersession_signal(&camel),
            Some(ErrorSignal::Superseded {
                replaced_by: "42".to_string()
            })
        );
    }

    #[test]
    fn test_no_supersession_when_null_or_missing() {
        assert_eq!(supersession_signal(&json!({"replaced_by": null})), None);
        assert_eq!(supersession_signal(&json!({"replaced_by": ""})), None);
        assert_eq!(supersession_signal(&json!({"name": "slide"})), None);
        assert_eq!(supersession_signal(&json!([1, 2, 3])), None);
    }

    #[test]
    fn test_category_identifiers() {
        assert_eq!(ErrorCategory::TileFailure.to_string(), "tile-failure");
        assert_eq!(
            ErrorCategory::ServiceUnavailable.as_str(),
            "service-unavailable"
        );
        assert_eq!(ErrorCategory::AuthExpired.as_str(), "auth-expired");
        assert_eq!(ErrorCategory::Superseded.as_str(), "superseded");
    }
}
