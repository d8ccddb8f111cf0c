//! Error classification.
//!
//! Maps an arbitrary failure message to a closed set of kinds used by the
//! rest of the resilience stack to decide retryability, backoff floors, and
//! user-facing messaging. Classification is pure and case-insensitive.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed set of error kinds the engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Authentication,
    RateLimit,
    ServerError,
    ClientError,
    ResourceExhausted,
    Timeout,
    /// Circuit was open; the call was never attempted.
    CircuitOpen,
    /// Caller cancelled the operation.
    Cancelled,
    /// Caller-supplied input was invalid.
    InvalidInput,
    /// Unexpected internal failure in our own code.
    Internal,
    Unknown,
}

impl ErrorKind {
    /// Whether this kind should ever be retried by the Retry Strategy (C2).
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::RateLimit
                | ErrorKind::ServerError
                | ErrorKind::ResourceExhausted
                | ErrorKind::Timeout
        )
    }

    /// Minimum wait hint before retrying, independent of backoff schedule.
    /// Rate limits are floored at 10s; every other kind defers entirely to
    /// the caller's `RetryConfig`.
    pub fn base_wait_hint(self) -> Option<Duration> {
        match self {
            ErrorKind::RateLimit => Some(Duration::from_secs(10)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ClientError => "client_error",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Internal => "internal",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered substring rules, first match wins. Mirrors the original
/// daemon's classifier exactly (see DESIGN.md).
const RULES: &[(&[&str], ErrorKind)] = &[
    (
        &["timeout", "connection", "unreachable", "dns", "refused"],
        ErrorKind::Network,
    ),
    (
        &[
            "401",
            "403",
            "unauthorized",
            "forbidden",
            "api key",
            "permission denied",
        ],
        ErrorKind::Authentication,
    ),
    (&["429", "rate limit", "quota"], ErrorKind::RateLimit),
    (
        &["gateway", "unavailable", "internal server"],
        ErrorKind::ServerError,
    ),
    (
        &["400", "404", "422", "bad request", "invalid input"],
        ErrorKind::ClientError,
    ),
    (
        &["out of memory", "disk", "exhausted", "resource limit"],
        ErrorKind::ResourceExhausted,
    ),
];

/// Whether `message` contains a 3-digit HTTP status in the 500-599 range,
/// e.g. "501", "599". Bounded on both sides by a non-digit (or the string
/// edge) so "12500" doesn't falsely match on its embedded "250".
fn contains_5xx_code(message: &str) -> bool {
    let bytes = message.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'5'
            && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
            && bytes.get(i + 2).is_some_and(u8::is_ascii_digit)
        {
            let left_ok = i == 0 || !bytes[i - 1].is_ascii_digit();
            let right_ok = bytes.get(i + 3).map_or(true, |b| !b.is_ascii_digit());
            if left_ok && right_ok {
                return true;
            }
        }
    }
    false
}

/// Classify an arbitrary error message into a closed [`ErrorKind`].
///
/// `timeout` is checked first so a message containing both "timeout" and,
/// say, "500" still classifies as `Network` per the rule table's declared
/// order — ties are not possible because rules are scanned in order and the
/// first match returns immediately.
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    for (needles, kind) in RULES {
        let matches = needles.iter().any(|n| lower.contains(n))
            || (*kind == ErrorKind::ServerError && contains_5xx_code(&lower));
        if matches {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

/// Classify a value produced by the runtime's own cancellation path.
/// Distinguished from `classify` because cancellation never arrives as a
/// string message in practice (it's a distinct control-flow signal).
pub fn classify_timeout() -> ErrorKind {
    ErrorKind::Timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_rules_match() {
        assert_eq!(classify("Connection timeout"), ErrorKind::Network);
        assert_eq!(classify("DNS lookup failed"), ErrorKind::Network);
        assert_eq!(classify("ECONNREFUSED"), ErrorKind::Network);
    }

    #[test]
    fn authentication_rules_match() {
        assert_eq!(classify("401 Unauthorized"), ErrorKind::Authentication);
        assert_eq!(classify("Invalid API key"), ErrorKind::Authentication);
    }

    #[test]
    fn rate_limit_rules_match() {
        assert_eq!(classify("429 Too Many Requests"), ErrorKind::RateLimit);
        assert_eq!(classify("quota exceeded"), ErrorKind::RateLimit);
    }

    #[test]
    fn server_error_rules_match() {
        assert_eq!(classify("503 Service Unavailable"), ErrorKind::ServerError);
        assert_eq!(classify("Bad Gateway"), ErrorKind::ServerError);
    }

    #[test]
    fn server_error_matches_any_5xx_code() {
        assert_eq!(classify("501 Not Implemented"), ErrorKind::ServerError);
        assert_eq!(classify("upstream returned 599"), ErrorKind::ServerError);
        assert_eq!(classify("HTTP 520 Unknown Error"), ErrorKind::ServerError);
    }

    #[test]
    fn server_error_5xx_scan_has_digit_boundaries() {
        assert_eq!(classify("12599 widgets in stock"), ErrorKind::Unknown);
    }

    #[test]
    fn client_error_rules_match() {
        assert_eq!(classify("404 Not Found"), ErrorKind::ClientError);
        assert_eq!(classify("422 invalid input"), ErrorKind::ClientError);
    }

    #[test]
    fn resource_exhausted_rules_match() {
        assert_eq!(classify("Out of memory"), ErrorKind::ResourceExhausted);
        assert_eq!(classify("disk full"), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn unmatched_is_unknown() {
        assert_eq!(classify("something weird happened"), ErrorKind::Unknown);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(classify("TIMEOUT"), ErrorKind::Network);
        assert_eq!(classify("Timeout"), ErrorKind::Network);
    }

    #[test]
    fn first_rule_wins_on_ambiguous_message() {
        // Contains both a network needle and a server-error needle;
        // network is earlier in the table so it wins.
        assert_eq!(classify("connection refused by 503 backend"), ErrorKind::Network);
    }

    #[test]
    fn retryable_set_matches_spec() {
        for kind in [
            ErrorKind::Network,
            ErrorKind::RateLimit,
            ErrorKind::ServerError,
            ErrorKind::ResourceExhausted,
            ErrorKind::Timeout,
        ] {
            assert!(kind.retryable(), "{kind:?} should be retryable");
        }
        for kind in [
            ErrorKind::Authentication,
            ErrorKind::ClientError,
            ErrorKind::CircuitOpen,
            ErrorKind::Cancelled,
            ErrorKind::InvalidInput,
            ErrorKind::Unknown,
        ] {
            assert!(!kind.retryable(), "{kind:?} should not be retryable");
        }
    }

    #[test]
    fn rate_limit_has_ten_second_floor() {
        assert_eq!(
            ErrorKind::RateLimit.base_wait_hint(),
            Some(Duration::from_secs(10))
        );
        assert_eq!(ErrorKind::Network.base_wait_hint(), None);
    }
}
