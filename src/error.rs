use std::time::Duration;
use thiserror::Error;

/// Submissions refused before anything is appended or sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("message is empty")]
    EmptyInput,

    #[error("still waiting for the previous reply")]
    Pending,

    #[error("Too many questions. Please wait {cooldown_hours} hours.")]
    QuotaExceeded { cooldown_hours: u64 },
}

/// Failures of the single outbound call. These never leave the exchange; they
/// become the text of an assistant message instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("{0}")]
    Transport(String),

    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_carries_the_code() {
        let err = ExchangeError::HttpStatus { status: 429 };
        assert_eq!(err.to_string(), "HTTP error! status: 429");
    }

    #[test]
    fn transport_message_is_passed_through() {
        let err = ExchangeError::Transport("network down".to_string());
        assert_eq!(err.to_string(), "network down");
    }

    #[test]
    fn quota_rejection_mentions_cooldown() {
        let err = SubmitRejection::QuotaExceeded { cooldown_hours: 2 };
        assert_eq!(err.to_string(), "Too many questions. Please wait 2 hours.");
    }

    #[test]
    fn timeout_reports_seconds() {
        let err = ExchangeError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30s");
    }
}
