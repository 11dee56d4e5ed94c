//! Completion failures
//!
//! None of these reach the traveler. A failed call makes the stage fall back
//! or leaves the conversation state as it was.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} rate limited the request, retry after {retry_after:?}")]
    RateLimited {
        provider: &'static str,
        retry_after: Duration,
    },

    #[error("{provider} answered HTTP {status}: {body}")]
    Rejected {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Could not reach the model service: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} still failing after {attempts} attempts: {last}")]
    Exhausted {
        provider: &'static str,
        attempts: u32,
        last: String,
    },

    #[error("No completion within {0:?}")]
    Timeout(Duration),

    #[error("Unreadable completion: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Classify a non-success HTTP reply
    pub fn from_status(provider: &'static str, status: u16, headers: &HeaderMap, body: String) -> Self {
        if status == 429 {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs);
            return LlmError::RateLimited { provider, retry_after };
        }
        LlmError::Rejected { provider, status, body }
    }

    /// Worth another attempt within the same call
    ///
    /// A rate limit is not: its window outlasts any stage timeout.
    pub fn is_transient(&self) -> bool {
        match self {
            // 408 request timeout, 5xx including Anthropic's 529 overloaded
            LlmError::Rejected { status, .. } => *status == 408 || *status >= 500,
            LlmError::Network(_) => true,
            _ => false,
        }
    }
}
