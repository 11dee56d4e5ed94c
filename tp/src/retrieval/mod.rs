//! Retrieval collaborator
//!
//! Supplies short reference snippets that ground the location and activity
//! stages. Stages treat every failure as "no context".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod jsonl;

pub use jsonl::JsonlRetriever;

/// One retrieved document fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Failed to read corpus {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed corpus line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Retrieval timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Retrieval backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Best `top_k` snippets for `query`, boosted by `location_hints`
    async fn search(&self, query: &str, location_hints: &[String], top_k: usize)
    -> Result<Vec<Snippet>, RetrievalError>;
}

/// Run a search bounded by `timeout`
pub async fn search_with_timeout(
    retriever: &dyn Retriever,
    query: &str,
    location_hints: &[String],
    top_k: usize,
    timeout: std::time::Duration,
) -> Result<Vec<Snippet>, RetrievalError> {
    match tokio::time::timeout(timeout, retriever.search(query, location_hints, top_k)).await {
        Ok(result) => result,
        Err(_) => Err(RetrievalError::Timeout(timeout)),
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one snippet per call naming the first hint, or fails / hangs
    pub struct MockRetriever {
        pub fail: bool,
        pub hang: bool,
        calls: AtomicUsize,
    }

    impl MockRetriever {
        pub fn ok() -> Self {
            Self {
                fail: false,
                hang: false,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }

        pub fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::ok()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Retriever for MockRetriever {
        async fn search(
            &self,
            query: &str,
            location_hints: &[String],
            _top_k: usize,
        ) -> Result<Vec<Snippet>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(RetrievalError::Backend("index offline".to_string()));
            }
            let place = location_hints.first().cloned().unwrap_or_default();
            Ok(vec![Snippet {
                text: format!("{} notes for {}", place, query),
                source: "mock".to_string(),
                tags: vec![place.to_lowercase()],
            }])
        }
    }

    #[tokio::test]
    async fn test_search_with_timeout_expires() {
        let retriever = MockRetriever::hanging();
        let result = search_with_timeout(&retriever, "q", &[], 3, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(RetrievalError::Timeout(_))));
    }
}
