//! Keyword retriever over a JSON-lines corpus

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{RetrievalError, Retriever, Snippet};

/// In-memory corpus scored by token overlap
pub struct JsonlRetriever {
    docs: Vec<(Snippet, HashSet<String>)>,
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
        .map(str::to_string)
        .collect()
}

impl JsonlRetriever {
    /// Load `{text, source, tags}` lines; blank lines are skipped
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        debug!(?path, "JsonlRetriever::load: called");
        let content = std::fs::read_to_string(path).map_err(|source| RetrievalError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let retriever = Self::parse(&content)?;
        info!(path = %path.display(), docs = retriever.len(), "Loaded retrieval corpus");
        Ok(retriever)
    }

    pub fn parse(content: &str) -> Result<Self, RetrievalError> {
        let mut docs = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let snippet: Snippet =
                serde_json::from_str(line).map_err(|source| RetrievalError::Parse { line: i + 1, source })?;
            let mut terms = tokens(&snippet.text);
            terms.extend(snippet.tags.iter().map(|t| t.to_lowercase()));
            docs.push((snippet, terms));
        }
        Ok(Self { docs })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn score(&self, terms: &HashSet<String>, query: &HashSet<String>, hints: &[String]) -> usize {
        let overlap = query.intersection(terms).count();
        // a location hint counts double so place-specific notes rank first
        let hinted = hints
            .iter()
            .map(|h| h.to_lowercase())
            .filter(|h| terms.contains(h) || h.split_whitespace().all(|w| terms.contains(w)))
            .count();
        overlap + 2 * hinted
    }
}

#[async_trait]
impl Retriever for JsonlRetriever {
    async fn search(
        &self,
        query: &str,
        location_hints: &[String],
        top_k: usize,
    ) -> Result<Vec<Snippet>, RetrievalError> {
        debug!(%query, ?location_hints, %top_k, "JsonlRetriever::search: called");
        let query_terms = tokens(query);
        let mut scored: Vec<(usize, usize)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(i, (_, terms))| (self.score(terms, &query_terms, location_hints), i))
            .filter(|(score, _)| *score > 0)
            .collect();
        // highest score first, corpus order breaks ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, i)| self.docs[i].0.clone())
            .collect())
    }
}
