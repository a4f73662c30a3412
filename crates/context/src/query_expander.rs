//! Entity-aware query expansion
//!
//! Short queries are under-specified for dense retrieval; appending the
//! clinically discriminative entity terms sharpens them. Long queries are
//! left alone.

use medrag_common::Entity;

/// Queries longer than this many words are never expanded
pub const DEFAULT_MAX_EXPANSION_WORDS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct QueryExpander {
    max_words: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSION_WORDS)
    }
}

impl QueryExpander {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    /// Return the retrieval query for `query`; never fails
    pub fn expand(&self, query: &str, entities: &[Entity]) -> String {
        if entities.is_empty() || query.split_whitespace().count() > self.max_words {
            return query.to_string();
        }

        let terms: Vec<&str> = entities
            .iter()
            .filter(|e| e.entity_type.is_clinically_discriminative())
            .map(|e| e.term.as_str())
            .collect();

        if terms.is_empty() {
            return query.to_string();
        }

        format!("{} {}", query, terms.join(" "))
    }
}
