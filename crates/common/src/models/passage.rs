//! Retrieved passages

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A retrieved unit of text with fixed-shape metadata
///
/// The embedding belongs to the index and is shared, not copied, between the
/// candidate pool and the selected passages. It is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,

    /// Path of the source document the chunk was cut from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Unique within its source document
    pub chunk_id: String,

    #[serde(skip, default = "empty_embedding")]
    pub embedding: Arc<[f32]>,
}

fn empty_embedding() -> Arc<[f32]> {
    Arc::from(Vec::new())
}

impl Passage {
    pub fn new(chunk_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_path: None,
            section: None,
            page: None,
            chunk_id: chunk_id.into(),
            embedding: empty_embedding(),
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Arc::from(embedding);
        self
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_not_serialized() {
        let passage = Passage::new("c-1", "Insulin lowers blood glucose.")
            .with_page("12")
            .with_embedding(vec![0.1, 0.2]);
        let json = serde_json::to_value(&passage).unwrap();

        assert!(json.get("embedding").is_none());
        assert!(json.get("section").is_none());
        assert!(json.get("book_title").is_none());
        assert_eq!(json["page"], "12");
        assert_eq!(passage.dimension(), 2);
    }

    #[test]
    fn test_clone_shares_embedding() {
        let passage = Passage::new("c-1", "text").with_embedding(vec![1.0; 4]);
        let copy = passage.clone();
        assert!(Arc::ptr_eq(&passage.embedding, &copy.embedding));
    }
}
