//! Numbered citations bound to retrieved passages

use super::Passage;
use serde::{Deserialize, Serialize};

/// Source name used when a passage has no resolvable source path
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Citation for a retrieved passage
///
/// `id` is 1-based and equals the passage's retrieval rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: usize,

    pub passage: Passage,

    /// Human-readable name of the source document
    pub source_name: String,

    /// "Section: .. Page: .." or empty
    pub location_label: String,
}

impl Citation {
    /// Legend line shown to the generator, e.g. `[Source 2]: Harrison Medicine - Page: 212`
    pub fn legend_line(&self) -> String {
        if self.location_label.is_empty() {
            format!("[Source {}]: {}", self.id, self.source_name)
        } else {
            format!(
                "[Source {}]: {} - {}",
                self.id, self.source_name, self.location_label
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(location_label: &str) -> Citation {
        Citation {
            id: 2,
            passage: Passage::new("c-2", "content"),
            source_name: "Harrison Medicine".to_string(),
            location_label: location_label.to_string(),
        }
    }

    #[test]
    fn test_legend_line_with_location() {
        assert_eq!(
            citation("Page: 212").legend_line(),
            "[Source 2]: Harrison Medicine - Page: 212"
        );
    }

    #[test]
    fn test_legend_line_without_location() {
        assert_eq!(citation("").legend_line(), "[Source 2]: Harrison Medicine");
    }
}
