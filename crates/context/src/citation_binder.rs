//! Deterministic citation binding
//!
//! Citation `n` is always the `n`-th retrieved passage. The same numbering is
//! used in the generation prompt and in the response.

use medrag_common::models::UNKNOWN_SOURCE;
use medrag_common::{Citation, Passage};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CitationBinder;

impl CitationBinder {
    pub fn new() -> Self {
        Self
    }

    /// Number passages 1..=n in retrieval order; never fails
    pub fn bind(&self, passages: Vec<Passage>) -> Vec<Citation> {
        passages
            .into_iter()
            .enumerate()
            .map(|(index, passage)| Citation {
                id: index + 1,
                source_name: source_name(passage.source_path.as_deref()),
                location_label: location_label(&passage),
                passage,
            })
            .collect()
    }
}

/// Human-readable document name derived from the stored source path
pub fn source_name(source_path: Option<&str>) -> String {
    let Some(path) = source_path.map(str::trim).filter(|p| !p.is_empty()) else {
        return UNKNOWN_SOURCE.to_string();
    };

    let normalized = path.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.replace('_', " ").trim().to_string())
        .unwrap_or_default();

    if name.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        name
    }
}

/// `"Section: <s> Page: <p>"` for the fields that are present
pub fn location_label(passage: &Passage) -> String {
    let present = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let parts: Vec<String> = [
        present(&passage.section).map(|s| format!("Section: {}", s)),
        present(&passage.page).map(|p| format!("Page: {}", p)),
    ]
    .into_iter()
    .flatten()
    .collect();

    parts.join(" ")
}
