//! Final per-request result

use super::{Citation, Entity};
use serde::{Deserialize, Serialize};

/// Answer returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer_text: String,

    pub entities: Vec<Entity>,

    /// Citations in retrieval order, passage content cut to a display preview
    pub citations: Vec<Citation>,

    /// Present only when expansion changed the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_query: Option<String>,
}

impl AnswerResult {
    pub fn was_expanded(&self) -> bool {
        self.expanded_query.is_some()
    }
}
