//! Final response assembly

use medrag_common::{AnswerResult, Citation, Entity};

/// Default passage preview length, in characters
pub const DEFAULT_PREVIEW_CHARS: usize = 600;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy)]
pub struct ResponseAssembler {
    preview_chars: usize,
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl ResponseAssembler {
    /// `preview_chars == 0` disables truncation
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    pub fn assemble(
        &self,
        answer_text: String,
        entities: Vec<Entity>,
        citations: Vec<Citation>,
        expanded_query: &str,
        original_query: &str,
    ) -> AnswerResult {
        let citations = citations
            .into_iter()
            .map(|mut citation| {
                if let Some(short) = preview(&citation.passage.content, self.preview_chars) {
                    citation.passage.content = short;
                }
                citation
            })
            .collect();

        AnswerResult {
            answer_text,
            entities,
            citations,
            expanded_query: (expanded_query != original_query).then(|| expanded_query.to_string()),
        }
    }
}

/// Cut `content` to `max_chars` characters plus an ellipsis; `None` if it already fits
fn preview(content: &str, max_chars: usize) -> Option<String> {
    if max_chars == 0 {
        return None;
    }

    let (cut, _) = content.char_indices().nth(max_chars)?;
    let mut short = String::with_capacity(cut + ELLIPSIS.len());
    short.push_str(&content[..cut]);
    short.push_str(ELLIPSIS);
    Some(short)
}
