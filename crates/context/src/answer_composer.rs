//! Prompt composition and grounded answer generation

use crate::generator::{DecodingConfig, Generator};
use medrag_common::errors::{AppError, Result};
use medrag_common::metrics::{self, Stage, StageTimer};
use medrag_common::Citation;
use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const INSTRUCTIONS: &str = "You are a medical expert. Answer the question using ONLY the context below. \
Cite sources like [1], [2] using the numbers from the Sources list. If unsure, say so.";

pub struct AnswerComposer {
    generator: Arc<dyn Generator>,
    decoding: DecodingConfig,
    timeout: Duration,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn Generator>, decoding: DecodingConfig, timeout: Duration) -> Self {
        Self {
            generator,
            decoding,
            timeout,
        }
    }

    /// Generate an answer to `question` grounded in `citations`
    ///
    /// `question` is the user's original wording, never the expanded query.
    pub async fn compose(&self, question: &str, citations: &[Citation]) -> Result<String> {
        let prompt = build_prompt(question, citations);
        let timer = StageTimer::start(Stage::Generation);

        let answer = match tokio::time::timeout(
            self.timeout,
            self.generator.generate(&prompt, &self.decoding),
        )
        .await
        {
            Ok(Ok(answer)) => {
                let elapsed_ms = timer.finish(true);
                tracing::debug!(
                    model = self.generator.model_name(),
                    prompt_chars = prompt.len(),
                    answer_chars = answer.len(),
                    elapsed_ms,
                    "Answer generated"
                );
                answer
            }
            Ok(Err(e)) => {
                timer.finish(false);
                return Err(match e {
                    AppError::Generation { .. } => e,
                    other => AppError::generation(other),
                });
            }
            Err(_) => {
                timer.finish(false);
                return Err(AppError::generation(format!(
                    "Generation timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        let unknown = unknown_citation_markers(&answer, citations.len());
        if !unknown.is_empty() {
            tracing::warn!(
                markers = ?unknown,
                citations = citations.len(),
                "Answer cites sources that were not provided"
            );
            metrics::record_unknown_citation_markers(unknown.len());
        }

        Ok(answer)
    }
}

/// Fill the prompt template with numbered context blocks and the source legend
pub fn build_prompt(question: &str, citations: &[Citation]) -> String {
    let context = citations
        .iter()
        .map(|c| format!("[Document {}]\n{}", c.id, c.passage.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let sources = citations
        .iter()
        .map(Citation::legend_line)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{INSTRUCTIONS}\n\nContext:\n{context}\n\nSources:\n{sources}\n\nQuestion: {question}\n\nAnswer:\n"
    )
}

fn marker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[(?:Source\s+|Document\s+)?(\d+)\]").ok())
        .as_ref()
}

/// Distinct `[n]` markers in `answer` that fall outside `1..=citation_count`
pub fn unknown_citation_markers(answer: &str, citation_count: usize) -> Vec<usize> {
    let Some(pattern) = marker_pattern() else {
        return Vec::new();
    };

    pattern
        .captures_iter(answer)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter(|&n| n == 0 || n > citation_count)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrag_common::Passage;
    use std::sync::Mutex;

    /// Records the last prompt and replies with a fixed answer
    struct RecordingGenerator {
        reply: String,
        last_prompt: Mutex<Option<String>>,
        last_decoding: Mutex<Option<DecodingConfig>>,
    }

    impl RecordingGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                last_prompt: Mutex::new(None),
                last_decoding: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, prompt: &str, decoding: &DecodingConfig) -> Result<String> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            *self.last_decoding.lock().unwrap() = Some(*decoding);
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            Err(AppError::Internal {
                message: "quota exceeded".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &str, _decoding: &DecodingConfig) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    fn citation(id: usize, content: &str, source: &str, label: &str) -> Citation {
        Citation {
            id,
            passage: Passage::new(format!("c{}", id), content),
            source_name: source.to_string(),
            location_label: label.to_string(),
        }
    }

    fn sample_citations() -> Vec<Citation> {
        vec![
            citation(1, "Metformin is first-line therapy.", "Harrison Medicine", "Page: 212"),
            citation(2, "Insulin is required in type 1 diabetes.", "Unknown Source", ""),
        ]
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("diabetes treatment", &sample_citations());

        assert!(prompt.contains(
            "Context:\n[Document 1]\nMetformin is first-line therapy.\n\n[Document 2]\nInsulin is required in type 1 diabetes.\n"
        ));
        assert!(prompt.contains(
            "Sources:\n[Source 1]: Harrison Medicine - Page: 212\n[Source 2]: Unknown Source\n"
        ));
        assert!(prompt.contains("Question: diabetes treatment\n"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn test_prompt_without_citations() {
        let prompt = build_prompt("diabetes treatment", &[]);
        assert!(!prompt.contains("[Document"));
        assert!(!prompt.contains("[Source"));
        assert!(prompt.contains("Question: diabetes treatment"));
    }

    #[test]
    fn test_unknown_markers() {
        let answer = "Metformin [1] and insulin [2]; see also [7] and [Source 0] and [7].";
        assert_eq!(unknown_citation_markers(answer, 2), vec![0, 7]);
        assert!(unknown_citation_markers("Metformin [1][2]", 2).is_empty());
        assert!(unknown_citation_markers("No markers here", 0).is_empty());
    }

    #[tokio::test]
    async fn test_compose_passes_original_question_and_decoding() {
        let generator = Arc::new(RecordingGenerator::new("Metformin [1]."));
        let decoding = DecodingConfig::default();
        let composer = AnswerComposer::new(generator.clone(), decoding, Duration::from_secs(1));

        let answer = composer
            .compose("diabetes treatment", &sample_citations())
            .await
            .unwrap();

        assert_eq!(answer, "Metformin [1].");
        let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Question: diabetes treatment\n"));
        assert_eq!(*generator.last_decoding.lock().unwrap(), Some(decoding));
    }

    #[tokio::test]
    async fn test_answer_with_unknown_marker_returned_untouched() {
        let generator = Arc::new(RecordingGenerator::new("See [9]."));
        let composer =
            AnswerComposer::new(generator, DecodingConfig::default(), Duration::from_secs(1));

        let answer = composer.compose("q", &sample_citations()).await.unwrap();
        assert_eq!(answer, "See [9].");
    }

    #[tokio::test]
    async fn test_generator_error_is_generation_failure() {
        let composer = AnswerComposer::new(
            Arc::new(FailingGenerator),
            DecodingConfig::default(),
            Duration::from_secs(1),
        );

        let err = composer.compose("q", &sample_citations()).await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_generator_timeout_is_generation_failure() {
        let composer = AnswerComposer::new(
            Arc::new(SlowGenerator),
            DecodingConfig::default(),
            Duration::from_millis(20),
        );

        let err = composer.compose("q", &sample_citations()).await.unwrap_err();
        assert!(matches!(err, AppError::Generation { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
