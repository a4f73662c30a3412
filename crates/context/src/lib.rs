//! MedRAG Context Engine
//!
//! Turns a medical question into a citation-grounded answer:
//! - Biomedical entity extraction (best-effort)
//! - Entity-aware expansion of short queries
//! - MMR retrieval via `medrag-search`
//! - Deterministic citation binding and prompt composition
//! - Response assembly with passage previews

pub mod answer_composer;
pub mod citation_binder;
pub mod entity_extractor;
pub mod generator;
pub mod ner;
pub mod pipeline;
pub mod query_expander;
pub mod response_assembler;

pub use answer_composer::AnswerComposer;
pub use citation_binder::CitationBinder;
pub use entity_extractor::EntityExtractor;
pub use generator::{create_generator, DecodingConfig, GeminiGenerator, Generator, MockGenerator};
pub use ner::{create_ner_model, HuggingFaceNer, MockNerModel, NerModel, RawEntity};
pub use pipeline::QueryPipeline;
pub use query_expander::QueryExpander;
pub use response_assembler::ResponseAssembler;
