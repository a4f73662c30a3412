//! Domain model shared by every pipeline stage
//!
//! All of these are request-scoped: built once per query, never mutated after
//! construction, and dropped once the response is produced.

mod answer;
mod citation;
mod entity;
mod passage;

pub use answer::AnswerResult;
pub use citation::{Citation, UNKNOWN_SOURCE};
pub use entity::{Entity, EntityType};
pub use passage::Passage;
