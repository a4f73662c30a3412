//! Tagged result for best-effort pipeline stages
//!
//! Fatal stages return `Result<T, AppError>`. Best-effort stages always produce a
//! usable value and record whether it was degraded along the way.

use serde::Serialize;

/// Result of a stage that never aborts the request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// The stage ran to completion
    Complete { value: T },
    /// The stage failed and fell back to a safe default
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn complete(value: T) -> Self {
        Outcome::Complete { value }
    }

    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    /// Reason recorded for a degraded outcome
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Complete { .. } => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Complete { value } | Outcome::Degraded { value, .. } => value,
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Degrade to `T::default()`, keeping the failure as the reason
    pub fn fallback(reason: impl std::fmt::Display) -> Self {
        Outcome::degraded(T::default(), reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_keeps_value_and_reason() {
        let outcome: Outcome<Vec<u8>> = Outcome::fallback("ner timed out");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.reason(), Some("ner timed out"));
        assert!(outcome.into_value().is_empty());
    }

    #[test]
    fn test_complete_has_no_reason() {
        let outcome = Outcome::complete(3);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.reason(), None);
        assert_eq!(outcome.into_value(), 3);
    }
}
