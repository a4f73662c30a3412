//! Best-effort biomedical entity extraction
//!
//! Raw model labels are normalised to `EntityType` through a fixed table.
//! A failing or slow NER model never blocks a query: the extractor falls back
//! to an empty, degraded result.

use crate::ner::{NerModel, RawEntity};
use medrag_common::metrics::{Stage, StageTimer};
use medrag_common::{Entity, EntityType, Outcome};
use std::sync::Arc;
use std::time::Duration;

pub struct EntityExtractor {
    model: Arc<dyn NerModel>,
    timeout: Duration,
}

impl EntityExtractor {
    pub fn new(model: Arc<dyn NerModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Extract entities from `query`, in order of appearance
    pub async fn extract(&self, query: &str) -> Outcome<Vec<Entity>> {
        let timer = StageTimer::start(Stage::Ner);

        match tokio::time::timeout(self.timeout, self.model.tag(query)).await {
            Ok(Ok(raw)) => {
                let elapsed_ms = timer.finish(true);
                let entities = normalize(raw);
                tracing::debug!(
                    model = self.model.model_name(),
                    count = entities.len(),
                    elapsed_ms,
                    "Entities extracted"
                );
                Outcome::complete(entities)
            }
            Ok(Err(e)) => {
                timer.finish(false);
                tracing::warn!(error = %e, "Entity extraction failed, continuing without entities");
                Outcome::fallback(e)
            }
            Err(_) => {
                timer.finish(false);
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Entity extraction timed out, continuing without entities"
                );
                Outcome::fallback(format!(
                    "NER timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

/// Map a raw model label to its canonical type
pub fn canonical_type(label: &str) -> EntityType {
    let label = strip_iob_prefix(label.trim());

    match label.to_ascii_uppercase().as_str() {
        "DISEASE" | "DISEASE_DISORDER" => EntityType::Disease,
        "CHEMICAL" | "DRUG" | "MEDICATION" | "CHEMICAL/DRUG" => EntityType::ChemicalDrug,
        "GENE" | "GENE_OR_GENE_PRODUCT" => EntityType::Gene,
        "PROTEIN" => EntityType::Protein,
        "SPECIES" | "ORGANISM" => EntityType::Species,
        "DNA" => EntityType::Dna,
        "RNA" => EntityType::Rna,
        "CELL_LINE" => EntityType::CellLine,
        "CELL_TYPE" => EntityType::CellType,
        _ => EntityType::Other(label.to_string()),
    }
}

fn strip_iob_prefix(label: &str) -> &str {
    let bytes = label.as_bytes();
    if bytes.len() > 2 && bytes[1] == b'-' && matches!(bytes[0], b'B' | b'I' | b'b' | b'i') {
        &label[2..]
    } else {
        label
    }
}

/// Clean up spans and fold sub-word residue (`##ment`) into the preceding term
fn normalize(raw: Vec<RawEntity>) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::with_capacity(raw.len());

    for span in raw {
        let term = span.term.trim();

        if let Some(residue) = term.strip_prefix("##") {
            match entities.last_mut() {
                Some(previous) => previous.term.push_str(residue),
                None if !residue.is_empty() => {
                    entities.push(Entity::new(residue, canonical_type(&span.label)))
                }
                None => {}
            }
            continue;
        }

        if term.is_empty() {
            continue;
        }

        entities.push(Entity::new(term, canonical_type(&span.label)));
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medrag_common::errors::{AppError, Result};

    struct ScriptedNer(Vec<RawEntity>);

    #[async_trait]
    impl NerModel for ScriptedNer {
        async fn tag(&self, _text: &str) -> Result<Vec<RawEntity>> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct BrokenNer;

    #[async_trait]
    impl NerModel for BrokenNer {
        async fn tag(&self, _text: &str) -> Result<Vec<RawEntity>> {
            Err(AppError::EntityExtraction {
                message: "model unavailable".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    struct StalledNer;

    #[async_trait]
    impl NerModel for StalledNer {
        async fn tag(&self, _text: &str) -> Result<Vec<RawEntity>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![RawEntity::new("diabetes", "Disease_disorder")])
        }

        fn model_name(&self) -> &str {
            "stalled"
        }
    }

    fn extractor(model: impl NerModel + 'static) -> EntityExtractor {
        EntityExtractor::new(Arc::new(model), Duration::from_millis(50))
    }

    #[test]
    fn test_label_table() {
        assert_eq!(canonical_type("Disease_disorder"), EntityType::Disease);
        assert_eq!(canonical_type("DISEASE"), EntityType::Disease);
        assert_eq!(canonical_type("Medication"), EntityType::ChemicalDrug);
        assert_eq!(canonical_type("chemical"), EntityType::ChemicalDrug);
        assert_eq!(canonical_type("Chemical/Drug"), EntityType::ChemicalDrug);
        assert_eq!(canonical_type("GENE_OR_GENE_PRODUCT"), EntityType::Gene);
        assert_eq!(canonical_type("Protein"), EntityType::Protein);
        assert_eq!(canonical_type("ORGANISM"), EntityType::Species);
        assert_eq!(canonical_type("DNA"), EntityType::Dna);
        assert_eq!(canonical_type("cell_line"), EntityType::CellLine);
        assert_eq!(canonical_type("CELL_TYPE"), EntityType::CellType);
    }

    #[test]
    fn test_unknown_label_passes_through() {
        assert_eq!(
            canonical_type("Sign_symptom"),
            EntityType::Other("Sign_symptom".to_string())
        );
    }

    #[test]
    fn test_iob_prefix_stripped() {
        assert_eq!(canonical_type("B-Disease_disorder"), EntityType::Disease);
        assert_eq!(canonical_type("I-DRUG"), EntityType::ChemicalDrug);
        assert_eq!(
            canonical_type("B-Lab_value"),
            EntityType::Other("Lab_value".to_string())
        );
        // Short labels are not mistaken for prefixes
        assert_eq!(canonical_type("B-"), EntityType::Other("B-".to_string()));
    }

    #[tokio::test]
    async fn test_extracts_in_order() {
        let outcome = extractor(ScriptedNer(vec![
            RawEntity::new("diabetes", "Disease_disorder"),
            RawEntity::new(" metformin ", "Medication"),
        ]))
        .extract("diabetes and metformin")
        .await;

        assert!(!outcome.is_degraded());
        assert_eq!(
            outcome.into_value(),
            vec![
                Entity::new("diabetes", EntityType::Disease),
                Entity::new("metformin", EntityType::ChemicalDrug),
            ]
        );
    }

    #[tokio::test]
    async fn test_subword_residue_merged() {
        let outcome = extractor(ScriptedNer(vec![
            RawEntity::new("glib", "Medication"),
            RawEntity::new("##enclamide", "Medication"),
            RawEntity::new("   ", "Medication"),
        ]))
        .extract("glibenclamide")
        .await;

        assert_eq!(
            outcome.into_value(),
            vec![Entity::new("glibenclamide", EntityType::ChemicalDrug)]
        );
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_empty() {
        let outcome = extractor(BrokenNer).extract("diabetes").await;

        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap_or_default().contains("model unavailable"));
        assert!(outcome.into_value().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty() {
        let outcome = extractor(StalledNer).extract("diabetes").await;

        assert!(outcome.is_degraded());
        assert!(outcome.into_value().is_empty());
    }
}
