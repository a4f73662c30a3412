//! Extracted medical entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical entity types
///
/// `Other` keeps the raw model label verbatim so the vocabulary stays open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EntityType {
    Disease,
    ChemicalDrug,
    Gene,
    Protein,
    Species,
    Dna,
    Rna,
    CellLine,
    CellType,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Disease => "Disease",
            EntityType::ChemicalDrug => "Chemical/Drug",
            EntityType::Gene => "Gene",
            EntityType::Protein => "Protein",
            EntityType::Species => "Species",
            EntityType::Dna => "DNA",
            EntityType::Rna => "RNA",
            EntityType::CellLine => "CellLine",
            EntityType::CellType => "CellType",
            EntityType::Other(label) => label,
        }
    }

    /// Types specific enough to sharpen a short retrieval query
    pub fn is_clinically_discriminative(&self) -> bool {
        matches!(
            self,
            EntityType::Disease | EntityType::ChemicalDrug | EntityType::Gene | EntityType::Protein
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Other(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Disease" => EntityType::Disease,
            "Chemical/Drug" => EntityType::ChemicalDrug,
            "Gene" => EntityType::Gene,
            "Protein" => EntityType::Protein,
            "Species" => EntityType::Species,
            "DNA" => EntityType::Dna,
            "RNA" => EntityType::Rna,
            "CellLine" => EntityType::CellLine,
            "CellType" => EntityType::CellType,
            _ => EntityType::Other(value),
        }
    }
}

/// Entity extracted from a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Whole term as it appeared in the query
    pub term: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl Entity {
    pub fn new(term: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            term: term.into(),
            entity_type,
        }
    }
}
