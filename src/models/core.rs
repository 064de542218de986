// src/models/core.rs - Core catalog records and derived attributes
use serde::{Deserialize, Serialize};

/// One row of a catalog as read from an input dataset. Immutable after
/// ingestion; everything derived from it (normalized name, attributes) is
/// computed per run, never stored back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    /// Price in currency units. 0.0 means unknown (unparseable or absent).
    pub price: f64,
    /// Opaque external identifier (SKU, barcode, ...). May be empty.
    pub external_id: String,
    /// Name of the catalog this row came from.
    pub source: String,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, price: f64, external_id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            external_id: external_id.into(),
            source: source.into(),
        }
    }
}

/// Fragrance strength category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationType {
    Extrait,
    Edp,
    Edt,
    Edc,
    Unknown,
}

impl ConcentrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcentrationType::Extrait => "extrait",
            ConcentrationType::Edp => "edp",
            ConcentrationType::Edt => "edt",
            ConcentrationType::Edc => "edc",
            ConcentrationType::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ConcentrationType::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::Unknown)
    }
}

/// Attributes derived deterministically from a normalized product name.
/// Absence of a signal is always represented as unknown, never guessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Canonical brand name from the known-brand table, if any alias hit.
    pub brand: Option<String>,
    /// Volume in milliliters. 0.0 means unknown.
    pub size_ml: f64,
    pub concentration: ConcentrationType,
    pub gender: Gender,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            brand: None,
            size_ml: 0.0,
            concentration: ConcentrationType::Unknown,
            gender: Gender::Unknown,
        }
    }
}

impl Attributes {
    /// Case-insensitive canonical brand comparison. Only meaningful when
    /// both sides carry a known brand.
    pub fn brand_conflicts_with(&self, other: &Attributes) -> bool {
        match (&self.brand, &other.brand) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    pub fn has_size(&self) -> bool {
        self.size_ml > 0.0
    }
}
