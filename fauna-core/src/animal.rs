//! Canonical shapes for image recognition and animal facts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Taxonomic ranks reported alongside a detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Class, e.g. `Mammalia`.
    #[serde(default)]
    pub class: Option<String>,
    /// Order, e.g. `Carnivora`.
    #[serde(default)]
    pub order: Option<String>,
    /// Family, e.g. `Felidae`.
    #[serde(default)]
    pub family: Option<String>,
    /// Genus, e.g. `Acinonyx`.
    #[serde(default)]
    pub genus: Option<String>,
    /// Species epithet or binomial.
    #[serde(default)]
    pub species: Option<String>,
}

/// A species detection returned by an image-recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Label assigned by the detector.
    pub label: String,
    /// Species name, when the detector reports one separately.
    #[serde(default)]
    pub species: Option<String>,
    /// Detector confidence in `[0, 1]`; zero when not reported.
    #[serde(default)]
    pub confidence: f64,
    /// Taxonomic ranks, when reported.
    #[serde(default)]
    pub taxonomy: Classification,
}

impl Detection {
    /// Best available name: the species when known, else the label.
    #[must_use]
    pub fn name(&self) -> &str {
        self.species.as_deref().unwrap_or(&self.label)
    }
}

/// Facts about an animal returned by a facts lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalFacts {
    /// Common name.
    pub name: String,
    /// Taxonomic ranks keyed by rank name.
    #[serde(default)]
    pub taxonomy: BTreeMap<String, String>,
    /// Regions or habitats where the animal lives.
    #[serde(default)]
    pub locations: Vec<String>,
    /// Free-form characteristics such as diet or lifespan.
    #[serde(default)]
    pub characteristics: BTreeMap<String, String>,
}
