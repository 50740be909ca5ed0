//! Canonical bird observation items.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single sighting normalized from a bird-observation provider.
///
/// `observation_id` is the stable upstream identifier and doubles as the
/// deduplication key across regional fan-out branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Display name: common name, falling back to the scientific name.
    pub species: String,
    /// Latin binomial, when reported.
    #[serde(default)]
    pub scientific_name: Option<String>,
    /// WGS84 latitude.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// WGS84 longitude.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Observation date as reported upstream.
    #[serde(default)]
    pub observed_at: Option<String>,
    /// Human readable location name.
    #[serde(default)]
    pub location_name: Option<String>,
    /// Reported individual count; absent when only presence was noted.
    #[serde(default)]
    pub count: Option<u64>,
    /// Stable upstream identifier.
    pub observation_id: String,
}

impl Observation {
    /// Whether `needle` occurs in the display or scientific name.
    ///
    /// `needle` must already be lower-cased.
    #[must_use]
    pub fn matches_species(&self, needle: &str) -> bool {
        self.species.to_lowercase().contains(needle)
            || self
                .scientific_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle))
    }
}

/// Collapse observations sharing an identifier, keeping the first seen.
///
/// # Examples
///
/// ```
/// use fauna_core::{Observation, dedup_by_id};
///
/// let sighting = |id: &str, species: &str| Observation {
///     species: species.into(),
///     scientific_name: None,
///     latitude: None,
///     longitude: None,
///     observed_at: None,
///     location_name: None,
///     count: None,
///     observation_id: id.into(),
/// };
/// let unique = dedup_by_id(vec![sighting("a", "Robin"), sighting("a", "Wren")]);
/// assert_eq!(unique.len(), 1);
/// assert_eq!(unique[0].species, "Robin");
/// ```
#[must_use]
pub fn dedup_by_id<I>(observations: I) -> Vec<Observation>
where
    I: IntoIterator<Item = Observation>,
{
    let mut seen = HashSet::new();
    observations
        .into_iter()
        .filter(|observation| seen.insert(observation.observation_id.clone()))
        .collect()
}
