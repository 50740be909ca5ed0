//! Flows combining several providers.

use std::collections::BTreeSet;

use fauna_core::{AnimalFacts, Detection, LocationMap, ProviderError};
use serde::Serialize;

use crate::facts::FactsProvider;
use crate::geocoding::GeocodingProvider;
use crate::http::HttpTransport;
use crate::recognition::{ImageRecognitionProvider, ImageUpload, best_detection};

/// Where an animal lives, geocoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimalRangeMap {
    /// Animal name as queried.
    pub animal: String,
    /// Distinct habitat locations reported by the facts lookup, sorted.
    pub locations: Vec<String>,
    /// Geocoded habitat locations.
    pub map: LocationMap,
}

/// Result of [`identify_image`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    /// Highest-confidence detection.
    pub detection: Detection,
    /// Facts for the detected animal; empty when the lookup failed.
    pub facts: Vec<AnimalFacts>,
}

/// Look up where `animal` lives and geocode those places.
///
/// Returns `Ok(None)` when the facts lookup reports no locations.
///
/// # Errors
///
/// Propagates facts lookup failures. Geocoding failures only leave gaps in
/// the map.
pub async fn animal_range_map<F, G>(
    facts: &FactsProvider<F>,
    geocoder: &GeocodingProvider<G>,
    animal: &str,
) -> Result<Option<AnimalRangeMap>, ProviderError>
where
    F: HttpTransport,
    G: HttpTransport,
{
    let locations: BTreeSet<String> = facts
        .lookup(animal)
        .await?
        .into_iter()
        .flat_map(|entry| entry.locations)
        .collect();
    if locations.is_empty() {
        log::info!("no habitat locations known for {animal:?}");
        return Ok(None);
    }

    let locations: Vec<String> = locations.into_iter().collect();
    let map = geocoder.get_map_for_locations(&locations).await;
    Ok(Some(AnimalRangeMap {
        animal: animal.to_owned(),
        locations,
        map,
    }))
}

/// Detect the animal in `image` and attach facts about it.
///
/// Returns `Ok(None)` when nothing was detected. A failed facts lookup is
/// logged and leaves [`Identification::facts`] empty.
///
/// # Errors
///
/// Propagates recognition failures.
pub async fn identify_image<R, F>(
    recognizer: &ImageRecognitionProvider<R>,
    facts: &FactsProvider<F>,
    image: &ImageUpload,
) -> Result<Option<Identification>, ProviderError>
where
    R: HttpTransport,
    F: HttpTransport,
{
    let detections = recognizer.detect(image).await?;
    let Some(detection) = best_detection(&detections).cloned() else {
        log::info!("no animal detected in {}", image.file_name);
        return Ok(None);
    };

    let facts = match facts.lookup(detection.name()).await {
        Ok(facts) => facts,
        Err(err) => {
            log::warn!("facts lookup for {:?} failed: {err}", detection.name());
            Vec::new()
        }
    };
    Ok(Some(Identification { detection, facts }))
}
