//! Mapping of upstream observation payloads onto [`Observation`].

use fauna_core::{Observation, dedup_by_id};
use serde_json::Value;

use crate::fields;

/// Species label used when an item carries no usable name at all.
pub const UNIDENTIFIED: &str = "unidentified";

/// Deduplication key of an upstream item: `obsId`, else `subId`.
pub(crate) fn observation_key(item: &Value) -> Option<String> {
    fields::text(item, "obsId").or_else(|| fields::text(item, "subId"))
}

/// Normalize one upstream item; `None` when it carries no identifier.
pub(crate) fn normalize_observation(item: &Value) -> Option<Observation> {
    let observation_id = observation_key(item)?;
    let scientific_name = fields::text(item, "sciName");
    let species = fields::text(item, "comName")
        .or_else(|| scientific_name.clone())
        .or_else(|| fields::text(item, "speciesCode"))
        .unwrap_or_else(|| UNIDENTIFIED.to_owned());

    Some(Observation {
        species,
        scientific_name,
        latitude: fields::number(item, "lat"),
        longitude: fields::number(item, "lng"),
        observed_at: fields::text(item, "obsDt"),
        location_name: fields::text(item, "locName"),
        count: fields::unsigned(item, "howMany"),
        observation_id,
    })
}

/// Normalize a batch of upstream items.
///
/// Items without an identifier are dropped and repeated identifiers keep
/// their first occurrence.
///
/// # Examples
///
/// ```
/// use fauna_data::ebird::normalize_observations;
/// use serde_json::json;
///
/// let items = normalize_observations(&[
///     json!({"obsId": "OBS1", "sciName": "Turdus migratorius"}),
///     json!({"comName": "No identifier"}),
/// ]);
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].species, "Turdus migratorius");
/// ```
#[must_use]
pub fn normalize_observations(raw: &[Value]) -> Vec<Observation> {
    dedup_by_id(raw.iter().filter_map(normalize_observation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn maps_upstream_fields() {
        let item = json!({
            "obsId": "OBS123",
            "subId": "S456",
            "comName": "American Robin",
            "sciName": "Turdus migratorius",
            "lat": 40.71,
            "lng": "-74.01",
            "obsDt": "2024-05-01 07:30",
            "locName": "Central Park",
            "howMany": 3
        });

        let observation = normalize_observation(&item).expect("identified item");

        assert_eq!(observation.observation_id, "OBS123");
        assert_eq!(observation.species, "American Robin");
        assert_eq!(observation.scientific_name.as_deref(), Some("Turdus migratorius"));
        assert_eq!(observation.latitude, Some(40.71));
        assert_eq!(observation.longitude, Some(-74.01));
        assert_eq!(observation.observed_at.as_deref(), Some("2024-05-01 07:30"));
        assert_eq!(observation.location_name.as_deref(), Some("Central Park"));
        assert_eq!(observation.count, Some(3));
    }

    #[rstest]
    #[case(json!({"subId": "S1", "comName": "Wren"}), "S1")]
    #[case(json!({"obsId": "  ", "subId": "S2"}), "S2")]
    fn falls_back_to_checklist_identifier(#[case] item: Value, #[case] expected: &str) {
        let observation = normalize_observation(&item).expect("identified item");
        assert_eq!(observation.observation_id, expected);
    }

    #[rstest]
    #[case(json!({"obsId": "1", "comName": "Robin", "sciName": "Erithacus rubecula"}), "Robin")]
    #[case(json!({"obsId": "1", "sciName": "Erithacus rubecula"}), "Erithacus rubecula")]
    #[case(json!({"obsId": "1", "speciesCode": "eurrob1"}), "eurrob1")]
    #[case(json!({"obsId": "1"}), UNIDENTIFIED)]
    fn species_name_falls_back(#[case] item: Value, #[case] expected: &str) {
        let observation = normalize_observation(&item).expect("identified item");
        assert_eq!(observation.species, expected);
    }

    #[rstest]
    fn unidentified_items_are_dropped() {
        let raw = vec![json!({"comName": "Robin"}), json!({"obsId": "A", "comName": "Wren"})];
        let items = normalize_observations(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].observation_id, "A");
    }

    #[rstest]
    fn presence_only_counts_stay_empty() {
        let item = json!({"obsId": "A", "comName": "Wren", "howMany": "X"});
        let observation = normalize_observation(&item).expect("identified item");
        assert_eq!(observation.count, None);
    }

    proptest! {
        #[test]
        fn output_ids_are_unique_and_first_seen(ids in prop::collection::vec("[a-e]", 0..30)) {
            let raw: Vec<Value> = ids
                .iter()
                .enumerate()
                .map(|(index, id)| json!({"obsId": id, "comName": format!("bird {index}")}))
                .collect();

            let items = normalize_observations(&raw);

            let mut expected: Vec<&String> = Vec::new();
            for id in &ids {
                if !expected.contains(&id) {
                    expected.push(id);
                }
            }
            let produced: Vec<&String> = items.iter().map(|item| &item.observation_id).collect();
            prop_assert_eq!(produced, expected);
            for item in &items {
                let first = ids.iter().position(|id| *id == item.observation_id);
                prop_assert_eq!(first.map(|index| format!("bird {index}")), Some(item.species.clone()));
            }
            prop_assert_eq!(normalize_observations(&raw), items);
        }
    }
}
