//! Planning and merging of the per-region, per-code fan-out.

use std::collections::HashSet;

use serde_json::Value;

use super::normalize::observation_key;
use crate::regions::expand_region;

/// One upstream call of a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchPair {
    pub(crate) region: String,
    /// Species code, empty for "all species".
    pub(crate) code: String,
}

/// Every `(region, code)` pair to fetch, code-major.
pub(crate) fn plan(region: &str, codes: &[String], world: &[String]) -> Vec<FetchPair> {
    let regions = expand_region(region, world);
    codes
        .iter()
        .flat_map(|code| {
            regions.iter().map(move |region| FetchPair {
                region: region.clone(),
                code: code.clone(),
            })
        })
        .collect()
}

/// Fan-out results merged by observation identifier.
#[derive(Debug, Default)]
pub(crate) struct Aggregate {
    seen: HashSet<String>,
    items: Vec<Value>,
}

impl Aggregate {
    /// Keep `item` unless it lacks an identifier or repeats one already kept.
    pub(crate) fn push(mut self, item: Value) -> Self {
        if let Some(key) = observation_key(&item)
            && self.seen.insert(key)
        {
            self.items.push(item);
        }
        self
    }

    pub(crate) fn into_items(self) -> Vec<Value> {
        self.items
    }
}
