//! Ranking of taxonomy matches for a free-text query.

use std::collections::HashSet;

use fauna_core::TaxonomyEntry;

/// Entries whose common or scientific name contains `query`, best first.
///
/// Matching is case-insensitive. An exact common-name match ranks first;
/// the rest follow by ascending common-name length so concise canonical
/// names beat incidental substring hits. Ties keep reference-list order.
#[must_use]
pub fn rank_matches<'a>(entries: &'a [TaxonomyEntry], query: &str) -> Vec<&'a TaxonomyEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<(bool, usize, &TaxonomyEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let common = entry.common_name.to_lowercase();
            let scientific = entry.scientific_name.to_lowercase();
            (common.contains(&needle) || scientific.contains(&needle)).then(|| {
                let inexact = common != needle;
                (inexact, entry.common_name.chars().count(), entry)
            })
        })
        .collect();
    matches.sort_by_key(|(inexact, length, _)| (*inexact, *length));
    matches.into_iter().map(|(_, _, entry)| entry).collect()
}

/// Up to `limit` distinct codes from ranked entries, in rank order.
#[must_use]
pub fn distinct_codes<'a, I>(ranked: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a TaxonomyEntry>,
{
    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|entry| seen.insert(entry.code.as_str()))
        .take(limit)
        .map(|entry| entry.code.clone())
        .collect()
}
