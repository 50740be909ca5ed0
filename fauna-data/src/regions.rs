//! Region codes used by the bird-observation fan-out.
//!
//! The upstream API answers per country; there is no global endpoint. A
//! `"world"` query is therefore expanded into a configurable list of
//! representative countries.

/// Region name that expands into the configured world list.
pub const WORLD: &str = "world";

/// Representative countries queried for `"world"` by default.
pub const DEFAULT_WORLD_REGIONS: [&str; 16] = [
    "US", "CA", "GB", "DE", "FR", "ES", "IT", "AU", "BR", "IN", "CN", "RU", "ZA", "MX", "AR", "JP",
];

/// Countries visited by the daily collection run by default.
pub const DEFAULT_DAILY_REGIONS: [&str; 10] =
    ["US", "ES", "GB", "FR", "DE", "IT", "CA", "AU", "BR", "MX"];

const COUNTRY_NAMES: [(&str, &str); 18] = [
    ("spain", "ES"),
    ("usa", "US"),
    ("united states", "US"),
    ("canada", "CA"),
    ("france", "FR"),
    ("germany", "DE"),
    ("italy", "IT"),
    ("uk", "GB"),
    ("united kingdom", "GB"),
    ("brazil", "BR"),
    ("australia", "AU"),
    ("india", "IN"),
    ("china", "CN"),
    ("russia", "RU"),
    ("south africa", "ZA"),
    ("mexico", "MX"),
    ("argentina", "AR"),
    ("japan", "JP"),
];

/// Owned copy of [`DEFAULT_WORLD_REGIONS`].
#[must_use]
pub fn default_world_regions() -> Vec<String> {
    DEFAULT_WORLD_REGIONS.iter().map(|code| (*code).to_owned()).collect()
}

/// Owned copy of [`DEFAULT_DAILY_REGIONS`].
#[must_use]
pub fn default_daily_regions() -> Vec<String> {
    DEFAULT_DAILY_REGIONS.iter().map(|code| (*code).to_owned()).collect()
}

/// Regions to query for `region`: the world list for [`WORLD`], otherwise
/// `region` itself.
#[must_use]
pub fn expand_region(region: &str, world: &[String]) -> Vec<String> {
    if region.trim().eq_ignore_ascii_case(WORLD) {
        world.to_vec()
    } else {
        vec![region.trim().to_owned()]
    }
}

/// Map a free-text country name to a region code.
///
/// Known country names and [`WORLD`] are matched case-insensitively; any
/// other two-letter input is taken as a code and upper-cased.
///
/// # Examples
///
/// ```
/// use fauna_data::regions::region_code_for;
///
/// assert_eq!(region_code_for("United Kingdom").as_deref(), Some("GB"));
/// assert_eq!(region_code_for("nz").as_deref(), Some("NZ"));
/// assert_eq!(region_code_for("Atlantis"), None);
/// ```
#[must_use]
pub fn region_code_for(name: &str) -> Option<String> {
    let lowered = name.trim().to_lowercase();
    if lowered == WORLD {
        return Some(WORLD.to_owned());
    }
    if let Some((_, code)) = COUNTRY_NAMES.iter().find(|(known, _)| *known == lowered) {
        return Some((*code).to_owned());
    }
    let is_code = lowered.len() == 2 && lowered.chars().all(|c| c.is_ascii_alphabetic());
    is_code.then(|| lowered.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("spain", Some("ES"))]
    #[case("USA", Some("US"))]
    #[case("Canada", Some("CA"))]
    #[case("  South Africa ", Some("ZA"))]
    #[case("World", Some("world"))]
    #[case("de", Some("DE"))]
    #[case("d3", None)]
    #[case("Narnia", None)]
    fn maps_country_names(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(region_code_for(input).as_deref(), expected);
    }

    #[rstest]
    fn world_expands_to_configured_list() {
        let world = vec!["US".to_owned(), "GB".to_owned()];
        assert_eq!(expand_region("world", &world), world);
        assert_eq!(expand_region("ES", &world), vec!["ES".to_owned()]);
    }

    #[rstest]
    fn default_world_list_has_sixteen_distinct_codes() {
        let mut codes = default_world_regions();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 16);
    }
}
