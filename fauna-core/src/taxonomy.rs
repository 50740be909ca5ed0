use serde::{Deserialize, Serialize};

/// One entry of the species reference list used to resolve free-text names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyEntry {
    /// English common name.
    pub common_name: String,
    /// Latin binomial.
    pub scientific_name: String,
    /// Provider species code.
    pub code: String,
}

impl TaxonomyEntry {
    /// Build an entry from its three names.
    #[must_use]
    pub fn new(
        common_name: impl Into<String>,
        scientific_name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            common_name: common_name.into(),
            scientific_name: scientific_name.into(),
            code: code.into(),
        }
    }
}
