use serde::{Deserialize, Serialize};

/// One detected license file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub spdx_id: String,
    /// Match confidence reported by the underlying matcher, in `[0, 1]`.
    pub confidence: f64,
    pub is_compatible: bool,
    /// Repository-relative path of the matched file.
    pub file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}

/// The detected licenses of one version, in preference order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseList(pub Vec<License>);

impl LicenseList {
    /// A version's docs may be redistributed iff at least one license was
    /// found and none of them is incompatible.
    pub fn is_redistributable(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|l| l.is_compatible)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
