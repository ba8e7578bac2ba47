//! # Regindex License
//!
//! License detection policy for scraped repositories.
//!
//! The actual text matching is a pluggable primitive ([`LicenseMatcher`]);
//! this crate owns the policy around it: confidence thresholds, candidate
//! filtering, directory preference, and compatibility tagging.

mod detector;
mod error;
mod keyword;

pub use detector::{LicenseDetector, DEFAULT_COMPATIBLE_LICENSES, T_HIGH, T_LOW};
pub use error::{LicenseError, Result};
pub use keyword::KeywordMatcher;

use async_trait::async_trait;
use std::path::Path;

/// One raw match from the underlying matcher, before policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseCandidate {
    pub spdx_id: String,
    /// Path of the matched file, relative to the scanned directory.
    pub file: String,
    pub confidence: f64,
}

/// The library primitive: scans a directory snapshot and yields candidate
/// license matches. Implementations must not apply policy.
#[async_trait]
pub trait LicenseMatcher: Send + Sync {
    async fn candidates(&self, dir: &Path) -> Result<Vec<LicenseCandidate>>;
}
