use crate::error::Result;
use crate::{LicenseCandidate, LicenseMatcher};
use regindex_types::{License, LicenseList};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Candidates below this confidence are discarded.
pub const T_LOW: f64 = 0.85;
/// A candidate at or above this confidence short-circuits the whole list.
pub const T_HIGH: f64 = 0.98;

/// SPDX identifiers whose docs may be redistributed by default.
pub const DEFAULT_COMPATIBLE_LICENSES: [&str; 10] = [
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "ISC",
    "MIT",
    "MPL-2.0",
    "0BSD",
    "Unlicense",
    "Zlib",
    "CC0-1.0",
];

const PREFERRED_DIRS: [&str; 4] = ["docs/", "doc/", "website/docs/", "documentation/"];
const IGNORED_DIRS: [&str; 3] = ["vendor/", "node_modules/", "examples/"];

/// Applies detection policy on top of a [`LicenseMatcher`].
pub struct LicenseDetector {
    matcher: Arc<dyn LicenseMatcher>,
    compatible: HashSet<String>,
    t_low: f64,
    t_high: f64,
}

impl LicenseDetector {
    pub fn new(matcher: Arc<dyn LicenseMatcher>) -> Self {
        Self::with_allow_list(
            matcher,
            DEFAULT_COMPATIBLE_LICENSES.iter().map(|s| s.to_string()),
        )
    }

    pub fn with_allow_list(
        matcher: Arc<dyn LicenseMatcher>,
        compatible: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            matcher,
            compatible: compatible.into_iter().collect(),
            t_low: T_LOW,
            t_high: T_HIGH,
        }
    }

    /// Scans `dir` and returns the policy-filtered license list.
    ///
    /// `file_link` synthesizes a human view URL for a matched file; it may
    /// return `None` for hosts without web access.
    pub async fn detect(
        &self,
        dir: &Path,
        file_link: impl Fn(&str) -> Option<String>,
    ) -> Result<LicenseList> {
        let mut candidates = self.matcher.candidates(dir).await?;
        candidates.retain(|c| c.confidence >= self.t_low && !is_excluded(&c.file));
        sort_by_preference(&mut candidates);

        // A near-certain match in the most preferred location stands alone.
        if let Some(best) = candidates.iter().find(|c| c.confidence >= self.t_high) {
            let best = best.clone();
            return Ok(LicenseList(vec![self.to_license(&best, &file_link)]));
        }

        Ok(LicenseList(
            candidates
                .iter()
                .map(|c| self.to_license(c, &file_link))
                .collect(),
        ))
    }

    fn to_license(
        &self,
        candidate: &LicenseCandidate,
        file_link: &impl Fn(&str) -> Option<String>,
    ) -> License {
        License {
            spdx_id: candidate.spdx_id.clone(),
            confidence: candidate.confidence,
            is_compatible: self.compatible.contains(&candidate.spdx_id),
            file: candidate.file.clone(),
            link: file_link(&candidate.file).unwrap_or_default(),
        }
    }
}

fn is_excluded(file: &str) -> bool {
    let normalized = file.replace('\\', "/");
    let name = normalized.rsplit('/').next().unwrap_or(&normalized);
    let upper = name.to_ascii_uppercase();
    if upper.starts_with("THIRD_PARTY_LICENSES") || upper == "PATENTS" || upper == "NOTICE" {
        return true;
    }
    let lower = normalized.to_ascii_lowercase();
    if IGNORED_DIRS
        .iter()
        .any(|d| lower.starts_with(d) || lower.contains(&format!("/{d}")))
    {
        return true;
    }
    lower.contains("test")
}

fn sort_by_preference(candidates: &mut [LicenseCandidate]) {
    candidates.sort_by(|a, b| {
        preference_rank(&a.file)
            .cmp(&preference_rank(&b.file))
            .then_with(|| depth(&a.file).cmp(&depth(&b.file)))
            .then_with(|| a.file.cmp(&b.file))
    });
}

fn preference_rank(file: &str) -> usize {
    let lower = file.to_ascii_lowercase();
    PREFERRED_DIRS
        .iter()
        .position(|d| lower.starts_with(d))
        .unwrap_or(PREFERRED_DIRS.len())
}

fn depth(file: &str) -> usize {
    file.matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as LicenseResult;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FixedMatcher(Vec<LicenseCandidate>);

    #[async_trait]
    impl LicenseMatcher for FixedMatcher {
        async fn candidates(&self, _dir: &Path) -> LicenseResult<Vec<LicenseCandidate>> {
            Ok(self.0.clone())
        }
    }

    fn candidate(spdx: &str, file: &str, confidence: f64) -> LicenseCandidate {
        LicenseCandidate {
            spdx_id: spdx.into(),
            file: file.into(),
            confidence,
        }
    }

    async fn detect(candidates: Vec<LicenseCandidate>) -> LicenseList {
        LicenseDetector::new(Arc::new(FixedMatcher(candidates)))
            .detect(Path::new("/unused"), |_| None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn low_confidence_is_dropped() {
        let list = detect(vec![candidate("MIT", "LICENSE", 0.5)]).await;
        assert!(list.is_empty());
        assert!(!list.is_redistributable());
    }

    #[tokio::test]
    async fn excluded_files_are_dropped() {
        let list = detect(vec![
            candidate("MIT", "vendor/dep/LICENSE", 0.99),
            candidate("MIT", "examples/LICENSE", 0.99),
            candidate("MIT", "THIRD_PARTY_LICENSES.txt", 0.99),
            candidate("MIT", "PATENTS", 0.99),
            candidate("MIT", "testdata/LICENSE", 0.99),
        ])
        .await;
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn high_confidence_short_circuits() {
        let list = detect(vec![
            candidate("MIT", "LICENSE", 0.99),
            candidate("Apache-2.0", "other/LICENSE", 0.90),
        ])
        .await;
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].spdx_id, "MIT");
        assert!(list.is_redistributable());
    }

    #[tokio::test]
    async fn preference_ranks_doc_dirs_then_depth() {
        let list = detect(vec![
            candidate("MIT", "a/b/LICENSE", 0.9),
            candidate("Apache-2.0", "docs/LICENSE", 0.9),
            candidate("MPL-2.0", "LICENSE", 0.9),
        ])
        .await;
        let files: Vec<&str> = list.0.iter().map(|l| l.file.as_str()).collect();
        assert_eq!(files, vec!["docs/LICENSE", "LICENSE", "a/b/LICENSE"]);
    }

    #[tokio::test]
    async fn incompatible_spdx_is_tagged() {
        let list = detect(vec![candidate("GPL-3.0", "LICENSE", 0.99)]).await;
        assert_eq!(list.0.len(), 1);
        assert!(!list.0[0].is_compatible);
        assert!(!list.is_redistributable());
    }
}
