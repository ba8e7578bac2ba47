use crate::error::{Result, TypesError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A normalized semantic version.
///
/// Parsing strips a single leading `v`; ordering follows semver precedence.
/// The serialized form is always the normalized string, so
/// `parse(parse(x).to_string()) == parse(x)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionNumber(semver::Version);

impl VersionNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let parsed = semver::Version::parse(stripped)
            .map_err(|e| TypesError::InvalidVersion(format!("{raw}: {e}")))?;
        Ok(Self(parsed))
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

    /// Sorts a version list in place, highest first, dropping duplicates.
    pub fn sort_descending(versions: &mut Vec<VersionNumber>) {
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();
    }
}

impl FromStr for VersionNumber {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Serialize for VersionNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionNumber {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionNumber::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A version entry in an entity listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub id: VersionNumber,
    pub published: DateTime<Utc>,
}

impl VersionDescriptor {
    /// Sorts descriptors in place, highest version first, dropping duplicate ids.
    pub fn sort_descending(descriptors: &mut Vec<VersionDescriptor>) {
        descriptors.sort_by(|a, b| b.id.cmp(&a.id));
        descriptors.dedup_by(|a, b| a.id == b.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_strips_leading_v() {
        let a = VersionNumber::parse("v1.2.3").unwrap();
        let b = VersionNumber::parse("1.2.3").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1.2.3");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(VersionNumber::parse("not-a-version").is_err());
        assert!(VersionNumber::parse("").is_err());
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = VersionNumber::parse("v2.0.0-rc.1").unwrap();
        let twice = VersionNumber::parse(&once.to_string()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn sort_descending_dedups() {
        let mut versions = vec![
            VersionNumber::parse("1.0.0").unwrap(),
            VersionNumber::parse("2.1.0").unwrap(),
            VersionNumber::parse("v1.0.0").unwrap(),
            VersionNumber::parse("2.0.0").unwrap(),
        ];
        VersionNumber::sort_descending(&mut versions);
        let ids: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(ids, vec!["2.1.0", "2.0.0", "1.0.0"]);
    }

    #[test]
    fn prerelease_sorts_below_release() {
        let mut versions = vec![
            VersionNumber::parse("1.0.0-beta.1").unwrap(),
            VersionNumber::parse("1.0.0").unwrap(),
        ];
        VersionNumber::sort_descending(&mut versions);
        assert_eq!(versions[0].to_string(), "1.0.0");
    }

    #[test]
    fn descriptor_round_trips() {
        let descriptor = VersionDescriptor {
            id: VersionNumber::parse("v1.2.3").unwrap(),
            published: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: VersionDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
        assert!(json.contains("\"id\":\"1.2.3\""));
    }
}
