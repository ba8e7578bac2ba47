use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_PATH_LEN: usize = 255;

/// A validated, slash-separated relative storage key.
///
/// Every boundary call into the storage layer goes through this type, so a
/// path that traverses upward or smuggles in an absolute component can never
/// reach a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() || path.len() > MAX_PATH_LEN {
            return Err(TypesError::InvalidPath(path));
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(TypesError::InvalidPath(path));
        }
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(TypesError::InvalidPath(path));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            {
                return Err(TypesError::InvalidPath(path));
            }
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends another relative path, re-validating the result.
    pub fn join(&self, rest: &str) -> Result<Self> {
        Self::new(format!("{}/{}", self.0, rest))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File extension (after the last dot of the file name), if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl FromStr for StoragePath {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StoragePath> for String {
    fn from(value: StoragePath) -> Self {
        value.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_keys() {
        for ok in [
            "index.json",
            "providers/acme/foo/1.2.3/resources/widget.md",
            "a-b_c.d/e",
        ] {
            assert!(StoragePath::new(ok).is_ok(), "expected {ok:?} to validate");
        }
    }

    #[test]
    fn rejects_traversal_and_absolute() {
        for bad in [
            "",
            "/abs",
            "trailing/",
            "a//b",
            "a/../b",
            "./a",
            "a/./b",
            "has space",
            "uni\u{00e9}code",
        ] {
            assert!(StoragePath::new(bad).is_err(), "expected {bad:?} to fail");
        }
    }

    #[test]
    fn rejects_overlong() {
        let long = "a/".repeat(130) + "b";
        assert!(StoragePath::new(long).is_err());
    }

    #[test]
    fn join_revalidates() {
        let base = StoragePath::new("providers/acme").unwrap();
        assert_eq!(
            base.join("foo/index.json").unwrap().as_str(),
            "providers/acme/foo/index.json"
        );
        assert!(base.join("../escape").is_err());
    }

    #[test]
    fn extension_and_file_name() {
        let path = StoragePath::new("providers/acme/index.json").unwrap();
        assert_eq!(path.file_name(), "index.json");
        assert_eq!(path.extension(), Some("json"));
        let bare = StoragePath::new("README").unwrap();
        assert_eq!(bare.extension(), None);
    }
}
