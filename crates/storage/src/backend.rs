use crate::error::Result;
use async_trait::async_trait;
use regindex_types::StoragePath;

/// Capability interface over one object store.
///
/// `read` must return [`crate::StorageError::NotFound`] for an absent key and
/// only for an absent key. `write` is idempotent for identical bytes and
/// creates any intermediate structure the backend needs. `remove_all` removes
/// every object under `prefix/`; it is not required to be atomic.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn read(&self, path: &StoragePath) -> Result<Vec<u8>>;

    async fn write(&self, path: &StoragePath, bytes: &[u8]) -> Result<()>;

    async fn remove_all(&self, prefix: &StoragePath) -> Result<()>;
}

/// Content type attached to uploads, keyed by file extension.
pub fn content_type_for(path: &StoragePath) -> &'static str {
    match path.extension() {
        Some("html") => "text/html",
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        let cases = [
            ("index.html", "text/html"),
            ("providers/index.json", "application/json"),
            ("docs/widget.md", "text/markdown"),
            ("openapi.yml", "application/octet-stream"),
            ("README", "application/octet-stream"),
        ];
        for (path, expected) in cases {
            let path = StoragePath::new(path).unwrap();
            assert_eq!(content_type_for(&path), expected, "for {path}");
        }
    }
}
