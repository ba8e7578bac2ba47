//! JSON document helpers over the buffered store.

use regindex_storage::BufferedStorage;
use regindex_types::StoragePath;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub(crate) async fn read_json<T: DeserializeOwned>(
    storage: &BufferedStorage,
    key: &str,
) -> Result<Option<T>> {
    let path = StoragePath::new(key)?;
    match storage.read(&path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn write_json<T: Serialize>(
    storage: &BufferedStorage,
    key: &str,
    value: &T,
) -> Result<()> {
    let path = StoragePath::new(key)?;
    let bytes = serde_json::to_vec_pretty(value)?;
    storage.write(&path, &bytes).await?;
    Ok(())
}
