//! # Regindex Search
//!
//! The search change log: an in-process meta index accumulating add and
//! remove records across a run, emitted as an ordered NDJSON stream for the
//! downstream loader.
//!
//! ## Stream shape
//!
//! ```text
//! {"type":"header","header":{"last_updated":"..."}}
//! {"type":"delete","deletion":{"id":"...","deleted_at":"..."}}   (all tombstones)
//! {"type":"add","addition":{...}}                                 (all live items)
//! ```

mod error;
mod meta;
mod record;

pub use error::{Result, SearchError};
pub use meta::{MetaIndex, MetaIndexState};
pub use record::{IndexItem, IndexType, SearchRecord, StreamDeletion, StreamHeader};

use regindex_storage::BufferedStorage;
use regindex_types::StoragePath;

pub const META_INDEX_KEY: &str = "metaindex.json";
pub const STREAM_KEY: &str = "search.ndjson";
/// Legacy key written alongside [`STREAM_KEY`] for older loaders.
pub const STREAM_KEY_COMPAT: &str = "search.json";

/// Loads a prior meta index from storage, or starts empty when absent.
pub async fn load_meta_index(storage: &BufferedStorage) -> Result<MetaIndex> {
    let path = key(META_INDEX_KEY)?;
    match storage.read(&path).await {
        Ok(bytes) => {
            let state: MetaIndexState = serde_json::from_slice(&bytes)?;
            Ok(MetaIndex::from_state(state))
        }
        Err(e) if e.is_not_found() => Ok(MetaIndex::default()),
        Err(e) => Err(e.into()),
    }
}

/// Persists the meta index and uploads the generated stream.
pub async fn store_meta_index(storage: &BufferedStorage, index: &MetaIndex) -> Result<()> {
    let stream = index.generate()?;
    let state = serde_json::to_vec_pretty(&index.state())?;

    storage.write(&key(META_INDEX_KEY)?, &state).await?;
    storage.write(&key(STREAM_KEY)?, stream.as_bytes()).await?;
    storage
        .write(&key(STREAM_KEY_COMPAT)?, stream.as_bytes())
        .await?;
    Ok(())
}

fn key(name: &str) -> Result<StoragePath> {
    Ok(StoragePath::new(name).map_err(regindex_storage::StorageError::from)?)
}
