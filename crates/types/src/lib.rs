//! # Regindex Types
//!
//! Validated identifiers and persisted document shapes shared by every
//! pipeline stage.
//!
//! ## Model
//!
//! ```text
//! ProviderAddr / ModuleAddr      -- case-normalized addresses
//!     │
//!     ├──> VersionNumber         -- semver, leading `v` stripped
//!     │      └─> VersionDescriptor {id, published}
//!     │
//!     ├──> StoragePath           -- validated slash-separated keys
//!     │
//!     └──> ProviderVersionDoc / ModuleVersionDoc
//!            └─> Docs {index, resources, datasources, functions, guides, ephemeral}
//! ```
//!
//! Everything here round-trips through `serde_json`; the storage and search
//! layers persist these shapes verbatim.

mod addr;
mod docs;
mod entity;
mod error;
mod license;
mod path;
mod version;

pub use addr::{ModuleAddr, ProviderAddr};
pub use docs::{
    normalize_doc_name, validate_doc_name, CdktfLanguage, DocCategory, DocItem, DocItemDetails,
    Docs, CDKTF_LANGUAGES,
};
pub use entity::{
    ModuleDescriptor, ModuleDetails, ModuleList, ModuleOutput, ModuleVariable, ModuleVersionDoc,
    ProviderDescriptor, ProviderList, ProviderVersionDoc,
};
pub use error::{Result, TypesError};
pub use license::{License, LicenseList};
pub use path::StoragePath;
pub use version::{VersionDescriptor, VersionNumber};
