//! # Regindex Registry
//!
//! Read-only view over a cloned registry repository: a git tree of JSON
//! metadata files enumerating providers, modules, their version lists, and
//! provider aliases.
//!
//! Expected tree:
//!
//! ```text
//! <root>/
//!   aliases.json                      -- {"providers": {"alias/addr": "canonical/addr"}}
//!   providers/<ns>/<name>.json        -- RegistryEntryFile
//!   modules/<ns>/<name>/<target>.json -- RegistryEntryFile
//! ```

mod error;
mod filter;
mod source;

pub use error::{RegistryError, Result};
pub use filter::Filter;
pub use source::{ModuleEntry, ProviderEntry, RegistryEntryFile, RegistrySource};
