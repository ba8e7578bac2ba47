//! # Regindex Scraper
//!
//! Turns one checked-out version of a provider or module repository into
//! the artifacts the registry serves: normalized markdown pages in object
//! storage plus the structured version document (`index.json` contents).
//!
//! Providers are walked through [`layout`]: the documentation root
//! (`website/docs/` or `docs/`), category directories and CDKTF language
//! subtrees. Modules contribute READMEs and extracted schemas for the root,
//! `modules/<name>` and `examples/<name>` directories. Versions whose
//! licenses do not permit redistribution keep their document tree, with
//! every body replaced by a fixed placeholder.

mod doc;
mod error;
mod frontmatter;
mod layout;
mod module;
mod provider;
mod schema;

pub use doc::{INCOMPATIBLE_LICENSE_TEXT, MAX_DOC_BYTES};
pub use error::{Result, SchemaError, ScraperError};
pub use frontmatter::Frontmatter;
pub use layout::{DocSource, DocTree};
pub use module::{scrape_module_version, ModuleScrape};
pub use provider::{scrape_provider_version, ProviderScrape};
pub use schema::{strip_ansi, BinaryProvisioner, ModuleSchema, SchemaExtractor};
