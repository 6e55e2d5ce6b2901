//! Tally Artifact Store
//!
//! Persists serialized aggregates as flat files and serves them back by name.
//!
//! # Core Concepts
//!
//! - [`ArtifactStore`]: one managed directory, constructed once and shared
//! - [`ArtifactName`]: validated single-component file name; every lookup goes
//!   through it, so no request can resolve outside the store root
//! - [`ArtifactWriter`]: `std::io::Write` sink that publishes atomically on commit
//!
//! # Example
//!
//! ```rust,ignore
//! use std::io::Write;
//! use tally_store::ArtifactStore;
//!
//! let store = ArtifactStore::open("processed_files", "city_sales").await?;
//!
//! let mut writer = store.create()?;
//! writer.write_all(b"New York,1950.5\n")?;
//! let name = writer.commit()?;
//!
//! let (_, bytes) = store.read(name.as_str()).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod name;
mod store;

pub use error::StoreError;
pub use name::{ArtifactName, NameError, MAX_NAME_LEN};
pub use store::{validate_prefix, ArtifactStore, ArtifactWriter, ARTIFACT_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
