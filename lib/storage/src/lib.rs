//! # basketx Storage
//!
//! Persists trained recommendation models as compressed artifacts with a
//! checksummed manifest, and loads them back into a
//! [`ModelSnapshot`](basketx_core::ModelSnapshot) for serving.

pub mod artifacts;
pub mod error;

pub use artifacts::{ArtifactStore, Manifest, FORMAT_VERSION, MANIFEST_FILE};
pub use error::{Result, StorageError};
