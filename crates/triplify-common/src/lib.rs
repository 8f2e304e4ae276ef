//! triplify-common — Shared error type, RDF prefix registry and URI encoding
//! used across all Triplify crates.

pub mod error;
pub mod prefixes;
pub mod uri;

pub use error::{Result, TriplifyError};
pub use prefixes::PrefixRegistry;
