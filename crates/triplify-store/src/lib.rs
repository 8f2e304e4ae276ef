//! triplify-store — Client-side plumbing for the external SPARQL
//! triplestore: the HTTP client, SPARQL text builders, the chunked triple
//! loader with rollback, endpoint registry, federation and job records.

pub mod assemble;
pub mod builder;
pub mod client;
pub mod endpoints;
pub mod federation;
pub mod graph;
pub mod jobs;
pub mod loader;
pub mod stats;

pub use builder::{Access, AccessLevel, QueryBuilder, QueryParts};
pub use client::{Row, SparqlClient, StoreEndpoint};
pub use loader::TripleLoader;
