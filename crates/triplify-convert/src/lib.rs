//! triplify-convert — Source files to RDF triples.
//!
//! A source file (tabular, GFF3, BED, Turtle, or a remote document) is
//! turned into three triple streams: the content itself, the abstraction
//! (the schema the query UI navigates), and the domain knowledge
//! (category members). The loader in triplify-store does the shipping.

pub mod abstraction;
pub mod bed;
pub mod external;
pub mod gff;
pub mod paths;
pub mod source_file;
pub mod tabular;
pub mod ttl;

pub use paths::UserDirs;
pub use source_file::{detect_kind, PersistOutcome, SourceKind};
