//! triplify-auth — Accounts and sessions.
//!
//! Users are rows in a dedicated named graph of the same triplestore the
//! data lives in. Sessions are server-side, keyed by an opaque cookie
//! token.

pub mod session;
pub mod users;

pub use session::{Session, SessionStore};
pub use users::{UserRecord, UserStore};
