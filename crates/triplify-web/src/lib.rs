//! triplify-web — The HTTP layer: axum router, handlers and shared state.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, SharedState};
