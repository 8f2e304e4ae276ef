//! Admin endpoints: server information and temp-directory cleanup.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::handlers::files::human_size;
use crate::state::SharedState;

fn dir_size(path: &std::path::Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// GET /server_informations
pub async fn server_informations(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;

    let files_dir = std::path::Path::new(&state.config.storage.files_dir);
    let dirs = state.user_dirs(&session);

    let values = vec![
        json!({ "key": "System", "value": std::env::consts::OS }),
        json!({ "key": "Architecture", "value": std::env::consts::ARCH }),
        json!({ "key": "Version", "value": env!("CARGO_PKG_VERSION") }),
        json!({ "key": "Triplestore endpoint", "value": state.config.triplestore.query_endpoint }),
        json!({ "key": "Files directory", "value": state.config.storage.files_dir }),
        json!({ "key": "Files directory size", "value": human_size(dir_size(files_dir)) }),
        json!({ "key": "Upload directory", "value": dirs.upload()?.display().to_string() }),
        json!({ "key": "Upload directory size", "value": human_size(dir_size(&dirs.upload()?)) }),
        json!({ "key": "Rdf directory", "value": dirs.rdf()?.display().to_string() }),
        json!({ "key": "Rdf directory size", "value": human_size(dir_size(&dirs.rdf()?)) }),
    ];

    Ok(Json(json!({ "values": values })))
}

/// POST /clean_tmp_directory — remove every generated ttl file of the
/// session user.
pub async fn clean_tmp_directory(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;

    let rdf_dir = state.user_dirs(&session).rdf()?;
    let mut removed = 0;
    for entry in std::fs::read_dir(&rdf_dir)?.flatten() {
        let path = entry.path();
        if path.is_file() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove file"),
            }
        }
    }
    Ok(Json(json!({ "removed": removed })))
}
