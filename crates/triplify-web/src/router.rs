//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin, auth, endpoints, files, graphs, integration, jobs, query, shortcuts,
};
use crate::state::{AppState, SharedState};

/// Genomic uploads are big; the default 2 MiB body cap is not enough.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Accounts
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/login_api", post(auth::login_api))
        .route("/logout", get(auth::logout))
        .route("/checkuser", get(auth::checkuser))
        .route("/nb_users", get(auth::nb_users))
        .route("/api_key", post(auth::api_key))
        .route("/renew_apikey", get(auth::renew_apikey))
        .route("/get_my_infos", get(auth::get_my_infos))
        .route("/update_mail", post(auth::update_mail))
        .route("/update_passwd", post(auth::update_passwd))
        .route("/get_users_infos", get(auth::get_users_infos))
        .route("/lock_user", post(auth::lock_user))
        .route("/set_admin", post(auth::set_admin))
        .route("/delete_user", post(auth::delete_user))

        // Files
        .route("/upload_file", post(files::upload_file))
        .route("/get_uploaded_files", get(files::get_uploaded_files))
        .route("/delete_uploaded_files", post(files::delete_uploaded_files))
        .route("/ttl/{username}/{name}", get(files::serve_ttl))
        .route("/csv/{name}", get(files::serve_csv))
        .route("/del_csv/{name}", get(files::delete_csv))

        // Preview and integration
        .route("/source_files_overview", post(integration::source_files_overview))
        .route("/guess_csv_header_type", post(integration::guess_csv_header_type))
        .route("/prefix_uri", post(integration::prefix_uri))
        .route("/preview_ttl", post(integration::preview_ttl))
        .route("/load_data_into_graph", post(integration::load_data_into_graph))
        .route("/load_gff_into_graph", post(integration::load_gff_into_graph))
        .route("/load_bed_into_graph", post(integration::load_bed_into_graph))
        .route("/load_ttl_into_graph", post(integration::load_ttl_into_graph))
        .route(
            "/load_remote_data_into_graph",
            post(integration::load_remote_data_into_graph),
        )

        // Named graphs
        .route("/list_user_graph", get(graphs::list_user_graph))
        .route("/delete_graph", post(graphs::delete_graph))
        .route("/empty_user_database", get(graphs::empty_user_database))

        // External endpoints
        .route("/list_endpoints", get(endpoints::list_endpoints))
        .route("/add_endpoint", post(endpoints::add_endpoint))
        .route("/delete_endpoints", post(endpoints::delete_endpoints))
        .route("/enable_endpoints", post(endpoints::enable_endpoints))
        .route("/inspect_endpoint", post(endpoints::inspect_endpoint))
        .route("/integrate_endpoint", post(endpoints::integrate_endpoint))

        // Queries
        .route("/start_points", get(query::start_points))
        .route("/get_user_abstraction", post(query::get_user_abstraction))
        .route("/sparqlquery", post(query::sparqlquery))
        .route("/sparql_query_text", post(query::sparql_query_text))
        .route("/statistics", get(query::statistics))

        // Jobs
        .route("/list_jobs", get(jobs::list_jobs))
        .route("/del_job", post(jobs::del_job))

        // Administration
        .route("/server_informations", get(admin::server_informations))
        .route("/clean_tmp_directory", post(admin::clean_tmp_directory))

        // Shortcuts
        .route("/import_shortcut", post(shortcuts::import_shortcut))
        .route("/delete_shortcut", post(shortcuts::delete_shortcut))

        // Middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds_from_a_minimal_config() {
        let config = triplify_config::Config::from_toml(
            r#"
            [triplestore]
            query_endpoint = "http://localhost:3030/ds/query"

            [namespaces]
            data = "http://example.org/data/"
            internal = "http://example.org/internal/"

            [storage]
            files_dir = "/tmp/triplify-test"
            "#,
        )
        .unwrap();
        let state = AppState::new(config).unwrap();
        let _router = build_router(state);
    }
}

