pub mod admin;
pub mod apply;
pub mod public;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn public_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/quotes", post(public::submit_quote))
        .route("/api/contacts", post(public::submit_contact))
        .route("/api/apply", post(apply::submit_application))
}

pub fn admin_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/admin/sync-local", post(admin::sync_local))
        .route("/api/admin/upload", post(admin::upload))
        .route("/api/admin/export-forms", get(admin::export_forms))
        .route("/api/admin/export/{table}", get(admin::export_table))
        .route(
            "/api/admin/{table}",
            get(admin::list_table).post(admin::create_record),
        )
        .route(
            "/api/admin/{table}/{id}",
            put(admin::update_record).delete(admin::delete_record),
        )
}
