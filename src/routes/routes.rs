//! Defines routes for the quote workflow API.
//!
//! ## Structure
//! - **Quote endpoints**
//!   - `GET    /quotes` — role-filtered listing
//!   - `POST   /quotes` — create (multipart: fields + spreadsheets)
//!   - `GET    /quotes/{id}` — detail, projected per role
//!   - `PUT    /quotes/{id}` — update (multipart: fields, uploads, deletions)
//!   - `DELETE /quotes/{id}` — delete quote and attachments
//!
//! - **Lifecycle actions**
//!   - `PATCH /quotes/{id}/reject`
//!   - `PATCH /quotes/{id}/assign-supplier`
//!   - `PATCH /quotes/{id}/remove-supplier`
//!   - `PATCH /quotes/{id}/assign-quoter`
//!   - `PATCH /quotes/{id}/confirm-supplier-quote`
//!   - `PATCH /quotes/{id}/confirm`
//!
//! - **Attachments**
//!   - `GET /quotes/{id}/files/{kind}` — zip of one collection
//!   - `GET /quotes/{id}/files/{kind}/{index}` — single file
//!
//! - **Supplier groups**
//!   - `GET/POST /groups`, `PUT/DELETE /groups/{id}`

use crate::{
    handlers::{
        group_handlers::{create_group, delete_group, list_groups, update_group},
        health_handlers::{healthz, readyz},
        quote_handlers::{
            assign_quoter, assign_supplier, confirm_final_quote, confirm_supplier_quote,
            create_quote, delete_quote, download_archive, download_file, get_quote, list_quotes,
            reject_quote, remove_supplier, update_quote,
        },
    },
    services::file_store::{MAX_FILES_PER_REQUEST, MAX_FILE_SIZE},
    services::quote_service::QuoteService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch},
};

/// Multipart bodies carry up to ten capped files plus text fields.
const MAX_BODY_BYTES: usize = (MAX_FILE_SIZE as usize) * MAX_FILES_PER_REQUEST + 1024 * 1024;

/// Build and return the router for the quote workflow API.
///
/// The router carries shared state (`QuoteService`) to all handlers.
pub fn routes() -> Router<QuoteService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // quote collection and document
        .route("/quotes", get(list_quotes).post(create_quote))
        .route(
            "/quotes/{id}",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
        // lifecycle actions
        .route("/quotes/{id}/reject", patch(reject_quote))
        .route("/quotes/{id}/assign-supplier", patch(assign_supplier))
        .route("/quotes/{id}/remove-supplier", patch(remove_supplier))
        .route("/quotes/{id}/assign-quoter", patch(assign_quoter))
        .route(
            "/quotes/{id}/confirm-supplier-quote",
            patch(confirm_supplier_quote),
        )
        .route("/quotes/{id}/confirm", patch(confirm_final_quote))
        // attachments
        .route("/quotes/{id}/files/{kind}", get(download_archive))
        .route("/quotes/{id}/files/{kind}/{index}", get(download_file))
        // supplier groups
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{id}", axum::routing::put(update_group).delete(delete_group))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
