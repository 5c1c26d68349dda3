use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Admin Router Module
///
/// Defines the routes that mutate privileged state. These endpoints sit behind
/// the same authentication layer as the authenticated router, but authorization
/// is enforced *inside* each handler by the guard's authoritative re-fetch:
/// the stored role decides, never the token's role claim. A request whose token
/// says 'ADMIN' is still rejected with 403 if the store says otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /admin/mode
        // Toggles the caller's durable admin-mode flag. Strict boolean payload
        // validation (400), then the store re-check (403), then the write.
        .route("/mode", put(handlers::set_admin_mode))
}
