use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication layer: profile access, per-user statistics, and the
/// save/unsave lifecycle.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `AuthUser` extractor middleware
/// being present on the router layer above this module. This guarantees that all
/// handlers receive a validated `AuthUser` struct containing the user's ID,
/// email, and role claim, which is then used to scope every query to the caller.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Retrieves the currently authenticated user's profile, re-read from the
        // store so current attributes (role, admin_mode) are reflected.
        .route("/me", get(handlers::get_me))
        // GET /me/forum-stats
        // Per-user forum statistics (reply count). Hard 401 without a session;
        // 404 when the session's email no longer maps to a stored user.
        .route("/me/forum-stats", get(handlers::get_forum_stats))
        // POST/DELETE /posts/{id}/save
        // The SavedPost lifecycle. Saving is idempotent (storage-layer
        // uniqueness on user/post); unsaving a record that isn't there is 404.
        .route(
            "/posts/{id}/save",
            post(handlers::save_post).delete(handlers::unsave_post),
        )
}
