use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are accessible without a required session: anonymous
/// read-only forum access, the identity gateway (register/login), and the
/// saved-posts listing, which resolves a session *when one is present* but
/// treats a missing or invalid credential as a valid anonymous caller.
///
/// Security Mandate:
/// Nothing in this module may expose another user's private attributes. The
/// forum handlers return posts with only the author's public profile fields,
/// and the saved-posts handler scopes its query to the resolved identity.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // Creates a new account. The stored role is always 'USER'; the request
        // schema carries no role field.
        .route("/register", post(handlers::register))
        // POST /login
        // Verifies credentials and issues the session JWT.
        .route("/login", post(handlers::login))
        // GET /saved-posts
        // The caller's saved posts. Deliberately NOT behind the auth middleware:
        // an anonymous caller receives an empty list with 200, never an error.
        // The handler uses the soft-fail `MaybeAuthUser` extractor.
        .route("/saved-posts", get(handlers::list_saved_posts))
        // GET /forum/posts?category=...&search=...
        // Lists forum posts, supporting category filtering and full-text search.
        .route("/forum/posts", get(handlers::list_posts))
        // GET /forum/posts/{id}
        // Retrieves a single post expanded with author, replies, and votes.
        .route("/forum/posts/{id}", get(handlers::get_post_details))
}
