use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Represents the user's canonical identity record stored in the `users` table.
/// This is the authoritative record consulted by the authorization guard;
/// the `role` stored here always outranks the role claim embedded in a session token.
///
/// The password hash is deliberately absent: it lives in `UserCredentials` and
/// never crosses the serialization boundary.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary Key.
    pub id: Uuid,
    // The user's primary identifier, also the lookup key for the statistics route.
    pub email: String,
    // Public display handle, unique across the site.
    pub username: String,
    // The RBAC field: 'ADMIN' or 'USER'.
    pub role: String,
    // Durable per-user privilege toggle. May only be flipped on by a stored admin.
    pub admin_mode: bool,
    // Optional avatar URL.
    pub image: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal row used exclusively by the login flow and the password-reset tool.
/// Carries the PHC-formatted Argon2 hash; intentionally not `Serialize`, not
/// exported to TypeScript, and never part of any response schema.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

/// AuthorProfile
///
/// The public subset of a user's profile attached to content they authored.
/// Only these fields may leak to other users; email and role stay internal.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AuthorProfile {
    pub id: Uuid,
    pub username: String,
    pub image: Option<String>,
}

/// Post
///
/// A forum post from the `posts` table. Vote and reply aggregates are derived
/// by queries at read time, never stored on the row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    // FK to users.id (Author).
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    // Free-form course/topic bucket, e.g. "calculus-101".
    pub category: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostVote
///
/// A single vote record from the `post_votes` table. The composite primary key
/// (user_id, post_id) enforces one vote per user per post at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PostVote {
    pub user_id: Uuid,
    pub post_id: Uuid,
    /// +1 for an upvote, -1 for a downvote.
    pub value: i32,
}

/// ForumReply
///
/// A reply on a forum post, augmented with the author's public username
/// (a join operation, defaulted when the row comes from a plain select).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ForumReply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded via a JOIN in the repository query.
    #[sqlx(default)]
    pub author_username: Option<String>,
}

/// SavedPostRow
///
/// Raw join result (Internal Use). One row per saved post, flattened across the
/// `saved_posts`, `posts`, and `users` tables plus an inline reply count.
/// The repository reshapes this into the nested `SavedPostEntry` before it
/// reaches a handler; votes are attached from a second, batched query.
#[derive(Debug, Clone, FromRow)]
pub struct SavedPostRow {
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub post_id: Uuid,
    pub post_user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub post_created_at: DateTime<Utc>,
    pub post_updated_at: DateTime<Utc>,
    pub author_username: String,
    pub author_image: Option<String>,
    pub reply_count: i64,
}

/// SavedPostEntry
///
/// One element of the saved-posts listing (UI ready): the save record expanded
/// with its post, the post author's public profile, the reply count, and the
/// post's vote records. Ordered newest-saved-first by the repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SavedPostEntry {
    /// Id of the save record itself, not of the post.
    pub id: Uuid,
    #[ts(type = "string")]
    pub saved_at: DateTime<Utc>,
    pub post: Post,
    pub author: AuthorProfile,
    pub reply_count: i64,
    pub votes: Vec<PostVote>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// Note: the role is *not* accepted from the client; every new account starts
/// as 'USER'. The password is hashed immediately and never persisted or logged in clear.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// LoginRequest
///
/// Input payload for the public login endpoint (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// AdminModeRequest
///
/// Documented shape of the admin-mode toggle payload (PUT /admin/mode).
/// The handler reads the raw JSON body instead of this struct so that a
/// non-boolean `adminMode` (string "true", number 1, null) is rejected with a
/// 400 rather than coerced or bounced by the framework's deserializer; this
/// type exists for the OpenAPI document and the exported client types.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminModeRequest {
    #[serde(rename = "adminMode")]
    pub admin_mode: bool,
}

// --- Response Envelopes (Output Schemas) ---

// The API contract fixes the success envelope to `{ <dataKey>: <payload> }`
// with camelCase data keys; the wrappers below pin those keys with serde renames
// so the Rust fields can stay snake_case.

/// SavedPostsResponse
///
/// Envelope for the saved-posts listing (GET /saved-posts).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SavedPostsResponse {
    #[serde(rename = "savedPosts")]
    pub saved_posts: Vec<SavedPostEntry>,
}

/// ForumStatsResponse
///
/// Envelope for the per-user forum statistics (GET /me/forum-stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ForumStatsResponse {
    #[serde(rename = "replyCount")]
    pub reply_count: i64,
}

/// AdminModeResponse
///
/// Envelope for the admin-mode toggle (PUT /admin/mode). Echoes only the
/// updated flag, nothing else about the user record.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminModeResponse {
    #[serde(rename = "adminMode")]
    pub admin_mode: bool,
}

/// SessionResponse
///
/// Envelope returned by login: the signed session token plus the user record
/// it was minted for. The embedded role claim is a snapshot; privileged routes
/// re-verify against the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// UserResponse
///
/// Envelope for the authenticated profile route (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserResponse {
    pub user: User,
}

/// PostsResponse
///
/// Envelope for the public forum listing (GET /forum/posts).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

/// PostDetailResponse
///
/// Envelope for a single forum post (GET /forum/posts/{id}), expanded the same
/// way a saved-post entry is: author profile, replies, and vote records.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetailResponse {
    pub post: Post,
    pub author: AuthorProfile,
    pub replies: Vec<ForumReply>,
    pub votes: Vec<PostVote>,
}
