use crate::{
    AppState,
    auth::{self, AuthUser, MaybeAuthUser},
    errors::ApiError,
    models::{
        AdminModeRequest, AdminModeResponse, ForumStatsResponse, LoginRequest, PostDetailResponse,
        PostsResponse, RegisterRequest, SavedPostsResponse, SessionResponse, UserResponse,
    },
    password,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

// --- Filter Structs ---

/// PostFilter
///
/// Defines the accepted query parameters for the public forum listing endpoint
/// (GET /forum/posts). Used by Axum's Query extractor to safely bind HTTP query
/// parameters for filtering and search.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PostFilter {
    /// Optional course/topic bucket filter.
    pub category: Option<String>,
    /// Optional case-insensitive search string over title and content.
    pub search: Option<String>,
}

// --- Handlers ---

/// list_saved_posts
///
/// [Soft-Auth Route] Lists the caller's saved posts, newest-saved-first, each
/// entry expanded with the post, the author's public profile, a reply count,
/// and vote records.
///
/// *Soft-fail*: an anonymous caller (no credential, or a malformed/expired one)
/// receives an empty list with 200, never an error: the saved page must not
/// special-case logged-out users. This is deliberately different from the
/// hard 401 on `/me/forum-stats`; do not unify the two.
#[utoipa::path(
    get,
    path = "/saved-posts",
    responses((status = 200, description = "Saved posts for the caller (empty when anonymous)", body = SavedPostsResponse))
)]
pub async fn list_saved_posts(
    MaybeAuthUser(maybe_user): MaybeAuthUser,
    State(state): State<AppState>,
) -> Result<Json<SavedPostsResponse>, ApiError> {
    let saved_posts = match maybe_user {
        Some(user) => state.repo.get_saved_posts(user.id).await?,
        None => vec![],
    };
    Ok(Json(SavedPostsResponse { saved_posts }))
}

/// get_forum_stats
///
/// [Authenticated Route] Per-user forum statistics: the number of replies the
/// caller has authored.
///
/// *Lookup*: keyed by the session's email claim. If the claim no longer maps to
/// a stored user (account deleted after the token was minted), this is 404:
/// the identity authenticated, but the referenced record is gone.
#[utoipa::path(
    get,
    path = "/me/forum-stats",
    responses(
        (status = 200, description = "Reply count", body = ForumStatsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_forum_stats(
    AuthUser { email, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ForumStatsResponse>, ApiError> {
    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let reply_count = state.repo.count_replies(user.id).await?;

    Ok(Json(ForumStatsResponse { reply_count }))
}

/// set_admin_mode
///
/// [Admin Route] Persists the caller's admin-mode flag.
///
/// *Input*: the body must carry an `adminMode` field that is strictly a JSON
/// boolean. String "true", number 1, null, or a missing field are all 400s and
/// perform no write. The raw `Value` is inspected on purpose: a typed `bool`
/// field would let the framework's deserializer decide what rejection looks
/// like, and the contract pins it to 400 with the standard envelope.
///
/// *Authorization*: [`auth::require_admin`] re-fetches the caller's role from
/// the store before the write. The token's role claim is never consulted here,
/// so a token minted before a role downgrade cannot toggle the flag.
#[utoipa::path(
    put,
    path = "/admin/mode",
    request_body = AdminModeRequest,
    responses(
        (status = 200, description = "Updated flag", body = AdminModeResponse),
        (status = 400, description = "adminMode not a boolean"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Stored role is not admin")
    )
)]
pub async fn set_admin_mode(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<AdminModeResponse>, ApiError> {
    // Strict boolean check happens before any store access.
    let enabled = match payload.get("adminMode") {
        Some(Value::Bool(b)) => *b,
        _ => {
            return Err(ApiError::BadRequest(
                "adminMode must be a boolean".to_string(),
            ));
        }
    };

    // Authoritative re-check; the session claim is not trusted for this.
    auth::require_admin(&state.repo, id).await?;

    // The row existed a moment ago in the guard; a None here means it vanished
    // in between, which collapses back to the unauthenticated case.
    let admin_mode = state
        .repo
        .set_admin_mode(id, enabled)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(AdminModeResponse { admin_mode }))
}

/// register
///
/// [Public Route] Creates a new account. The password is hashed with Argon2id
/// before it touches the repository; the clear text is never persisted or logged.
///
/// *Security*: the stored role is always 'USER'. The request schema has no role
/// field, and the insert statement hardcodes the tier, so registration can never
/// be a privilege-escalation vector.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserResponse),
        (status = 400, description = "Invalid email, username, or password"),
        (status = 409, description = "Email or username already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    if payload.username.trim().is_empty() {
        return Err(ApiError::BadRequest("A username is required".to_string()));
    }

    let password_hash = password::hash_password(&payload.password).map_err(|e| match e {
        password::PasswordError::TooShort | password::PasswordError::TooLong => {
            ApiError::BadRequest(e.to_string())
        }
        other => {
            tracing::error!("password hashing failed: {}", other);
            ApiError::Internal
        }
    })?;

    let user = match state.repo.create_user(&payload, &password_hash).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(ApiError::Conflict(
                "Email or username already registered".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// login
///
/// [Public Route] Verifies credentials and mints a session JWT. The role written
/// into the token is a snapshot of the stored role; privileged routes re-verify
/// against the store on every request, so a stale snapshot grants nothing.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    // An unknown email and a wrong password are indistinguishable to the caller.
    let creds = state
        .repo
        .find_credentials(&payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    password::verify_password(&payload.password, &creds.password_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user = state
        .repo
        .get_user(creds.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let token = auth::issue_token(&user, &state.config.jwt_secret, state.config.token_ttl_secs)
        .map_err(|e| {
            tracing::error!("token issuance failed: {:?}", e);
            ApiError::Internal
        })?;

    Ok(Json(SessionResponse { token, user }))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile, re-read from the store so the
/// response reflects current attributes (role, admin_mode) rather than claims.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse { user }))
}

/// save_post
///
/// [Authenticated Route] Saves a post for the caller. The post must exist (404
/// otherwise); a repeat save is an idempotent success. 201 signals a new save
/// record, 200 signals "was already saved".
#[utoipa::path(
    post,
    path = "/posts/{id}/save",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 201, description = "Saved"),
        (status = 200, description = "Already saved"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn save_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .repo
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if state.repo.save_post(user_id, post_id).await? {
        Ok(StatusCode::CREATED)
    } else {
        Ok(StatusCode::OK)
    }
}

/// unsave_post
///
/// [Authenticated Route] Removes the caller's save record for a post. Scoped to
/// the caller; 404 when there was nothing to remove.
#[utoipa::path(
    delete,
    path = "/posts/{id}/save",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Not saved")
    )
)]
pub async fn unsave_post(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.repo.unsave_post(user_id, post_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Saved post not found".to_string()))
    }
}

/// list_posts
///
/// [Public Route] Lists forum posts with category filtering and search,
/// newest-first.
#[utoipa::path(
    get,
    path = "/forum/posts",
    params(PostFilter),
    responses((status = 200, description = "Filtered posts", body = PostsResponse))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<PostsResponse>, ApiError> {
    let posts = state.repo.get_posts(filter.category, filter.search).await?;
    Ok(Json(PostsResponse { posts }))
}

/// get_post_details
///
/// [Public Route] One post, expanded with author profile, replies, and votes.
#[utoipa::path(
    get,
    path = "/forum/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetailResponse),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let detail = state
        .repo
        .get_post_detail(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    Ok(Json(detail))
}
