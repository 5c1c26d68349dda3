use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use notvarmi_api::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    config::AppConfig,
    errors::ApiError,
    handlers,
    models::{
        Post, PostDetailResponse, RegisterRequest, SavedPostEntry, User, UserCredentials,
    },
    password,
    repository::Repository,
};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::test;
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// The central control point for testing handler logic: handlers depend on the
// trait, so the mock decides what the "store" contains. Write operations bump
// atomic counters so tests can assert that a rejected request performed no write.
pub struct MockRepoControl {
    // Pre-canned outputs for handler requests
    pub user_to_return: Option<User>,
    pub user_by_email: Option<User>,
    pub credentials_to_return: Option<UserCredentials>,
    pub saved_to_return: Vec<SavedPostEntry>,
    pub reply_count: i64,
    pub post_to_return: Option<Post>,
    pub posts_to_return: Vec<Post>,
    pub detail_to_return: Option<PostDetailResponse>,
    pub save_inserts_row: bool,
    pub unsave_removes_row: bool,

    // Write observation
    pub set_admin_mode_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
}

impl Default for MockRepoControl {
    fn default() -> Self {
        MockRepoControl {
            user_to_return: None,
            user_by_email: None,
            credentials_to_return: None,
            saved_to_return: vec![],
            reply_count: 0,
            post_to_return: None,
            posts_to_return: vec![],
            detail_to_return: None,
            save_inserts_row: true,
            unsave_removes_row: true,
            set_admin_mode_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn get_user(&self, _id: Uuid) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_to_return.clone())
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self.user_by_email.clone())
    }
    async fn create_user(
        &self,
        req: &RegisterRequest,
        _password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        // Mirrors the real insert: the tier is fixed, never client-supplied.
        Ok(User {
            id: Uuid::new_v4(),
            email: req.email.clone(),
            username: req.username.clone(),
            role: "USER".to_string(),
            admin_mode: false,
            image: None,
            created_at: Default::default(),
        })
    }
    async fn find_credentials(&self, _email: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
        Ok(self.credentials_to_return.clone())
    }
    async fn update_password(
        &self,
        _email: &str,
        _password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        Ok(true)
    }
    async fn set_admin_mode(
        &self,
        _user_id: Uuid,
        enabled: bool,
    ) -> Result<Option<bool>, sqlx::Error> {
        self.set_admin_mode_calls.fetch_add(1, Ordering::SeqCst);
        // Echo the stored value like the RETURNING clause does.
        Ok(self.user_to_return.as_ref().map(|_| enabled))
    }
    async fn get_saved_posts(&self, _user_id: Uuid) -> Result<Vec<SavedPostEntry>, sqlx::Error> {
        Ok(self.saved_to_return.clone())
    }
    async fn save_post(&self, _user_id: Uuid, _post_id: Uuid) -> Result<bool, sqlx::Error> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.save_inserts_row)
    }
    async fn unsave_post(&self, _user_id: Uuid, _post_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(self.unsave_removes_row)
    }
    async fn count_replies(&self, _user_id: Uuid) -> Result<i64, sqlx::Error> {
        Ok(self.reply_count)
    }
    async fn get_posts(
        &self,
        _category: Option<String>,
        _search: Option<String>,
    ) -> Result<Vec<Post>, sqlx::Error> {
        Ok(self.posts_to_return.clone())
    }
    async fn get_post(&self, _id: Uuid) -> Result<Option<Post>, sqlx::Error> {
        Ok(self.post_to_return.clone())
    }
    async fn get_post_detail(&self, _id: Uuid) -> Result<Option<PostDetailResponse>, sqlx::Error> {
        Ok(self.detail_to_return.clone())
    }
}

// --- TEST UTILITIES ---

const TEST_ID: Uuid = Uuid::from_u128(123);

fn create_test_state(repo_control: Arc<MockRepoControl>) -> AppState {
    AppState {
        repo: repo_control,
        config: AppConfig::default(),
    }
}

fn stored_user(role: &str) -> User {
    User {
        id: TEST_ID,
        email: "test@user.com".to_string(),
        username: "test_user".to_string(),
        role: role.to_string(),
        admin_mode: false,
        image: None,
        created_at: Default::default(),
    }
}

// Session identity whose role claim may deliberately disagree with the store.
fn session_identity(claim_role: &str) -> AuthUser {
    AuthUser {
        id: TEST_ID,
        email: "test@user.com".to_string(),
        role: claim_role.to_string(),
    }
}

// --- SAVED-POSTS LISTING ---

#[test]
async fn test_saved_posts_anonymous_gets_empty_list_not_error() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    // No resolvable identity at all: the soft-fail contract.
    let result = handlers::list_saved_posts(MaybeAuthUser(None), State(state)).await;

    let Json(body) = result.expect("anonymous listing must not error");
    assert!(body.saved_posts.is_empty());
}

#[test]
async fn test_saved_posts_returns_entries_for_identity() {
    let entry = SavedPostEntry {
        id: Uuid::new_v4(),
        ..SavedPostEntry::default()
    };
    let repo = Arc::new(MockRepoControl {
        saved_to_return: vec![entry.clone()],
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::list_saved_posts(
        MaybeAuthUser(Some(session_identity("USER"))),
        State(state),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body.saved_posts.len(), 1);
    assert_eq!(body.saved_posts[0].id, entry.id);
}

// --- USER STATISTICS ---

#[test]
async fn test_forum_stats_missing_user_is_not_found() {
    // Identity resolves, but the email no longer maps to a stored user.
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::get_forum_stats(session_identity("USER"), State(state)).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[test]
async fn test_forum_stats_counts_replies() {
    let repo = Arc::new(MockRepoControl {
        user_by_email: Some(stored_user("USER")),
        reply_count: 42,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::get_forum_stats(session_identity("USER"), State(state)).await;

    let Json(body) = result.unwrap();
    assert_eq!(body.reply_count, 42);
}

// --- ADMIN-MODE TOGGLE ---

#[test]
async fn test_admin_mode_rejects_non_boolean_payloads_without_writing() {
    let payloads = vec![
        json!({ "adminMode": "true" }),
        json!({ "adminMode": 1 }),
        json!({ "adminMode": null }),
        json!({}),
    ];

    for payload in payloads {
        let repo = Arc::new(MockRepoControl {
            user_to_return: Some(stored_user("ADMIN")),
            ..MockRepoControl::default()
        });
        let state = create_test_state(repo.clone());

        let result =
            handlers::set_admin_mode(session_identity("ADMIN"), State(state), Json(payload.clone()))
                .await;

        assert!(
            matches!(result, Err(ApiError::BadRequest(_))),
            "payload {payload} must be a 400"
        );
        assert_eq!(
            repo.set_admin_mode_calls.load(Ordering::SeqCst),
            0,
            "payload {payload} must not reach the store"
        );
    }
}

#[test]
async fn test_admin_mode_stale_admin_claim_is_forbidden() {
    // The token still claims ADMIN, but the store has since downgraded the role.
    let repo = Arc::new(MockRepoControl {
        user_to_return: Some(stored_user("USER")),
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo.clone());

    let result = handlers::set_admin_mode(
        session_identity("ADMIN"),
        State(state),
        Json(json!({ "adminMode": true })),
    )
    .await;

    assert!(matches!(result, Err(ApiError::Forbidden)));
    assert_eq!(repo.set_admin_mode_calls.load(Ordering::SeqCst), 0);
}

#[test]
async fn test_admin_mode_stale_user_claim_is_allowed_when_store_says_admin() {
    // Opposite direction: the token predates a promotion. The store wins here too.
    let repo = Arc::new(MockRepoControl {
        user_to_return: Some(stored_user("ADMIN")),
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::set_admin_mode(
        session_identity("USER"),
        State(state),
        Json(json!({ "adminMode": true })),
    )
    .await;

    let Json(body) = result.unwrap();
    assert!(body.admin_mode);
}

#[test]
async fn test_admin_mode_deleted_user_is_unauthenticated() {
    // Identity resolves from the token but the row is gone from the store.
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::set_admin_mode(
        session_identity("ADMIN"),
        State(state),
        Json(json!({ "adminMode": true })),
    )
    .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[test]
async fn test_admin_mode_echoes_exactly_the_written_flag() {
    for enabled in [true, false] {
        let repo = Arc::new(MockRepoControl {
            user_to_return: Some(stored_user("ADMIN")),
            ..MockRepoControl::default()
        });
        let state = create_test_state(repo.clone());

        let result = handlers::set_admin_mode(
            session_identity("ADMIN"),
            State(state),
            Json(json!({ "adminMode": enabled })),
        )
        .await;

        let Json(body) = result.unwrap();
        assert_eq!(body.admin_mode, enabled);
        assert_eq!(repo.set_admin_mode_calls.load(Ordering::SeqCst), 1);
    }
}

#[test]
async fn test_admin_mode_toggle_is_idempotent() {
    let repo = Arc::new(MockRepoControl {
        user_to_return: Some(stored_user("ADMIN")),
        ..MockRepoControl::default()
    });

    // Same value twice in succession: same success response both times.
    for _ in 0..2 {
        let state = create_test_state(repo.clone());
        let result = handlers::set_admin_mode(
            session_identity("ADMIN"),
            State(state),
            Json(json!({ "adminMode": true })),
        )
        .await;
        let Json(body) = result.unwrap();
        assert!(body.admin_mode);
    }
    assert_eq!(repo.set_admin_mode_calls.load(Ordering::SeqCst), 2);
}

// --- REGISTRATION & LOGIN ---

#[test]
async fn test_register_rejects_invalid_email() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::register(
        State(state),
        Json(RegisterRequest {
            email: "not-an-email".to_string(),
            username: "someone".to_string(),
            password: "long-enough-password".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[test]
async fn test_register_rejects_short_password() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::register(
        State(state),
        Json(RegisterRequest {
            email: "someone@example.com".to_string(),
            username: "someone".to_string(),
            password: "short".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::BadRequest(_))));
}

#[test]
async fn test_register_assigns_user_role() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::register(
        State(state),
        Json(RegisterRequest {
            email: "someone@example.com".to_string(),
            username: "someone".to_string(),
            password: "long-enough-password".to_string(),
        }),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.user.role, "USER");
    assert!(!body.user.admin_mode);
}

#[test]
async fn test_login_wrong_password_is_unauthorized() {
    let hash = password::hash_password("the-real-password").unwrap();
    let repo = Arc::new(MockRepoControl {
        credentials_to_return: Some(UserCredentials {
            id: TEST_ID,
            password_hash: hash,
        }),
        user_to_return: Some(stored_user("USER")),
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::login(
        State(state),
        Json(notvarmi_api::models::LoginRequest {
            email: "test@user.com".to_string(),
            password: "a-wrong-password".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[test]
async fn test_login_issues_token_for_valid_credentials() {
    let hash = password::hash_password("the-real-password").unwrap();
    let repo = Arc::new(MockRepoControl {
        credentials_to_return: Some(UserCredentials {
            id: TEST_ID,
            password_hash: hash,
        }),
        user_to_return: Some(stored_user("USER")),
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::login(
        State(state),
        Json(notvarmi_api::models::LoginRequest {
            email: "test@user.com".to_string(),
            password: "the-real-password".to_string(),
        }),
    )
    .await;

    let Json(body) = result.unwrap();
    assert!(!body.token.is_empty());
    assert_eq!(body.user.id, TEST_ID);
}

#[test]
async fn test_login_unknown_email_is_unauthorized() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::login(
        State(state),
        Json(notvarmi_api::models::LoginRequest {
            email: "ghost@example.com".to_string(),
            password: "whatever-password".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

// --- SAVE / UNSAVE LIFECYCLE ---

#[test]
async fn test_save_post_missing_post_is_not_found() {
    let repo = Arc::new(MockRepoControl::default());
    let state = create_test_state(repo.clone());

    let result = handlers::save_post(session_identity("USER"), State(state), Path(TEST_ID)).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
    // Existence check failed before the insert was attempted.
    assert_eq!(repo.save_calls.load(Ordering::SeqCst), 0);
}

#[test]
async fn test_save_post_new_save_is_created() {
    let repo = Arc::new(MockRepoControl {
        post_to_return: Some(Post::default()),
        save_inserts_row: true,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::save_post(session_identity("USER"), State(state), Path(TEST_ID)).await;

    assert_eq!(result.unwrap(), StatusCode::CREATED);
}

#[test]
async fn test_save_post_duplicate_save_is_idempotent_success() {
    let repo = Arc::new(MockRepoControl {
        post_to_return: Some(Post::default()),
        save_inserts_row: false,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::save_post(session_identity("USER"), State(state), Path(TEST_ID)).await;

    // Already saved: success, not an error.
    assert_eq!(result.unwrap(), StatusCode::OK);
}

#[test]
async fn test_unsave_post_removes_existing_save() {
    let repo = Arc::new(MockRepoControl {
        unsave_removes_row: true,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::unsave_post(session_identity("USER"), State(state), Path(TEST_ID)).await;

    assert_eq!(result.unwrap(), StatusCode::NO_CONTENT);
}

#[test]
async fn test_unsave_post_nothing_to_remove_is_not_found() {
    let repo = Arc::new(MockRepoControl {
        unsave_removes_row: false,
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::unsave_post(session_identity("USER"), State(state), Path(TEST_ID)).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

// --- FORUM READS ---

#[test]
async fn test_get_post_details_not_found() {
    let state = create_test_state(Arc::new(MockRepoControl::default()));

    let result = handlers::get_post_details(State(state), Path(TEST_ID)).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[test]
async fn test_list_posts_returns_listing() {
    let repo = Arc::new(MockRepoControl {
        posts_to_return: vec![Post::default(), Post::default()],
        ..MockRepoControl::default()
    });
    let state = create_test_state(repo);

    let result = handlers::list_posts(
        State(state),
        axum::extract::Query(handlers::PostFilter {
            category: None,
            search: None,
        }),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body.posts.len(), 2);
}
