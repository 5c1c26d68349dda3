use crate::models::{
    Post, PostDetailResponse, PostVote, RegisterRequest, SavedPostEntry, SavedPostRow, User,
    UserCredentials,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// handlers to interact with the data layer without knowing the specific
/// implementation (Postgres, Mock, etc.).
///
/// Every method returns `Result<_, sqlx::Error>`: store failures are surfaced to
/// the route boundary, where they are logged and masked into the generic 500
/// envelope. Nothing is retried; a failure is terminal for that request.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Auth ---
    // Authoritative identity read; also the guard's re-fetch point.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;
    // Email-keyed lookup used by the statistics route.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    // Registration. Role is fixed to 'USER' at the query level.
    async fn create_user(
        &self,
        req: &RegisterRequest,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;
    // Login-only credential fetch; the hash never rides on the `User` model.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, sqlx::Error>;
    // Operational reset. Returns false when the email matches no user.
    async fn update_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error>;
    // Privileged write behind the authorization guard. Returns the updated flag,
    // or None when the user row vanished between guard and write.
    async fn set_admin_mode(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> Result<Option<bool>, sqlx::Error>;

    // --- Saved Posts ---
    // Listing for one user, newest-saved-first, each entry expanded with the
    // post, author profile, reply count, and vote records.
    async fn get_saved_posts(&self, user_id: Uuid) -> Result<Vec<SavedPostEntry>, sqlx::Error>;
    // Idempotent save: returns true if a row was inserted, false on conflict
    // (already saved). Uniqueness is enforced by the storage layer.
    async fn save_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, sqlx::Error>;
    // Returns false when there was nothing to unsave.
    async fn unsave_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, sqlx::Error>;

    // --- Forum ---
    // Reply count authored by a user, for the statistics route.
    async fn count_replies(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;
    // Public listing with filtering and search.
    async fn get_posts(
        &self,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<Post>, sqlx::Error>;
    // Bare post fetch (existence checks).
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, sqlx::Error>;
    // Single post expanded with author, replies, and votes.
    async fn get_post_detail(&self, id: Uuid) -> Result<Option<PostDetailResponse>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Shared column list for reads that materialize a `User`. The password hash is
// excluded on purpose; credential reads go through `find_credentials`.
const USER_COLUMNS: &str = "id, email, username, role, admin_mode, image, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    /// get_user
    ///
    /// Retrieves the canonical user record by primary key. This is the query the
    /// authorization guard re-runs before every privileged write, so it must
    /// always read the live row, never a cache.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_user_by_email
    ///
    /// Email-keyed variant of `get_user`, used by the statistics route whose
    /// session identity is keyed by the email claim.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// create_user
    ///
    /// Inserts a new account. The role is hardcoded to 'USER' in the statement:
    /// no code path lets a client choose its own tier. Unique violations on
    /// email/username bubble up as `sqlx::Error::Database` for the handler to
    /// map to 409.
    async fn create_user(
        &self,
        req: &RegisterRequest,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let new_id = Uuid::new_v4();
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, email, username, password_hash, role, admin_mode, created_at)
               VALUES ($1, $2, $3, $4, 'USER', false, NOW())
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(new_id)
        .bind(&req.email)
        .bind(&req.username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }

    /// find_credentials
    ///
    /// Fetches only what the login flow needs: the user id and the stored hash.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// update_password
    ///
    /// Single-record hash replacement for the operational reset tool.
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// set_admin_mode
    ///
    /// Persists the admin-mode flag and returns exactly the stored value.
    /// Writing the same value twice is a plain idempotent UPDATE.
    async fn set_admin_mode(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE users SET admin_mode = $1 WHERE id = $2 RETURNING admin_mode",
        )
        .bind(enabled)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_saved_posts
    ///
    /// The listing query joins each save record with its post, the post author's
    /// public profile fields, and an inline reply count, newest-saved-first.
    /// Vote records are attached from a second, batched query (`ANY($1)`) so the
    /// route issues exactly two statements regardless of list size.
    async fn get_saved_posts(&self, user_id: Uuid) -> Result<Vec<SavedPostEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SavedPostRow>(
            r#"
            SELECT
                s.id, s.created_at AS saved_at,
                p.id AS post_id, p.user_id AS post_user_id, p.title, p.content, p.category,
                p.created_at AS post_created_at, p.updated_at AS post_updated_at,
                u.username AS author_username, u.image AS author_image,
                (SELECT COUNT(*) FROM forum_replies r WHERE r.post_id = p.id) AS reply_count
            FROM saved_posts s
            JOIN posts p ON s.post_id = p.id
            JOIN users u ON p.user_id = u.id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(vec![]);
        }

        let post_ids: Vec<Uuid> = rows.iter().map(|r| r.post_id).collect();
        let votes = sqlx::query_as::<_, PostVote>(
            "SELECT user_id, post_id, value FROM post_votes WHERE post_id = ANY($1)",
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut votes_by_post: HashMap<Uuid, Vec<PostVote>> = HashMap::new();
        for vote in votes {
            votes_by_post.entry(vote.post_id).or_default().push(vote);
        }

        Ok(rows
            .into_iter()
            .map(|row| SavedPostEntry {
                id: row.id,
                saved_at: row.saved_at,
                post: Post {
                    id: row.post_id,
                    user_id: row.post_user_id,
                    title: row.title,
                    content: row.content,
                    category: row.category,
                    created_at: row.post_created_at,
                    updated_at: row.post_updated_at,
                },
                author: crate::models::AuthorProfile {
                    id: row.post_user_id,
                    username: row.author_username,
                    image: row.author_image,
                },
                reply_count: row.reply_count,
                votes: votes_by_post.remove(&row.post_id).unwrap_or_default(),
            })
            .collect())
    }

    /// save_post
    ///
    /// Inserts a save record. Uses `ON CONFLICT DO NOTHING` against the
    /// `(user_id, post_id)` unique constraint so a duplicate save is an
    /// idempotent no-op. Returns true only if a new row was inserted.
    async fn save_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO saved_posts (id, user_id, post_id, created_at)
               VALUES ($1, $2, $3, NOW())
               ON CONFLICT (user_id, post_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// unsave_post
    ///
    /// Deletes the caller's save record for a post. Scoped by `user_id`, so a
    /// user can never unsave on someone else's behalf.
    async fn unsave_post(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM saved_posts WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// count_replies
    ///
    /// Aggregate for the statistics route: replies authored by this user id.
    async fn count_replies(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forum_replies WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }

    /// get_posts
    ///
    /// Implements flexible category/search filtering using QueryBuilder for safe
    /// parameterization. Search is case-insensitive across title and content.
    async fn get_posts(
        &self,
        category: Option<String>,
        search: Option<String>,
    ) -> Result<Vec<Post>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT id, user_id, title, content, category, created_at, updated_at
            FROM posts
            WHERE true
            "#,
        );

        if let Some(c) = category {
            builder.push(" AND category = ");
            builder.push_bind(c);
        }

        if let Some(s) = search {
            let search_pattern = format!("%{}%", s);
            builder.push(" AND (title ILIKE ");
            builder.push_bind(search_pattern.clone());
            builder.push(" OR content ILIKE ");
            builder.push_bind(search_pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC");

        builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
    }

    /// get_post
    ///
    /// Bare fetch by id, used for existence checks before save operations.
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "SELECT id, user_id, title, content, category, created_at, updated_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// get_post_detail
    ///
    /// Expands one post the same way the saved-posts listing does: author
    /// profile, replies (joined with the author username), and vote records.
    /// The calls run in sequence; there is no fan-out within a request.
    async fn get_post_detail(&self, id: Uuid) -> Result<Option<PostDetailResponse>, sqlx::Error> {
        let Some(post) = self.get_post(id).await? else {
            return Ok(None);
        };

        let author = sqlx::query_as::<_, crate::models::AuthorProfile>(
            "SELECT id, username, image FROM users WHERE id = $1",
        )
        .bind(post.user_id)
        .fetch_one(&self.pool)
        .await?;

        let replies = sqlx::query_as::<_, crate::models::ForumReply>(
            r#"
            SELECT r.id, r.post_id, r.user_id, r.content, r.created_at,
                   u.username AS author_username
            FROM forum_replies r
            JOIN users u ON r.user_id = u.id
            WHERE r.post_id = $1
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let votes = sqlx::query_as::<_, PostVote>(
            "SELECT user_id, post_id, value FROM post_votes WHERE post_id = $1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PostDetailResponse {
            post,
            author,
            replies,
            votes,
        }))
    }
}
