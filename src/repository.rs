use crate::error::ApiError;
use crate::models::{
    Category, CommentOut, Genre, NewUser, ReviewOut, TitleOut, TitleRow, TitleWrite, User,
    UserPayload,
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

/// Repository Trait
///
/// Abstract contract for all persistence operations, shared as a trait
/// object so handlers never depend on a concrete store. The production
/// implementation is Postgres; tests substitute an in-memory one.
///
/// Uniqueness rules (username, email, slugs, one review per title/author)
/// are enforced by the store itself; implementations surface violations as
/// validation errors rather than taking locks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError>;
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    async fn create_user(&self, new: NewUser) -> Result<User, ApiError>;
    /// Partial update keyed by username. The caller has already resolved the
    /// effective role (the self-service endpoint forces it unchanged).
    async fn update_user(
        &self,
        username: &str,
        patch: UserPayload,
    ) -> Result<Option<User>, ApiError>;
    async fn delete_user(&self, username: &str) -> Result<bool, ApiError>;
    /// Create-or-reuse for the signup flow. The confirmation code is stored
    /// only when the row is first created; an existing user keeps theirs.
    async fn signup_user(&self, username: &str, email: &str, code: &str)
    -> Result<User, ApiError>;

    // --- Categories / Genres ---
    async fn list_categories(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Category>), ApiError>;
    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError>;
    async fn delete_category(&self, slug: &str) -> Result<bool, ApiError>;
    async fn list_genres(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Genre>), ApiError>;
    async fn create_genre(&self, name: &str, slug: &str) -> Result<Genre, ApiError>;
    async fn delete_genre(&self, slug: &str) -> Result<bool, ApiError>;

    // --- Titles ---
    async fn list_titles(
        &self,
        genre: Option<&str>,
        category: Option<&str>,
        year: Option<i32>,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<TitleOut>), ApiError>;
    async fn get_title(&self, id: i64) -> Result<Option<TitleOut>, ApiError>;
    async fn title_exists(&self, id: i64) -> Result<bool, ApiError>;
    async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: &str,
        genre_slugs: &[String],
        category_slug: Option<&str>,
    ) -> Result<TitleOut, ApiError>;
    async fn update_title(&self, id: i64, patch: TitleWrite)
    -> Result<Option<TitleOut>, ApiError>;
    async fn delete_title(&self, id: i64) -> Result<bool, ApiError>;

    // --- Reviews (scoped to a title) ---
    async fn list_reviews(
        &self,
        title_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<ReviewOut>), ApiError>;
    async fn get_review(&self, title_id: i64, review_id: i64)
    -> Result<Option<ReviewOut>, ApiError>;
    async fn author_has_review(&self, title_id: i64, author_id: i64) -> Result<bool, ApiError>;
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: &str,
        score: i16,
    ) -> Result<ReviewOut, ApiError>;
    async fn update_review(
        &self,
        title_id: i64,
        review_id: i64,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Option<ReviewOut>, ApiError>;
    async fn delete_review(&self, title_id: i64, review_id: i64) -> Result<bool, ApiError>;

    // --- Comments (scoped to a title and a review) ---
    async fn list_comments(
        &self,
        title_id: i64,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<CommentOut>), ApiError>;
    async fn get_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentOut>, ApiError>;
    async fn create_comment(
        &self,
        title_id: i64,
        review_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentOut, ApiError>;
    async fn update_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
        text: Option<&str>,
    ) -> Result<Option<CommentOut>, ApiError>;
    async fn delete_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<bool, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, email, bio, first_name, last_name, \
     confirmation_code, role, is_staff, is_superuser";

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, \
     (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating, \
     c.name AS category_name, c.slug AS category_slug \
     FROM titles t LEFT JOIN categories c ON c.id = t.category_id";

const TITLE_FILTERS: &str = "($1::text IS NULL OR EXISTS (\
        SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
        WHERE tg.title_id = t.id AND g.slug = $1)) \
     AND ($2::text IS NULL OR c.slug = $2) \
     AND ($3::int4 IS NULL OR t.year = $3) \
     AND ($4::text IS NULL OR t.name LIKE '%' || $4 || '%')";

/// Genre row tagged with its owning title, for batched page loading.
#[derive(FromRow)]
struct TitleGenreRow {
    title_id: i64,
    name: String,
    slug: String,
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by
/// PostgreSQL. Queries use runtime binding so the crate builds without a
/// live database connection.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the genres for a set of titles in one query and groups them by
    /// title id, avoiding a per-row lookup when building a page.
    async fn genres_for_titles(
        &self,
        title_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Genre>>, ApiError> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, TitleGenreRow>(
            "SELECT tg.title_id, g.name, g.slug \
             FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
             WHERE tg.title_id = ANY($1) ORDER BY g.id",
        )
        .bind(title_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in rows {
            grouped.entry(row.title_id).or_default().push(Genre {
                name: row.name,
                slug: row.slug,
            });
        }
        Ok(grouped)
    }

    /// Resolves genre slugs and links them to a title inside the caller's
    /// transaction. An unknown slug is a validation error.
    async fn link_genres(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        title_id: i64,
        slugs: &[String],
    ) -> Result<(), ApiError> {
        let found = sqlx::query_as::<_, (String, i64)>(
            "SELECT slug, id FROM genres WHERE slug = ANY($1)",
        )
        .bind(slugs)
        .fetch_all(&mut **tx)
        .await?;
        let by_slug: HashMap<&str, i64> =
            found.iter().map(|(slug, id)| (slug.as_str(), *id)).collect();

        for slug in slugs {
            let Some(genre_id) = by_slug.get(slug.as_str()) else {
                return Err(ApiError::validation(
                    "genre",
                    format!("Object with slug={slug} does not exist."),
                ));
            };
            sqlx::query(
                "INSERT INTO title_genres (title_id, genre_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Resolves a category slug to its id inside a transaction. An unknown
    /// slug is a validation error.
    async fn resolve_category(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        slug: &str,
    ) -> Result<i64, ApiError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                ApiError::validation("category", format!("Object with slug={slug} does not exist."))
            })
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users \
             WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR username ILIKE '%' || $1 || '%') \
             ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((count, users))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
             (username, email, bio, first_name, last_name, confirmation_code, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.bio)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.confirmation_code)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        username: &str,
        patch: UserPayload,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
               username = COALESCE($2::varchar, username), \
               email = COALESCE($3::varchar, email), \
               first_name = COALESCE($4::varchar, first_name), \
               last_name = COALESCE($5::varchar, last_name), \
               bio = COALESCE($6::text, bio), \
               role = COALESCE($7::varchar, role) \
             WHERE username = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(patch.username.as_deref())
        .bind(patch.email.as_deref())
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.bio.as_deref())
        .bind(patch.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, username: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn signup_user(
        &self,
        username: &str,
        email: &str,
        code: &str,
    ) -> Result<User, ApiError> {
        if let Some(user) = self.get_user_by_username(username).await? {
            // Repeated signup: resend path. The stored code stays stable, but
            // the caller must present the same pairing; re-keying someone
            // else's username to a new address is rejected.
            if user.email != email {
                return Err(ApiError::validation(
                    "username",
                    "This username is already taken.",
                ));
            }
            return Ok(user);
        }

        // Fresh record; an email collision surfaces via the unique index.
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, confirmation_code) \
             VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    // --- CATEGORIES / GENRES ---

    async fn list_categories(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Category>), ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM categories \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        let categories = sqlx::query_as::<_, Category>(
            "SELECT name, slug FROM categories \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%') \
             ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((count, categories))
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM categories WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_genres(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Genre>), ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM genres \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')",
        )
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        let genres = sqlx::query_as::<_, Genre>(
            "SELECT name, slug FROM genres \
             WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%') \
             ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((count, genres))
    }

    async fn create_genre(&self, name: &str, slug: &str) -> Result<Genre, ApiError> {
        let genre = sqlx::query_as::<_, Genre>(
            "INSERT INTO genres (name, slug) VALUES ($1, $2) RETURNING name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM genres WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- TITLES ---

    async fn list_titles(
        &self,
        genre: Option<&str>,
        category: Option<&str>,
        year: Option<i32>,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<TitleOut>), ApiError> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM titles t \
             LEFT JOIN categories c ON c.id = t.category_id \
             WHERE {TITLE_FILTERS}"
        ))
        .bind(genre)
        .bind(category)
        .bind(year)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TitleRow>(&format!(
            "{TITLE_SELECT} WHERE {TITLE_FILTERS} ORDER BY t.id LIMIT $5 OFFSET $6"
        ))
        .bind(genre)
        .bind(category)
        .bind(year)
        .bind(name)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut genres = self.genres_for_titles(&ids).await?;
        let titles = rows
            .into_iter()
            .map(|row| {
                let linked = genres.remove(&row.id).unwrap_or_default();
                TitleOut::from_row(row, linked)
            })
            .collect();

        Ok((count, titles))
    }

    async fn get_title(&self, id: i64) -> Result<Option<TitleOut>, ApiError> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };

        let mut genres = self.genres_for_titles(&[row.id]).await?;
        let linked = genres.remove(&row.id).unwrap_or_default();
        Ok(Some(TitleOut::from_row(row, linked)))
    }

    async fn title_exists(&self, id: i64) -> Result<bool, ApiError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM titles WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: &str,
        genre_slugs: &[String],
        category_slug: Option<&str>,
    ) -> Result<TitleOut, ApiError> {
        let mut tx = self.pool.begin().await?;

        let category_id = match category_slug {
            Some(slug) => Some(self.resolve_category(&mut tx, slug).await?),
            None => None,
        };

        let title_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO titles (name, year, description, category_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(year)
        .bind(description)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        self.link_genres(&mut tx, title_id, genre_slugs).await?;
        tx.commit().await?;

        self.get_title(title_id).await?.ok_or(ApiError::NotFound)
    }

    async fn update_title(
        &self,
        id: i64,
        patch: TitleWrite,
    ) -> Result<Option<TitleOut>, ApiError> {
        let mut tx = self.pool.begin().await?;

        let category_id = match patch.category.as_deref() {
            Some(slug) => Some(self.resolve_category(&mut tx, slug).await?),
            None => None,
        };

        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE titles SET \
               name = COALESCE($2::varchar, name), \
               year = COALESCE($3::int4, year), \
               description = COALESCE($4::text, description), \
               category_id = COALESCE($5::int8, category_id) \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.year)
        .bind(patch.description.as_deref())
        .bind(category_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(title_id) = updated else {
            return Ok(None);
        };

        // Replacing the genre set is all-or-nothing.
        if let Some(slugs) = &patch.genre {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(title_id)
                .execute(&mut *tx)
                .await?;
            self.link_genres(&mut tx, title_id, slugs).await?;
        }

        tx.commit().await?;
        self.get_title(title_id).await
    }

    async fn delete_title(&self, id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(
        &self,
        title_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<ReviewOut>), ApiError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE title_id = $1")
                .bind(title_id)
                .fetch_one(&self.pool)
                .await?;

        let reviews = sqlx::query_as::<_, ReviewOut>(
            "SELECT r.id, u.username AS author, r.author_id, r.text, r.score, r.pub_date \
             FROM reviews r JOIN users u ON u.id = r.author_id \
             WHERE r.title_id = $1 ORDER BY r.id LIMIT $2 OFFSET $3",
        )
        .bind(title_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((count, reviews))
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<ReviewOut>, ApiError> {
        let review = sqlx::query_as::<_, ReviewOut>(
            "SELECT r.id, u.username AS author, r.author_id, r.text, r.score, r.pub_date \
             FROM reviews r JOIN users u ON u.id = r.author_id \
             WHERE r.title_id = $1 AND r.id = $2",
        )
        .bind(title_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn author_has_review(&self, title_id: i64, author_id: i64) -> Result<bool, ApiError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE title_id = $1 AND author_id = $2)",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: &str,
        score: i16,
    ) -> Result<ReviewOut, ApiError> {
        // Insert and join the author in one round trip.
        let review = sqlx::query_as::<_, ReviewOut>(
            "WITH inserted AS (\
                INSERT INTO reviews (author_id, title_id, text, score) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, author_id, text, score, pub_date\
             ) \
             SELECT i.id, u.username AS author, i.author_id, i.text, i.score, i.pub_date \
             FROM inserted i JOIN users u ON u.id = i.author_id",
        )
        .bind(author_id)
        .bind(title_id)
        .bind(text)
        .bind(score)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn update_review(
        &self,
        title_id: i64,
        review_id: i64,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Option<ReviewOut>, ApiError> {
        // pub_date is set once on insert and never touched here.
        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE reviews SET \
               text = COALESCE($3::varchar, text), \
               score = COALESCE($4::int2, score) \
             WHERE title_id = $1 AND id = $2 RETURNING id",
        )
        .bind(title_id)
        .bind(review_id)
        .bind(text)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_review(title_id, id).await,
            None => Ok(None),
        }
    }

    async fn delete_review(&self, title_id: i64, review_id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM reviews WHERE title_id = $1 AND id = $2")
            .bind(title_id)
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(
        &self,
        title_id: i64,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<CommentOut>), ApiError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE title_id = $1 AND review_id = $2",
        )
        .bind(title_id)
        .bind(review_id)
        .fetch_one(&self.pool)
        .await?;

        let comments = sqlx::query_as::<_, CommentOut>(
            "SELECT c.id, u.username AS author, c.author_id, c.text, c.pub_date \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.title_id = $1 AND c.review_id = $2 \
             ORDER BY c.id LIMIT $3 OFFSET $4",
        )
        .bind(title_id)
        .bind(review_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((count, comments))
    }

    async fn get_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentOut>, ApiError> {
        // A comment whose review does not belong to the given title is
        // outside the queryset entirely.
        let comment = sqlx::query_as::<_, CommentOut>(
            "SELECT c.id, u.username AS author, c.author_id, c.text, c.pub_date \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.title_id = $1 AND c.review_id = $2 AND c.id = $3",
        )
        .bind(title_id)
        .bind(review_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn create_comment(
        &self,
        title_id: i64,
        review_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentOut, ApiError> {
        let comment = sqlx::query_as::<_, CommentOut>(
            "WITH inserted AS (\
                INSERT INTO comments (author_id, review_id, title_id, text) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, author_id, text, pub_date\
             ) \
             SELECT i.id, u.username AS author, i.author_id, i.text, i.pub_date \
             FROM inserted i JOIN users u ON u.id = i.author_id",
        )
        .bind(author_id)
        .bind(review_id)
        .bind(title_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
        text: Option<&str>,
    ) -> Result<Option<CommentOut>, ApiError> {
        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE comments SET text = COALESCE($4::text, text) \
             WHERE title_id = $1 AND review_id = $2 AND id = $3 RETURNING id",
        )
        .bind(title_id)
        .bind(review_id)
        .bind(comment_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_comment(title_id, review_id, id).await,
            None => Ok(None),
        }
    }

    async fn delete_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<bool, ApiError> {
        let result =
            sqlx::query("DELETE FROM comments WHERE title_id = $1 AND review_id = $2 AND id = $3")
                .bind(title_id)
                .bind(review_id)
                .bind(comment_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
