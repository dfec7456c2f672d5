#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use review_portal::{
    AppState,
    config::AppConfig,
    create_router,
    error::ApiError,
    mail::{MailerState, MockMailer},
    models::{
        Category, CommentOut, Genre, NewUser, ReviewOut, Role, TitleOut, TitleWrite, User,
        UserPayload,
    },
    repository::{Repository, RepositoryState},
};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

// --- In-Memory Repository ---

// Handlers depend on the Repository trait, so tests substitute this
// in-memory implementation. It emulates what the real store enforces:
// unique usernames/emails/slugs, the one-review-per-title-author rule,
// cascading deletes, and SET NULL on category removal.

#[derive(Debug, Clone)]
struct TitleRec {
    id: i64,
    name: String,
    year: i32,
    description: String,
    category_slug: Option<String>,
    genre_slugs: Vec<String>,
}

#[derive(Debug, Clone)]
struct ReviewRec {
    id: i64,
    author_id: i64,
    title_id: i64,
    text: String,
    score: i16,
    pub_date: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRec {
    id: i64,
    author_id: i64,
    review_id: i64,
    title_id: i64,
    text: String,
    pub_date: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    categories: Vec<Category>,
    genres: Vec<Genre>,
    titles: Vec<TitleRec>,
    reviews: Vec<ReviewRec>,
    comments: Vec<CommentRec>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username_of(&self, user_id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn review_out(&self, rec: &ReviewRec) -> ReviewOut {
        ReviewOut {
            id: rec.id,
            author: self.username_of(rec.author_id),
            author_id: rec.author_id,
            text: rec.text.clone(),
            score: rec.score,
            pub_date: rec.pub_date,
        }
    }

    fn comment_out(&self, rec: &CommentRec) -> CommentOut {
        CommentOut {
            id: rec.id,
            author: self.username_of(rec.author_id),
            author_id: rec.author_id,
            text: rec.text.clone(),
            pub_date: rec.pub_date,
        }
    }

    fn title_out(&self, rec: &TitleRec) -> TitleOut {
        let scores: Vec<i16> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == rec.id)
            .map(|r| r.score)
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64)
        };
        TitleOut {
            id: rec.id,
            name: rec.name.clone(),
            year: rec.year,
            description: rec.description.clone(),
            rating,
            genre: rec
                .genre_slugs
                .iter()
                .filter_map(|slug| self.genres.iter().find(|g| &g.slug == slug).cloned())
                .collect(),
            category: rec
                .category_slug
                .as_ref()
                .and_then(|slug| self.categories.iter().find(|c| &c.slug == slug).cloned()),
        }
    }
}

fn page<T: Clone>(items: Vec<T>, limit: i64, offset: i64) -> (i64, Vec<T>) {
    let count = items.len() as i64;
    let page = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    (count, page)
}

#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directly inserts a user, bypassing signup. For seeding test roles.
    pub fn add_user(
        &self,
        username: &str,
        role: Role,
        is_staff: bool,
        is_superuser: bool,
    ) -> User {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let user = User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            confirmation_code: "seededcode".to_string(),
            role,
            is_staff,
            is_superuser,
            ..User::default()
        };
        inner.users.push(user.clone());
        user
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let needle = search.map(str::to_lowercase);
        let matched: Vec<User> = inner
            .users
            .iter()
            .filter(|u| match &needle {
                Some(n) => u.username.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.username == new.username) {
            return Err(ApiError::validation(
                "username",
                "This username is already taken.",
            ));
        }
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(ApiError::validation("email", "This email is already taken."));
        }
        let id = inner.next_id();
        let user = User {
            id,
            username: new.username,
            email: new.email,
            bio: new.bio,
            first_name: new.first_name,
            last_name: new.last_name,
            confirmation_code: new.confirmation_code,
            role: new.role,
            is_staff: false,
            is_superuser: false,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        username: &str,
        patch: UserPayload,
    ) -> Result<Option<User>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.users.iter().position(|u| u.username == username) else {
            return Ok(None);
        };
        let current_id = inner.users[pos].id;
        if let Some(new_username) = &patch.username {
            if inner
                .users
                .iter()
                .any(|u| u.id != current_id && &u.username == new_username)
            {
                return Err(ApiError::validation(
                    "username",
                    "This username is already taken.",
                ));
            }
        }
        if let Some(new_email) = &patch.email {
            if inner
                .users
                .iter()
                .any(|u| u.id != current_id && &u.email == new_email)
            {
                return Err(ApiError::validation("email", "This email is already taken."));
            }
        }
        let user = &mut inner.users[pos];
        if let Some(v) = patch.username {
            user.username = v;
        }
        if let Some(v) = patch.email {
            user.email = v;
        }
        if let Some(v) = patch.first_name {
            user.first_name = v;
        }
        if let Some(v) = patch.last_name {
            user.last_name = v;
        }
        if let Some(v) = patch.bio {
            user.bio = v;
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, username: &str) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.users.iter().position(|u| u.username == username) else {
            return Ok(false);
        };
        let user_id = inner.users[pos].id;
        inner.users.remove(pos);
        // Cascades: the user's reviews, comments on those reviews, and the
        // user's own comments.
        let removed_reviews: Vec<i64> = inner
            .reviews
            .iter()
            .filter(|r| r.author_id == user_id)
            .map(|r| r.id)
            .collect();
        inner.reviews.retain(|r| r.author_id != user_id);
        inner
            .comments
            .retain(|c| c.author_id != user_id && !removed_reviews.contains(&c.review_id));
        Ok(true)
    }

    async fn signup_user(
        &self,
        username: &str,
        email: &str,
        code: &str,
    ) -> Result<User, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter().find(|u| u.username == username) {
            if user.email != email {
                return Err(ApiError::validation(
                    "username",
                    "This username is already taken.",
                ));
            }
            return Ok(user.clone());
        }
        if inner.users.iter().any(|u| u.email == email) {
            return Err(ApiError::validation("email", "This email is already taken."));
        }
        let id = inner.next_id();
        let user = User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            confirmation_code: code.to_string(),
            ..User::default()
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn list_categories(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Category>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let needle = search.map(str::to_lowercase);
        let matched: Vec<Category> = inner
            .categories
            .iter()
            .filter(|c| match &needle {
                Some(n) => c.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.categories.iter().any(|c| c.slug == slug) {
            return Err(ApiError::validation("slug", "This slug is already taken."));
        }
        let category = Category {
            name: name.to_string(),
            slug: slug.to_string(),
        };
        inner.categories.push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, slug: &str) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.categories.iter().position(|c| c.slug == slug) else {
            return Ok(false);
        };
        inner.categories.remove(pos);
        // Titles keep existing, uncategorized.
        for title in &mut inner.titles {
            if title.category_slug.as_deref() == Some(slug) {
                title.category_slug = None;
            }
        }
        Ok(true)
    }

    async fn list_genres(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Genre>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let needle = search.map(str::to_lowercase);
        let matched: Vec<Genre> = inner
            .genres
            .iter()
            .filter(|g| match &needle {
                Some(n) => g.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn create_genre(&self, name: &str, slug: &str) -> Result<Genre, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.genres.iter().any(|g| g.slug == slug) {
            return Err(ApiError::validation("slug", "This slug is already taken."));
        }
        let genre = Genre {
            name: name.to_string(),
            slug: slug.to_string(),
        };
        inner.genres.push(genre.clone());
        Ok(genre)
    }

    async fn delete_genre(&self, slug: &str) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.genres.iter().position(|g| g.slug == slug) else {
            return Ok(false);
        };
        inner.genres.remove(pos);
        for title in &mut inner.titles {
            title.genre_slugs.retain(|s| s != slug);
        }
        Ok(true)
    }

    async fn list_titles(
        &self,
        genre: Option<&str>,
        category: Option<&str>,
        year: Option<i32>,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<TitleOut>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let matched: Vec<TitleOut> = inner
            .titles
            .iter()
            .filter(|t| genre.is_none_or(|g| t.genre_slugs.iter().any(|s| s == g)))
            .filter(|t| category.is_none_or(|c| t.category_slug.as_deref() == Some(c)))
            .filter(|t| year.is_none_or(|y| t.year == y))
            // Case-sensitive contains, matching the store collation rule.
            .filter(|t| name.is_none_or(|n| t.name.contains(n)))
            .map(|t| inner.title_out(t))
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn get_title(&self, id: i64) -> Result<Option<TitleOut>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|t| inner.title_out(t)))
    }

    async fn title_exists(&self, id: i64) -> Result<bool, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.titles.iter().any(|t| t.id == id))
    }

    async fn create_title(
        &self,
        name: &str,
        year: i32,
        description: &str,
        genre_slugs: &[String],
        category_slug: Option<&str>,
    ) -> Result<TitleOut, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slug) = category_slug {
            if !inner.categories.iter().any(|c| c.slug == slug) {
                return Err(ApiError::validation(
                    "category",
                    format!("Object with slug={slug} does not exist."),
                ));
            }
        }
        for slug in genre_slugs {
            if !inner.genres.iter().any(|g| &g.slug == slug) {
                return Err(ApiError::validation(
                    "genre",
                    format!("Object with slug={slug} does not exist."),
                ));
            }
        }
        let id = inner.next_id();
        let rec = TitleRec {
            id,
            name: name.to_string(),
            year,
            description: description.to_string(),
            category_slug: category_slug.map(str::to_string),
            genre_slugs: genre_slugs.to_vec(),
        };
        inner.titles.push(rec.clone());
        Ok(inner.title_out(&rec))
    }

    async fn update_title(
        &self,
        id: i64,
        patch: TitleWrite,
    ) -> Result<Option<TitleOut>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.titles.iter().any(|t| t.id == id) {
            return Ok(None);
        }
        if let Some(slug) = &patch.category {
            if !inner.categories.iter().any(|c| &c.slug == slug) {
                return Err(ApiError::validation(
                    "category",
                    format!("Object with slug={slug} does not exist."),
                ));
            }
        }
        if let Some(slugs) = &patch.genre {
            for slug in slugs {
                if !inner.genres.iter().any(|g| &g.slug == slug) {
                    return Err(ApiError::validation(
                        "genre",
                        format!("Object with slug={slug} does not exist."),
                    ));
                }
            }
        }
        let pos = inner.titles.iter().position(|t| t.id == id).unwrap();
        {
            let title = &mut inner.titles[pos];
            if let Some(v) = patch.name {
                title.name = v;
            }
            if let Some(v) = patch.year {
                title.year = v;
            }
            if let Some(v) = patch.description {
                title.description = v;
            }
            if let Some(v) = patch.category {
                title.category_slug = Some(v);
            }
            if let Some(v) = patch.genre {
                title.genre_slugs = v;
            }
        }
        let rec = inner.titles[pos].clone();
        Ok(Some(inner.title_out(&rec)))
    }

    async fn delete_title(&self, id: i64) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner.titles.iter().position(|t| t.id == id) else {
            return Ok(false);
        };
        inner.titles.remove(pos);
        inner.reviews.retain(|r| r.title_id != id);
        inner.comments.retain(|c| c.title_id != id);
        Ok(true)
    }

    async fn list_reviews(
        &self,
        title_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<ReviewOut>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let matched: Vec<ReviewOut> = inner
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| inner.review_out(r))
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> Result<Option<ReviewOut>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reviews
            .iter()
            .find(|r| r.title_id == title_id && r.id == review_id)
            .map(|r| inner.review_out(r)))
    }

    async fn author_has_review(&self, title_id: i64, author_id: i64) -> Result<bool, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id))
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: &str,
        score: i16,
    ) -> Result<ReviewOut, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        // The store-level unique constraint on (title, author).
        if inner
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id)
        {
            return Err(ApiError::validation(
                "author",
                "You have already left a review for this title.",
            ));
        }
        let id = inner.next_id();
        let rec = ReviewRec {
            id,
            author_id,
            title_id,
            text: text.to_string(),
            score,
            pub_date: Utc::now(),
        };
        inner.reviews.push(rec.clone());
        Ok(inner.review_out(&rec))
    }

    async fn update_review(
        &self,
        title_id: i64,
        review_id: i64,
        text: Option<&str>,
        score: Option<i16>,
    ) -> Result<Option<ReviewOut>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .reviews
            .iter()
            .position(|r| r.title_id == title_id && r.id == review_id)
        else {
            return Ok(None);
        };
        {
            let review = &mut inner.reviews[pos];
            if let Some(v) = text {
                review.text = v.to_string();
            }
            if let Some(v) = score {
                review.score = v;
            }
        }
        let rec = inner.reviews[pos].clone();
        Ok(Some(inner.review_out(&rec)))
    }

    async fn delete_review(&self, title_id: i64, review_id: i64) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .reviews
            .iter()
            .position(|r| r.title_id == title_id && r.id == review_id)
        else {
            return Ok(false);
        };
        inner.reviews.remove(pos);
        inner.comments.retain(|c| c.review_id != review_id);
        Ok(true)
    }

    async fn list_comments(
        &self,
        title_id: i64,
        review_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<CommentOut>), ApiError> {
        let inner = self.inner.lock().unwrap();
        let matched: Vec<CommentOut> = inner
            .comments
            .iter()
            .filter(|c| c.title_id == title_id && c.review_id == review_id)
            .map(|c| inner.comment_out(c))
            .collect();
        Ok(page(matched, limit, offset))
    }

    async fn get_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<Option<CommentOut>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .comments
            .iter()
            .find(|c| c.title_id == title_id && c.review_id == review_id && c.id == comment_id)
            .map(|c| inner.comment_out(c)))
    }

    async fn create_comment(
        &self,
        title_id: i64,
        review_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentOut, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let rec = CommentRec {
            id,
            author_id,
            review_id,
            title_id,
            text: text.to_string(),
            pub_date: Utc::now(),
        };
        inner.comments.push(rec.clone());
        Ok(inner.comment_out(&rec))
    }

    async fn update_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
        text: Option<&str>,
    ) -> Result<Option<CommentOut>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(pos) = inner
            .comments
            .iter()
            .position(|c| c.title_id == title_id && c.review_id == review_id && c.id == comment_id)
        else {
            return Ok(None);
        };
        if let Some(v) = text {
            inner.comments[pos].text = v.to_string();
        }
        let rec = inner.comments[pos].clone();
        Ok(Some(inner.comment_out(&rec)))
    }

    async fn delete_comment(
        &self,
        title_id: i64,
        review_id: i64,
        comment_id: i64,
    ) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.comments.len();
        inner
            .comments
            .retain(|c| !(c.title_id == title_id && c.review_id == review_id && c.id == comment_id));
        Ok(inner.comments.len() < before)
    }
}

// --- Test Application Scaffolding ---

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub mailer: Arc<MockMailer>,
}

fn build_app(mailer: MockMailer) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let mailer = Arc::new(mailer);
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        mailer: mailer.clone() as MailerState,
        // Env::Local, so the x-username bypass header authenticates seeded users.
        config: AppConfig::default(),
    };
    TestApp {
        router: create_router(state),
        repo,
        mailer,
    }
}

pub fn spawn_app() -> TestApp {
    build_app(MockMailer::new())
}

pub fn spawn_app_with_failing_mailer() -> TestApp {
    build_app(MockMailer::new_failing())
}

/// Sends one request through the router and returns (status, JSON body).
/// `user` authenticates via the local-env bypass header.
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(username) = user {
        builder = builder.header("x-username", username);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    read_response(response).await
}

/// Same as [`request`], but authenticating with a real bearer token instead
/// of the development bypass header.
pub async fn request_bearer(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let request = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            builder.body(Body::from(json.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    read_response(response).await
}

async fn read_response(
    response: axum::response::Response,
) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}
