use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser, generate_confirmation_code, issue_token_pair},
    error::ApiError,
    models::{
        Category, CommentInput, CommentOut, Genre, NewUser, ReviewInput, ReviewOut,
        SignupRequest, SignupResponse, SlugPayload, TitleOut, TitleWrite, TokenRequest,
        TokenResponse, UserOut, UserPayload,
    },
    pagination::{Page, PageQuery},
    permissions::{catalog_gate, content_object_gate, users_gate},
};
use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

// --- Query Parameter Structs ---

/// SearchQuery
///
/// The `?search=` parameter accepted by the user, category, and genre list
/// endpoints (substring match).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// TitleFilter
///
/// Query parameters for the title list endpoint. `genre` and `category`
/// match by slug, `year` exactly, `name` by case-sensitive substring.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct TitleFilter {
    pub genre: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub name: Option<String>,
}

// --- Field Validation Helpers ---

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::validation(field, "This field is required."))
}

/// Usernames must be present, non-empty, within the column limit, and never
/// the literal `me`, which is reserved for the self-service route.
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::validation("username", "This field is required."));
    }
    if username == "me" {
        return Err(ApiError::validation(
            "username",
            "\"me\" is not a valid username.",
        ));
    }
    if username.len() > 150 {
        return Err(ApiError::validation(
            "username",
            "Ensure this field has no more than 150 characters.",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("email", "This field is required."));
    }
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::validation("email", "Enter a valid email address."));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if slug.is_empty() || slug.len() > 50 {
        return Err(ApiError::validation(
            "slug",
            "Ensure this field has between 1 and 50 characters.",
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "slug",
            "Only letters, digits, underscores, and hyphens are allowed.",
        ));
    }
    Ok(())
}

fn validate_year(year: i32) -> Result<(), ApiError> {
    if year > Utc::now().year() {
        return Err(ApiError::validation(
            "year",
            "The release year cannot be in the future.",
        ));
    }
    Ok(())
}

fn validate_score(score: i16) -> Result<(), ApiError> {
    if !(1..=10).contains(&score) {
        return Err(ApiError::validation(
            "score",
            "Score must be between 1 and 10.",
        ));
    }
    Ok(())
}

fn validate_name(name: &str, max: usize) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name", "This field is required."));
    }
    if name.len() > max {
        return Err(ApiError::validation(
            "name",
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

fn validate_review_text(text: &str) -> Result<(), ApiError> {
    if text.len() > 256 {
        return Err(ApiError::validation(
            "text",
            "Ensure this field has no more than 256 characters.",
        ));
    }
    Ok(())
}

// --- Authentication Flow ---

/// signup
///
/// [Public Route] First half of the two-step flow: validates the requested
/// identity, creates or reuses the user record, and emails the stored
/// confirmation code. A mail gateway failure is reported as a 400 but the
/// user record deliberately stays persisted, so a retried signup resends
/// the same code instead of regenerating it.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code sent", body = SignupResponse),
        (status = 400, description = "Validation or mail delivery failure")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    let username = require(payload.username, "username")?;
    validate_username(&username)?;
    let email = require(payload.email, "email")?;
    validate_email(&email)?;

    // The code only takes effect for a newly created row; an existing user
    // keeps the one generated on first save.
    let code = generate_confirmation_code();
    let user = state.repo.signup_user(&username, &email, &code).await?;

    state
        .mailer
        .send_confirmation_code(&user.email, &user.username, &user.confirmation_code)
        .await?;

    Ok(Json(SignupResponse {
        email: user.email,
        username: user.username,
    }))
}

/// obtain_token
///
/// [Public Route] Second half of the flow: exchanges a (username, code)
/// pair for a signed access token. Codes never rotate, so a repeated
/// correct exchange also succeeds.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Missing username or wrong code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let username = require(payload.username, "username")?;

    let user = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound)?;

    if payload.confirmation_code.as_deref() != Some(user.confirmation_code.as_str()) {
        return Err(ApiError::validation(
            "confirmation_code",
            "Invalid confirmation code",
        ));
    }

    let pair = issue_token_pair(user.id, &state.config.jwt_secret)?;
    Ok(Json(TokenResponse { token: pair.access }))
}

// --- Users ---

/// list_users
///
/// [Admin Route] Paginated user listing with username substring search.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(SearchQuery, PageQuery),
    responses((status = 200, description = "Users", body = Page<UserOut>))
)]
pub async fn list_users(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<UserOut>>, ApiError> {
    users_gate(&user)?;
    let (count, users) = state
        .repo
        .list_users(search.search.as_deref(), page.limit(), page.offset())
        .await?;
    let results = users.iter().map(UserOut::from).collect();
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// create_user
///
/// [Admin Route] Creates a user directly, role included. The confirmation
/// code is generated here the same way signup does it, so the account can
/// still complete the token flow.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = UserPayload,
    responses((status = 201, description = "Created", body = UserOut))
)]
pub async fn create_user(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<(StatusCode, Json<UserOut>), ApiError> {
    users_gate(&user)?;

    let username = require(payload.username, "username")?;
    validate_username(&username)?;
    let email = require(payload.email, "email")?;
    validate_email(&email)?;

    let created = state
        .repo
        .create_user(NewUser {
            username,
            email,
            first_name: payload.first_name.unwrap_or_default(),
            last_name: payload.last_name.unwrap_or_default(),
            bio: payload.bio.unwrap_or_default(),
            role: payload.role.unwrap_or_default(),
            confirmation_code: generate_confirmation_code(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserOut::from(&created))))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Profile", body = UserOut))
)]
pub async fn get_me(AuthUser { user }: AuthUser) -> Json<UserOut> {
    Json(UserOut::from(&user))
}

/// patch_me
///
/// [Authenticated Route] Self-service partial update. The role field is
/// always overwritten back to the caller's current role: including `role`
/// in the body must never escalate privileges.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UserPayload,
    responses((status = 200, description = "Updated", body = UserOut))
)]
pub async fn patch_me(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<UserPayload>,
) -> Result<Json<UserOut>, ApiError> {
    if let Some(username) = &payload.username {
        validate_username(username)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }
    payload.role = Some(user.role);

    let updated = state
        .repo
        .update_user(&user.username, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(UserOut::from(&updated)))
}

/// get_user
///
/// [Admin Route] Retrieve a user by username.
#[utoipa::path(
    get,
    path = "/api/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses((status = 200, description = "Found", body = UserOut))
)]
pub async fn get_user(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserOut>, ApiError> {
    users_gate(&user)?;
    let found = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(UserOut::from(&found)))
}

/// update_user
///
/// [Admin Route] Partial update of any user, including the role field.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UserPayload,
    responses((status = 200, description = "Updated", body = UserOut))
)]
pub async fn update_user(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<UserOut>, ApiError> {
    users_gate(&user)?;
    if let Some(new_username) = &payload.username {
        validate_username(new_username)?;
    }
    if let Some(email) = &payload.email {
        validate_email(email)?;
    }

    let updated = state
        .repo
        .update_user(&username, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(UserOut::from(&updated)))
}

/// delete_user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_user(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    users_gate(&user)?;
    if state.repo.delete_user(&username).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Categories ---

/// list_categories
///
/// [Public Route] Paginated category listing with name substring search.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    params(SearchQuery, PageQuery),
    responses((status = 200, description = "Categories", body = Page<Category>))
)]
pub async fn list_categories(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<Category>>, ApiError> {
    catalog_gate(user.as_ref(), true)?;
    let (count, results) = state
        .repo
        .list_categories(search.search.as_deref(), page.limit(), page.offset())
        .await?;
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// create_category
///
/// [Admin Route] Categories are create/list/destroy only; the slug is the
/// identity and editing in place is not offered.
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = SlugPayload,
    responses((status = 201, description = "Created", body = Category))
)]
pub async fn create_category(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SlugPayload>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    catalog_gate(Some(&user), false)?;
    let name = require(payload.name, "name")?;
    validate_name(&name, 256)?;
    let slug = require(payload.slug, "slug")?;
    validate_slug(&slug)?;

    let category = state.repo.create_category(&name, &slug).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// destroy_category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn destroy_category(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    catalog_gate(Some(&user), false)?;
    if state.repo.delete_category(&slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Genres ---

/// list_genres
#[utoipa::path(
    get,
    path = "/api/v1/genres",
    params(SearchQuery, PageQuery),
    responses((status = 200, description = "Genres", body = Page<Genre>))
)]
pub async fn list_genres(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<Genre>>, ApiError> {
    catalog_gate(user.as_ref(), true)?;
    let (count, results) = state
        .repo
        .list_genres(search.search.as_deref(), page.limit(), page.offset())
        .await?;
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// create_genre
#[utoipa::path(
    post,
    path = "/api/v1/genres",
    request_body = SlugPayload,
    responses((status = 201, description = "Created", body = Genre))
)]
pub async fn create_genre(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SlugPayload>,
) -> Result<(StatusCode, Json<Genre>), ApiError> {
    catalog_gate(Some(&user), false)?;
    let name = require(payload.name, "name")?;
    validate_name(&name, 256)?;
    let slug = require(payload.slug, "slug")?;
    validate_slug(&slug)?;

    let genre = state.repo.create_genre(&name, &slug).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

/// destroy_genre
#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}",
    params(("slug" = String, Path, description = "Genre slug")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn destroy_genre(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    catalog_gate(Some(&user), false)?;
    if state.repo.delete_genre(&slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Titles ---

/// list_titles
///
/// [Public Route] Paginated title listing in the nested representation,
/// filterable by genre slug, category slug, exact year, and name substring.
#[utoipa::path(
    get,
    path = "/api/v1/titles",
    params(TitleFilter, PageQuery),
    responses((status = 200, description = "Titles", body = Page<TitleOut>))
)]
pub async fn list_titles(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Query(filter): Query<TitleFilter>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<TitleOut>>, ApiError> {
    catalog_gate(user.as_ref(), true)?;
    let (count, results) = state
        .repo
        .list_titles(
            filter.genre.as_deref(),
            filter.category.as_deref(),
            filter.year,
            filter.name.as_deref(),
            page.limit(),
            page.offset(),
        )
        .await?;
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// get_title
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses((status = 200, description = "Found", body = TitleOut))
)]
pub async fn get_title(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TitleOut>, ApiError> {
    catalog_gate(user.as_ref(), true)?;
    let title = state.repo.get_title(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(title))
}

/// create_title
///
/// [Admin Route] Accepts category and genres by slug and responds with the
/// nested representation, rating included (null for a fresh title).
#[utoipa::path(
    post,
    path = "/api/v1/titles",
    request_body = TitleWrite,
    responses((status = 201, description = "Created", body = TitleOut))
)]
pub async fn create_title(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<TitleWrite>,
) -> Result<(StatusCode, Json<TitleOut>), ApiError> {
    catalog_gate(Some(&user), false)?;

    let name = require(payload.name, "name")?;
    validate_name(&name, 70)?;
    let year = require(payload.year, "year")?;
    validate_year(year)?;
    let genre_slugs = require(payload.genre, "genre")?;
    let category = require(payload.category, "category")?;
    let description = payload.description.unwrap_or_default();

    let title = state
        .repo
        .create_title(&name, year, &description, &genre_slugs, Some(category.as_str()))
        .await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// update_title
///
/// [Admin Route] Partial update; providing `genre` replaces the whole set.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = TitleWrite,
    responses((status = 200, description = "Updated", body = TitleOut))
)]
pub async fn update_title(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<TitleWrite>,
) -> Result<Json<TitleOut>, ApiError> {
    catalog_gate(Some(&user), false)?;
    if let Some(name) = &payload.name {
        validate_name(name, 70)?;
    }
    if let Some(year) = payload.year {
        validate_year(year)?;
    }

    let title = state
        .repo
        .update_title(id, payload)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(title))
}

/// destroy_title
///
/// [Admin Route] Deleting a title cascades to its reviews and their comments.
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn destroy_title(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    catalog_gate(Some(&user), false)?;
    if state.repo.delete_title(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Reviews ---

/// list_reviews
///
/// [Public Route] Reviews of one title. 404 when the title itself is absent.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title ID"), PageQuery),
    responses((status = 200, description = "Reviews", body = Page<ReviewOut>))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<ReviewOut>>, ApiError> {
    if !state.repo.title_exists(title_id).await? {
        return Err(ApiError::NotFound);
    }
    let (count, results) = state
        .repo
        .list_reviews(title_id, page.limit(), page.offset())
        .await?;
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// get_review
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses((status = 200, description = "Found", body = ReviewOut))
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<ReviewOut>, ApiError> {
    let review = state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(review))
}

/// create_review
///
/// [Authenticated Route] The author and title are injected server-side. A
/// second review by the same author on the same title is a validation
/// error; the check applies to creation only.
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title ID")),
    request_body = ReviewInput,
    responses(
        (status = 201, description = "Created", body = ReviewOut),
        (status = 400, description = "Duplicate review or invalid score")
    )
)]
pub async fn create_review(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Json(payload): Json<ReviewInput>,
) -> Result<(StatusCode, Json<ReviewOut>), ApiError> {
    if !state.repo.title_exists(title_id).await? {
        return Err(ApiError::NotFound);
    }
    if state.repo.author_has_review(title_id, user.id).await? {
        return Err(ApiError::validation(
            "author",
            "You have already left a review for this title.",
        ));
    }

    let text = require(payload.text, "text")?;
    validate_review_text(&text)?;
    let score = require(payload.score, "score")?;
    validate_score(score)?;

    let review = state
        .repo
        .create_review(title_id, user.id, &text, score)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// update_review
///
/// [Authenticated Route] Author, moderator, admin, or superuser only. The
/// duplicate-review rule does not apply to updates.
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = ReviewInput,
    responses((status = 200, description = "Updated", body = ReviewOut))
)]
pub async fn update_review(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<ReviewInput>,
) -> Result<Json<ReviewOut>, ApiError> {
    let review = state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    content_object_gate(Some(&user), false, review.author_id)?;

    if let Some(text) = &payload.text {
        validate_review_text(text)?;
    }
    if let Some(score) = payload.score {
        validate_score(score)?;
    }

    let updated = state
        .repo
        .update_review(title_id, review_id, payload.text.as_deref(), payload.score)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// destroy_review
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn destroy_review(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let review = state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    content_object_gate(Some(&user), false, review.author_id)?;

    if state.repo.delete_review(title_id, review_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

// --- Comments ---

/// list_comments
///
/// [Public Route] Comments of one review, scoped by both path segments: a
/// review outside the given title yields 404.
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        PageQuery
    ),
    responses((status = 200, description = "Comments", body = Page<CommentOut>))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Query(page): Query<PageQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Json<Page<CommentOut>>, ApiError> {
    state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let (count, results) = state
        .repo
        .list_comments(title_id, review_id, page.limit(), page.offset())
        .await?;
    Ok(Json(Page::new(count, results, &page, &uri)))
}

/// get_comment
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses((status = 200, description = "Found", body = CommentOut))
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<Json<CommentOut>, ApiError> {
    let comment = state
        .repo
        .get_comment(title_id, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(comment))
}

/// create_comment
///
/// [Authenticated Route] Author, review, and the review's title are all
/// injected server-side; the body carries only the text.
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID")
    ),
    request_body = CommentInput,
    responses((status = 201, description = "Created", body = CommentOut))
)]
pub async fn create_comment(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentInput>,
) -> Result<(StatusCode, Json<CommentOut>), ApiError> {
    state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let text = require(payload.text, "text")?;
    if text.trim().is_empty() {
        return Err(ApiError::validation("text", "This field is required."));
    }

    let comment = state
        .repo
        .create_comment(title_id, review_id, user.id, &text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentInput,
    responses((status = 200, description = "Updated", body = CommentOut))
)]
pub async fn update_comment(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Json(payload): Json<CommentInput>,
) -> Result<Json<CommentOut>, ApiError> {
    let comment = state
        .repo
        .get_comment(title_id, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    content_object_gate(Some(&user), false, comment.author_id)?;

    let updated = state
        .repo
        .update_comment(title_id, review_id, comment_id, payload.text.as_deref())
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(updated))
}

/// destroy_comment
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title ID"),
        ("review_id" = i64, Path, description = "Review ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn destroy_comment(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let comment = state
        .repo
        .get_comment(title_id, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    content_object_gate(Some(&user), false, comment.author_id)?;

    if state.repo.delete_comment(title_id, review_id, comment_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
