use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The user's role tri-state. Stored as text in the `users` table; the
/// cross-cutting `is_staff`/`is_superuser` flags live next to it and are
/// combined only through the derived `User::is_admin`/`User::is_moderator`
/// functions, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User
///
/// Canonical account record from the `users` table, including the
/// confirmation code used by the authentication flow. This struct never
/// leaves the server as-is; API responses use [`UserOut`].
#[derive(Debug, Clone, PartialEq, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub first_name: String,
    pub last_name: String,
    pub confirmation_code: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    /// Staff status, an admin role, or superuser all grant admin rights.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator || self.is_superuser
    }
}

/// UserOut
///
/// The user representation exposed by the API: exactly the editable profile
/// fields plus the role. Internal columns (id, flags, confirmation code)
/// stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserOut {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<&User> for UserOut {
    fn from(user: &User) -> Self {
        UserOut {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            bio: user.bio.clone(),
            role: user.role,
        }
    }
}

/// Category
///
/// Catalog category. Identity is the slug; there is no in-place editing, so
/// the numeric key never appears in the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Category {
    pub name: String,
    pub slug: String,
}

/// Genre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Genre {
    pub name: String,
    pub slug: String,
}

/// TitleRow
///
/// Raw database projection for a title: the scalar columns, the left-joined
/// category, and the aggregated rating. Genres are attached afterwards
/// (one query per page, not per row) to build a [`TitleOut`].
#[derive(Debug, Clone, FromRow)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: String,
    pub rating: Option<f64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

/// TitleOut
///
/// The nested title representation used by every title response: full
/// category and genre objects plus the computed average rating (null when
/// the title has no reviews).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TitleOut {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: String,
    pub rating: Option<f64>,
    pub genre: Vec<Genre>,
    pub category: Option<Category>,
}

impl TitleOut {
    pub fn from_row(row: TitleRow, genre: Vec<Genre>) -> Self {
        let category = match (row.category_name, row.category_slug) {
            (Some(name), Some(slug)) => Some(Category { name, slug }),
            _ => None,
        };
        TitleOut {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            rating: row.rating,
            genre,
            category,
        }
    }
}

/// ReviewOut
///
/// Review representation: the author is rendered as a username. The numeric
/// author id is carried along for ownership checks but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct ReviewOut {
    pub id: i64,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

/// CommentOut
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct CommentOut {
    pub id: i64,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input for POST /auth/signup. Both fields are optional at the type level
/// so their absence surfaces as a field-keyed validation error rather than
/// a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// SignupResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignupResponse {
    pub email: String,
    pub username: String,
}

/// TokenRequest
///
/// Input for POST /auth/token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

/// TokenResponse
///
/// Only the access token is surfaced; the refresh half of the pair never
/// leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenResponse {
    pub token: String,
}

/// UserPayload
///
/// Input payload for user creation and (partial) updates. All fields are
/// optional; the handlers decide which ones are mandatory per operation and
/// whether `role` may be honored (the self-service endpoint always forces it
/// back to the caller's current role).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserPayload {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

/// NewUser
///
/// Validated insert payload assembled by the handlers; the confirmation
/// code is set exactly once, here, when the record is first created.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    pub confirmation_code: String,
}

/// SlugPayload
///
/// Input for category/genre creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SlugPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// TitleWrite
///
/// Write-side title payload: category and genres are referenced by slug and
/// re-expanded to nested objects in the response. All fields optional to
/// support partial updates; creation validates the required ones.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TitleWrite {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
    pub category: Option<String>,
}

/// ReviewInput
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ReviewInput {
    pub text: Option<String>,
    pub score: Option<i16>,
}

/// CommentInput
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CommentInput {
    pub text: Option<String>,
}
