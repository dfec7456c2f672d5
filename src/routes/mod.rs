/// Router Module Index
///
/// Organizes the versioned API surface by resource family. Access control
/// is not split per router here: most paths mix open reads with privileged
/// writes, so each handler applies its own permission gate after the
/// authentication extractors run.

/// Signup and token-exchange endpoints.
pub mod auth;

/// User administration and the self-service profile routes.
pub mod users;

/// Categories, genres, and titles.
pub mod catalog;

/// Reviews and comments, nested under titles.
pub mod content;

use crate::AppState;
use axum::Router;

/// api_v1_routes
///
/// Assembles every resource router under the caller-provided version prefix.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::auth_routes())
        .merge(users::user_routes())
        .merge(catalog::catalog_routes())
        .merge(content::content_routes())
}
