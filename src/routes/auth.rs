use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authentication Router Module
///
/// The two unauthenticated endpoints of the signup flow: requesting a
/// confirmation code by email, and exchanging it for an access token.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/signup
        // Validates the requested identity and emails the confirmation code.
        .route("/auth/signup", post(handlers::signup))
        // POST /auth/token
        // Exchanges (username, confirmation_code) for an access token.
        .route("/auth/token", post(handlers::obtain_token))
}
