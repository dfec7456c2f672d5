use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// User Router Module
///
/// Administration CRUD keyed by username (admin or superuser only) plus the
/// self-service `/users/me` route for any authenticated caller. The static
/// `me` segment is registered alongside the username capture and takes
/// priority, which is also why `me` is a forbidden username.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET  /users?search=<substring>
        // POST /users
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        // GET/PATCH /users/me
        // Self-service profile. PATCH preserves the caller's role no matter
        // what the request body claims.
        .route(
            "/users/me",
            get(handlers::get_me).patch(handlers::patch_me),
        )
        // GET/PATCH/PUT/DELETE /users/{username}
        .route(
            "/users/{username}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
