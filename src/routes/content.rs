use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Content Router Module
///
/// Reviews nested under a title, and comments nested under a review. Both
/// levels of nesting are enforced in the queries: an id pair that does not
/// line up (a review on another title, a comment on another review) is
/// outside the queryset and yields a 404.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /titles/{title_id}/reviews
        .route(
            "/titles/{title_id}/reviews",
            get(handlers::list_reviews).post(handlers::create_review),
        )
        // GET/PATCH/PUT/DELETE /titles/{title_id}/reviews/{review_id}
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(handlers::get_review)
                .patch(handlers::update_review)
                .put(handlers::update_review)
                .delete(handlers::destroy_review),
        )
        // GET/POST /titles/{title_id}/reviews/{review_id}/comments
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        // GET/PATCH/PUT/DELETE .../comments/{comment_id}
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(handlers::get_comment)
                .patch(handlers::update_comment)
                .put(handlers::update_comment)
                .delete(handlers::destroy_comment),
        )
}
