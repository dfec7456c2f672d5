use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get},
};

/// Catalog Router Module
///
/// Categories, genres, and titles. Reads are open to anonymous callers;
/// every mutation requires admin rights (or superuser), enforced by the
/// catalog gate inside each handler.
///
/// Categories and genres deliberately have no update or retrieve-by-slug
/// route: the slug is the identity, so the only mutations are create and
/// destroy.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        // DELETE /categories/{slug}
        .route("/categories/{slug}", delete(handlers::destroy_category))
        // GET/POST /genres
        .route(
            "/genres",
            get(handlers::list_genres).post(handlers::create_genre),
        )
        // DELETE /genres/{slug}
        .route("/genres/{slug}", delete(handlers::destroy_genre))
        // GET/POST /titles?genre=&category=&year=&name=
        .route(
            "/titles",
            get(handlers::list_titles).post(handlers::create_title),
        )
        // GET/PATCH/PUT/DELETE /titles/{title_id}
        // The segment is named `title_id` to match the nested review routes.
        .route(
            "/titles/{title_id}",
            get(handlers::get_title)
                .patch(handlers::update_title)
                .put(handlers::update_title)
                .delete(handlers::destroy_title),
        )
}
