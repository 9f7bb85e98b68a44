use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Management routes. The gate runs first (401 on a bad token); each handler then
/// checks `role == admin` and answers 403 otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /users
        // List every user; create a user from `{ name }`.
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        // POST /courses, PUT/DELETE /courses/{id}
        // Catalog writes. Deleting a course does not touch users who bought it.
        .route("/courses", post(handlers::create_course))
        .route(
            "/courses/{id}",
            put(handlers::update_course).delete(handlers::delete_course),
        )
        // GET /admins, GET/PUT/DELETE /admins/{id}
        .route("/admins", get(handlers::list_admins))
        .route(
            "/admins/{id}",
            get(handlers::get_admin)
                .put(handlers::update_admin)
                .delete(handlers::delete_admin),
        )
}
