use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any caller the gate resolved. Handlers on `/users/{id}/...` still check
/// that the caller is that user or an admin.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The identity attached by the gate.
        .route("/me", get(handlers::get_me))
        // GET/PUT/DELETE /users/{id}
        // Read, partially update or remove one user (self or admin).
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // GET /users/{id}/courses
        // Purchased courses, resolved against the catalog in purchase order.
        .route("/users/{id}/courses", get(handlers::list_purchased_courses))
        // POST /users/{id}/courses/{course_id}
        // Purchase: both sides must exist, repeats are rejected.
        .route(
            "/users/{id}/courses/{course_id}",
            post(handlers::add_purchased_course),
        )
}
