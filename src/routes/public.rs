use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Nothing here mutates existing records;
/// signup only creates the caller's own account.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /admin/signup, /admin/signin
        // Signup is anonymous only for the first admin; afterwards the handler runs the
        // gate itself and requires an admin caller. Signin is open.
        .route("/admin/signup", post(handlers::admin_signup))
        .route("/admin/signin", post(handlers::admin_signin))
        // POST /users/signup, /users/signin
        // User self-registration and token exchange.
        .route("/users/signup", post(handlers::user_signup))
        .route("/users/signin", post(handlers::user_signin))
        // GET /courses, /courses/{id}
        // The catalog is browsable anonymously; writes live in the admin router.
        .route("/courses", get(handlers::list_courses))
        .route("/courses/{id}", get(handlers::get_course))
}
