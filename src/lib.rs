use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;

// Routers split by access level (public, authenticated, admin).
pub mod routes;
use auth::{AuthUser, TokenAuthority, TokenState};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, AuthError, RepoError};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::admin_signup, handlers::admin_signin, handlers::user_signup,
        handlers::user_signin, handlers::list_courses, handlers::get_course,
        handlers::get_me, handlers::get_user, handlers::update_user, handlers::delete_user,
        handlers::list_purchased_courses, handlers::add_purchased_course,
        handlers::list_users, handlers::create_user, handlers::create_course,
        handlers::update_course, handlers::delete_course, handlers::list_admins,
        handlers::get_admin, handlers::update_admin, handlers::delete_admin
    ),
    components(
        schemas(
            models::Admin, models::User, models::Course, models::NewCourse, models::CoursePatch,
            models::CredentialsRequest, models::CreateUserRequest, models::UpdateAccountRequest,
            models::TokenResponse, models::MeResponse, models::MessageResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "course-portal", description = "Course catalog and purchases API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for everything handlers need.
#[derive(Clone)]
pub struct AppState {
    /// Resource store: admins, users, courses and purchases.
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
    /// Token issuing and verification, keyed by `config.secret`.
    pub tokens: TokenState,
}

impl AppState {
    /// Assembles the state, building the token authority from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = Arc::new(TokenAuthority::new(&config));
        Self {
            repo,
            config,
            tokens,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// The authentication gate in front of the authenticated and admin routers.
///
/// Extracting `AuthUser` runs verification exactly once. On failure the extractor's
/// rejection (401 + `{ message }`) is the response and `next` is never called. On
/// success the identity is attached to the request extensions, where the handler's own
/// `AuthUser` extractor picks it up without verifying again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the gate and the observability layers,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let gate = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // `route_layer` so unmatched paths still 404 instead of 401.
        .merge(authenticated::authenticated_routes().route_layer(gate()))
        .merge(admin::admin_routes().route_layer(gate()))
        .with_state(state.clone());

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, uri and the `x-request-id` set by the layer above,
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
