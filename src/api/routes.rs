use crate::api::{handlers, users, AppState};
use crate::auth::require_auth;
use crate::config::CorsConfig;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let protected = Router::new()
        // Session
        .route("/auth/logout", get(users::logout))
        // Incident management
        .route(
            "/incidents",
            post(handlers::create_incident).get(handlers::list_incidents),
        )
        .route("/incidents/search", get(handlers::search_incidents))
        .route(
            "/incidents/:id",
            get(handlers::get_incident)
                .patch(handlers::update_incident)
                .delete(handlers::delete_incident),
        )
        .route("/incidents/:id/discussion", post(handlers::add_discussion))
        // User management
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::deactivate_user),
        )
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_auth,
        ));

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        // Registration and login
        .route("/auth/register", post(users::register))
        .route("/auth/login", post(users::login))
        .merge(protected)
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new().include_headers(false)),
        )
        .layer(cors_layer(cors))
}

/// Restrict cross-origin access to the configured origins; permissive when none are set
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
