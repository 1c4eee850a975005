use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::get,
};
use deployment::Deployment;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{DeploymentImpl, middleware::USER_ID_HEADER};

pub mod cases;
pub mod comments;
pub mod dashboard;
pub mod health;
pub mod lookups;
pub mod users;

pub fn router(deployment: DeploymentImpl) -> Router {
    let cors = cors_layer(deployment.config().cors_origins.as_slice());

    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(cases::router(&deployment))
        .merge(comments::router(&deployment))
        .merge(lookups::router(&deployment))
        .merge(users::router(&deployment))
        .merge(dashboard::router(&deployment))
        .with_state(deployment);

    Router::new()
        .nest("/api", base_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Any origin when none are configured, otherwise exactly the configured list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
