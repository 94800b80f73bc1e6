//! HTTP surface: routes, middleware and the OpenAPI document.

use crate::dashboard::DashboardOverview;
use crate::handlers::{self, AppState, HealthResponse, SegmentMembers};
use crate::insights::Insight;
use crate::metrics::{DataStatus, MetricsDisplay, MetricsResult};
use crate::models::{CustomerRecord, Evaluation};
use crate::segments::SegmentResult;
use crate::trend::TrendPoint;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Request size limit for every API route.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CRM Metrics API",
        description = "Customer KPIs and behavioral segments for the CRM dashboard"
    ),
    paths(
        handlers::health,
        handlers::list_customers,
        handlers::get_customer_by_id,
        handlers::generate_insight,
        handlers::get_overview,
        handlers::get_metrics,
        handlers::get_segments,
        handlers::get_trend,
        handlers::get_segment_members,
        handlers::evaluate_customers,
    ),
    components(schemas(
        CustomerRecord,
        Evaluation,
        MetricsResult,
        MetricsDisplay,
        DataStatus,
        SegmentResult,
        SegmentMembers,
        DashboardOverview,
        TrendPoint,
        Insight,
        HealthResponse,
    )),
    tags(
        (name = "customers", description = "Customer records"),
        (name = "overview", description = "Dashboard KPIs and segments"),
        (name = "service", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Path segments under `/api/customers/` taken by derived views. A customer
/// whose id equals one of these is listed by `/api/customers` but cannot be
/// fetched through `/api/customers/:id`.
pub const RESERVED_CUSTOMER_PATHS: [&str; 2] = ["overview", "segments"];

/// Routes subject to rate limiting. The caller layers the limiter on top.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/customers", get(handlers::list_customers))
        // Static segments win over `:id`; see RESERVED_CUSTOMER_PATHS.
        .route("/api/customers/overview", get(handlers::get_overview))
        .route(
            "/api/customers/overview/metrics",
            get(handlers::get_metrics),
        )
        .route(
            "/api/customers/overview/segments",
            get(handlers::get_segments),
        )
        .route("/api/customers/overview/trend", get(handlers::get_trend))
        .route(
            "/api/customers/segments/:slug",
            get(handlers::get_segment_members),
        )
        .route("/api/customers/:id", get(handlers::get_customer_by_id))
        .route(
            "/api/customers/:id/generate-insight",
            post(handlers::generate_insight),
        )
        .route(
            "/api/overview/evaluate",
            post(handlers::evaluate_customers),
        )
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
}

/// Assembles the application: health check, the given API routes, Swagger UI
/// and request tracing.
///
/// `/health` stays outside `api` so that platform probes bypass whatever
/// limits the caller placed on the API routes.
pub fn app(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the dashboard origin; permissive when no origin is configured.
pub fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    match origin {
        None => Ok(CorsLayer::permissive()),
        Some(origin) => {
            let origin = origin
                .parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("CORS_ORIGIN is not a valid header value: {}", e))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any))
        }
    }
}
