use crate::config::Config;
use crate::dashboard::{reference_instant, DashboardOverview, OverviewMemo};
use crate::errors::{AppError, ResultExt};
use crate::insights::{Insight, InsightGenerator};
use crate::metrics::MetricsResult;
use crate::models::*;
use crate::segments::{segment_members, Segment, SegmentResult};
use crate::store::{CustomerStore, SnapshotCache};
use crate::trend::{acquisition_trend, TrendPoint, TrendRange};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Customer source plus a short-lived snapshot cache in front of it.
    pub snapshots: SnapshotCache,
    /// Memoized overviews keyed by snapshot content and `as_of`.
    pub overview_memo: OverviewMemo,
    /// Insight stub.
    pub insight_generator: InsightGenerator,
}

impl AppState {
    pub fn new(config: Config, store: CustomerStore) -> Self {
        let snapshots = SnapshotCache::new(store, config.snapshot_ttl);
        // Overviews outlive a snapshot only by their content key, so one hour
        // and a few hundred entries cover every as_of a dashboard asks for.
        let overview_memo = OverviewMemo::new(Duration::from_secs(3600), 512);
        let insight_generator = InsightGenerator::new(config.insight_delay);

        Self {
            config,
            snapshots,
            overview_memo,
            insight_generator,
        }
    }

    /// Explicit `as_of` wins; otherwise the current time truncated to the
    /// configured resolution.
    fn resolve_as_of(&self, raw: Option<&str>) -> Result<DateTime<Utc>, AppError> {
        Ok(parse_as_of(raw)?
            .unwrap_or_else(|| reference_instant(Utc::now(), self.config.as_of_resolution)))
    }

    async fn overview(&self, raw_as_of: Option<&str>) -> Result<Arc<DashboardOverview>, AppError> {
        let as_of = self.resolve_as_of(raw_as_of)?;
        let snapshot = self
            .snapshots
            .snapshot()
            .await
            .context("Loading customers for overview")?;
        Ok(self.overview_memo.get_or_build(&snapshot, as_of).await)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub customer_source: String,
}

/// Members of one segment, with the segment card they belong to.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SegmentMembers {
    pub segment: SegmentResult,
    pub customers: Vec<CustomerRecord>,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "service",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            customer_source: state.snapshots.store().kind().to_string(),
        }),
    )
}

/// GET /api/customers
///
/// Current customer snapshot, in source order.
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "customers",
    responses(
        (status = 200, description = "All customers", body = [CustomerRecord]),
        (status = 502, description = "Customer source unavailable")
    )
)]
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CustomerRecord>>, AppError> {
    tracing::info!("GET /customers");

    let snapshot = state.snapshots.snapshot().await?;
    Ok(Json(snapshot.to_vec()))
}

/// GET /api/customers/:id
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    tag = "customers",
    params(("id" = String, Path, description = "Customer identifier")),
    responses(
        (status = 200, description = "The customer", body = CustomerRecord),
        (status = 404, description = "Unknown customer")
    )
)]
pub async fn get_customer_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CustomerRecord>, AppError> {
    tracing::info!("GET /customers/{}", id);

    let customer = state
        .snapshots
        .store()
        .fetch_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer with id {} not found", id)))?;

    Ok(Json(customer))
}

/// POST /api/customers/:id/generate-insight
///
/// Returns the canned insight after the configured delay.
#[utoipa::path(
    post,
    path = "/api/customers/{id}/generate-insight",
    tag = "customers",
    params(("id" = String, Path, description = "Customer identifier")),
    responses(
        (status = 200, description = "Generated insight", body = Insight),
        (status = 404, description = "Unknown customer")
    )
)]
pub async fn generate_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Insight>, AppError> {
    tracing::info!("POST /customers/{}/generate-insight", id);

    let customer = state
        .snapshots
        .store()
        .fetch_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer with id {} not found", id)))?;

    Ok(Json(state.insight_generator.generate(&customer).await))
}

/// GET /api/customers/overview
///
/// KPIs, their display strings and the segment cards for one `as_of`.
#[utoipa::path(
    get,
    path = "/api/customers/overview",
    tag = "overview",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Dashboard overview", body = DashboardOverview),
        (status = 400, description = "Invalid as_of")
    )
)]
pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<DashboardOverview>, AppError> {
    tracing::info!("GET /customers/overview - params: {:?}", params);

    let overview = state.overview(params.as_of.as_deref()).await?;
    Ok(Json(overview.as_ref().clone()))
}

/// GET /api/customers/overview/metrics
#[utoipa::path(
    get,
    path = "/api/customers/overview/metrics",
    tag = "overview",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Headline KPIs", body = MetricsResult),
        (status = 400, description = "Invalid as_of")
    )
)]
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<MetricsResult>, AppError> {
    tracing::info!("GET /customers/overview/metrics - params: {:?}", params);

    let overview = state.overview(params.as_of.as_deref()).await?;
    Ok(Json(overview.metrics.clone()))
}

/// GET /api/customers/overview/segments
#[utoipa::path(
    get,
    path = "/api/customers/overview/segments",
    tag = "overview",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Segment cards in display order", body = [SegmentResult]),
        (status = 400, description = "Invalid as_of")
    )
)]
pub async fn get_segments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<Vec<SegmentResult>>, AppError> {
    tracing::info!("GET /customers/overview/segments - params: {:?}", params);

    let overview = state.overview(params.as_of.as_deref()).await?;
    Ok(Json(overview.segments.clone()))
}

/// GET /api/customers/overview/trend
#[utoipa::path(
    get,
    path = "/api/customers/overview/trend",
    tag = "overview",
    params(TrendQuery),
    responses(
        (status = 200, description = "Daily acquisition series", body = [TrendPoint]),
        (status = 400, description = "Invalid range or as_of")
    )
)]
pub async fn get_trend(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, AppError> {
    tracing::info!("GET /customers/overview/trend - params: {:?}", params);

    let range = match params.range.as_deref() {
        Some(raw) => raw.parse::<TrendRange>().map_err(AppError::BadRequest)?,
        None => TrendRange::default(),
    };
    let as_of = state.resolve_as_of(params.as_of.as_deref())?;
    let snapshot = state.snapshots.snapshot().await?;

    Ok(Json(acquisition_trend(&snapshot, as_of, range)))
}

/// GET /api/customers/segments/:slug
#[utoipa::path(
    get,
    path = "/api/customers/segments/{slug}",
    tag = "overview",
    params(
        ("slug" = String, Path, description = "Segment slug, e.g. em-risco"),
        AsOfQuery
    ),
    responses(
        (status = 200, description = "Segment members in source order", body = SegmentMembers),
        (status = 404, description = "Unknown segment")
    )
)]
pub async fn get_segment_members(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<AsOfQuery>,
) -> Result<Json<SegmentMembers>, AppError> {
    tracing::info!("GET /customers/segments/{} - params: {:?}", slug, params);

    let segment = Segment::from_slug(&slug)
        .ok_or_else(|| AppError::NotFound(format!("Segment {} not found", slug)))?;
    let as_of = state.resolve_as_of(params.as_of.as_deref())?;
    let snapshot = state.snapshots.snapshot().await?;
    let overview = state.overview_memo.get_or_build(&snapshot, as_of).await;

    let card = overview
        .segments
        .iter()
        .find(|s| s.slug == segment.slug())
        .cloned()
        .ok_or_else(|| AppError::InternalError(format!("Segment {} missing from overview", slug)))?;

    let customers = segment_members(&snapshot, segment, as_of)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(SegmentMembers {
        segment: card,
        customers,
    }))
}

/// POST /api/overview/evaluate
///
/// Computes an overview over a caller-supplied customer array instead of the
/// configured source. The body must be a JSON array.
#[utoipa::path(
    post,
    path = "/api/overview/evaluate",
    tag = "overview",
    params(AsOfQuery),
    request_body = [CustomerRecord],
    responses(
        (status = 200, description = "Overview of the supplied customers", body = DashboardOverview),
        (status = 400, description = "Body is not an array of customer objects")
    )
)]
pub async fn evaluate_customers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AsOfQuery>,
    Json(body): Json<Value>,
) -> Result<Json<DashboardOverview>, AppError> {
    let customers = parse_customer_batch(body)?;
    tracing::info!(
        "POST /overview/evaluate - {} customers, params: {:?}",
        customers.len(),
        params
    );

    let as_of = state.resolve_as_of(params.as_of.as_deref())?;
    Ok(Json(DashboardOverview::build(&customers, as_of)))
}
