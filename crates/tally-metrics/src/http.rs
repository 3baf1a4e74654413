use crate::codec;
use crate::context::{reject_nan, MetricContext};
use crate::logging;
use crate::metric::MetricKind;
use crate::snapshot::{Snapshot, SnapshotEntry};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

/// Path the snapshot is served under.
pub const METRICS_PATH: &str = "/api/v1/metrics.json/";

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    /// `allowNaN=false` drops counters with a NaN rate and NaN gauges.
    #[serde(rename = "allowNaN")]
    allow_nan: Option<String>,
}

impl MetricsQuery {
    fn allow_nan(&self) -> bool {
        !self
            .allow_nan
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("false"))
    }
}

/// Router exposing `context` as JSON:
///
/// - `GET /api/v1/metrics.json/`
/// - `GET /api/v1/metrics.json/{Counters|Gauges|BasicCounters|StatTimers}`
pub fn router(context: Arc<MetricContext>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(all_metrics))
        .route("/api/v1/metrics.json/{filter}", get(filtered_metrics))
        .with_state(context)
        .layer(middleware::from_fn(logging::request_logging))
}

async fn all_metrics(
    State(context): State<Arc<MetricContext>>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    json_response(&take_snapshot(&context, None, &query))
}

async fn filtered_metrics(
    State(context): State<Arc<MetricContext>>,
    Path(filter): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let Ok(kind) = filter.parse::<MetricKind>() else {
        return (StatusCode::NOT_FOUND, format!("unknown metric filter: {filter}")).into_response();
    };
    json_response(&take_snapshot(&context, Some(kind), &query))
}

fn take_snapshot(
    context: &MetricContext,
    kind: Option<MetricKind>,
    query: &MetricsQuery,
) -> Snapshot {
    let allow_nan = query.allow_nan();
    context.snapshot_filtered(kind, &|name: &str, entry: &SnapshotEntry| {
        allow_nan || reject_nan(name, entry)
    })
}

fn json_response(snapshot: &Snapshot) -> Response {
    match codec::encode(snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics snapshot");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
