mod metrics;
mod models;
mod queries;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use common::config::{Aggregation, Config};
use common::query::{QueryDescriptor, QueryExecutor, SnapshotExecutor};
use common::types::{EntityKind, Granularity, TradeRecord};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use models::{ActivityView, RankingView, SeriesView, SummaryView};
use queries::{ChartRequest, Metric, RankingSpan, Span};

pub struct AppState<E> {
    pub executor: E,
    pub query: QueryDescriptor,
    pub aggregation: Aggregation,
    pub prometheus: Option<PrometheusHandle>,
}

/// Fetch the trades relation and parse it into records.
/// Every request reads the relation afresh; nothing is cached between requests.
async fn load_records<E: QueryExecutor>(state: &AppState<E>) -> Result<Vec<TradeRecord>> {
    let table = state.executor.execute(&state.query).await?;
    let records = table.to_records()?;
    ::metrics::counter!("dashboard_records_loaded_total").increment(records.len() as u64);
    Ok(records)
}

// --- Errors ---

pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(e) => {
                tracing::error!(error = %e, "dashboard view failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self::Internal(e.into())
    }
}

fn bad_request(e: String) -> ApiError {
    ApiError::BadRequest(e)
}

/// Record outcome and latency for one view.
fn observe<T>(route: &'static str, start: Instant, res: &Result<T, ApiError>) {
    let status = match res {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "bad_request",
        Err(ApiError::Internal(_)) => "error",
    };
    ::metrics::counter!("dashboard_requests_total", "route" => route, "status" => status)
        .increment(1);
    ::metrics::histogram!("dashboard_aggregation_latency_ms", "route" => route)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

// --- Query parameters ---

#[derive(Debug, Default, Deserialize)]
struct ChartParams {
    kind: Option<String>,
    granularity: Option<String>,
    span: Option<String>,
    top: Option<usize>,
    metric: Option<String>,
}

impl ChartParams {
    fn kind(&self) -> Result<EntityKind, ApiError> {
        self.kind
            .as_deref()
            .map_or(Ok(EntityKind::Chain), str::parse)
            .map_err(bad_request)
    }

    fn span(&self) -> Result<Span, ApiError> {
        self.span
            .as_deref()
            .map_or(Ok(Span::default()), str::parse)
            .map_err(bad_request)
    }

    fn ranking_span(&self) -> Result<RankingSpan, ApiError> {
        self.span
            .as_deref()
            .map_or(Ok(RankingSpan::default()), str::parse)
            .map_err(bad_request)
    }

    fn metric(&self) -> Result<Metric, ApiError> {
        self.metric
            .as_deref()
            .map_or(Ok(Metric::default()), str::parse)
            .map_err(bad_request)
    }

    fn granularity(&self, fallback: Granularity) -> Result<Granularity, ApiError> {
        self.granularity
            .as_deref()
            .map_or(Ok(fallback), str::parse)
            .map_err(bad_request)
    }

    fn chart_request(&self, aggregation: &Aggregation) -> Result<ChartRequest, ApiError> {
        let span = self.span()?;
        let fallback = span.default_granularity(aggregation.default_granularity);
        Ok(ChartRequest {
            kind: self.kind()?,
            granularity: self.granularity(fallback)?,
            span,
            policy: aggregation.swap_policy,
            now: Utc::now(),
        })
    }
}

// --- Handlers ---

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint<E>(State(state): State<Arc<AppState<E>>>) -> Response {
    match &state.prometheus {
        Some(handle) => {
            handle.run_upkeep();
            handle.render().into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn summary<E>(State(state): State<Arc<AppState<E>>>) -> Result<Json<SummaryView>, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let records = load_records(&state).await?;
        Ok::<_, ApiError>(queries::summary_view(&records))
    }
    .await;
    observe("summary", start, &res);
    res.map(Json)
}

async fn volume<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(params): Query<ChartParams>,
) -> Result<Json<SeriesView>, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let req = params.chart_request(&state.aggregation)?;
        let top_n = params.top.unwrap_or(state.aggregation.top_n);
        let records = load_records(&state).await?;
        Ok::<_, ApiError>(queries::volume_breakdown(&records, &req, top_n))
    }
    .await;
    observe("volume", start, &res);
    res.map(Json)
}

async fn entity_volume<E>(
    State(state): State<Arc<AppState<E>>>,
    Path((kind, entity)): Path<(String, String)>,
    Query(params): Query<ChartParams>,
) -> Result<Json<SeriesView>, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let mut req = params.chart_request(&state.aggregation)?;
        req.kind = kind.parse().map_err(bad_request)?;
        let records = load_records(&state).await?;
        Ok::<_, ApiError>(queries::entity_volume(&records, &req, &entity))
    }
    .await;
    observe("entity_volume", start, &res);
    res.map(Json)
}

async fn rankings<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(params): Query<ChartParams>,
) -> Result<Json<RankingView>, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let kind = params.kind()?;
        let span = params.ranking_span()?;
        let records = load_records(&state).await?;
        Ok::<_, ApiError>(queries::ranking_view(
            &records,
            kind,
            span,
            state.aggregation.swap_policy,
            Utc::now(),
        ))
    }
    .await;
    observe("rankings", start, &res);
    res.map(Json)
}

async fn cumulative<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(params): Query<ChartParams>,
) -> Result<Response, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let metric = params.metric()?;
        let granularity = params.granularity(state.aggregation.default_granularity)?;
        let records = load_records(&state).await?;
        let body = match metric {
            Metric::Volume => {
                Json(queries::cumulative_volume(&records, granularity)).into_response()
            }
            Metric::Trades => {
                Json(queries::cumulative_trades(&records, granularity)).into_response()
            }
            Metric::Wallets => {
                Json(queries::cumulative_wallets(&records, granularity)).into_response()
            }
        };
        Ok::<_, ApiError>(body)
    }
    .await;
    observe("cumulative", start, &res);
    res
}

async fn activity<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(params): Query<ChartParams>,
) -> Result<Json<ActivityView>, ApiError>
where
    E: QueryExecutor + Send + Sync,
{
    let start = Instant::now();
    let res = async {
        let span = params.span()?;
        let granularity =
            params.granularity(span.default_granularity(state.aggregation.default_granularity))?;
        let records = load_records(&state).await?;
        Ok::<_, ApiError>(queries::activity_view(
            &records,
            granularity,
            span,
            Utc::now(),
        ))
    }
    .await;
    observe("activity", start, &res);
    res.map(Json)
}

// --- Router ---

pub fn create_router_with_state<E>(state: Arc<AppState<E>>) -> Router
where
    E: QueryExecutor + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint::<E>))
        .route("/api/summary", get(summary::<E>))
        .route("/api/volume", get(volume::<E>))
        .route("/api/volume/{kind}/{entity}", get(entity_volume::<E>))
        .route("/api/rankings", get(rankings::<E>))
        .route("/api/cumulative", get(cumulative::<E>))
        .route("/api/activity", get(activity::<E>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    let dispatch = common::observability::build_dispatch(
        config.observability.service_name.clone(),
        &config.general.log_level,
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let prometheus = metrics::install()?;

    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or_else(|| "0.0.0.0".to_string(), |w| w.host.clone());

    let state = Arc::new(AppState {
        executor: SnapshotExecutor::new(&config.source.snapshot_dir),
        query: QueryDescriptor::relation(config.source.relation.clone()),
        aggregation: config.aggregation,
        prometheus: Some(prometheus),
    });

    let app = create_router_with_state(state);
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!(
        %addr,
        relation = %config.source.relation,
        swap_policy = config.aggregation.swap_policy.as_str(),
        "dashboard listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::error::SourceError;
    use common::rows::Table;
    use common::types::SwapPolicy;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Serves a fixed table without touching disk.
    struct FixedExecutor(Table);

    impl QueryExecutor for FixedExecutor {
        async fn execute(&self, _query: &QueryDescriptor) -> Result<Table, SourceError> {
            Ok(self.0.clone())
        }
    }

    fn aggregation(swap_policy: SwapPolicy) -> Aggregation {
        Aggregation {
            swap_policy,
            top_n: 2,
            default_granularity: Granularity::Day,
        }
    }

    fn sample_rows() -> Value {
        json!([
            {"timestamp": "2025-02-01T03:00:00Z", "transaction_id": "t1", "source_chain": "eth",
             "dest_chain": "polygon", "source_asset": "USDC", "dest_asset": "USDT",
             "source_volume": "100", "dest_volume": 100, "wallet": "w1"},
            {"timestamp": "2025-02-01T05:00:00Z", "transaction_id": "t2", "source_chain": "eth",
             "dest_chain": "eth", "source_asset": "WETH", "dest_asset": "USDC",
             "source_volume": 50, "dest_volume": 50, "wallet": "w2"},
            {"timestamp": "2025-02-02T05:00:00Z", "transaction_id": "t3", "source_chain": "base",
             "dest_chain": "solana", "source_asset": "USDC", "dest_asset": "SOL",
             "source_volume": 5, "dest_volume": 5, "wallet": "w1"}
        ])
    }

    fn app_with(rows: Value, swap_policy: SwapPolicy) -> Router {
        let table = Table::from_value(rows).unwrap();
        let state = Arc::new(AppState {
            executor: FixedExecutor(table),
            query: QueryDescriptor::relation("main_volume_table"),
            aggregation: aggregation(swap_policy),
            prometheus: None,
        });
        create_router_with_state(state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let app = app_with(json!([]), SwapPolicy::Full);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder_is_404() {
        let app = app_with(json!([]), SwapPolicy::Full);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_summary_counts_trades() {
        let app = app_with(sample_rows(), SwapPolicy::Full);
        let (status, body) = get_json(app, "/api/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["no_data"], false);
        assert_eq!(body["trade_count"], 3);
        assert_eq!(body["unique_wallets"], 2);
        assert_eq!(body["total_volume"], "310");
    }

    #[tokio::test]
    async fn test_volume_breakdown_has_other() {
        let (status, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Full),
            "/api/volume?kind=chain&granularity=day&span=all&top=1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let points = body["points"].as_array().unwrap();
        let series: Vec<&str> = points
            .iter()
            .map(|p| p["series"].as_str().unwrap())
            .collect();
        assert_eq!(series, vec!["eth", "Other", "Other"]);
        assert_eq!(points[0]["value"], "200");
        assert_eq!(points[1]["value"], "100");
        assert_eq!(points[2]["value"], "10");
        assert_eq!(body["swap_policy"], "full");
    }

    #[tokio::test]
    async fn test_halved_breakdown_without_tail_has_no_other() {
        let (status, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Halved),
            "/api/volume?kind=chain&granularity=day&span=all&top=8",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let points = body["points"].as_array().unwrap();
        let series: Vec<&str> = points
            .iter()
            .map(|p| p["series"].as_str().unwrap())
            .collect();
        assert!(!series.contains(&"Other"), "unexpected Other in {series:?}");
        assert_eq!(&series[..2], &["eth", "polygon"]);
        assert_eq!(points[0]["value"], "150");
        assert_eq!(points[1]["value"], "100");
        assert_eq!(body["swap_policy"], "halved");
    }

    #[tokio::test]
    async fn test_halved_policy_changes_self_swap_volume() {
        let (_, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Halved),
            "/api/volume/chain/eth?granularity=day",
        )
        .await;
        let points = body["points"].as_array().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0]["value"], "150");
        assert_eq!(body["swap_policy"], "halved");
    }

    #[tokio::test]
    async fn test_total_entity_series() {
        let (status, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Full),
            "/api/volume/asset/Total",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let values: Vec<&str> = body["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["value"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["300", "10"]);
        assert_eq!(body["kind"], "asset");
    }

    #[tokio::test]
    async fn test_rankings_by_asset() {
        let (status, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Full),
            "/api/rankings?kind=assets",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entities = body["entities"].as_array().unwrap();
        assert_eq!(entities[0]["entity"], "USDC");
        assert_eq!(entities[0]["volume"], "155");
    }

    #[tokio::test]
    async fn test_cumulative_metrics() {
        let app = app_with(sample_rows(), SwapPolicy::Full);
        let (_, body) = get_json(app.clone(), "/api/cumulative?metric=volume").await;
        assert_eq!(body["metric"], "volume");
        assert_eq!(body["points"][1]["running_total"], "310");

        let (_, body) = get_json(app.clone(), "/api/cumulative?metric=trades").await;
        assert_eq!(body["points"][1]["running_total"], 3);

        let (_, body) = get_json(app, "/api/cumulative?metric=wallets").await;
        assert_eq!(body["points"][1]["running_total"], 2);
    }

    #[tokio::test]
    async fn test_activity_latest_day_is_hourly() {
        let (status, body) = get_json(
            app_with(sample_rows(), SwapPolicy::Full),
            "/api/activity?span=day",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["granularity"], "hour");
        let buckets = body["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["bucket"], "2025-02-01T03:00:00Z");
    }

    #[tokio::test]
    async fn test_empty_relation_is_no_data() {
        let app = app_with(json!({"result": null}), SwapPolicy::Full);
        for uri in ["/api/summary", "/api/volume", "/api/rankings", "/api/activity"] {
            let (status, body) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(body["no_data"], true, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_bad_parameters_are_400() {
        let app = app_with(sample_rows(), SwapPolicy::Full);
        for uri in [
            "/api/volume?kind=pools",
            "/api/volume?granularity=week",
            "/api/volume?span=decade",
            "/api/cumulative?metric=fees",
            "/api/volume/pools/eth",
        ] {
            let (status, body) = get_json(app.clone(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_malformed_volume_is_500() {
        let rows = json!([
            {"timestamp": "2025-02-01T03:00:00Z", "source_chain": "eth", "dest_chain": "base",
             "source_volume": "lots", "dest_volume": 1}
        ]);
        let (status, body) = get_json(app_with(rows, SwapPolicy::Full), "/api/volume").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("source_volume"));
    }

    #[tokio::test]
    async fn test_overflowing_volume_is_500() {
        let rows = json!([
            {"timestamp": "2025-02-01T03:00:00Z", "source_chain": "eth", "dest_chain": "eth",
             "source_volume": "50000000000000000000000000000",
             "dest_volume": "50000000000000000000000000000"}
        ]);
        for uri in ["/api/summary", "/api/volume?span=all"] {
            let (status, body) = get_json(app_with(rows.clone(), SwapPolicy::Full), uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert!(body["error"].as_str().unwrap().contains("representable"));
        }
    }

    #[tokio::test]
    async fn test_snapshot_executor_serves_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main_volume_table.json"),
            serde_json::to_vec(&json!({ "result": sample_rows() })).unwrap(),
        )
        .unwrap();
        let state = Arc::new(AppState {
            executor: SnapshotExecutor::new(dir.path()),
            query: QueryDescriptor::relation("main_volume_table"),
            aggregation: aggregation(SwapPolicy::Full),
            prometheus: None,
        });
        let (status, body) = get_json(create_router_with_state(state), "/api/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trade_count"], 3);
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState {
            executor: SnapshotExecutor::new(dir.path()),
            query: QueryDescriptor::relation("main_volume_table"),
            aggregation: aggregation(SwapPolicy::Full),
            prometheus: None,
        });
        let (status, _) = get_json(create_router_with_state(state), "/api/summary").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
