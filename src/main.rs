use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use listinglift_api::db::SupabaseClient;
use listinglift_api::gateway::{self, GatewayError, GatewayErrorKind};
use listinglift_api::llm::LlmClient;
use listinglift_api::models::{
    AnalysisRequest, ApiError, BulletGapRequest, BulletIdeasRequest, BulletPointsRequest,
    BulletPointsResponse, DescriptionIdeasRequest, KeywordGapRequest, ScrapeParams,
    SpellcheckRequest, TitleSuggestRequest,
};
use listinglift_api::scrape::ScrapeService;
use listinglift_api::{catalog, metrics, security};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Header selecting which AI action `/gpt-suggest` performs; absent means
/// title suggestions.
const AI_ACTION_HEADER: &str = "x-ll-ai-action";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "listinglift.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let security = Arc::new(security::Security::from_env());
    if security.open() {
        info!(target = "listinglift.api", "no api keys configured, running open");
    }

    let llm = Arc::new(LlmClient::from_env());
    let db = SupabaseClient::from_env();
    if db.is_none() {
        warn!(
            target = "listinglift.api",
            "SUPABASE_URL/key not set, data endpoints will return errors"
        );
    }
    let scraper = db.clone().map(ScrapeService::from_env);

    let openapi: Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi": "3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre::eyre!("prometheus recorder: {err}"))?;

    let state = AppState {
        llm,
        db,
        scraper,
        openapi: Arc::new(openapi),
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let api = Router::new()
        .route("/decodo", post(decodo))
        .route("/bullet-points", post(bullet_points))
        .route("/gpt-suggest", post(gpt_suggest))
        .route("/listing-analysis", post(listing_analysis))
        .route("/spellcheck", post(spellcheck))
        .route_layer(middleware::from_fn_with_state(security, security::guard));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "listinglift.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    llm: Arc<LlmClient>,
    db: Option<SupabaseClient>,
    scraper: Option<ScrapeService>,
    openapi: Arc<Value>,
    prometheus_handle: PrometheusHandle,
}

impl AppState {
    fn scraper(&self) -> Result<&ScrapeService, GatewayError> {
        self.scraper
            .as_ref()
            .ok_or_else(|| GatewayError::upstream("decodo", "scrape provider not configured"))
    }

    fn db(&self) -> Result<&SupabaseClient, GatewayError> {
        self.db
            .as_ref()
            .ok_or_else(|| GatewayError::upstream("supabase", "database not configured"))
    }
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "listinglift-api",
    }))
}

/// Scrape passthrough: the request body is the provider parameter bundle,
/// the response is the provider JSON verbatim. Side effect: successful
/// product/search scrapes are persisted.
///
/// - Method: `POST`
/// - Path: `/decodo`
async fn decodo(
    State(state): State<AppState>,
    Json(params): Json<ScrapeParams>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/decodo");
    let payload = state
        .scraper()?
        .scrape(&params)
        .await
        .map_err(|err| GatewayError::upstream("decodo", err.to_string()))?;
    Ok(Json(payload))
}

/// Product + competitor copy for the wizard's bullet and description steps,
/// backfilling missing listings on the way.
///
/// - Method: `POST`
/// - Path: `/bullet-points`
/// - Body: `{asin, heroKeyword}`
async fn bullet_points(
    State(state): State<AppState>,
    Json(request): Json<BulletPointsRequest>,
) -> Result<Json<BulletPointsResponse>, AppError> {
    metrics::inc_requests("/bullet-points");
    let response = catalog::bullet_points(
        state.scraper()?,
        state.db()?,
        &request.asin,
        &request.hero_keyword,
    )
    .await?;
    Ok(Json(response))
}

/// AI action dispatch. The `x-ll-ai-action` header picks the action; absent
/// or unrecognized values run title suggestions, matching the wire contract
/// the front end ships with.
///
/// - Method: `POST`
/// - Path: `/gpt-suggest`
async fn gpt_suggest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/gpt-suggest");
    let action = headers
        .get(AI_ACTION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let llm = state.llm.as_ref();

    let value = match action {
        "keyword-gap" => {
            let request: KeywordGapRequest = parse_body("keyword-gap", body)?;
            to_json(gateway::title_keyword_gap(llm, &request).await?)?
        }
        "bullet-gap" => {
            let request: BulletGapRequest = parse_body("bullet-gap", body)?;
            to_json(gateway::bullet_keyword_gap(llm, &request).await?)?
        }
        "bullet-ideas" => {
            let request: BulletIdeasRequest = parse_body("bullet-ideas", body)?;
            to_json(gateway::bullet_ideas(llm, &request).await?)?
        }
        "description-ideas" => {
            let request: DescriptionIdeasRequest = parse_body("description-ideas", body)?;
            to_json(gateway::description_ideas(llm, &request).await?)?
        }
        _ => {
            let request: TitleSuggestRequest = parse_body("gpt-suggest", body)?;
            to_json(gateway::suggest_titles(llm, &request).await?)?
        }
    };
    Ok(Json(value))
}

/// Before/after improvement estimate for the preview screen.
///
/// - Method: `POST`
/// - Path: `/listing-analysis`
/// - Body: `{originalListing, optimizedListing, heroKeyword}`
async fn listing_analysis(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/listing-analysis");
    let request: AnalysisRequest = parse_body("listing-analysis", body)?;
    let metrics = gateway::analyze_listing(state.llm.as_ref(), &request).await?;
    Ok(Json(to_json(metrics)?))
}

/// Spellcheck free text; returns the corrections array directly.
///
/// - Method: `POST`
/// - Path: `/spellcheck`
/// - Body: `{text}`
async fn spellcheck(
    State(state): State<AppState>,
    Json(request): Json<SpellcheckRequest>,
) -> Result<Json<Value>, AppError> {
    metrics::inc_requests("/spellcheck");
    let corrections = gateway::spellcheck(state.llm.as_ref(), &request.text).await?;
    Ok(Json(to_json(corrections)?))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(GatewayError::invalid_input("docs", "unauthorized").into());
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>ListingLift API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(256 * 1024)
}

fn parse_body<T: DeserializeOwned>(stage: &'static str, body: Value) -> Result<T, AppError> {
    serde_json::from_value(body)
        .map_err(|err| GatewayError::invalid_input(stage, err.to_string()).into())
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|err| GatewayError::upstream("serialize", err.to_string()).into())
}

#[derive(Debug)]
struct AppError(GatewayError);

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            GatewayErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            GatewayErrorKind::Upstream | GatewayErrorKind::MalformedAi => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let payload = ApiError {
            error: self.0.stage().to_string(),
            detail: Some(self.0.detail().to_string()),
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
