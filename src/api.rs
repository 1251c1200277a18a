//! REST API for the stacking engine.
//!
//! Translates JSON requests into [`StackingEngine`] runs. Uses Axum as the web
//! framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, EngineConfig};
use crate::diagnostics::{PackingSummary, SupportDiagnostics, summarize};
use crate::engine::{PackingResult, StackingEngine, Strategy};
use crate::error::{EngineError, ValidationError};
use crate::model::{BoxRecord, ContainerSpec, PlacementRecord};
use crate::optimizer::PackingConfig;
use crate::types::Extent3;

#[derive(Clone)]
struct ApiState {
    engine_config: EngineConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pallet_stacker API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
</html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Box identifier as sent by clients: text or a plain number.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[serde(untagged)]
pub enum BoxIdInput {
    Text(String),
    Number(i64),
}

/// Box size as sent by clients: `"[w,l,h]"` or `[w, l, h]`.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[serde(untagged)]
pub enum BoxSizeInput {
    Text(String),
    Dims(Vec<i64>),
}

#[derive(Deserialize, Clone, Debug, ToSchema)]
pub struct BoxInput {
    pub box_id: BoxIdInput,
    pub box_size: BoxSizeInput,
}

impl BoxInput {
    /// Normalises the input to the textual record the engine parses.
    fn into_record(self) -> BoxRecord {
        let box_id = match self.box_id {
            BoxIdInput::Text(text) => text,
            BoxIdInput::Number(number) => number.to_string(),
        };
        let box_size = match self.box_size {
            BoxSizeInput::Text(text) => text,
            BoxSizeInput::Dims(dims) => {
                let parts: Vec<String> = dims.iter().map(i64::to_string).collect();
                format!("[{}]", parts.join(","))
            }
        };
        BoxRecord::new(box_id, box_size)
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "pallet": [100, 100, 100],
        "boxes": [
            { "box_id": "A", "box_size": "[40,40,40]" },
            { "box_id": 2, "box_size": [40, 40, 40] }
        ],
        "strategy": "greedy_fill_all",
        "gap": 5
    })
)]
pub struct StackRequest {
    #[schema(value_type = [u32; 3], example = json!([100, 100, 100]))]
    pub pallet: (u32, u32, u32),
    pub boxes: Vec<BoxInput>,
    /// Strategy selector, see [`Strategy`].
    #[schema(example = "greedy_fill_all")]
    pub strategy: String,
    #[serde(default)]
    #[schema(nullable = true)]
    pub gap: Option<u32>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub buffer_capacity: Option<usize>,
}

struct ValidatedStackRequest {
    records: Vec<BoxRecord>,
    pallet: ContainerSpec,
    strategy: Strategy,
    gap: Option<u32>,
    buffer_capacity: Option<usize>,
}

impl ValidatedStackRequest {
    fn packing_config(&self, defaults: PackingConfig) -> PackingConfig {
        let mut config = defaults;
        if let Some(gap) = self.gap {
            config.gap = gap;
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        config
    }

    fn into_engine(
        self,
        defaults: PackingConfig,
    ) -> Result<(StackingEngine, Strategy), EngineError> {
        let config = self.packing_config(defaults);
        let engine = StackingEngine::new(&self.records, self.pallet, config)?;
        Ok((engine, self.strategy))
    }
}

#[derive(Debug)]
enum StackRequestValidationError {
    InvalidPallet(ValidationError),
    UnsupportedStrategy(EngineError),
}

impl StackRequest {
    fn into_validated(self) -> Result<ValidatedStackRequest, StackRequestValidationError> {
        let pallet = ContainerSpec::new(Extent3::from(self.pallet))
            .map_err(StackRequestValidationError::InvalidPallet)?;
        let strategy = self
            .strategy
            .parse::<Strategy>()
            .map_err(StackRequestValidationError::UnsupportedStrategy)?;

        Ok(ValidatedStackRequest {
            records: self.boxes.into_iter().map(BoxInput::into_record).collect(),
            pallet,
            strategy,
            gap: self.gap,
            buffer_capacity: self.buffer_capacity,
        })
    }
}

/// A box rejected before stacking.
#[derive(Serialize, ToSchema)]
pub struct SkippedEntry {
    pub box_id: String,
    pub reason: String,
}

/// Response of a stacking run.
///
/// # Fields
/// * `placements` - Placement records in the strategy's processing order
/// * `dropped` - Ids of boxes no position was found for
/// * `skipped` - Boxes rejected because of malformed sizes
#[derive(Serialize, ToSchema)]
pub struct StackResponse {
    pub strategy: Strategy,
    pub placements: Vec<PlacementRecord>,
    pub dropped: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
    pub summary: PackingSummary,
}

impl StackResponse {
    fn from_result(result: &PackingResult, summary: PackingSummary) -> Self {
        Self {
            strategy: result.strategy,
            placements: result.records(),
            dropped: result.dropped.clone(),
            skipped: result
                .skipped
                .iter()
                .map(|entry| SkippedEntry {
                    box_id: entry.box_id.clone(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            summary,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn engine_error(err: EngineError) -> Response {
    match err {
        EngineError::UnsupportedStrategy(_) => {
            error_response(StatusCode::BAD_REQUEST, "Unsupported strategy", err.to_string())
        }
        EngineError::Validation(_) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid configuration",
            err.to_string(),
        ),
        EngineError::Grid(_) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Pallet not usable by strategy",
            err.to_string(),
        ),
    }
}

fn parse_stack_request(
    payload: Result<Json<StackRequest>, JsonRejection>,
) -> Result<ValidatedStackRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated() {
        Ok(validated) => Ok(validated),
        Err(StackRequestValidationError::InvalidPallet(err)) => Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid pallet",
            err.to_string(),
        )),
        Err(StackRequestValidationError::UnsupportedStrategy(err)) => Err(engine_error(err)),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_stack, handle_stack_stream),
    components(
        schemas(
            StackRequest,
            BoxInput,
            BoxIdInput,
            BoxSizeInput,
            StackResponse,
            PlacementRecord,
            SkippedEntry,
            ErrorResponse,
            Strategy,
            PackingSummary,
            SupportDiagnostics
        )
    ),
    tags((name = "stacking", description = "Endpoints for pallet stacking"))
)]
struct ApiDoc;

fn router(engine_config: EngineConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { engine_config };

    Router::new()
        .route("/stack", post(handle_stack))
        .route("/stack_stream", post(handle_stack_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
///
/// # Errors
/// Fails if the listener cannot be bound or the server stops with an I/O error.
pub async fn start_api_server(
    config: ApiConfig,
    engine_config: EngineConfig,
) -> std::io::Result<()> {
    let app = router(engine_config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        tracing::info!("local access: http://localhost:{}", config.port());
    }
    tracing::info!("endpoints: POST /stack, POST /stack_stream, GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /stack endpoint.
///
/// Runs the selected strategy over the submitted boxes.
///
/// # Parameters
/// * `payload` - JSON payload with pallet dimensions, boxes and strategy
///
/// # Returns
/// JSON response with the ordered placements and a run summary
#[utoipa::path(
    post,
    path = "/stack",
    request_body = StackRequest,
    responses(
        (status = 200, description = "Stacking run finished", body = StackResponse),
        (status = BAD_REQUEST, description = "Unknown strategy selector", body = ErrorResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, pallet or configuration",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Stacking task failed", body = ErrorResponse)
    ),
    tag = "stacking"
)]
async fn handle_stack(
    State(state): State<ApiState>,
    payload: Result<Json<StackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_stack_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!(
        boxes = request.records.len(),
        strategy = %request.strategy,
        "new stack request"
    );

    let (engine, strategy) = match request.into_engine(state.engine_config.packing_config()) {
        Ok(parts) => parts,
        Err(err) => return engine_error(err),
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let result = engine.run(strategy)?;
        let summary = summarize(&result, engine.pallet(), engine.config());
        Ok::<_, EngineError>(StackResponse::from_result(&result, summary))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(Err(err)) => engine_error(err),
        Err(err) => {
            tracing::error!(%err, "stacking task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Stacking failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /stack_stream endpoint (SSE).
///
/// Streams progress events as Server-Sent Events (text/event-stream) while
/// the strategy runs.
#[utoipa::path(
    post,
    path = "/stack_stream",
    request_body = StackRequest,
    responses(
        (
            status = 200,
            description = "Streams stacking events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (status = BAD_REQUEST, description = "Unknown strategy selector", body = ErrorResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, pallet or configuration",
            body = ErrorResponse
        )
    ),
    tag = "stacking"
)]
async fn handle_stack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<StackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_stack_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (engine, strategy) = match request.into_engine(state.engine_config.packing_config()) {
        Ok(parts) => parts,
        Err(err) => return engine_error(err),
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let mut forwarder = EventForwarder::new(tx);
        let outcome = engine.run_with_progress(strategy, |evt| forwarder.send(evt));

        if let Err(err) = outcome {
            tracing::warn!(%err, "streamed stacking run failed");
            forwarder.send(&ErrorResponse::new("Stacking failed", err.to_string()));
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Serializes events into the SSE channel until the client goes away.
struct EventForwarder {
    tx: mpsc::Sender<String>,
    closed: bool,
}

impl EventForwarder {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx, closed: false }
    }

    /// Sends one message. After the first failed send everything is discarded.
    fn send<T: Serialize>(&mut self, message: &T) {
        if self.closed {
            return;
        }
        let Ok(json) = serde_json::to_string(message) else {
            return;
        };
        if self.tx.blocking_send(json).is_err() {
            tracing::debug!("stream client disconnected, discarding remaining events");
            self.closed = true;
        }
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(EngineConfig::new(PackingConfig::default()))
    }

    async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        assert!(
            paths.contains_key("/stack"),
            "OpenAPI documentation is missing the /stack path"
        );
        assert!(
            paths.contains_key("/stack_stream"),
            "OpenAPI documentation is missing the /stack_stream path"
        );
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["StackRequest", "StackResponse", "PlacementRecord", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn box_input_accepts_numbers_and_arrays() {
        let json = r#"[
            {"box_id": "A", "box_size": "[40,40,40]"},
            {"box_id": 7, "box_size": [10, 20, 30]}
        ]"#;
        let inputs: Vec<BoxInput> = serde_json::from_str(json).expect("Should parse valid JSON");
        let records: Vec<BoxRecord> = inputs.into_iter().map(BoxInput::into_record).collect();
        assert_eq!(records[0], BoxRecord::new("A", "[40,40,40]"));
        assert_eq!(records[1], BoxRecord::new("7", "[10,20,30]"));
    }

    #[test]
    fn request_overrides_replace_config_defaults() {
        let json = r#"{
            "pallet": [100, 100, 100],
            "boxes": [],
            "strategy": "buffer_then_promote",
            "buffer_capacity": 1
        }"#;
        let request: StackRequest = serde_json::from_str(json).expect("Should parse valid JSON");
        let validated = request.into_validated().expect("Should validate");
        let config = validated.packing_config(PackingConfig::default());
        assert_eq!(config.buffer_capacity, 1);
        assert_eq!(config.gap, PackingConfig::DEFAULT_GAP);
        assert_eq!(validated.strategy, Strategy::BufferThenPromote);
    }

    #[tokio::test]
    async fn stack_returns_ordered_placements() {
        let (status, body) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [100, 100, 100],
                "boxes": [
                    {"box_id": "A", "box_size": "[40,40,40]"},
                    {"box_id": "B", "box_size": "[40,40,40]"},
                    {"box_id": "C", "box_size": "[10,10]"}
                ],
                "strategy": "greedy_fill_all",
                "gap": 5
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["strategy"], "greedy_fill_all");
        assert_eq!(json["placements"][0]["box_loc"], serde_json::json!([20, 20, 0]));
        assert_eq!(json["placements"][1]["box_loc"], serde_json::json!([65, 20, 0]));
        assert_eq!(json["placements"][1]["pallet_id"], 1);
        assert_eq!(json["skipped"][0]["box_id"], "C");
        assert_eq!(json["summary"]["main_count"], 2);
    }

    #[tokio::test]
    async fn unknown_strategy_is_a_bad_request() {
        let (status, body) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [100, 100, 100],
                "boxes": [],
                "strategy": "best_fit"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Unsupported strategy"));
    }

    #[tokio::test]
    async fn invalid_gap_and_pallet_are_unprocessable() {
        let (status, _) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [100, 100, 100],
                "boxes": [],
                "strategy": "greedy_fill_all",
                "gap": 0
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [0, 100, 100],
                "boxes": [],
                "strategy": "greedy_fill_all"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Invalid pallet"));
    }

    #[tokio::test]
    async fn misaligned_pallet_is_rejected_for_grid_strategy() {
        let (status, body) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [101, 100, 100],
                "boxes": [{"box_id": "A", "box_size": "[10,10,10]"}],
                "strategy": "sorted_rotation"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("not a multiple"));
    }

    #[tokio::test]
    async fn oversized_grid_is_rejected_without_allocating() {
        let (status, body) = post_json(
            "/stack",
            serde_json::json!({
                "pallet": [100000, 100000, 100000],
                "boxes": [{"box_id": "A", "box_size": "[10,10,10]"}],
                "strategy": "sorted_rotation"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("exceeds the limit"));
    }

    #[test]
    fn forwarder_stops_after_client_disconnects() {
        let (tx, rx) = mpsc::channel::<String>(4);
        let mut forwarder = EventForwarder::new(tx);

        forwarder.send(&ErrorResponse::new("first", "still connected"));
        assert!(!forwarder.closed);

        drop(rx);
        forwarder.send(&ErrorResponse::new("second", "gone"));
        assert!(forwarder.closed);
        forwarder.send(&ErrorResponse::new("third", "skipped"));
        assert!(forwarder.closed);
    }

    #[tokio::test]
    async fn stream_emits_start_and_finish_events() {
        let (status, body) = post_json(
            "/stack_stream",
            serde_json::json!({
                "pallet": [100, 100, 100],
                "boxes": [{"box_id": 1, "box_size": [10, 10, 10]}],
                "strategy": "sorted_rotation"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"type\":\"RunStarted\""));
        assert!(body.contains("\"type\":\"BoxPlaced\""));
        assert!(body.contains("\"type\":\"Finished\""));
    }
}
