//! MedRAG API Gateway
//!
//! The HTTP entry point for medical question answering.
//! Handles:
//! - Request validation and routing
//! - Backpressure (concurrency limit, body size limit)
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use medrag_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics,
};
use medrag_context::QueryPipeline;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<QueryPipeline>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);
    info!("Starting MedRAG API Gateway v{}", medrag_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // Model clients are built once and shared by every request
    let pipeline = QueryPipeline::from_config(&config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize query pipeline");
        e
    })?;

    let state = AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn install_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        info!("Prometheus exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(metrics::LATENCY_BUCKETS)?
        .install()?;

    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let max_in_flight = state.config.server.max_concurrent_requests.max(1);

    // API routes
    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Question answering
        .route("/process_query", post(handlers::query::process_query))
        .route_layer(axum::middleware::from_fn(middleware::track_metrics));

    // Compose the app
    Router::new()
        .nest("/v2", api_routes)
        .layer(axum::middleware::from_fn(middleware::content_length_limit))
        .layer(ConcurrencyLimitLayer::new(max_in_flight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use medrag_common::embeddings::MockEmbedder;
    use medrag_common::{Embedder, Passage};
    use medrag_context::{
        AnswerComposer, DecodingConfig, EntityExtractor, MockGenerator, MockNerModel,
    };
    use medrag_search::{MemoryIndex, SimilarityMetric, VectorRetriever};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const DIMENSION: usize = 8;

    async fn test_state() -> AppState {
        let embedder = MockEmbedder::new(DIMENSION);
        let mut index = MemoryIndex::new(DIMENSION, SimilarityMetric::Cosine);
        for i in 0..6 {
            let content = format!("Diabetes passage {}", i);
            let embedding = embedder.embed(&content).await.unwrap();
            index
                .insert(
                    Passage::new(format!("chunk-{}", i), content)
                        .with_source_path("corpus/Harrison_Internal_Medicine.txt")
                        .with_section("CHAPTER 4")
                        .with_page("212")
                        .with_embedding(embedding),
                )
                .unwrap();
        }

        let pipeline = QueryPipeline::new(
            EntityExtractor::new(Arc::new(MockNerModel::default()), Duration::from_secs(1)),
            VectorRetriever::new(Arc::new(embedder), Arc::new(index)),
            AnswerComposer::new(
                Arc::new(MockGenerator),
                DecodingConfig::default(),
                Duration::from_secs(1),
            ),
        );

        AppState {
            config: Arc::new(AppConfig::default()),
            pipeline: Arc::new(pipeline),
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::get("/v2/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_retrieval_settings() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::get("/v2/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["retrieval"]["k"], 5);
        assert_eq!(body["retrieval"]["fetch_k"], 10);
    }

    #[tokio::test]
    async fn test_process_query() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(post_json("/v2/process_query", json!({"text": "diabetes treatment"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;

        assert_eq!(body["expanded_query"], "diabetes treatment diabetes");
        assert_eq!(body["entities"][0]["term"], "diabetes");
        assert_eq!(body["entities"][0]["type"], "Disease");

        let citations = body["citations"].as_array().unwrap();
        assert_eq!(citations.len(), 5);
        assert_eq!(citations[0]["id"], 1);
        assert_eq!(citations[0]["source_name"], "Harrison Internal Medicine");
        assert_eq!(citations[0]["location_label"], "Section: CHAPTER 4 Page: 212");
        assert!(body["answer_text"].as_str().unwrap().contains("[1]"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(post_json("/v2/process_query", json!({"text": ""})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "text");
    }

    #[tokio::test]
    async fn test_overlong_text_rejected() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(post_json("/v2/process_query", json!({"text": "a".repeat(2001)})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_structured_error() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(post_json("/v2/process_query", json!({"query": "diabetes"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_declared_oversize_body_rejected() {
        let app = create_router(test_state().await);
        let request = Request::builder()
            .method("POST")
            .uri("/v2/process_query")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, (middleware::MAX_BODY_BYTES + 1).to_string())
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_generation_failure_is_bad_gateway() {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".to_string();
        config.index.provider = "memory".to_string();
        config.ner.provider = "mock".to_string();
        config.generation.provider = "gemini".to_string();
        config.generation.api_key = Some("test-key".to_string());
        config.generation.api_base = "http://127.0.0.1:9".to_string();
        config.generation.timeout_secs = 1;

        let state = AppState {
            pipeline: Arc::new(QueryPipeline::from_config(&config).unwrap()),
            config: Arc::new(config),
        };

        let response = create_router(state)
            .oneshot(post_json("/v2/process_query", json!({"text": "diabetes"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "GENERATION_FAILURE");
        assert!(body.get("answer_text").is_none());
    }
}
