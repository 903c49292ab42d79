mod config;
mod error;
mod models;
mod services;
mod utils;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use config::Config;
use error::AppError;
use http::header;
use models::{ExtractionMode, GenerateRequest};
use services::{chapterizer, export, llm::LLMClient};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt};

/// Allowance for the JSON or multipart framing around an SRT payload.
const REQUEST_OVERHEAD_BYTES: usize = 16 * 1024;

/// JSON escaping at most doubles newlines, quotes and backslashes.
/// `chapterizer::prepare` enforces the real cap on the decoded text.
fn body_limit(max_payload_bytes: usize) -> usize {
    max_payload_bytes
        .saturating_mul(2)
        .saturating_add(REQUEST_OVERHEAD_BYTES)
}

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    llm_client: Arc<LLMClient>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vibestamps=info,tower_http=info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let llm_client = Arc::new(LLMClient::new(&config.llm)?);
    tracing::info!(
        "using model {} at {} (max payload {} bytes)",
        config.llm.model,
        config.llm.api_url,
        config.max_payload_bytes
    );

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let app = router(AppState {
        config: Arc::new(config),
        llm_client,
    });

    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let body_limit = body_limit(state.config.max_payload_bytes);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/generate", post(generate_stream))
        .route("/api/timestamps", post(generate_timestamps))
        .route("/upload", post(upload_file))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Vibestamps</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
    </style>
</head>
<body>
    <h1>Vibestamps</h1>

    <div class="info-box">
        <p>Turns an .srt subtitle file into a short list of chapter timestamps for a video description.</p>
        <p>Generated timestamps later than the last subtitle are discarded.</p>
    </div>

    <h2>Available Endpoints:</h2>
    <div class="endpoint">GET /health - Health check</div>
    <div class="endpoint">POST /api/generate - JSON {"srtContent", "mode"}; streams accepted lines as plain text</div>
    <div class="endpoint">POST /api/timestamps - JSON {"srtContent", "mode", "format"}; format is json, text, csv or youtube</div>
    <div class="endpoint">POST /upload - multipart form with an 'srt_file' field</div>
</body>
</html>
"#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn generate_stream(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload
        .map_err(|rejection| AppError::from_json_rejection(rejection, state.config.max_payload_bytes))?;

    let prepared = chapterizer::prepare(&request.srt_content, request.mode, &state.config)?;
    let fragments = state
        .llm_client
        .generate_stream(&prepared.prompt)
        .await
        .map_err(AppError::Generation)?;

    let body = Body::from_stream(chapterizer::accepted_line_stream(fragments, prepared.bound));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

async fn generate_timestamps(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload
        .map_err(|rejection| AppError::from_json_rejection(rejection, state.config.max_payload_bytes))?;

    let result = chapterizer::process_srt(
        &request.srt_content,
        request.mode,
        &state.config,
        &state.llm_client,
    )
    .await?;

    let (content_type, body) = export::render(&result, request.format);
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = state.config.max_payload_bytes;

    // Extract the uploaded subtitle file
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::from_multipart(err, limit))?
    {
        if field.name() != Some("srt_file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !utils::has_srt_extension(&file_name) {
            return Err(AppError::BadRequest("File must be an .srt file".to_string()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::from_multipart(err, limit))?;
        if data.len() > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        let srt_content = utils::decode_upload(&data)
            .ok_or_else(|| AppError::BadRequest("File must be UTF-8 encoded text".to_string()))?;

        tracing::info!("processing upload {} ({} bytes)", file_name, data.len());
        let result = chapterizer::process_srt(
            &srt_content,
            ExtractionMode::Plain,
            &state.config,
            &state.llm_client,
        )
        .await?;

        return Ok(Json(export::to_json(&result)));
    }

    Err(AppError::BadRequest("No srt_file field in upload".to_string()))
}
