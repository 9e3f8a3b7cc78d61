use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
};
use bookai::cache::{CachedSummary, SummaryCache};
use bookai::config::AppConfig;
use bookai::services::epub_source::BookSource;
use bookai::services::orchestrator::RunMode;
use bookai::services::scraper::EbookScraper;
use serde::Deserialize;
use serde_json::{Value, json};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    config: Arc<AppConfig>,
    cache: Arc<SummaryCache>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ModeParam {
    Sequential,
    Parallel,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    mode: Option<ModeParam>,
    workers: Option<usize>,
    bionic: Option<bool>,
}

impl UploadParams {
    fn run_mode(&self, config: &AppConfig) -> Result<RunMode, String> {
        match self.mode {
            Some(ModeParam::Sequential) => Ok(RunMode::Sequential),
            Some(ModeParam::Parallel) | None => {
                let workers = match self.workers {
                    Some(n) => NonZeroUsize::new(n).ok_or("workers must be at least 1")?,
                    None => config.workers,
                };
                Ok(RunMode::Parallel { workers })
            }
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    let message = message.into();
    warn!(%status, "{message}");
    (
        status,
        Json(json!({
            "success": false,
            "error": message,
        })),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let bind_addr = config.bind_addr;
    info!(
        llm = %config.llm.api_url,
        model = %config.llm.model,
        bionic = config.bionic.is_some(),
        workers = config.workers.get(),
        "Loaded configuration"
    );

    let app_state = AppState {
        config: Arc::new(config),
        cache: Arc::new(SummaryCache::new()),
    };

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app(app_state))
        .await
        .context("server error")?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_file))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let config = &state.config;
    let languages = if config.allowed_languages.is_empty() {
        "any".to_string()
    } else {
        config.allowed_languages.join(", ")
    };
    let bionic = if config.bionic.is_some() {
        "enabled"
    } else {
        "disabled (set BIONIC_API_KEY)"
    };

    Html(format!(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>BookAI Summarizer Service</title>
        <meta charset="utf-8">
        <style>
            body {{ font-family: Arial, sans-serif; margin: 40px; }}
            .info-box {{ background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }}
            .endpoint {{ background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }}
        </style>
    </head>
    <body>
        <h1>BookAI Summarizer Service</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>Upload an EPUB book and get a summary of every chapter.</p>
            <p>Model: {model}</p>
            <p>Bionic reading: {bionic}</p>
            <p>Accepted languages: {languages}</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET / - This information page</div>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">POST /upload?mode=sequential|parallel&amp;workers=N&amp;bionic=true|false - Summarize an EPUB</div>

        <h2>How to Use:</h2>
        <p>Make a POST request to /upload with a multipart form containing an 'epub_file' field</p>
    </body>
    </html>
    "#,
        model = html_escape::encode_text(&config.llm.model),
        languages = html_escape::encode_text(&languages),
    ))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn upload_file(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mode = params
        .run_mode(&state.config)
        .map_err(|msg| api_error(StatusCode::BAD_REQUEST, msg))?;
    let bionic = params.bionic.unwrap_or(state.config.bionic.is_some());

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("epub_file") {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

        let job_id = Uuid::new_v4();
        info!(%job_id, bytes = data.len(), ?mode, bionic, "Received EPUB upload");

        // Unzipping and parsing is blocking work.
        let source = tokio::task::spawn_blocking(move || BookSource::from_bytes(data.to_vec()))
            .await
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

        let scraper = EbookScraper::new(
            source,
            state.config.min_chapter_length,
            state.config.orchestrator(mode, bionic),
        );

        if !scraper.is_allowed_language(&state.config.allowed_languages) {
            return Err(api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!(
                    "unsupported book language: {}",
                    scraper.language().unwrap_or("unknown")
                ),
            ));
        }

        if let Some(cached) = state.cache.get(scraper.title()).await {
            info!(%job_id, title = %cached.title, "Serving cached summary");
            return Ok(summary_response(job_id, &cached, true));
        }

        // html2text over every chapter body is blocking work too.
        let mut scraper = tokio::task::spawn_blocking(move || {
            scraper.chapters();
            scraper
        })
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

        let chapters = scraper.summarize_chapters().await.clone();
        let cached = state
            .cache
            .insert(CachedSummary {
                title: scraper.title().to_string(),
                language: scraper.language().map(str::to_string),
                chapters,
            })
            .await;

        return Ok(summary_response(job_id, &cached, false));
    }

    Err(api_error(
        StatusCode::BAD_REQUEST,
        "missing 'epub_file' field",
    ))
}

fn summary_response(job_id: Uuid, summary: &CachedSummary, cached: bool) -> Json<Value> {
    Json(json!({
        "success": true,
        "job_id": job_id.to_string(),
        "title": summary.title,
        "language": summary.language,
        "chapter_count": summary.chapters.len(),
        "failed_count": summary.chapters.failed_count(),
        "cached": cached,
        "chapters": summary.chapters,
    }))
}
