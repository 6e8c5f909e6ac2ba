use crate::config::Config;
use crate::error::EnhanceError;
use crate::job::EnhancementJob;
use crate::pipeline::{CancellationToken, EnhancementPipeline, FACE_UPSCALE, SUPER_RESOLUTION_SCALE};
use crate::service::ServiceInfo;
use crate::services::ServiceSet;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Input formats accepted on upload
const SUPPORTED_FORMATS: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/bmp",
    "image/tiff",
    "image/webp",
    "image/gif",
];

/// Room for multipart framing on top of the file size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EnhancementPipeline>,
    pub services: Arc<Vec<ServiceInfo>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(services: &ServiceSet, config: Config) -> Self {
        Self {
            pipeline: Arc::new(services.pipeline()),
            services: Arc::new(services.info()),
            config: Arc::new(config),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub services: Vec<ServiceInfo>,
    pub super_resolution_scale: u32,
    pub face_upscale: u32,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/enhance", post(handle_enhance))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_file_size.saturating_add(MULTIPART_OVERHEAD)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let services = ServiceSet::new(&config)?;
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState::new(&services, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Cancels the running job if the request is dropped before it finishes
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Handle enhancement requests
async fn handle_enhance(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, EnhanceError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| EnhanceError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() == Some("file") {
            content_type = field.content_type().map(|s| s.to_string());
            file_data = Some(field.bytes().await.map_err(|e| {
                EnhanceError::InvalidRequest(format!("Failed to read file data: {}", e))
            })?);
        }
    }

    let data = file_data.ok_or(EnhanceError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(EnhanceError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    if let Some(mime) = &content_type {
        if !SUPPORTED_FORMATS.contains(&mime.as_str()) {
            tracing::warn!("Received file with content type: {}", mime);
        }
    }

    let image = image::load_from_memory(&data)
        .map_err(|e| EnhanceError::ImageLoad(e.to_string()))?
        .into_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(EnhanceError::ImageLoad("image is empty".to_string()));
    }

    let job = EnhancementJob::spawn(state.pipeline.clone(), image);
    let _guard = CancelOnDrop(job.token());
    let enhanced = job.wait().await?;

    let mut body = Vec::new();
    JpegEncoder::new_with_quality(&mut body, state.config.jpeg_quality)
        .encode_image(&enhanced)
        .map_err(|e| EnhanceError::Internal(format!("Failed to encode JPEG: {}", e)))?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Enhancement completed in {}ms, output {}x{}, {} bytes",
        processing_time_ms,
        enhanced.width(),
        enhanced.height(),
        body.len()
    );

    let headers = [
        ("content-type", "image/jpeg".to_string()),
        ("x-processing-time-ms", processing_time_ms.to_string()),
        ("x-output-width", enhanced.width().to_string()),
        ("x-output-height", enhanced.height().to_string()),
    ];
    Ok((headers, body).into_response())
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: state.services.as_ref().clone(),
        super_resolution_scale: SUPER_RESOLUTION_SCALE,
        face_upscale: FACE_UPSCALE,
        supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        max_file_size_bytes: state.config.max_file_size,
    })
}
