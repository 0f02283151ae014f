use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audio::AudioStub;
use crate::chat::{ChatRelay, FileKind};
use crate::error::AppError;
use crate::model::Prediction;
use crate::pipeline::UploadPipeline;
use crate::storage::{content_type, Storage};

pub struct AppState {
    pub pipeline: UploadPipeline,
    pub chat: ChatRelay,
    pub audio: AudioStub,
    pub storage: Storage,
    pub public_base_url: String,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: &'static str,
    predictions: Vec<Prediction>,
    annotated_image_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: String,
    #[serde(default)]
    predictions: Vec<Prediction>,
    #[serde(default = "default_file_type")]
    file_type: String,
}

fn default_file_type() -> String {
    "image".to_string()
}

pub fn router(state: SharedState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/upload/", post(upload_handler))
        .route("/upload_audio", post(upload_audio_handler))
        .route("/upload_audio/", post(upload_audio_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/", post(chat_handler))
        .route("/results/:name", get(result_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(health_check))
}

/// Pulls the `file` field out of a multipart form.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::invalid(format!("Could not read file: {}", e)))?;
            if data.is_empty() {
                break;
            }
            return Ok((file_name, data.to_vec()));
        }
    }

    Err(AppError::invalid("No file uploaded"))
}

async fn upload_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (file_name, image_data) = read_file_field(&mut multipart).await?;
    let outcome = state.pipeline.process_upload(&file_name, &image_data).await?;

    Ok(Json(UploadResponse {
        message: "Analysis complete!",
        predictions: outcome.predictions,
        annotated_image_url: format!(
            "{}/results/{}",
            state.public_base_url, outcome.annotated_image
        ),
    }))
}

async fn upload_audio_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let (file_name, audio_data) = read_file_field(&mut multipart).await?;
    let message = state.audio.process_audio(&file_name, &audio_data).await?;
    Ok(Json(json!({ "message": message })))
}

async fn chat_handler(
    State(state): State<SharedState>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(request) =
        request.map_err(|e| AppError::invalid(format!("Malformed request body: {}", e)))?;
    let kind: FileKind = request.file_type.parse()?;

    let reply = state
        .chat
        .build_and_relay(&request.prompt, &request.predictions, kind)
        .await?;
    Ok(Json(json!({ "response": reply })))
}

async fn result_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let data = state.storage.read_result(&name).await?.ok_or(AppError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, content_type(&name))], data).into_response())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}
