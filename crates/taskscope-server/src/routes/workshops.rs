//! Workshop management routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use taskscope_core::types::{NewWorkshop, Task, Workshop, WorkshopFile};
use taskscope_core::upload::{StoredUpload, UploadMeta};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Create workshop router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workshops", get(list_workshops).post(create_workshop))
        .route(
            "/workshops/{id}",
            get(get_workshop).delete(delete_workshop),
        )
        .route(
            "/workshops/{id}/files",
            // FileIntake enforces size limits while streaming
            post(upload_files).layer(DefaultBodyLimit::disable()),
        )
        .route("/workshops/{id}/tasks", get(list_tasks))
        .route("/workshops/{id}/tools-generated", post(mark_tools_generated))
        .route("/workshops/{id}/complete", post(complete_workshop))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkshopRequest {
    #[serde(default)]
    pub name: String,
    pub domains: Vec<String>,
    pub participant_count: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopDetail {
    #[serde(flatten)]
    pub workshop: Workshop,
    pub files: Vec<WorkshopFile>,
    pub analysis_running: bool,
}

/// Create a new workshop
pub async fn create_workshop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkshopRequest>,
) -> Result<(StatusCode, Json<Workshop>), ApiError> {
    let workshop = state.orchestrator.create_workshop(NewWorkshop {
        name: req.name,
        domains: req.domains,
        participant_count: req.participant_count,
    })?;
    Ok((StatusCode::CREATED, Json(workshop)))
}

/// List workshops, oldest first
pub async fn list_workshops(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Workshop>>, ApiError> {
    Ok(Json(state.orchestrator.list_workshops()?))
}

/// Get a workshop with its files
pub async fn get_workshop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkshopDetail>, ApiError> {
    let workshop = state.orchestrator.get_workshop(&id)?;
    let files = state.orchestrator.workshop_files(&id)?;
    Ok(Json(WorkshopDetail {
        analysis_running: state.orchestrator.is_running(&id),
        workshop,
        files,
    }))
}

/// Delete a workshop and its stored documents
pub async fn delete_workshop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.orchestrator.cleanup(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(taskscope_core::Error::WorkshopNotFound(id).into())
    }
}

/// Upload documents into a workshop.
///
/// The batch is all-or-nothing: if any part is rejected, documents already
/// stored from this request are removed.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<WorkshopFile>>), ApiError> {
    // Fail fast before reading any bytes
    let workshop = state.orchestrator.get_workshop(&id)?;
    if !workshop.status.accepts_files() {
        return Err(taskscope_core::Error::transition(
            workshop.status,
            taskscope_core::types::WorkshopStatus::FilesUploaded,
        )
        .into());
    }

    let mut stored: Vec<StoredUpload> = Vec::new();
    let result = receive_parts(&state, &mut multipart, &mut stored).await;
    if let Err(e) = result {
        state.intake.discard(&stored).await;
        warn!(workshop_id = %id, error = %e.message, "Upload batch rejected");
        return Err(e);
    }

    let count = stored.len();
    match state.orchestrator.attach_files(&id, stored.clone()) {
        Ok(files) => {
            info!(workshop_id = %id, files = count, "Upload batch stored");
            Ok((StatusCode::CREATED, Json(files)))
        }
        Err(e) => {
            state.intake.discard(&stored).await;
            Err(e.into())
        }
    }
}

async fn receive_parts(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Vec<StoredUpload>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        // Non-file form fields are ignored
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        state.intake.check_batch(stored.len() + 1)?;

        let media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let meta = UploadMeta::new(filename, media_type);
        stored.push(state.intake.accept(&meta, field).await?);
    }
    state.intake.check_batch(stored.len())?;
    Ok(())
}

/// Tasks found so far, in discovery order
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.orchestrator.workshop_tasks(&id)?))
}

pub async fn mark_tools_generated(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Workshop>, ApiError> {
    Ok(Json(state.orchestrator.mark_tools_generated(&id)?))
}

pub async fn complete_workshop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Workshop>, ApiError> {
    Ok(Json(state.orchestrator.complete_workshop(&id)?))
}
