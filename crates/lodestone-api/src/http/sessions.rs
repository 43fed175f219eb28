//! Session route handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path as AxumPath, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use lodestone_core::SessionId;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::http::constants::{MESSAGE_DOWNLOAD_NOT_FOUND, MESSAGE_MAGNET_REQUIRED};
use crate::http::errors::ApiError;
use crate::models::{CancelResponse, CreateRequest, CreateResponse, StatusView, status_label};
use crate::state::ApiState;

const UNNAMED: &str = "Unnamed Torrent";

pub(crate) async fn create_download(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected download request body");
        ApiError::bad_request(MESSAGE_MAGNET_REQUIRED)
    })?;
    let magnet = request
        .magnet
        .as_deref()
        .map(str::trim)
        .filter(|magnet| !magnet.is_empty())
        .ok_or_else(|| ApiError::bad_request(MESSAGE_MAGNET_REQUIRED))?;

    let (session, is_new) = state.registry.create_session(magnet)?;
    info!(
        session_id = %session.id,
        fingerprint = %session.fingerprint,
        is_new,
        "download requested"
    );
    Ok(Json(CreateResponse {
        download_id: session.id.to_string(),
        name: session.name().unwrap_or(UNNAMED).to_string(),
        is_new,
        status: status_label(session.state),
    }))
}

pub(crate) async fn get_status(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<StatusView>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let session = state.registry.get_session(session_id)?;
    Ok(Json(StatusView::from_session(&session, &state.bounds)))
}

pub(crate) async fn list_downloads(State(state): State<Arc<ApiState>>) -> Json<Vec<StatusView>> {
    let views = state
        .registry
        .list_sessions()
        .iter()
        .map(|session| StatusView::from_session(session, &state.bounds))
        .collect();
    Json(views)
}

pub(crate) async fn cancel_download(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    state.registry.cancel_session(session_id)?;
    info!(session_id = %session_id, "download cancelled");
    Ok(Json(CancelResponse::cancelled()))
}

pub(crate) async fn download_file(
    State(state): State<Arc<ApiState>>,
    AxumPath((id, filename)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let session_id = parse_session_id(&id)?;
    let located = state.registry.locate_file(session_id, &filename)?;
    let file = tokio::fs::File::open(&located.path).await.map_err(|err| {
        error!(
            error = %err,
            session_id = %session_id,
            path = %located.path.display(),
            "failed to open completed file"
        );
        ApiError::internal("Failed to download file")
    })?;
    // The engine's reported size can lag the file on disk.
    let length = file
        .metadata()
        .await
        .map_err(|err| {
            error!(
                error = %err,
                session_id = %session_id,
                path = %located.path.display(),
                "failed to stat completed file"
            );
            ApiError::internal("Failed to download file")
        })?
        .len();
    if length != located.size {
        debug!(
            session_id = %session_id,
            reported = located.size,
            on_disk = length,
            "engine size differs from file on disk"
        );
    }

    let disposition = format!(
        "attachment; filename=\"{}\"",
        urlencoding::encode(&located.name)
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, length)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|err| {
            error!(error = %err, "failed to build download response");
            ApiError::internal("Failed to download file")
        })
}

// Unparsable ids cannot name a live session.
fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse::<SessionId>()
        .map_err(|_| ApiError::not_found(MESSAGE_DOWNLOAD_NOT_FOUND))
}
