use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use engine::{validate_document, EditCommand, EditorView, StoreError, Tool};
use queue::{EditorSession, QueueError};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionDto {
    /// Project tools shown alongside the workflow's own, read-only.
    #[serde(default)]
    pub catalog: Vec<Tool>,
}

/// The observable editor outputs plus the last save failure, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub view: EditorView,
    pub save_error: Option<String>,
}

impl SessionResponse {
    fn new(view: EditorView, save_error: Result<(), StoreError>) -> Self {
        Self { view, save_error: save_error.err().map(|e| e.to_string()) }
    }
}

fn status_of(err: &QueueError) -> StatusCode {
    match err {
        QueueError::Store(StoreError::WorkflowNotFound(_)) => StatusCode::NOT_FOUND,
        QueueError::Store(_) => StatusCode::BAD_GATEWAY,
        QueueError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[instrument(skip(state, payload))]
pub async fn open(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Option<Json<OpenSessionDto>>,
) -> Result<(StatusCode, Json<SessionResponse>), StatusCode> {
    let (slot, mut guard) = state.claim(id).await;
    if let Some(session) = guard.as_mut() {
        let pumped = session.pump();
        return Ok((StatusCode::OK, Json(SessionResponse::new(session.view(), pumped))));
    }

    let session = match EditorSession::open(Arc::clone(&state.store), id, state.queue_config).await {
        Ok(s) => s,
        Err(e) => {
            warn!("could not open workflow {id}: {e}");
            state.release(id, &slot).await;
            return Err(status_of(&e));
        }
    };
    let Json(dto) = payload.unwrap_or_default();
    let session = session.with_catalog(dto.catalog);

    let view = session.view();
    *guard = Some(session);
    Ok((StatusCode::CREATED, Json(SessionResponse::new(view, Ok(())))))
}

pub async fn view(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let slot = state.slot(id).await.ok_or(StatusCode::NOT_FOUND)?;
    let mut guard = slot.lock().await;
    let session = guard.as_mut().ok_or(StatusCode::NOT_FOUND)?;

    let pumped = session.pump();
    Ok(Json(SessionResponse::new(session.view(), pumped)))
}

#[instrument(skip(state, command))]
pub async fn dispatch(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(command): Json<EditCommand>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let slot = state.slot(id).await.ok_or(StatusCode::NOT_FOUND)?;
    let mut guard = slot.lock().await;
    let session = guard.as_mut().ok_or(StatusCode::NOT_FOUND)?;

    let pumped = session.pump();
    if let Err(e) = session.dispatch(command) {
        warn!("dispatch failed: {e}");
        return Err(status_of(&e));
    }
    Ok(Json(SessionResponse::new(session.view(), pumped)))
}

pub async fn issues(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, StatusCode> {
    let slot = state.slot(id).await.ok_or(StatusCode::NOT_FOUND)?;
    let guard = slot.lock().await;
    let session = guard.as_ref().ok_or(StatusCode::NOT_FOUND)?;

    let issues = validate_document(&session.state().document)
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok(Json(issues))
}

#[instrument(skip(state))]
pub async fn publish(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let slot = state.slot(id).await.ok_or(StatusCode::NOT_FOUND)?;
    let mut guard = slot.lock().await;
    let session = guard.as_mut().ok_or(StatusCode::NOT_FOUND)?;

    match session.publish().await {
        Ok(view) => Ok(Json(SessionResponse::new(view, Ok(())))),
        Err(e) => {
            warn!("publish of {id} failed: {e}");
            Err(status_of(&e))
        }
    }
}

/// Flush pending edits, stop the writer and forget the session.
///
/// The slot stays registered and locked until the writer has stopped, so a
/// concurrent open waits and then loads what was written.
#[instrument(skip(state))]
pub async fn close(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, StatusCode> {
    let slot = state.slot(id).await.ok_or(StatusCode::NOT_FOUND)?;
    let mut guard = slot.lock().await;
    let mut session = guard.take().ok_or(StatusCode::NOT_FOUND)?;

    let settled = session.settle().await;
    let view = session.view();
    if let Err(e) = session.close().await {
        warn!("writer for {id} did not stop cleanly: {e}");
    }
    state.release(id, &slot).await;
    drop(guard);

    let settled = match settled {
        Ok(_) => Ok(()),
        Err(QueueError::Store(e)) => Err(e),
        Err(e) => return Err(status_of(&e)),
    };
    Ok(Json(SessionResponse::new(view, settled)))
}
