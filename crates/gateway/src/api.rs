//! Chat API routes, mounted under `/api/chat`.
//!
//! | Method | Path        | Body / Query        | Response              |
//! |--------|-------------|---------------------|-----------------------|
//! | POST   | `/`         | `{project_id, message}` | `{message}`       |
//! | GET    | `/history`  | `?project_id=N`     | `[{isUser, content}]` |
//! | DELETE | `/history`  | `?project_id=N`     | 204                   |
//! | GET    | `/projects` |                     | `[{id, name}]`        |
//! | POST   | `/projects` | `{name}`            | 201 `{id, name}`      |
//!
//! Every failure is `{"error": "..."}` with a status derived from the
//! underlying error.

use crate::SharedState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use codewright_core::error::{AgentError, StoreError};
use codewright_core::message::Role;
use codewright_core::store::{MetadataStore, Project, ProjectId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub fn chat_router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/history", get(history_handler).delete(delete_history_handler))
        .route("/projects", get(list_projects_handler).post(create_project_handler))
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request: the status to answer with and the message to show.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        let status = match &e {
            AgentError::Store(StoreError::ProjectNotFound(_)) => StatusCode::NOT_FOUND,
            AgentError::ExhaustedRetries { .. } => StatusCode::TOO_MANY_REQUESTS,
            AgentError::Provider(_) => StatusCode::BAD_GATEWAY,
            AgentError::Store(_) | AgentError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub project_id: ProjectId,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

/// `POST /api/chat`: Run one exchange and return the assistant's answer.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let message = state
        .orchestrator
        .handle_message(req.project_id, &req.message)
        .await?;
    Ok(Json(ChatResponse { message }))
}

// ── History ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub project_id: ProjectId,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "isUser")]
    pub is_user: bool,
    pub content: String,
}

/// `GET /api/chat/history`: The project's plain-text turns, oldest first.
async fn history_handler(
    State(state): State<SharedState>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Query(query) = query?;
    let turns = state.cache.history(query.project_id).await?;

    Ok(Json(
        turns
            .iter()
            .filter_map(|turn| {
                turn.text().map(|text| HistoryEntry {
                    is_user: turn.role == Role::User,
                    content: text.to_string(),
                })
            })
            .collect(),
    ))
}

/// `DELETE /api/chat/history`: Remove the project with everything it owns.
async fn delete_history_handler(
    State(state): State<SharedState>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(query) = query?;
    state.cache.delete_project(query.project_id).await?;
    info!(project_id = query.project_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Projects ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// `GET /api/chat/projects`
async fn list_projects_handler(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    let projects = state.store.list_projects().await?;
    Ok(Json(projects.into_iter().map(ProjectSummary::from).collect()))
}

/// `POST /api/chat/projects`
async fn create_project_handler(
    State(state): State<SharedState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProjectSummary>), ApiError> {
    let Json(req) = payload?;
    let name = req.name.trim();
    if name.is_empty() {
        warn!("Rejected project with an empty name");
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let project = state.store.create_project(name).await?;
    info!(project_id = project.id, name = %project.name, "Project created");
    Ok((StatusCode::CREATED, Json(project.into())))
}
