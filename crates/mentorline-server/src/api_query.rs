//! Query intake and the mentor accept/reject endpoints.

use crate::api::{with_conn, ApiError};
use crate::pipeline::{submit_query, QuerySubmission, UploadForm};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Json, Multipart, Path};
use mentorline_queries::{
    assigned_mentor_for, list_pending_for_mentor, respond, Assignment, PendingRequest,
};
use mentorline_types::{
    MentorSummary, QueryStatus, RespondAction, RespondOutcome, DEFAULT_LANGUAGE_ID,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for `POST /api/query`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQueryResponse {
    pub query_id: i64,
    pub status: QueryStatus,
    pub transcription: String,
    pub career: String,
    #[serde(rename = "matchedMentors")]
    pub matched_mentors: Vec<MentorSummary>,
}

/// Request body for `POST /api/respond`.
#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    #[serde(rename = "queryId")]
    pub query_id: i64,
    #[serde(rename = "mentorId")]
    pub mentor_id: i64,
    pub action: RespondAction,
}

/// Response body for `POST /api/respond`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RespondResponse {
    pub success: bool,
    pub outcome: RespondOutcome,
}

/// Handler for `POST /api/query`.
///
/// Multipart fields: `audio` (required), `mentee_id` (required) and
/// `language_id` (defaults to English).
pub async fn submit_query_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<SubmitQueryResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let submission = QuerySubmission {
        clip: form.take_audio()?,
        mentee_id: form.required_id("mentee_id")?,
        language_id: form
            .optional_id("language_id")?
            .unwrap_or(DEFAULT_LANGUAGE_ID),
    };

    let submitted = submit_query(&state, submission).await?;

    Ok(Json(SubmitQueryResponse {
        query_id: submitted.query.id,
        status: submitted.query.status,
        transcription: submitted.query.query_text,
        career: submitted.query.career,
        matched_mentors: submitted.matched.iter().map(MentorSummary::from).collect(),
    }))
}

/// Handler for `GET /api/requests/mentor/{mentorId}`.
pub async fn pending_requests_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(mentor_id): Path<i64>,
) -> Result<Json<Vec<PendingRequest>>, ApiError> {
    let requests =
        with_conn(&state, move |conn| Ok(list_pending_for_mentor(conn, mentor_id)?)).await?;
    Ok(Json(requests))
}

/// Handler for `POST /api/respond`.
///
/// Losing an accept race is a normal outcome, reported with
/// `success: false` rather than an error status.
pub async fn respond_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<Json<RespondResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let RespondRequest {
        query_id,
        mentor_id,
        action,
    } = payload;

    let outcome = with_conn(&state, move |conn| {
        Ok(respond(conn, query_id, mentor_id, action)?)
    })
    .await?;

    Ok(Json(RespondResponse {
        success: outcome.is_success(),
        outcome,
    }))
}

/// Handler for `GET /api/assigned-mentor/{menteeId}`.
pub async fn assigned_mentor_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(mentee_id): Path<i64>,
) -> Result<Json<Assignment>, ApiError> {
    let assignment =
        with_conn(&state, move |conn| Ok(assigned_mentor_for(conn, mentee_id)?)).await?;
    Ok(Json(assignment))
}
