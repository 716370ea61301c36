//! LRA lifecycle and participant enlistment endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use common::{LRA_CONTEXT_HEADER, LRA_RECOVERY_HEADER, LraId};
use coordinator::{
    LraCoordinator, ParticipantClient, ParticipantRegistry, RecoveryScheduler,
};
use serde::{Deserialize, Serialize};
use store::{LraRecord, Participant, RecordStore};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: RecordStore + Clone, C: ParticipantClient> {
    pub coordinator: Arc<LraCoordinator<S, C>>,
    pub registry: ParticipantRegistry<S>,
    pub scheduler: Arc<RecoveryScheduler<S, C>>,
    pub store: S,
}

// -- Request types --

/// Query parameters shared by start and renew. The protocol spells them
/// in upper camel case.
#[derive(Debug, Deserialize)]
pub struct TimeLimitParams {
    #[serde(rename = "ClientID")]
    pub client_id: Option<String>,
    /// Time limit in milliseconds; absent or zero means the default.
    #[serde(rename = "TimeLimit")]
    pub time_limit: Option<u64>,
}

impl TimeLimitParams {
    fn timeout(&self) -> Option<Duration> {
        match self.time_limit {
            None | Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct LraSummary {
    pub id: String,
    pub client_name: String,
    pub status: String,
    pub parent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
    pub participant_count: usize,
}

impl From<LraRecord> for LraSummary {
    fn from(record: LraRecord) -> Self {
        Self {
            id: record.id.to_string(),
            client_name: record.client_name.clone(),
            status: record.status.to_string(),
            parent_id: record.parent_id.map(|p| p.to_string()),
            started_at: record.started_at,
            timeout_at: record.timeout_at,
            participant_count: record.participants.len(),
        }
    }
}

fn parse_id(id: &str) -> Result<LraId, ApiError> {
    LraId::parse(id).ok_or_else(|| ApiError::BadRequest(format!("invalid LRA id: {id}")))
}

fn context_header(headers: &HeaderMap) -> Result<Option<LraId>, ApiError> {
    let Some(value) = headers.get(LRA_CONTEXT_HEADER) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("unreadable LRA context header".to_string()))?;
    Ok(Some(parse_id(value)?))
}

// -- Handlers --

/// POST /lra-coordinator — starts a new LRA, nested when the request
/// carries an LRA context header.
#[tracing::instrument(skip(state, headers))]
pub async fn start<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Query(params): Query<TimeLimitParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let parent = context_header(&headers)?;
    let client_name = params.client_id.as_deref().unwrap_or("anonymous");

    let id = state
        .coordinator
        .start(parent, client_name, params.timeout())
        .await?;

    Ok((
        StatusCode::CREATED,
        [(LRA_CONTEXT_HEADER, id.to_string())],
        id.to_string(),
    )
        .into_response())
}

/// PUT /lra-coordinator/{id}/close — requests completion of all work.
#[tracing::instrument(skip(state))]
pub async fn close<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<String, ApiError> {
    let id = parse_id(&id)?;
    let status = state.coordinator.close(id).await?;
    Ok(status.to_string())
}

/// PUT /lra-coordinator/{id}/cancel — requests compensation of all work.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<String, ApiError> {
    let id = parse_id(&id)?;
    let status = state.coordinator.cancel(id).await?;
    Ok(status.to_string())
}

/// GET /lra-coordinator — lists LRAs that still have work pending.
pub async fn list_active<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<Vec<LraSummary>>, ApiError> {
    let records = state
        .store
        .list_active()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(records.into_iter().map(LraSummary::from).collect()))
}

/// GET /lra-coordinator/status — lists every LRA still retained.
pub async fn list_all<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
) -> Result<Json<Vec<LraSummary>>, ApiError> {
    let records = state
        .store
        .list_all()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(records.into_iter().map(LraSummary::from).collect()))
}

/// GET /lra-coordinator/{id}/status — returns the status name.
pub async fn status<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<String, ApiError> {
    let id = parse_id(&id)?;
    let status = state.coordinator.status(id).await?;
    Ok(status.to_string())
}

/// PUT /lra-coordinator/{id}/renew — extends the time limit.
#[tracing::instrument(skip(state))]
pub async fn renew<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    Query(params): Query<TimeLimitParams>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let Some(timeout) = params.timeout() else {
        return Err(ApiError::BadRequest("TimeLimit is required".to_string()));
    };
    state.coordinator.renew_timeout(id, timeout).await?;
    Ok(StatusCode::OK)
}

/// PUT /lra-coordinator/{id} — enlists a participant.
///
/// Callback URLs arrive in the `Link` header; the request body is opaque
/// user data replayed on every callback. Responds with the recovery id in
/// the `Long-Running-Action-Recovery` header.
#[tracing::instrument(skip(state, headers, body))]
pub async fn join<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let link = headers
        .get("link")
        .ok_or_else(|| ApiError::BadRequest("missing Link header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::BadRequest("unreadable Link header".to_string()))?;

    let mut participant = participant_from_links(link)?;
    if !body.is_empty() {
        participant.user_data = Some(body);
    }

    let enlistment = state.registry.enlist(id, participant).await?;

    Ok((
        StatusCode::OK,
        [
            (LRA_CONTEXT_HEADER, id.to_string()),
            (LRA_RECOVERY_HEADER, enlistment.recovery_id().to_string()),
        ],
        enlistment.recovery_id().to_string(),
    )
        .into_response())
}

/// PUT /lra-coordinator/{id}/remove — removes a participant before the
/// end phase begins. The body names the participant, either as the bare
/// endpoint or as the Link header it joined with.
#[tracing::instrument(skip(state, body))]
pub async fn leave<S: RecordStore + Clone + 'static, C: ParticipantClient + 'static>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let endpoint = if body.contains('<') {
        participant_from_links(&body)?.endpoint
    } else {
        body.trim().to_string()
    };
    if endpoint.is_empty() {
        return Err(ApiError::BadRequest(
            "request body must name the participant".to_string(),
        ));
    }

    state.registry.leave(id, &endpoint).await?;
    Ok(StatusCode::OK)
}

/// Builds a participant from a `Link` header of the form
/// `<url>; rel="complete", <url>; rel="compensate", ...`.
fn participant_from_links(header: &str) -> Result<Participant, ApiError> {
    let mut complete = None;
    let mut compensate = None;
    let mut status = None;
    let mut forget = None;
    let mut after = None;

    for part in header.split(',') {
        let part = part.trim();
        let Some(url) = part
            .split(';')
            .next()
            .map(str::trim)
            .and_then(|u| u.strip_prefix('<'))
            .and_then(|u| u.strip_suffix('>'))
        else {
            return Err(ApiError::BadRequest(format!("malformed link: {part}")));
        };
        let Some(rel) = part.split(';').skip(1).find_map(|attr| {
            let attr = attr.trim();
            attr.strip_prefix("rel=")
                .map(|v| v.trim_matches('"').to_string())
        }) else {
            continue;
        };

        match rel.as_str() {
            "complete" => complete = Some(url.to_string()),
            "compensate" => compensate = Some(url.to_string()),
            "status" => status = Some(url.to_string()),
            "forget" => forget = Some(url.to_string()),
            "after" => after = Some(url.to_string()),
            // unknown rels are ignored, per the usual Link semantics
            _ => {}
        }
    }

    if complete.is_none() && compensate.is_none() {
        return Err(ApiError::BadRequest(
            "Link header must carry a complete or compensate URL".to_string(),
        ));
    }

    // the endpoint identity is the callback base, preferring complete
    let endpoint = endpoint_of(complete.as_deref().or(compensate.as_deref()).unwrap_or(""));
    let mut participant = Participant::new(endpoint);
    participant.complete_url = complete;
    participant.compensate_url = compensate;
    participant.status_url = status;
    participant.forget_url = forget;
    participant.after_url = after;
    Ok(participant)
}

/// Strips the final path segment, so `http://svc/orders/complete` and
/// `http://svc/orders/compensate` identify the same participant.
fn endpoint_of(callback_url: &str) -> String {
    match callback_url.rsplit_once('/') {
        Some((base, _)) if base.contains("://") => base.to_string(),
        _ => callback_url.to_string(),
    }
}
