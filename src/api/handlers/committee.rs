//! Agendas, participant confirmation, minutes and comments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::StatusBody;
use crate::api::error::ApiResult;
use crate::api::extract::CurrentPrincipal;
use crate::api::state::AppState;
use crate::domain::{
    Agenda, AgendaId, AgendaParticipant, Comment, CommentOrigin, Minutes, MinutesAttendee, MinutesId, RequestId,
    UserId,
};
use crate::workflows::{AgendaUpdate, NewAgenda, NewComment, NewMinutes, RosterView, UserAgenda};

// Agendas

pub async fn create_agenda(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<NewAgenda>,
) -> ApiResult<(StatusCode, Json<Agenda>)> {
    let agenda = state.orchestrator.create_agenda(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(agenda)))
}

pub async fn list_agendas(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<Agenda>>> {
    Ok(Json(state.orchestrator.list_agendas(&principal).await?))
}

pub async fn my_agendas(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<UserAgenda>>> {
    Ok(Json(state.orchestrator.my_agendas(&principal).await?))
}

pub async fn get_agenda(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<AgendaId>,
) -> ApiResult<Json<Agenda>> {
    Ok(Json(state.orchestrator.get_agenda(&principal, id).await?))
}

pub async fn update_agenda(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<AgendaId>,
    Json(body): Json<AgendaUpdate>,
) -> ApiResult<Json<Agenda>> {
    Ok(Json(state.orchestrator.update_agenda(&principal, id, body).await?))
}

pub async fn set_agenda_status(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<AgendaId>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<Agenda>> {
    Ok(Json(
        state
            .orchestrator
            .set_agenda_status(&principal, id, &body.status)
            .await?,
    ))
}

pub async fn agenda_for_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
) -> ApiResult<Json<Agenda>> {
    Ok(Json(state.orchestrator.agenda_for_request(&principal, request_id).await?))
}

pub async fn agenda_participants(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<AgendaId>,
) -> ApiResult<Json<RosterView>> {
    Ok(Json(state.orchestrator.agenda_participants(&principal, id).await?))
}

pub async fn mark_agenda_seen(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((agenda_id, user_id)): Path<(AgendaId, UserId)>,
) -> ApiResult<Json<AgendaParticipant>> {
    Ok(Json(
        state
            .orchestrator
            .mark_agenda_seen(&principal, agenda_id, user_id)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmBody {
    #[serde(default)]
    pub observations: Option<String>,
}

pub async fn confirm_attendance(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((agenda_id, user_id)): Path<(AgendaId, UserId)>,
    body: Option<Json<ConfirmBody>>,
) -> ApiResult<Json<AgendaParticipant>> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .confirm_attendance(&principal, agenda_id, user_id, body.observations)
            .await?,
    ))
}

// Minutes

#[derive(Debug, Serialize)]
pub struct MinutesView {
    pub minutes: Minutes,
    pub attendees: Vec<MinutesAttendee>,
}

impl From<(Minutes, Vec<MinutesAttendee>)> for MinutesView {
    fn from((minutes, attendees): (Minutes, Vec<MinutesAttendee>)) -> Self {
        Self { minutes, attendees }
    }
}

pub async fn create_minutes(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<NewMinutes>,
) -> ApiResult<(StatusCode, Json<MinutesView>)> {
    let created = state.orchestrator.create_minutes(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn get_minutes(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<MinutesId>,
) -> ApiResult<Json<MinutesView>> {
    Ok(Json(state.orchestrator.get_minutes(&principal, id).await?.into()))
}

pub async fn minutes_for_agenda(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(agenda_id): Path<AgendaId>,
) -> ApiResult<Json<MinutesView>> {
    Ok(Json(
        state
            .orchestrator
            .minutes_for_agenda(&principal, agenda_id)
            .await?
            .into(),
    ))
}

pub async fn set_minutes_status(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<MinutesId>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<Minutes>> {
    Ok(Json(
        state
            .orchestrator
            .set_minutes_status(&principal, id, &body.status)
            .await?,
    ))
}

/// Absent comment signs; a comment requests a correction
#[derive(Debug, Default, Deserialize)]
pub struct AttendeeResponseBody {
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn respond_to_minutes(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((id, user_id)): Path<(MinutesId, UserId)>,
    body: Option<Json<AttendeeResponseBody>>,
) -> ApiResult<Json<MinutesAttendee>> {
    let Json(body) = body.unwrap_or_default();
    Ok(Json(
        state
            .orchestrator
            .respond_to_minutes(&principal, id, user_id, body.comment)
            .await?,
    ))
}

// Comments

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub origin: CommentOrigin,
    pub origin_id: u64,
}

pub async fn add_comment(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let comment = state.orchestrator.add_comment(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<CommentQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(
        state
            .orchestrator
            .list_comments(&principal, query.origin, query.origin_id)
            .await?,
    ))
}
