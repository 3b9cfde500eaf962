//! Request lifecycle and the generic change-status route

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::StatusBody;
use crate::api::error::ApiResult;
use crate::api::extract::CurrentPrincipal;
use crate::api::state::AppState;
use crate::domain::{DepartmentId, Request, RequestId, StatusBucket};
use crate::store::RequestFilter;
use crate::workflows::{NewRequest, RequestEdit, StatusChange, StatusDomain};

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub department_id: Option<DepartmentId>,
    pub bucket: Option<StatusBucket>,
}

pub async fn create_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<NewRequest>,
) -> ApiResult<(StatusCode, Json<Request>)> {
    let request = state.orchestrator.create_request(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<ListRequestsQuery>,
) -> ApiResult<Json<Vec<Request>>> {
    let filter = RequestFilter {
        department_id: query.department_id,
        bucket: query.bucket,
    };
    Ok(Json(state.orchestrator.list_requests(&principal, filter).await?))
}

pub async fn get_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.orchestrator.get_request(&principal, id).await?))
}

pub async fn update_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RequestId>,
    Json(body): Json<RequestEdit>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.orchestrator.update_request(&principal, id, body).await?))
}

pub async fn sign_request(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<Request>> {
    Ok(Json(state.orchestrator.sign_request(&principal, id).await?))
}

/// `PUT /status/:domain/:id`
pub async fn change_status(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((domain, id)): Path<(String, u64)>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<StatusChange>> {
    let domain: StatusDomain = domain.parse()?;
    let change = state
        .orchestrator
        .change_status(&principal, domain, id, &body.status)
        .await?;
    Ok(Json(change))
}
