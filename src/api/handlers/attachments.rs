//! Justifications, budget sufficiency and supporting documents

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::UploadForm;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::CurrentPrincipal;
use crate::api::state::AppState;
use crate::domain::{
    BudgetSufficiencyRequest, DocumentId, Justification, JustificationDocument, JustificationId, RequestId,
    SufficiencyDocument, SufficiencyId, SufficiencyKind, SupportingDocument,
};
use crate::workflows::{
    JustificationFields, NewJustificationDocument, NewSupportingDocument, SufficiencyFields,
    SufficiencyResponseUpload,
};

// Justification

pub async fn create_justification(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
    Json(body): Json<JustificationFields>,
) -> ApiResult<(StatusCode, Json<Justification>)> {
    let justification = state
        .orchestrator
        .create_justification(&principal, request_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(justification)))
}

pub async fn get_justification(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
) -> ApiResult<Json<Justification>> {
    Ok(Json(state.orchestrator.get_justification(&principal, request_id).await?))
}

pub async fn update_justification(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
    Json(body): Json<JustificationFields>,
) -> ApiResult<Json<Justification>> {
    Ok(Json(
        state
            .orchestrator
            .update_justification(&principal, request_id, body)
            .await?,
    ))
}

/// Multipart fields: `file`, `section`, `uploader_id`, `comment`
pub async fn attach_justification_document(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(justification_id): Path<JustificationId>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<JustificationDocument>)> {
    let form = UploadForm::read(multipart).await?;
    let doc = NewJustificationDocument {
        section: form.text("section").unwrap_or_default().to_string(),
        uploader_id: form.uploader(&principal)?,
        comment: form.text("comment").map(str::to_string),
        file_name: form.file_name,
        bytes: form.bytes,
    };

    let document = state
        .orchestrator
        .attach_justification_document(&principal, justification_id, doc)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_justification_documents(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(justification_id): Path<JustificationId>,
) -> ApiResult<Json<Vec<JustificationDocument>>> {
    Ok(Json(
        state
            .orchestrator
            .list_justification_documents(&principal, justification_id)
            .await?,
    ))
}

pub async fn remove_justification_document(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<DocumentId>,
) -> ApiResult<StatusCode> {
    state
        .orchestrator
        .remove_justification_document(&principal, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Budget sufficiency

#[derive(Debug, Serialize)]
pub struct SufficiencyResponseView {
    pub document: SufficiencyDocument,
    pub sufficiency: BudgetSufficiencyRequest,
}

fn parse_kind(raw: &str) -> ApiResult<SufficiencyKind> {
    raw.parse().map_err(ApiError::BadRequest)
}

/// Body is the sufficiency fields plus a `kind`
#[derive(Debug, serde::Deserialize)]
pub struct CreateSufficiencyBody {
    pub kind: SufficiencyKind,
    #[serde(flatten)]
    pub fields: SufficiencyFields,
}

pub async fn create_sufficiency(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
    Json(body): Json<CreateSufficiencyBody>,
) -> ApiResult<(StatusCode, Json<BudgetSufficiencyRequest>)> {
    let record = state
        .orchestrator
        .create_sufficiency(&principal, request_id, body.kind, body.fields)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn find_sufficiency(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((request_id, kind)): Path<(RequestId, String)>,
) -> ApiResult<Json<BudgetSufficiencyRequest>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(
        state
            .orchestrator
            .find_sufficiency(&principal, request_id, kind)
            .await?,
    ))
}

pub async fn get_sufficiency(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<SufficiencyId>,
) -> ApiResult<Json<BudgetSufficiencyRequest>> {
    Ok(Json(state.orchestrator.get_sufficiency(&principal, id).await?))
}

pub async fn update_sufficiency(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<SufficiencyId>,
    Json(body): Json<SufficiencyFields>,
) -> ApiResult<Json<BudgetSufficiencyRequest>> {
    Ok(Json(state.orchestrator.update_sufficiency(&principal, id, body).await?))
}

pub async fn send_sufficiency(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<SufficiencyId>,
) -> ApiResult<Json<BudgetSufficiencyRequest>> {
    Ok(Json(state.orchestrator.send_sufficiency(&principal, id).await?))
}

/// Multipart fields: `file` (PDF), `request_id`, `uploader_id`
pub async fn upload_sufficiency_response(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<SufficiencyId>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SufficiencyResponseView>)> {
    let form = UploadForm::read(multipart).await?;
    let upload = SufficiencyResponseUpload {
        request_id: form.parse("request_id")?,
        uploader_id: form.uploader(&principal)?,
        file_name: form.file_name,
        bytes: form.bytes,
    };

    let (document, sufficiency) = state
        .orchestrator
        .upload_sufficiency_response(&principal, id, upload)
        .await?;
    Ok((StatusCode::CREATED, Json(SufficiencyResponseView { document, sufficiency })))
}

pub async fn list_sufficiency_responses(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<SufficiencyId>,
) -> ApiResult<Json<Vec<SufficiencyDocument>>> {
    Ok(Json(state.orchestrator.list_sufficiency_responses(&principal, id).await?))
}

// Supporting documents

/// Multipart fields: `file`, `doc_type`, `uploader_id`
pub async fn attach_document(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SupportingDocument>)> {
    let form = UploadForm::read(multipart).await?;
    let doc = NewSupportingDocument {
        doc_type: form.text("doc_type").unwrap_or_default().to_string(),
        uploader_id: form.uploader(&principal)?,
        file_name: form.file_name,
        bytes: form.bytes,
    };

    let document = state.orchestrator.attach_document(&principal, request_id, doc).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(request_id): Path<RequestId>,
) -> ApiResult<Json<Vec<SupportingDocument>>> {
    Ok(Json(state.orchestrator.list_documents(&principal, request_id).await?))
}

pub async fn remove_document(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<DocumentId>,
) -> ApiResult<StatusCode> {
    state.orchestrator.remove_document(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
