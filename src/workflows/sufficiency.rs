use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{ensure_transition, WorkflowContext};
use crate::domain::{
    BudgetSufficiencyRequest, DepartmentId, NotificationCategory, NotificationTarget, RequestId, RoleId,
    SufficiencyDocument, SufficiencyId, SufficiencyKind, SufficiencyStatus, UserId, WorkflowStatus,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::notifications::OutgoingNotification;

/// Editable sufficiency fields; every one of them is mandatory
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SufficiencyFields {
    pub secretariat_id: Option<u64>,
    pub department_id: Option<DepartmentId>,
    pub user_id: Option<UserId>,
    pub office_letter_number: String,
    pub subject: String,
    pub place: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub account: String,
    pub amount: Option<Decimal>,
    pub motive: String,
}

/// Fields after validation, with nothing left optional
struct ValidFields {
    secretariat_id: u64,
    department_id: DepartmentId,
    user_id: UserId,
    office_letter_number: String,
    subject: String,
    place: String,
    date: NaiveDate,
    time: NaiveTime,
    account: String,
    amount: Decimal,
    motive: String,
}

impl SufficiencyFields {
    fn validate(self) -> WorkflowResult<ValidFields> {
        let mut missing = Vec::new();
        let text = [
            ("office_letter_number", &self.office_letter_number),
            ("subject", &self.subject),
            ("place", &self.place),
            ("account", &self.account),
            ("motive", &self.motive),
        ];

        if self.secretariat_id.is_none() {
            missing.push("secretariat_id");
        }
        if self.department_id.is_none() {
            missing.push("department_id");
        }
        if self.user_id.is_none() {
            missing.push("user_id");
        }
        for (name, value) in text {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if self.date.is_none() {
            missing.push("date");
        }
        if self.time.is_none() {
            missing.push("time");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }

        match (self.secretariat_id, self.department_id, self.user_id, self.date, self.time, self.amount) {
            (Some(secretariat_id), Some(department_id), Some(user_id), Some(date), Some(time), Some(amount))
                if missing.is_empty() =>
            {
                Ok(ValidFields {
                    secretariat_id,
                    department_id,
                    user_id,
                    office_letter_number: self.office_letter_number,
                    subject: self.subject,
                    place: self.place,
                    date,
                    time,
                    account: self.account,
                    amount,
                    motive: self.motive,
                })
            }
            _ => Err(WorkflowError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SufficiencyResponseUpload {
    /// Request the caller believes the sufficiency belongs to
    pub request_id: Option<RequestId>,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub uploader_id: UserId,
}

/// Accept only files that are named and shaped like a PDF
pub fn is_pdf(file_name: &str, bytes: &[u8]) -> bool {
    file_name.to_ascii_lowercase().ends_with(".pdf") && bytes.starts_with(b"%PDF-")
}

#[derive(Clone)]
pub struct BudgetSufficiencyWorkflow {
    ctx: WorkflowContext,
    processing_roles: BTreeSet<RoleId>,
}

impl BudgetSufficiencyWorkflow {
    /// `processing_roles` receive the "send for processing" notification
    pub fn new(ctx: WorkflowContext, processing_roles: BTreeSet<RoleId>) -> Self {
        Self { ctx, processing_roles }
    }

    pub async fn create(
        &self,
        request_id: RequestId,
        kind: SufficiencyKind,
        fields: SufficiencyFields,
    ) -> WorkflowResult<BudgetSufficiencyRequest> {
        let store = &self.ctx.store;
        if store.get_request(request_id).await?.is_none() {
            return Err(WorkflowError::not_found("request", request_id));
        }
        if store.find_sufficiency(request_id, kind).await?.is_some() {
            return Err(WorkflowError::AlreadyExists {
                entity: "budget sufficiency",
                scope: format!("request {request_id} and kind {}", kind.label()),
            });
        }
        let fields = fields.validate()?;

        let now = Utc::now();
        let record = store
            .insert_sufficiency(BudgetSufficiencyRequest {
                id: 0,
                request_id,
                kind,
                secretariat_id: fields.secretariat_id,
                department_id: fields.department_id,
                user_id: fields.user_id,
                office_letter_number: fields.office_letter_number,
                subject: fields.subject,
                place: fields.place,
                date: fields.date,
                time: fields.time,
                account: fields.account,
                amount: fields.amount,
                motive: fields.motive,
                status: SufficiencyStatus::Pending,
                responded_at: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(request_id, sufficiency_id = record.id, kind = kind.label(), "Sufficiency request created");
        Ok(record)
    }

    pub async fn get(&self, id: SufficiencyId) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.ctx
            .store
            .get_sufficiency(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("budget sufficiency", id))
    }

    pub async fn find(&self, request_id: RequestId, kind: SufficiencyKind) -> WorkflowResult<BudgetSufficiencyRequest> {
        self.ctx
            .store
            .find_sufficiency(request_id, kind)
            .await?
            .ok_or_else(|| WorkflowError::not_found("budget sufficiency", format!("{request_id}/{}", kind.label())))
    }

    pub async fn list(&self, request_id: RequestId) -> WorkflowResult<Vec<BudgetSufficiencyRequest>> {
        Ok(self.ctx.store.list_sufficiencies(request_id).await?)
    }

    pub async fn update(&self, id: SufficiencyId, fields: SufficiencyFields) -> WorkflowResult<BudgetSufficiencyRequest> {
        let mut record = self.get(id).await?;
        if record.status != SufficiencyStatus::Pending {
            return Err(WorkflowError::NotEditable {
                entity: "budget sufficiency",
                id,
                status: record.status.label(),
            });
        }
        let fields = fields.validate()?;

        record.secretariat_id = fields.secretariat_id;
        record.department_id = fields.department_id;
        record.user_id = fields.user_id;
        record.office_letter_number = fields.office_letter_number;
        record.subject = fields.subject;
        record.place = fields.place;
        record.date = fields.date;
        record.time = fields.time;
        record.account = fields.account;
        record.amount = fields.amount;
        record.motive = fields.motive;
        record.updated_at = Utc::now();
        self.ctx.store.update_sufficiency(&record).await?;
        Ok(record)
    }

    /// Pendiente -> Enviado para atender; notifies the processing roles and
    /// the request owner
    pub async fn send_for_processing(&self, actor: UserId, id: SufficiencyId) -> WorkflowResult<BudgetSufficiencyRequest> {
        let mut record = self.get(id).await?;
        ensure_transition("budget sufficiency", record.status, SufficiencyStatus::Sent)?;

        record.status = SufficiencyStatus::Sent;
        record.updated_at = Utc::now();
        self.ctx.store.update_sufficiency(&record).await?;
        info!(sufficiency_id = id, kind = record.kind.label(), "Sufficiency sent for processing");

        let request = self.ctx.store.get_request(record.request_id).await?;
        let folio = request.as_ref().map(|r| r.folio.as_str()).unwrap_or_default();
        let title = format!("Solicitud de {} {}", record.kind.label(), record.office_letter_number);

        if let Some(target) = NotificationTarget::roles(self.processing_roles.iter().copied()) {
            self.ctx
                .notifier
                .send(OutgoingNotification::new(
                    title.clone(),
                    format!("La solicitud {folio} requiere atención presupuestal"),
                    NotificationCategory::Sufficiency,
                    actor,
                    target,
                ))
                .await;
        }
        if let Some(request) = &request {
            self.ctx
                .notifier
                .send_to_user(
                    request.requester_id,
                    title,
                    format!("La {} fue enviada para atender", record.kind.label()),
                    NotificationCategory::Sufficiency,
                    actor,
                )
                .await;
        }

        Ok(record)
    }

    /// Store a budget response and mark the sufficiency as addressed
    pub async fn upload_response(
        &self,
        actor: UserId,
        id: SufficiencyId,
        upload: SufficiencyResponseUpload,
    ) -> WorkflowResult<(SufficiencyDocument, BudgetSufficiencyRequest)> {
        if !is_pdf(&upload.file_name, &upload.bytes) {
            return Err(WorkflowError::Validation(format!(
                "'{}' is not a PDF document",
                upload.file_name
            )));
        }

        let record = self.get(id).await?;
        if let Some(request_id) = upload.request_id {
            if request_id != record.request_id {
                return Err(WorkflowError::Validation(format!(
                    "sufficiency {id} does not belong to request {request_id}"
                )));
            }
        }

        let handle = self
            .ctx
            .objects
            .upload(record.kind.storage_folder(), &upload.file_name, upload.bytes)
            .await?;

        let inserted = self
            .ctx
            .store
            .insert_sufficiency_document(SufficiencyDocument {
                id: 0,
                sufficiency_id: id,
                handle: handle.clone(),
                file_name: upload.file_name,
                uploader_id: upload.uploader_id,
                uploaded_at: Utc::now(),
            })
            .await;
        let doc = match inserted {
            Ok(doc) => doc,
            Err(e) => {
                self.ctx.discard_blob(&handle).await;
                return Err(e.into());
            }
        };

        let record = self.mark_addressed(actor, id).await?;
        Ok((doc, record))
    }

    /// Set "Atendido" and stamp `responded_at`, whatever the prior status
    pub async fn mark_addressed(&self, actor: UserId, id: SufficiencyId) -> WorkflowResult<BudgetSufficiencyRequest> {
        let mut record = self.get(id).await?;
        let now = Utc::now();
        let previous = record.status;
        record.status = SufficiencyStatus::Addressed;
        record.responded_at = Some(now);
        record.updated_at = now;
        self.ctx.store.update_sufficiency(&record).await?;

        info!(
            sufficiency_id = id,
            from = previous.label(),
            "Sufficiency marked as addressed"
        );

        if let Some(request) = self.ctx.store.get_request(record.request_id).await? {
            self.ctx
                .notifier
                .send_to_user(
                    request.requester_id,
                    format!("Respuesta de {}", record.kind.label()),
                    format!("La {} de la solicitud {} fue atendida", record.kind.label(), request.folio),
                    NotificationCategory::Sufficiency,
                    actor,
                )
                .await;
        }

        Ok(record)
    }

    pub async fn list_responses(&self, id: SufficiencyId) -> WorkflowResult<Vec<SufficiencyDocument>> {
        self.get(id).await?;
        Ok(self.ctx.store.list_sufficiency_documents(id).await?)
    }
}
