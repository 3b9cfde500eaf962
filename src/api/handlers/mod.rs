//! API request handlers

mod attachments;
mod committee;
mod health;
mod notifications;
mod requests;

pub use attachments::*;
pub use committee::*;
pub use health::*;
pub use notifications::*;
pub use requests::*;

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use serde::Deserialize;

use super::error::{ApiError, ApiResult};
use crate::auth::Principal;
use crate::domain::UserId;
use crate::error::WorkflowError;

/// Body of every `{status}` change route
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// A multipart upload: one `file` part plus plain text fields
pub(crate) struct UploadForm {
    pub file_name: String,
    pub bytes: Vec<u8>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("archivo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable file part: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("unreadable field '{name}': {e}")))?;
                fields.insert(name, value);
            }
        }

        let (file_name, bytes) = file.ok_or_else(|| ApiError::BadRequest("missing 'file' part".to_string()))?;
        Ok(Self { file_name, bytes, fields })
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> ApiResult<Option<T>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ApiError::BadRequest(format!("invalid value for '{name}'"))),
        }
    }

    /// Uploads are always attributed to the caller; a conflicting
    /// `uploader_id` field is refused rather than trusted
    pub fn uploader(&self, principal: &Principal) -> ApiResult<UserId> {
        match self.parse::<UserId>("uploader_id")? {
            Some(claimed) if claimed != principal.user_id => Err(WorkflowError::Forbidden(format!(
                "user {} cannot upload on behalf of user {claimed}",
                principal.user_id
            ))
            .into()),
            _ => Ok(principal.user_id),
        }
    }
}
