use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;
use super::state::AppState;
use crate::auth::Principal;
use crate::domain::UserId;

/// Header carrying the gateway-authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The resolved caller of the current request
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;

        let user_id: UserId = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;

        state
            .resolver
            .resolve(user_id)
            .await?
            .map(CurrentPrincipal)
            .ok_or_else(|| ApiError::Unauthorized(format!("unknown user {user_id}")))
    }
}
