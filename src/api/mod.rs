//! HTTP surface of the committee service
//!
//! Routes live under `/api/v1`. The caller's identity arrives in the
//! `x-user-id` header and is resolved server-side into a `Principal`.

mod error;
mod extract;
mod handlers;
mod router;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::{CurrentPrincipal, USER_ID_HEADER};
pub use router::create_router;
pub use state::AppState;
