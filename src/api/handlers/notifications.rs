//! Notification listing and the live push stream

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;

use crate::api::error::ApiResult;
use crate::api::extract::CurrentPrincipal;
use crate::api::state::AppState;
use crate::domain::{Notification, NotificationId};

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.orchestrator.my_notifications(&principal).await?))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<NotificationId>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.orchestrator.mark_notification_read(&principal, id).await?))
}

/// Stream the caller's notifications via SSE
///
/// Every subscriber receives the whole channel; events addressed to
/// someone else are dropped here. The stream ends on shutdown.
pub async fn stream_notifications(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.events.subscribe();
    let shutdown = state.shutdown_tx.subscribe();

    let stream = stream::unfold(
        (events, shutdown, principal),
        |(mut events, mut shutdown, principal)| async move {
            loop {
                if *shutdown.borrow() {
                    return None;
                }
                tokio::select! {
                    received = events.recv() => match received {
                        Ok(event) if event.is_addressed_to(principal.user_id, &principal.roles) => {
                            let sse_event = Event::default()
                                .event("notification")
                                .json_data(&event)
                                .unwrap_or_else(|_| Event::default().comment("unserializable"));
                            return Some((Ok(sse_event), (events, shutdown, principal)));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            let comment = Event::default().comment(format!("lagged {skipped}"));
                            return Some((Ok(comment), (events, shutdown, principal)));
                        }
                        Err(RecvError::Closed) => return None,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
