//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // Requests
        .route("/requests", post(handlers::create_request).get(handlers::list_requests))
        .route("/requests/:id", get(handlers::get_request).put(handlers::update_request))
        .route("/requests/:id/sign", post(handlers::sign_request))
        // Justification
        .route(
            "/requests/:id/justification",
            post(handlers::create_justification)
                .get(handlers::get_justification)
                .put(handlers::update_justification),
        )
        .route(
            "/justifications/:id/documents",
            post(handlers::attach_justification_document).get(handlers::list_justification_documents),
        )
        .route("/justification-documents/:id", delete(handlers::remove_justification_document))
        // Budget sufficiency
        .route("/requests/:id/sufficiencies", post(handlers::create_sufficiency))
        .route("/requests/:id/sufficiencies/:kind", get(handlers::find_sufficiency))
        .route(
            "/sufficiencies/:id",
            get(handlers::get_sufficiency).put(handlers::update_sufficiency),
        )
        .route("/sufficiencies/:id/send", post(handlers::send_sufficiency))
        .route(
            "/sufficiencies/:id/responses",
            post(handlers::upload_sufficiency_response).get(handlers::list_sufficiency_responses),
        )
        // Supporting documents
        .route(
            "/requests/:id/documents",
            post(handlers::attach_document).get(handlers::list_documents),
        )
        .route("/documents/:id", delete(handlers::remove_document))
        // Agendas
        .route("/agendas", post(handlers::create_agenda).get(handlers::list_agendas))
        .route("/agendas/mine", get(handlers::my_agendas))
        .route("/agendas/:id", get(handlers::get_agenda).put(handlers::update_agenda))
        .route("/agendas/:id/status", put(handlers::set_agenda_status))
        .route("/requests/:id/agenda", get(handlers::agenda_for_request))
        .route("/agendas/:id/participants", get(handlers::agenda_participants))
        .route("/agendas/:id/participants/:user_id/seen", put(handlers::mark_agenda_seen))
        .route("/agendas/:id/participants/:user_id/confirm", put(handlers::confirm_attendance))
        .route("/agendas/:id/minutes", get(handlers::minutes_for_agenda))
        // Comments
        .route("/comments", post(handlers::add_comment).get(handlers::list_comments))
        // Minutes
        .route("/minutes", post(handlers::create_minutes))
        .route("/minutes/:id", get(handlers::get_minutes))
        .route("/minutes/:id/status", put(handlers::set_minutes_status))
        .route("/minutes/:id/attendees/:user_id", put(handlers::respond_to_minutes))
        // Generic status change
        .route("/status/:domain/:id", put(handlers::change_status))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/stream", get(handlers::stream_notifications))
        .route("/notifications/:id/read", put(handlers::mark_notification_read));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
