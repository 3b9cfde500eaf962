// HTTP surface tests
// Requests go through the full router with `oneshot`, so extractors, error
// mapping and status codes are exercised exactly as a client sees them.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;

use procurement_committee::api::USER_ID_HEADER;
use chrono::Utc;
use rust_decimal::Decimal;

use procurement_committee::domain::{Permission, RequestId, RequestStatus, User, UserId};
use procurement_committee::store::{RequestStore, UserStore};
use procurement_committee::{
    create_router, AppState, InMemoryStore, LocalObjectStore, PrincipalResolver, WorkflowContext,
    WorkflowOrchestrator,
};

const REQUESTER: UserId = 1;
const REVIEWER: UserId = 30;
const BUDGET_OFFICE: UserId = 40;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    _blobs: tempfile::TempDir,
}

async fn app() -> TestApp {
    let blobs = tempfile::TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    store.upsert_user(user(REQUESTER, &[])).await.unwrap();
    store
        .upsert_user(user(REVIEWER, &[Permission::ReviewRequests, Permission::ManageAgendas]))
        .await
        .unwrap();
    store
        .upsert_user(user(BUDGET_OFFICE, &[Permission::ManageSufficiency]))
        .await
        .unwrap();
    for member in [10, 11, 20] {
        store.upsert_user(user(member, &[])).await.unwrap();
    }

    let ctx = WorkflowContext::new(store.clone(), Arc::new(LocalObjectStore::new(blobs.path())));
    let orchestrator = Arc::new(WorkflowOrchestrator::new(ctx, BTreeSet::new()));
    let resolver = PrincipalResolver::new(store.clone(), Duration::from_secs(60), 100);
    let (events, _) = broadcast::channel(16);
    let (shutdown_tx, _) = watch::channel(false);

    TestApp {
        router: create_router(AppState::new(orchestrator, resolver, events, shutdown_tx)),
        store,
        _blobs: blobs,
    }
}

fn user(id: UserId, permissions: &[Permission]) -> User {
    User {
        id,
        name: format!("Usuario {id}"),
        title: "Analista".to_string(),
        department_id: 4,
        roles: BTreeSet::new(),
        permissions: permissions.iter().copied().collect(),
    }
}

async fn call(app: &TestApp, method: Method, uri: &str, caller: Option<UserId>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = caller {
        builder = builder.header(USER_ID_HEADER, id.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    read_json(app.router.clone().oneshot(request).await.unwrap()).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Send a single `file` part the way a browser form would
async fn upload(app: &TestApp, uri: &str, caller: UserId, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
    const BOUNDARY: &str = "committee-test-boundary";
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(USER_ID_HEADER, caller.to_string())
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    read_json(app.router.clone().oneshot(request).await.unwrap()).await
}

async fn seed_request(app: &TestApp, status: RequestStatus) -> RequestId {
    let now = Utc::now();
    app.store
        .insert_request(procurement_committee::domain::Request {
            id: 0,
            folio: "ADQ-2026-021".to_string(),
            requester_id: REQUESTER,
            department_id: 4,
            amount: Decimal::new(98_000, 0),
            acquisition_type_id: 1,
            motive: "Mobiliario para sala de juntas".to_string(),
            status,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
        .id
}

/// Convene members 10 and 11 plus guest 20 over an approved request
async fn convene(app: &TestApp) -> u64 {
    let request_id = seed_request(app, RequestStatus::Approved).await;
    let (status, agenda) = call(
        app,
        Method::POST,
        "/api/v1/agendas",
        Some(REVIEWER),
        Some(json!({
            "request_id": request_id,
            "event_date": "2026-06-03",
            "hour": "10:00:00",
            "office_letter_number": "OF-CA-040",
            "subject": "Convocatoria",
            "points": ["Revisión de la solicitud"],
            "base_roster": [10, 11],
            "invited_roster": [20]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agenda["status"], "Convocada");
    agenda["id"].as_u64().unwrap()
}

fn new_request() -> Value {
    json!({
        "folio": "ADQ-2026-020",
        "department_id": 4,
        "amount": "98000.50",
        "acquisition_type_id": 1,
        "motive": "Mobiliario para sala de juntas"
    })
}

#[tokio::test]
async fn test_health_needs_no_caller() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_unknown_caller_is_unauthorized() {
    let app = app().await;

    let (status, body) = call(&app, Method::GET, "/api/v1/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = call(&app, Method::GET, "/api/v1/requests", Some(999), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_then_sign_reports_missing_prerequisites() {
    let app = app().await;

    let (status, created) = call(&app, Method::POST, "/api/v1/requests", Some(REQUESTER), Some(new_request())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "Pendiente");
    assert_eq!(created["requester_id"], REQUESTER);

    let id = created["id"].as_u64().unwrap();
    let (status, body) = call(&app, Method::POST, &format!("/api/v1/requests/{id}/sign"), Some(REQUESTER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PREREQUISITES_NOT_MET");
    assert_eq!(body["details"]["missing"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let app = app().await;
    let mut body = new_request();
    body["motive"] = json!("   ");

    let (status, body) = call(&app, Method::POST, "/api/v1/requests", Some(REQUESTER), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/v1/requests/404", Some(REQUESTER), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_status_route_enforces_permission_and_table() {
    let app = app().await;
    let (_, created) = call(&app, Method::POST, "/api/v1/requests", Some(REQUESTER), Some(new_request())).await;
    let id = created["id"].as_u64().unwrap();
    let uri = format!("/api/v1/status/aquisicion/{id}");

    let (status, _) = call(&app, Method::PUT, &uri, Some(REQUESTER), Some(json!({"status": "Cancelada"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Pendiente cannot jump straight to Aprobada
    let (status, body) = call(&app, Method::PUT, &uri, Some(REVIEWER), Some(json!({"status": "Aprobada"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert_eq!(body["details"]["from"], "Pendiente");

    let (status, body) = call(&app, Method::PUT, &uri, Some(REVIEWER), Some(json!({"status": "Cancelada"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelada");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/v1/status/inventario/1",
        Some(REVIEWER),
        Some(json!({"status": "Cancelada"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_sees_status_notification() {
    let app = app().await;
    let (_, created) = call(&app, Method::POST, "/api/v1/requests", Some(REQUESTER), Some(new_request())).await;
    let id = created["id"].as_u64().unwrap();

    call(
        &app,
        Method::PUT,
        &format!("/api/v1/status/aquisicion/{id}"),
        Some(REVIEWER),
        Some(json!({"status": "Cancelada"})),
    )
    .await;

    let (status, mine) = call(&app, Method::GET, "/api/v1/notifications", Some(REQUESTER), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["read"], false);

    let (_, theirs) = call(&app, Method::GET, "/api/v1/notifications", Some(REVIEWER), None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let notification_id = mine[0]["id"].as_u64().unwrap();
    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/notifications/{notification_id}/read"),
        Some(REVIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, read) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/notifications/{notification_id}/read"),
        Some(REQUESTER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read"], true);
}

#[tokio::test]
async fn test_sufficiency_response_upload_requires_pdf_and_addresses() {
    let app = app().await;
    let (_, created) = call(&app, Method::POST, "/api/v1/requests", Some(REQUESTER), Some(new_request())).await;
    let request_id = created["id"].as_u64().unwrap();

    let (status, sufficiency) = call(
        &app,
        Method::POST,
        &format!("/api/v1/requests/{request_id}/sufficiencies"),
        Some(REQUESTER),
        Some(json!({
            "kind": "pre-suficiencia",
            "secretariat_id": 2,
            "department_id": 4,
            "user_id": REQUESTER,
            "office_letter_number": "OF-DA-201",
            "subject": "Solicitud de pre-suficiencia",
            "place": "Oficinas centrales",
            "date": "2026-05-20",
            "time": "09:30:00",
            "account": "2151-001",
            "amount": "98000.50",
            "motive": "Mobiliario"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sufficiency["status"], "Pendiente");
    let uri = format!("/api/v1/sufficiencies/{}/responses", sufficiency["id"].as_u64().unwrap());

    let (status, body) = upload(&app, &uri, BUDGET_OFFICE, "respuesta.docx", b"PK\x03\x04 not a pdf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // The owner cannot answer their own sufficiency
    let (status, _) = upload(&app, &uri, REQUESTER, "respuesta.pdf", b"%PDF-1.4 oficio").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = upload(&app, &uri, BUDGET_OFFICE, "respuesta.pdf", b"%PDF-1.4 oficio").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sufficiency"]["status"], "Atendido");
    assert!(!body["sufficiency"]["responded_at"].is_null());
    assert_eq!(body["document"]["file_name"], "respuesta.pdf");
    assert_eq!(body["document"]["uploader_id"], BUDGET_OFFICE);

    let (status, responses) = call(&app, Method::GET, &uri, Some(REQUESTER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(responses.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_participants_mark_seen_and_confirm_for_themselves() {
    let app = app().await;
    let agenda_id = convene(&app).await;
    let participant = |user_id: UserId, action: &str| format!("/api/v1/agendas/{agenda_id}/participants/{user_id}/{action}");

    let (status, seen) = call(&app, Method::PUT, &participant(10, "seen"), Some(10), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!seen["seen_at"].is_null());
    assert!(seen["confirmed_at"].is_null());

    // Confirming without a body leaves no observations
    let (status, confirmed) = call(&app, Method::PUT, &participant(10, "confirm"), Some(10), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!confirmed["confirmed_at"].is_null());
    assert!(confirmed["observations"].is_null());

    let (status, confirmed) = call(
        &app,
        Method::PUT,
        &participant(11, "confirm"),
        Some(11),
        Some(json!({"observations": "Llegaré 15 minutos tarde"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["observations"], "Llegaré 15 minutos tarde");

    let (status, _) = call(&app, Method::PUT, &participant(20, "seen"), Some(10), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The secretary may act on anyone's behalf
    let (status, _) = call(&app, Method::PUT, &participant(20, "seen"), Some(REVIEWER), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::PUT, &participant(REQUESTER, "confirm"), Some(REQUESTER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_minutes_attendee_route_signs_or_requests_correction() {
    let app = app().await;
    let agenda_id = convene(&app).await;
    let (status, created) = call(
        &app,
        Method::POST,
        "/api/v1/minutes",
        Some(REVIEWER),
        Some(json!({
            "agenda_id": agenda_id,
            "session_date": "2026-06-03",
            "start_time": "10:05:00",
            "points_treated": ["Aprobación de la adquisición"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["attendees"].as_array().unwrap().len(), 3);
    let minutes_id = created["minutes"]["id"].as_u64().unwrap();
    let attendee = |user_id: UserId| format!("/api/v1/minutes/{minutes_id}/attendees/{user_id}");

    let (status, signed) = call(&app, Method::PUT, &attendee(10), Some(10), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!signed["signed_at"].is_null());

    // An empty object still means "sign"
    let (status, signed) = call(&app, Method::PUT, &attendee(11), Some(11), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!signed["signed_at"].is_null());

    let (status, correction) = call(
        &app,
        Method::PUT,
        &attendee(20),
        Some(20),
        Some(json!({"comment": "Falta el monto en el punto 1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(correction["signed_at"].is_null());
    assert_eq!(correction["correction_comment"], "Falta el monto en el punto 1");
    assert!(!correction["correction_requested_at"].is_null());

    let (status, body) = call(&app, Method::PUT, &attendee(10), Some(10), Some(json!({"comment": "tarde"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_SIGNED");

    let (status, _) = call(&app, Method::PUT, &attendee(20), Some(10), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, view) = call(&app, Method::GET, &format!("/api/v1/minutes/{minutes_id}"), Some(20), None).await;
    assert_eq!(status, StatusCode::OK);
    for attendee in view["attendees"].as_array().unwrap() {
        let signed = !attendee["signed_at"].is_null();
        assert_eq!(signed, attendee["user_id"] != 20, "attendee {}", attendee["user_id"]);
    }
}
