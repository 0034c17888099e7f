use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use dialtone_telephony::{MessageSender, OutboundMessage, SendError, TwilioMessagingClient};
use serde_json::json;

const ACCOUNT_SID: &str = "AC0001";
const AUTH_TOKEN: &str = "token-xyz";
// base64("AC0001:token-xyz")
const EXPECTED_AUTHORIZATION: &str = "Basic QUMwMDAxOnRva2VuLXh5eg==";

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, Option<String>, HashMap<String, String>)>>>,
}

async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind provider");
    let address = listener.local_addr().expect("provider address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{address}")
}

fn client(base_url: &str) -> TwilioMessagingClient {
    TwilioMessagingClient::new(base_url, ACCOUNT_SID, AUTH_TOKEN.to_string().into())
}

fn message() -> OutboundMessage {
    OutboundMessage {
        to: "+15551112222".to_string(),
        from: "+15550000000".to_string(),
        body: "Here is your answer".to_string(),
    }
}

#[tokio::test]
async fn send_posts_form_with_basic_auth() {
    let captured = Captured::default();
    let router = Router::new()
        .route(
            "/2010-04-01/Accounts/{sid}/Messages.json",
            post(
                |State(captured): State<Captured>,
                 Path(sid): Path<String>,
                 headers: HeaderMap,
                 Form(form): Form<HashMap<String, String>>| async move {
                    let authorization = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    captured.requests.lock().expect("capture lock").push((sid, authorization, form));
                    (StatusCode::CREATED, Json(json!({ "sid": "SM123", "status": "queued" })))
                },
            ),
        )
        .with_state(captured.clone());
    let base_url = spawn_provider(router).await;

    let sent = client(&base_url).send(&message()).await.expect("send should succeed");

    assert_eq!(sent.sid.as_deref(), Some("SM123"));
    let requests = captured.requests.lock().expect("capture lock");
    assert_eq!(requests.len(), 1);
    let (sid, authorization, form) = &requests[0];
    assert_eq!(sid, ACCOUNT_SID);
    assert_eq!(authorization.as_deref(), Some(EXPECTED_AUTHORIZATION));
    assert_eq!(form.get("To").map(String::as_str), Some("+15551112222"));
    assert_eq!(form.get("From").map(String::as_str), Some("+15550000000"));
    assert_eq!(form.get("Body").map(String::as_str), Some("Here is your answer"));
}

#[tokio::test]
async fn rejected_send_carries_provider_status() {
    let router = Router::new().route(
        "/2010-04-01/Accounts/{sid}/Messages.json",
        post(|| async {
            (StatusCode::BAD_REQUEST, Json(json!({ "code": 21211, "message": "invalid To" })))
        }),
    );
    let base_url = spawn_provider(router).await;

    let error = client(&base_url).send(&message()).await.expect_err("send should fail");

    assert!(matches!(error, SendError::Rejected { status: 400, ref detail } if detail.contains("21211")));
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);

    let error = client(&format!("http://{address}"))
        .send(&message())
        .await
        .expect_err("send should fail");

    assert!(matches!(error, SendError::Transport(_)));
}

#[tokio::test]
async fn credential_probe_reads_account_summary() {
    let router = Router::new().route(
        "/2010-04-01/Accounts/{file}",
        get(|Path(file): Path<String>, headers: HeaderMap| async move {
            let authorized = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == EXPECTED_AUTHORIZATION);
            if !authorized || file != "AC0001.json" {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "code": 20003 })));
            }
            (StatusCode::OK, Json(json!({ "friendly_name": "Dialtone", "status": "active" })))
        }),
    );
    let base_url = spawn_provider(router).await;

    let summary = client(&base_url).verify_credentials().await.expect("credentials accepted");
    assert_eq!(summary.status.as_deref(), Some("active"));

    let wrong = TwilioMessagingClient::new(&base_url, ACCOUNT_SID, "wrong".to_string().into());
    let error = wrong.verify_credentials().await.expect_err("credentials rejected");
    assert!(matches!(error, SendError::Rejected { status: 401, .. }));
}
