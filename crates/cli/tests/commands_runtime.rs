use std::env;
use std::sync::{Mutex, OnceLock};

use axum::{
    routing::{get, post},
    Json, Router,
};
use dialtone_cli::commands::{config, doctor, smoke};
use serde_json::{json, Value};

#[test]
fn config_fails_without_telephony_credentials() {
    with_env(&[], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_legacy_env_names_and_redacts_token() {
    with_env(
        &[
            ("TWILIO_ACCOUNT_SID", "AC0123456789abcdef"),
            ("TWILIO_AUTH_TOKEN", "auth-secret-value"),
            ("TWILIO_PHONE_NUMBER", "+15550000000"),
            ("MAX_CALLS_PER_DAY", "7"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(output
                .contains("- limits.voice_calls_per_day = 7 (source: env (MAX_CALLS_PER_DAY))"));
            assert!(output.contains("- limits.sms_per_day = 100 (source: default)"));
            assert!(output.contains("- telephony.account_sid = AC***cdef"));
            assert!(output.contains("- telephony.auth_token = <redacted>"));
            assert!(!output.contains("auth-secret-value"));
        },
    );
}

#[test]
fn doctor_skips_probes_when_config_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_probes_generation_backend_and_telephony_account() {
    let base = spawn_mock_services();
    let generation_url = format!("{base}/api");
    with_env(
        &[
            ("TWILIO_ACCOUNT_SID", "AC0001"),
            ("TWILIO_AUTH_TOKEN", "token-xyz"),
            ("TWILIO_PHONE_NUMBER", "+15550000000"),
            ("DIALTONE_TELEPHONY_API_BASE_URL", base.as_str()),
            ("OLLAMA_API_URL", generation_url.as_str()),
        ],
        || {
            let result = doctor::run(true);
            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "pass", "report: {payload}");
            assert_eq!(result.exit_code, 0);
            assert_eq!(payload["checks"][1]["name"], "generation_backend");
            assert_eq!(payload["checks"][2]["name"], "telephony_credentials");
        },
    );
}

#[test]
fn smoke_passes_against_responsive_server() {
    let base = spawn_mock_services();

    let result = smoke::run(&smoke::SmokeOptions {
        url: base,
        from: "+15555550100".to_string(),
        body: "Hello".to_string(),
    });

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    let payload = parse_payload(last_line(&result.output));
    assert_eq!(payload["command"], "smoke");
    assert_eq!(payload["status"], "pass");
    assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
}

#[test]
fn smoke_reports_failure_when_server_unreachable() {
    let result = smoke::run(&smoke::SmokeOptions {
        url: "http://127.0.0.1:1".to_string(),
        from: "+15555550100".to_string(),
        body: "Hello".to_string(),
    });

    assert_eq!(result.exit_code, 6, "expected smoke failure code");
    let payload = parse_payload(last_line(&result.output));
    assert_eq!(payload["status"], "fail");
    assert_eq!(payload["checks"][0]["status"], "fail");
    assert_eq!(payload["checks"][1]["status"], "skipped");
}

/// Generation backend, telephony account resource and webhook endpoints on one ephemeral port.
fn spawn_mock_services() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock listener");
    listener.set_nonblocking(true).expect("nonblocking listener");
    let address = listener.local_addr().expect("mock address");

    let router = Router::new()
        .route("/api/generate", post(|| async { Json(json!({ "response": "ready" })) }))
        .route(
            "/2010-04-01/Accounts/AC0001.json",
            get(|| async { Json(json!({ "friendly_name": "Test", "status": "active" })) }),
        )
        .route("/health", get(|| async { Json(json!({ "status": "ready" })) }))
        .route("/voice", post(|| async { "<Response><Gather/></Response>" }))
        .route("/process-speech", post(|| async { "<Response><Say>Hi</Say></Response>" }))
        .route("/sms", post(|| async { "Message processed" }));

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("mock runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, router).await.expect("mock server");
        });
    });

    format!("http://{address}")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DIALTONE_SERVER_BIND_ADDRESS",
        "DIALTONE_SERVER_PORT",
        "DIALTONE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "DIALTONE_LIMITS_VOICE_CALLS_PER_DAY",
        "DIALTONE_LIMITS_SMS_PER_DAY",
        "DIALTONE_LIMITS_CLEANUP_INTERVAL_HOURS",
        "MAX_CALLS_PER_DAY",
        "MAX_SMS_PER_DAY",
        "DIALTONE_GENERATION_BASE_URL",
        "DIALTONE_GENERATION_TIMEOUT_SECS",
        "OLLAMA_API_URL",
        "DIALTONE_TELEPHONY_ACCOUNT_SID",
        "DIALTONE_TELEPHONY_AUTH_TOKEN",
        "DIALTONE_TELEPHONY_PHONE_NUMBER",
        "DIALTONE_TELEPHONY_API_BASE_URL",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_PHONE_NUMBER",
        "DIALTONE_LOGGING_LEVEL",
        "DIALTONE_LOGGING_FORMAT",
        "DIALTONE_LOG_LEVEL",
        "DIALTONE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
