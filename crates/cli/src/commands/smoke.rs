use std::time::{Duration, Instant};

use crate::commands::CommandResult;
use reqwest::Client;
use serde::Serialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

#[derive(Clone, Debug)]
pub struct SmokeOptions {
    pub url: String,
    pub from: String,
    pub body: String,
}

struct Reply {
    status: u16,
    body: String,
}

/// Drives one call and one SMS through a running server's webhooks.
pub fn run(options: &SmokeOptions) -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "health",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            return finalize_report(checks, elapsed_ms(started));
        }
    };

    let base = options.url.trim().trim_end_matches('/').to_string();
    let client = Client::new();

    runtime.block_on(async {
        let health_started = Instant::now();
        let health = client.get(format!("{base}/health")).timeout(REQUEST_TIMEOUT).send().await;
        let health_ok = matches!(&health, Ok(response) if response.status().is_success());
        checks.push(SmokeCheck {
            name: "health",
            status: if health_ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
            elapsed_ms: elapsed_ms(health_started),
            message: match health {
                Ok(response) => format!("GET /health returned {}", response.status().as_u16()),
                Err(error) => format!("server unreachable: {error}"),
            },
        });
        if !health_ok {
            for name in ["voice_entry", "speech_turn", "sms_turn"] {
                checks.push(skipped(name));
            }
            return;
        }

        let voice = [("From", options.from.as_str())];
        checks.push(
            timed_post(&client, &format!("{base}/voice"), &voice, "voice_entry", |reply| {
                reply.body.contains("<Response>")
            })
            .await,
        );

        let speech = [("SpeechResult", options.body.as_str()), ("From", options.from.as_str())];
        checks.push(
            timed_post(&client, &format!("{base}/process-speech"), &speech, "speech_turn", |reply| {
                reply.body.contains("<Say")
            })
            .await,
        );

        let sms = [("Body", options.body.as_str()), ("From", options.from.as_str())];
        checks.push(
            timed_post(&client, &format!("{base}/sms"), &sms, "sms_turn", |reply| !reply.body.is_empty())
                .await,
        );
    });

    finalize_report(checks, elapsed_ms(started))
}

async fn timed_post(
    client: &Client,
    url: &str,
    fields: &[(&str, &str)],
    name: &'static str,
    accept: impl Fn(&Reply) -> bool,
) -> SmokeCheck {
    let started = Instant::now();
    let result = post_form(client, url, fields).await;
    let elapsed_ms = elapsed_ms(started);

    match result {
        Ok(reply) if reply.status == 200 && accept(&reply) => SmokeCheck {
            name,
            status: SmokeStatus::Pass,
            elapsed_ms,
            message: first_line(&reply.body),
        },
        Ok(reply) => SmokeCheck {
            name,
            status: SmokeStatus::Fail,
            elapsed_ms,
            message: format!("unexpected reply {}: {}", reply.status, first_line(&reply.body)),
        },
        Err(error) => SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: error },
    }
}

async fn post_form(client: &Client, url: &str, fields: &[(&str, &str)]) -> Result<Reply, String> {
    let response = client
        .post(url)
        .timeout(REQUEST_TIMEOUT)
        .form(fields)
        .send()
        .await
        .map_err(|error| format!("request failed: {error}"))?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|error| format!("unreadable body: {error}"))?;
    Ok(Reply { status, body })
}

fn elapsed_ms(started: Instant) -> u64 {
    saturating_millis(started.elapsed())
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn first_line(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    line.chars().take(160).collect()
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status != SmokeStatus::Pass);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
