use dialtone_agent::{HttpGenerationClient, TextGenerator};
use dialtone_core::config::{AppConfig, LoadOptions};
use dialtone_core::GenerationOutcome;
use dialtone_telephony::TwilioMessagingClient;
use serde::Serialize;

use crate::commands::CommandResult;

const PROBE_PROMPT: &str = "Reply with the single word: ready";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn passed(&self) -> bool {
        self.overall_status == CheckStatus::Pass
    }
}

/// Exits with 1 when any check did not pass.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.passed() { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(probe_dependencies(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["generation_backend", "telephony_credentials"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn probe_dependencies(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "generation_backend",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    let generator = HttpGenerationClient::from_config(&config.generation);
    let telephony = TwilioMessagingClient::from_config(&config.telephony);

    runtime.block_on(async {
        vec![check_generation(&generator).await, check_telephony(&telephony).await]
    })
}

async fn check_generation(generator: &HttpGenerationClient) -> DoctorCheck {
    match generator.generate(PROBE_PROMPT).await {
        GenerationOutcome::Success(_) => DoctorCheck {
            name: "generation_backend",
            status: CheckStatus::Pass,
            details: format!("`{}` answered a probe prompt", generator.endpoint()),
        },
        GenerationOutcome::BackendError(status) => DoctorCheck {
            name: "generation_backend",
            status: CheckStatus::Fail,
            details: format!("`{}` returned HTTP {status}", generator.endpoint()),
        },
        failure => DoctorCheck {
            name: "generation_backend",
            status: CheckStatus::Fail,
            details: format!("`{}` unreachable ({})", generator.endpoint(), failure.kind()),
        },
    }
}

async fn check_telephony(client: &TwilioMessagingClient) -> DoctorCheck {
    match client.verify_credentials().await {
        Ok(account) => DoctorCheck {
            name: "telephony_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "account `{}` is {}",
                account.friendly_name.as_deref().unwrap_or("unnamed"),
                account.status.as_deref().unwrap_or("reachable")
            ),
        },
        Err(error) => DoctorCheck {
            name: "telephony_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
