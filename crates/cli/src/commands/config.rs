use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dialtone_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

struct SourceContext {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl SourceContext {
    fn detect() -> Self {
        let path = resolve_config_path(None);
        let doc = load_config_file_doc(path.as_deref());
        Self { doc, path }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        render_line(key_path, value, self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let sources = SourceContext::detect();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line(
        "server.bind_address",
        &config.server.bind_address,
        &["DIALTONE_SERVER_BIND_ADDRESS"],
    ));
    lines.push(sources.line("server.port", &config.server.port.to_string(), &["DIALTONE_SERVER_PORT"]));
    lines.push(sources.line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["DIALTONE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    ));

    lines.push(sources.line(
        "limits.voice_calls_per_day",
        &config.limits.voice_calls_per_day.to_string(),
        &["DIALTONE_LIMITS_VOICE_CALLS_PER_DAY", "MAX_CALLS_PER_DAY"],
    ));
    lines.push(sources.line(
        "limits.sms_per_day",
        &config.limits.sms_per_day.to_string(),
        &["DIALTONE_LIMITS_SMS_PER_DAY", "MAX_SMS_PER_DAY"],
    ));
    lines.push(sources.line(
        "limits.cleanup_interval_hours",
        &config.limits.cleanup_interval_hours.to_string(),
        &["DIALTONE_LIMITS_CLEANUP_INTERVAL_HOURS"],
    ));

    lines.push(sources.line(
        "generation.base_url",
        &config.generation.base_url,
        &["DIALTONE_GENERATION_BASE_URL", "OLLAMA_API_URL"],
    ));
    lines.push(sources.line(
        "generation.timeout_secs",
        &config.generation.timeout_secs.to_string(),
        &["DIALTONE_GENERATION_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "telephony.account_sid",
        &redact_sid(&config.telephony.account_sid),
        &["DIALTONE_TELEPHONY_ACCOUNT_SID", "TWILIO_ACCOUNT_SID"],
    ));
    lines.push(sources.line(
        "telephony.auth_token",
        redact_token(config.telephony.auth_token.expose_secret()),
        &["DIALTONE_TELEPHONY_AUTH_TOKEN", "TWILIO_AUTH_TOKEN"],
    ));
    lines.push(sources.line(
        "telephony.phone_number",
        &config.telephony.phone_number,
        &["DIALTONE_TELEPHONY_PHONE_NUMBER", "TWILIO_PHONE_NUMBER"],
    ));
    lines.push(sources.line(
        "telephony.api_base_url",
        &config.telephony.api_base_url,
        &["DIALTONE_TELEPHONY_API_BASE_URL"],
    ));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["DIALTONE_LOGGING_LEVEL", "DIALTONE_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["DIALTONE_LOGGING_FORMAT", "DIALTONE_LOG_FORMAT"],
    ));

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> &'static str {
    if token.trim().is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Keeps the `AC` prefix and the last four characters.
fn redact_sid(sid: &str) -> String {
    let sid = sid.trim();
    let chars: Vec<char> = sid.chars().collect();
    if chars.len() <= 6 {
        return format!("{}***", chars.iter().take(2).collect::<String>());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{tail}", chars[..2].iter().collect::<String>())
}
