use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub generation: GenerationConfig,
    pub telephony: TelephonyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LimitsConfig {
    pub voice_calls_per_day: u32,
    pub sms_per_day: u32,
    pub cleanup_interval_hours: u32,
}

#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelephonyConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub phone_number: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub voice_calls_per_day: Option<u32>,
    pub sms_per_day: Option<u32>,
    pub generation_base_url: Option<String>,
    pub generation_timeout_secs: Option<u64>,
    pub telephony_account_sid: Option<String>,
    pub telephony_auth_token: Option<String>,
    pub telephony_phone_number: Option<String>,
    pub telephony_api_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_CONFIG_FILE: &str = "dialtone.toml";
pub const NESTED_CONFIG_FILE: &str = "config/dialtone.toml";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            limits: LimitsConfig {
                voice_calls_per_day: 100,
                sms_per_day: 100,
                cleanup_interval_hours: 24,
            },
            generation: GenerationConfig {
                base_url: "http://localhost:11434/api".to_string(),
                timeout_secs: 30,
            },
            telephony: TelephonyConfig {
                account_sid: String::new(),
                auth_token: String::new().into(),
                phone_number: String::new(),
                api_base_url: "https://api.twilio.com".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(limits) = patch.limits {
            if let Some(voice_calls_per_day) = limits.voice_calls_per_day {
                self.limits.voice_calls_per_day = voice_calls_per_day;
            }
            if let Some(sms_per_day) = limits.sms_per_day {
                self.limits.sms_per_day = sms_per_day;
            }
            if let Some(cleanup_interval_hours) = limits.cleanup_interval_hours {
                self.limits.cleanup_interval_hours = cleanup_interval_hours;
            }
        }

        if let Some(generation) = patch.generation {
            if let Some(base_url) = generation.base_url {
                self.generation.base_url = base_url;
            }
            if let Some(timeout_secs) = generation.timeout_secs {
                self.generation.timeout_secs = timeout_secs;
            }
        }

        if let Some(telephony) = patch.telephony {
            if let Some(account_sid) = telephony.account_sid {
                self.telephony.account_sid = account_sid;
            }
            if let Some(auth_token_value) = telephony.auth_token {
                self.telephony.auth_token = secret_value(auth_token_value);
            }
            if let Some(phone_number) = telephony.phone_number {
                self.telephony.phone_number = phone_number;
            }
            if let Some(api_base_url) = telephony.api_base_url {
                self.telephony.api_base_url = api_base_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DIALTONE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DIALTONE_SERVER_PORT") {
            self.server.port = parse_u16("DIALTONE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DIALTONE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DIALTONE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some((key, value)) =
            read_env_aliased(&["DIALTONE_LIMITS_VOICE_CALLS_PER_DAY", "MAX_CALLS_PER_DAY"])
        {
            self.limits.voice_calls_per_day = parse_u32(key, &value)?;
        }
        if let Some((key, value)) =
            read_env_aliased(&["DIALTONE_LIMITS_SMS_PER_DAY", "MAX_SMS_PER_DAY"])
        {
            self.limits.sms_per_day = parse_u32(key, &value)?;
        }
        if let Some(value) = read_env("DIALTONE_LIMITS_CLEANUP_INTERVAL_HOURS") {
            self.limits.cleanup_interval_hours =
                parse_u32("DIALTONE_LIMITS_CLEANUP_INTERVAL_HOURS", &value)?;
        }

        if let Some((_, value)) =
            read_env_aliased(&["DIALTONE_GENERATION_BASE_URL", "OLLAMA_API_URL"])
        {
            self.generation.base_url = value;
        }
        if let Some(value) = read_env("DIALTONE_GENERATION_TIMEOUT_SECS") {
            self.generation.timeout_secs = parse_u64("DIALTONE_GENERATION_TIMEOUT_SECS", &value)?;
        }

        if let Some((_, value)) =
            read_env_aliased(&["DIALTONE_TELEPHONY_ACCOUNT_SID", "TWILIO_ACCOUNT_SID"])
        {
            self.telephony.account_sid = value;
        }
        if let Some((_, value)) =
            read_env_aliased(&["DIALTONE_TELEPHONY_AUTH_TOKEN", "TWILIO_AUTH_TOKEN"])
        {
            self.telephony.auth_token = secret_value(value);
        }
        if let Some((_, value)) =
            read_env_aliased(&["DIALTONE_TELEPHONY_PHONE_NUMBER", "TWILIO_PHONE_NUMBER"])
        {
            self.telephony.phone_number = value;
        }
        if let Some(value) = read_env("DIALTONE_TELEPHONY_API_BASE_URL") {
            self.telephony.api_base_url = value;
        }

        if let Some((_, value)) = read_env_aliased(&["DIALTONE_LOGGING_LEVEL", "DIALTONE_LOG_LEVEL"])
        {
            self.logging.level = value;
        }
        if let Some((_, value)) =
            read_env_aliased(&["DIALTONE_LOGGING_FORMAT", "DIALTONE_LOG_FORMAT"])
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(voice_calls_per_day) = overrides.voice_calls_per_day {
            self.limits.voice_calls_per_day = voice_calls_per_day;
        }
        if let Some(sms_per_day) = overrides.sms_per_day {
            self.limits.sms_per_day = sms_per_day;
        }
        if let Some(base_url) = overrides.generation_base_url {
            self.generation.base_url = base_url;
        }
        if let Some(timeout_secs) = overrides.generation_timeout_secs {
            self.generation.timeout_secs = timeout_secs;
        }
        if let Some(account_sid) = overrides.telephony_account_sid {
            self.telephony.account_sid = account_sid;
        }
        if let Some(auth_token) = overrides.telephony_auth_token {
            self.telephony.auth_token = secret_value(auth_token);
        }
        if let Some(phone_number) = overrides.telephony_phone_number {
            self.telephony.phone_number = phone_number;
        }
        if let Some(api_base_url) = overrides.telephony_api_base_url {
            self.telephony.api_base_url = api_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_limits(&self.limits)?;
        validate_generation(&self.generation)?;
        validate_telephony(&self.telephony)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.voice_calls_per_day == 0 {
        return Err(ConfigError::Validation(
            "limits.voice_calls_per_day must be greater than zero (env MAX_CALLS_PER_DAY)"
                .to_string(),
        ));
    }

    if limits.sms_per_day == 0 {
        return Err(ConfigError::Validation(
            "limits.sms_per_day must be greater than zero (env MAX_SMS_PER_DAY)".to_string(),
        ));
    }

    if limits.cleanup_interval_hours == 0 {
        return Err(ConfigError::Validation(
            "limits.cleanup_interval_hours must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_generation(generation: &GenerationConfig) -> Result<(), ConfigError> {
    let base_url = generation.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "generation.base_url is required (env OLLAMA_API_URL)".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "generation.base_url must start with http:// or https://".to_string(),
        ));
    }

    if generation.timeout_secs == 0 || generation.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "generation.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telephony(telephony: &TelephonyConfig) -> Result<(), ConfigError> {
    let account_sid = telephony.account_sid.trim();
    if account_sid.is_empty() {
        return Err(ConfigError::Validation(
            "telephony.account_sid is required. Find it on the Twilio console dashboard (env TWILIO_ACCOUNT_SID)".to_string(),
        ));
    }
    if !account_sid.starts_with("AC") {
        let hint = if account_sid.starts_with("SK") {
            " (hint: you may have used an API key SID instead of the account SID)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "telephony.account_sid must start with `AC`{hint}"
        )));
    }

    if telephony.auth_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "telephony.auth_token is required (env TWILIO_AUTH_TOKEN)".to_string(),
        ));
    }

    let phone_number = telephony.phone_number.trim();
    if phone_number.is_empty() {
        return Err(ConfigError::Validation(
            "telephony.phone_number is required (env TWILIO_PHONE_NUMBER)".to_string(),
        ));
    }
    let e164 = phone_number
        .strip_prefix('+')
        .map(|digits| !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()))
        .unwrap_or(false);
    if !e164 {
        return Err(ConfigError::Validation(format!(
            "telephony.phone_number must be in E.164 format (`+15551234567`), got `{phone_number}`"
        )));
    }

    let api_base_url = telephony.api_base_url.trim();
    if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telephony.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// First non-empty value among `keys`, together with the key it came from.
fn read_env_aliased<'a>(keys: &[&'a str]) -> Option<(&'a str, String)> {
    keys.iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    limits: Option<LimitsPatch>,
    generation: Option<GenerationPatch>,
    telephony: Option<TelephonyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsPatch {
    voice_calls_per_day: Option<u32>,
    sms_per_day: Option<u32>,
    cleanup_interval_hours: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelephonyPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    phone_number: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
