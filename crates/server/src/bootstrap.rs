use std::sync::Arc;

use axum::Router;
use dialtone_agent::HttpGenerationClient;
use dialtone_core::config::{AppConfig, ConfigError};
use dialtone_telephony::TwilioMessagingClient;
use thiserror::Error;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::{health, webhooks};

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn router(&self) -> Router {
        let voice = self.dispatcher.voice_limiter().clone();
        let sms = self.dispatcher.sms_limiter().clone();
        webhooks::router(self.dispatcher.clone()).merge(health::router(voice, sms))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Builds the process-wide limiters and outbound clients from `config`, validating it first.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let generator = Arc::new(HttpGenerationClient::from_config(&config.generation));
    let messenger = Arc::new(TwilioMessagingClient::from_config(&config.telephony));
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        generation_endpoint = generator.endpoint(),
        voice_quota = config.limits.voice_calls_per_day,
        sms_quota = config.limits.sms_per_day,
        "outbound clients and rate limiters initialized"
    );

    let dispatcher = Dispatcher::from_config(&config, generator, messenger);
    Ok(Application { config, dispatcher: Arc::new(dispatcher) })
}
