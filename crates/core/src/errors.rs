use thiserror::Error;

/// Webhook entry points, used to pick the generic failure detail returned to the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookEndpoint {
    Voice,
    ProcessSpeech,
    Sms,
}

impl WebhookEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Voice => "/voice",
            Self::ProcessSpeech => "/process-speech",
            Self::Sms => "/sms",
        }
    }

    pub fn failure_detail(&self) -> &'static str {
        match self {
            Self::Voice => "Internal server error",
            Self::ProcessSpeech => "Speech processing error",
            Self::Sms => "SMS processing error",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("malformed inbound event: missing required field `{field}`")]
    MalformedEvent { field: &'static str },
    #[error("malformed inbound body: {0}")]
    MalformedBody(String),
    #[error("provider send failed: {0}")]
    ProviderSend(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("internal error on {endpoint:?}: {message}")]
    Internal { endpoint: WebhookEndpoint, message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to hand back to the telephony provider. Never contains the internal message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Internal { endpoint, .. } => endpoint.failure_detail(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(
        self,
        endpoint: WebhookEndpoint,
        correlation_id: impl Into<String>,
    ) -> InterfaceError {
        InterfaceError::Internal {
            endpoint,
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}
