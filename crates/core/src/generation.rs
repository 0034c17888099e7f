use crate::messages;

/// Result of one attempt against the text-generation backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    BackendError(u16),
    Timeout,
    TransportError,
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::BackendError(_) => "backend_error",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
        }
    }

    /// Text to speak or send. Never empty.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Success(text) if !text.trim().is_empty() => text,
            Self::Success(_) => messages::GENERATION_MISSING_FIELD,
            Self::BackendError(_) => messages::GENERATION_BACKEND_ERROR,
            Self::Timeout => messages::GENERATION_TIMEOUT,
            Self::TransportError => messages::GENERATION_TRANSPORT_ERROR,
        }
    }
}
