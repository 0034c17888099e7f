use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dialtone_agent::TextGenerator;
use dialtone_core::GenerationOutcome;
use dialtone_telephony::{MessageSender, OutboundMessage, SendError, SentMessage};

pub struct ScriptedGenerator {
    outcome: GenerationOutcome,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(text: &str) -> Arc<Self> {
        Self::with_outcome(GenerationOutcome::Success(text.to_string()))
    }

    pub fn with_outcome(outcome: GenerationOutcome) -> Arc<Self> {
        Arc::new(Self { outcome, prompts: Mutex::new(Vec::new()) })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> GenerationOutcome {
        self.prompts.lock().expect("prompts lock").push(prompt.to_string());
        self.outcome.clone()
    }
}

/// Accepts the prompt and then never answers.
#[derive(Default)]
pub struct StalledGenerator {
    calls: Mutex<usize>,
}

impl StalledGenerator {
    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

#[async_trait]
impl TextGenerator for StalledGenerator {
    async fn generate(&self, _prompt: &str) -> GenerationOutcome {
        *self.calls.lock().expect("calls lock") += 1;
        std::future::pending().await
    }
}

pub struct RecordingSender {
    reject: bool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self { reject: false, sent: Mutex::new(Vec::new()) })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self { reject: true, sent: Mutex::new(Vec::new()) })
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<SentMessage, SendError> {
        self.sent.lock().expect("sent lock").push(message.clone());
        if self.reject {
            return Err(SendError::Rejected {
                status: 401,
                detail: "Authenticate AC0001".to_string(),
            });
        }
        Ok(SentMessage { sid: Some("SM0001".to_string()) })
    }
}
