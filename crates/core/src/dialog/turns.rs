use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Voice,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized originating phone number. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallerKey(String);

impl CallerKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Webhook targets a voice instruction can hand control back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    VoiceEntry,
    SpeechContinuation,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Self::VoiceEntry => "/voice",
            Self::SpeechContinuation => "/process-speech",
        }
    }
}

/// One speech capture window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listen {
    pub prompt: String,
    pub timeout_secs: u8,
    pub language: String,
    pub hints: Vec<String>,
    pub action: Route,
}

/// Channel-independent next action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Prompt and listen; hand control to `on_silence` if nothing is captured.
    Greet { listen: Listen, on_silence: Route },
    Reprompt { message: String, restart: Route },
    /// Speak a generated answer, then listen again.
    Speak { text: String, listen: Listen },
    Reply { text: String },
    Deny { channel: Channel, message: String },
}

impl Instruction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Greet { .. } => "greet",
            Self::Reprompt { .. } => "reprompt",
            Self::Speak { .. } => "speak",
            Self::Reply { .. } => "reply",
            Self::Deny { .. } => "deny",
        }
    }
}

/// One inbound event. Nothing here outlives the request that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogTurn {
    pub channel: Channel,
    pub caller: Option<CallerKey>,
    pub text: Option<String>,
    pub is_first_turn: bool,
}

impl DialogTurn {
    pub fn voice_entry(caller: Option<CallerKey>) -> Self {
        Self { channel: Channel::Voice, caller, text: None, is_first_turn: true }
    }

    pub fn voice_continuation(caller: Option<CallerKey>, speech: Option<String>) -> Self {
        Self { channel: Channel::Voice, caller, text: speech, is_first_turn: false }
    }

    pub fn sms(caller: Option<CallerKey>, body: Option<String>) -> Self {
        Self { channel: Channel::Sms, caller, text: body, is_first_turn: false }
    }

    /// Captured text exactly as received, or `None` when it is blank.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }
}
