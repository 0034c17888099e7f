use crate::dialog::turns::{Channel, DialogTurn, Instruction, Listen, Route};
use crate::generation::GenerationOutcome;
use crate::messages;

pub const LISTEN_TIMEOUT_SECS: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogSettings {
    pub listen_timeout_secs: u8,
    pub language: String,
    pub greeting_hints: Vec<String>,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            listen_timeout_secs: LISTEN_TIMEOUT_SECS,
            language: "en".to_string(),
            greeting_hints: ["Hello", "Help", "Goodbye"].map(String::from).to_vec(),
        }
    }
}

/// What the dispatcher must do next for a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStep {
    Respond(Instruction),
    /// Call the generation backend with `prompt`, then pass the outcome to
    /// [`DialogTurnHandler::respond`].
    Generate { channel: Channel, prompt: String },
}

/// Stateless turn logic. Admission is decided before a turn reaches this handler.
#[derive(Clone, Debug, Default)]
pub struct DialogTurnHandler {
    settings: DialogSettings,
}

impl DialogTurnHandler {
    pub fn new(settings: DialogSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DialogSettings {
        &self.settings
    }

    pub fn next_step(&self, turn: &DialogTurn) -> TurnStep {
        match (turn.channel, turn.is_first_turn, turn.text()) {
            (Channel::Voice, true, _) => TurnStep::Respond(self.greet()),
            (Channel::Voice, false, None) => TurnStep::Respond(Instruction::Reprompt {
                message: messages::REPROMPT.to_string(),
                restart: Route::VoiceEntry,
            }),
            (Channel::Sms, _, None) => {
                TurnStep::Respond(Instruction::Reply { text: messages::SMS_EMPTY_BODY.to_string() })
            }
            (channel, _, Some(text)) => TurnStep::Generate { channel, prompt: text.to_string() },
        }
    }

    /// Turns a generation outcome into the channel's answer instruction.
    pub fn respond(&self, channel: Channel, outcome: &GenerationOutcome) -> Instruction {
        let text = outcome.display_text().to_string();
        match channel {
            Channel::Voice => Instruction::Speak {
                text,
                listen: self.listen(messages::FOLLOW_UP, Vec::new()),
            },
            Channel::Sms => Instruction::Reply { text },
        }
    }

    pub fn deny(&self, channel: Channel) -> Instruction {
        let message = match channel {
            Channel::Voice => messages::VOICE_LIMIT_REACHED,
            Channel::Sms => messages::SMS_LIMIT_REACHED,
        };
        Instruction::Deny { channel, message: message.to_string() }
    }

    fn greet(&self) -> Instruction {
        Instruction::Greet {
            listen: self.listen(messages::GREETING, self.settings.greeting_hints.clone()),
            on_silence: Route::VoiceEntry,
        }
    }

    fn listen(&self, prompt: &str, hints: Vec<String>) -> Listen {
        Listen {
            prompt: prompt.to_string(),
            timeout_secs: self.settings.listen_timeout_secs,
            language: self.settings.language.clone(),
            hints,
            action: Route::SpeechContinuation,
        }
    }
}
