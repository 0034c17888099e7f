use std::sync::Arc;

use dialtone_agent::TextGenerator;
use dialtone_core::config::AppConfig;
use dialtone_core::{
    messages, ApplicationError, CallerKey, Channel, DialogTurn, DialogTurnHandler, Instruction,
    Listen, RateLimiter, TurnStep,
};
use dialtone_telephony::{Gather, MessageSender, OutboundMessage, SendError, VoiceResponse};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("inbound event is missing required field `{field}`")]
    MalformedEvent { field: &'static str },
    #[error(transparent)]
    ProviderSend(#[from] SendError),
    #[error("instruction `{kind}` has no {channel} encoding")]
    Unencodable { kind: &'static str, channel: Channel },
}

impl From<DispatchError> for ApplicationError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::MalformedEvent { field } => Self::MalformedEvent { field },
            DispatchError::ProviderSend(send) => Self::ProviderSend(send.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// One decoded webhook call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub correlation_id: String,
    pub from: Option<String>,
    pub text: Option<String>,
}

impl InboundEvent {
    fn required_from(&self) -> Result<&str, DispatchError> {
        self.from.as_deref().ok_or(DispatchError::MalformedEvent { field: "From" })
    }
}

/// Routes admitted turns through dialog logic and generation, and encodes the result per channel.
pub struct Dispatcher {
    voice_limiter: Arc<RateLimiter>,
    sms_limiter: Arc<RateLimiter>,
    turns: DialogTurnHandler,
    generator: Arc<dyn TextGenerator>,
    messenger: Arc<dyn MessageSender>,
    source_number: String,
}

impl Dispatcher {
    pub fn new(
        voice_limiter: Arc<RateLimiter>,
        sms_limiter: Arc<RateLimiter>,
        generator: Arc<dyn TextGenerator>,
        messenger: Arc<dyn MessageSender>,
        source_number: impl Into<String>,
    ) -> Self {
        Self {
            voice_limiter,
            sms_limiter,
            turns: DialogTurnHandler::default(),
            generator,
            messenger,
            source_number: source_number.into(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        generator: Arc<dyn TextGenerator>,
        messenger: Arc<dyn MessageSender>,
    ) -> Self {
        let interval = config.limits.cleanup_interval_hours;
        let voice = RateLimiter::new("voice", config.limits.voice_calls_per_day)
            .with_cleanup_interval_hours(interval);
        let sms = RateLimiter::new("sms", config.limits.sms_per_day)
            .with_cleanup_interval_hours(interval);
        Self::new(
            Arc::new(voice),
            Arc::new(sms),
            generator,
            messenger,
            config.telephony.phone_number.trim(),
        )
    }

    pub fn voice_limiter(&self) -> &Arc<RateLimiter> {
        &self.voice_limiter
    }

    pub fn sms_limiter(&self) -> &Arc<RateLimiter> {
        &self.sms_limiter
    }

    /// `/voice`: an incoming call, or a redirect back to the greeting. Charges the voice quota.
    pub async fn handle_voice_entry(
        &self,
        event: &InboundEvent,
    ) -> Result<VoiceResponse, DispatchError> {
        let from = event.required_from()?;
        if !self.admit(&self.voice_limiter, Channel::Voice, from, event) {
            return self.encode_voice(self.turns.deny(Channel::Voice));
        }

        let turn = DialogTurn::voice_entry(CallerKey::parse(from));
        let instruction = self.run_turn(&turn, event).await;
        self.encode_voice(instruction)
    }

    /// `/process-speech`: the result of a speech capture window. Admission was granted on entry.
    pub async fn handle_voice_continuation(
        &self,
        event: &InboundEvent,
    ) -> Result<VoiceResponse, DispatchError> {
        let caller = event.from.as_deref().and_then(CallerKey::parse);
        let turn = DialogTurn::voice_continuation(caller, event.text.clone());
        let instruction = self.run_turn(&turn, event).await;
        self.encode_voice(instruction)
    }

    /// `/sms`: returns the webhook body. A reply is sent out of band before returning.
    pub async fn handle_sms(&self, event: &InboundEvent) -> Result<String, DispatchError> {
        let from = event.required_from()?;
        let body = event.text.clone().ok_or(DispatchError::MalformedEvent { field: "Body" })?;
        if !self.admit(&self.sms_limiter, Channel::Sms, from, event) {
            return self.encode_sms(from, self.turns.deny(Channel::Sms), event).await;
        }

        let turn = DialogTurn::sms(CallerKey::parse(from), Some(body));
        let instruction = self.run_turn(&turn, event).await;
        self.encode_sms(from, instruction, event).await
    }

    fn admit(
        &self,
        limiter: &RateLimiter,
        channel: Channel,
        from: &str,
        event: &InboundEvent,
    ) -> bool {
        if limiter.can_proceed(from) {
            return true;
        }
        warn!(
            event_name = "dispatch.rate_limited",
            correlation_id = %event.correlation_id,
            channel = %channel,
            caller = from,
            quota = limiter.quota(),
            "caller exceeded daily quota"
        );
        false
    }

    async fn run_turn(&self, turn: &DialogTurn, event: &InboundEvent) -> Instruction {
        match self.turns.next_step(turn) {
            TurnStep::Respond(instruction) => instruction,
            TurnStep::Generate { channel, prompt } => {
                let outcome = self.generator.generate(&prompt).await;
                info!(
                    event_name = "dispatch.generated",
                    correlation_id = %event.correlation_id,
                    channel = %channel,
                    caller = turn.caller.as_ref().map(CallerKey::as_str).unwrap_or("unknown"),
                    outcome = outcome.kind(),
                    "generation finished for turn"
                );
                self.turns.respond(channel, &outcome)
            }
        }
    }

    fn encode_voice(&self, instruction: Instruction) -> Result<VoiceResponse, DispatchError> {
        let language = Some(self.turns.settings().language.as_str());
        let response = match instruction {
            Instruction::Greet { listen, on_silence } => {
                VoiceResponse::new().gather(gather(&listen)).redirect(on_silence.path())
            }
            Instruction::Reprompt { message, restart } => {
                VoiceResponse::new().say(message, language).redirect(restart.path())
            }
            Instruction::Speak { text, listen } => {
                VoiceResponse::new().say(text, language).gather(gather(&listen))
            }
            Instruction::Deny { message, .. } => {
                VoiceResponse::new().say(message, language).hangup()
            }
            other @ Instruction::Reply { .. } => {
                return Err(DispatchError::Unencodable { kind: other.kind(), channel: Channel::Voice })
            }
        };
        Ok(response)
    }

    async fn encode_sms(
        &self,
        to: &str,
        instruction: Instruction,
        event: &InboundEvent,
    ) -> Result<String, DispatchError> {
        match instruction {
            Instruction::Deny { message, .. } => Ok(message),
            Instruction::Reply { text } => {
                let message =
                    OutboundMessage { to: to.to_string(), from: self.source_number.clone(), body: text };
                let sent = self.messenger.send(&message).await?;
                info!(
                    event_name = "dispatch.sms_replied",
                    correlation_id = %event.correlation_id,
                    channel = "sms",
                    caller = to,
                    message_sid = sent.sid.as_deref().unwrap_or("unknown"),
                    "sms reply sent"
                );
                Ok(messages::SMS_ACCEPTED.to_string())
            }
            other => Err(DispatchError::Unencodable { kind: other.kind(), channel: Channel::Sms }),
        }
    }
}

fn gather(listen: &Listen) -> Gather {
    Gather::speech(listen.action.path(), listen.timeout_secs)
        .language(listen.language.as_str())
        .hints(listen.hints.iter().cloned())
        .say(listen.prompt.as_str())
}
