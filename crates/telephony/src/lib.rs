//! Telephony Integration - voice markup and outbound SMS
//!
//! This crate is the provider-facing edge of dialtone:
//! - **Voice markup** (`twiml`) - `<Response>` documents built from say/gather/redirect/hangup verbs
//! - **Messaging** (`messaging`) - send-message client and account credential probe
//!
//! # Architecture
//!
//! ```text
//! Provider webhook → Dispatcher → Instruction → VoiceResponse (markup)
//!                                     ↓
//!                               MessageSender (SMS reply)
//! ```
//!
//! # Key Types
//!
//! - `VoiceResponse` - Ordered list of voice verbs rendered as XML
//! - `MessageSender` - Trait for anything that can deliver an SMS
//! - `TwilioMessagingClient` - REST implementation of `MessageSender`

pub mod messaging;
pub mod twiml;

pub use messaging::{MessageSender, OutboundMessage, SendError, SentMessage, TwilioMessagingClient};
pub use twiml::{Gather, VoiceResponse};
