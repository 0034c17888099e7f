//! Core of the dialtone telephony assistant: configuration, per-caller rate limiting,
//! stateless dialog turn logic and the generation outcome model shared by the other crates.

pub mod config;
pub mod dialog;
pub mod errors;
pub mod generation;
pub mod messages;
pub mod rate_limit;

pub use dialog::{
    CallerKey, Channel, DialogSettings, DialogTurn, DialogTurnHandler, Instruction, Listen, Route,
    TurnStep,
};
pub use errors::{ApplicationError, InterfaceError, WebhookEndpoint};
pub use generation::GenerationOutcome;
pub use rate_limit::{Clock, RateLimitError, RateLimiter, SystemClock};
