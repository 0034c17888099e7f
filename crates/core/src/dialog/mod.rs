pub mod handler;
pub mod turns;

pub use handler::{DialogSettings, DialogTurnHandler, TurnStep};
pub use turns::{CallerKey, Channel, DialogTurn, Instruction, Listen, Route};
