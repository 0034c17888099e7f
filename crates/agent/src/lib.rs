//! Generation client - bounded-timeout access to the text-generation backend
//!
//! The backend is a black box reachable at `<base_url>/generate`. It receives
//! `{"prompt": "..."}` and answers `{"response": "..."}`. Every call resolves to a
//! [`GenerationOutcome`](dialtone_core::GenerationOutcome); nothing is raised past this crate.
//!
//! # Key Types
//!
//! - `TextGenerator` - Pluggable trait the dispatcher talks to
//! - `HttpGenerationClient` - reqwest-backed implementation, one attempt per call

pub mod generation;

pub use generation::{HttpGenerationClient, TextGenerator};
