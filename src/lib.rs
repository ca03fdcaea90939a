//! Crypto Portfolio Assistant
//!
//! A conversational agent that turns transcribed speech into portfolio
//! actions:
//! - Normalizes noisy transcripts (number words, known mis-hearings)
//! - Classifies intent with an NLU oracle behind a keyword gate
//! - Builds a portfolio one confirmed entry at a time
//! - Persists one portfolio per user and values it at live USD prices
//!
//! TURN:
//! NORMALIZE → CLASSIFY (Idle) | STATE MACHINE (Saving) → PERSIST? → VALUE? → REPLY

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod market;
pub mod memory;
pub mod models;
pub mod normalizer;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod valuation;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::Assistant;
pub use config::AssistantConfig;
