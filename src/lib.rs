//! Voice Helper - a local voice assistant backed by Ollama
//!
//! This library provides the pieces of the assistant:
//! - Utterance resolution (quick replies, memory commands, generation)
//! - Persistent memory of conversations and tasks
//! - A bounded response cache in front of the language model
//! - Voice capture, STT, TTS and playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Session                          │
//! │   Capture  →  Resolver  →  Playback                  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Memory  │  Response cache  │  Generation client   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Ollama (worker thread)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod generation;
pub mod memory;
pub mod resolver;
pub mod session;
pub mod voice;

pub use cache::ResponseCache;
pub use config::Config;
pub use error::{Error, Result};
pub use generation::{GenerationClient, Generated, Generator};
pub use memory::{MemorySnapshot, MemoryStore};
pub use resolver::{ResolutionOutcome, Utterance, resolve};
pub use session::{Capture, Heard, Playback, Session, SessionConfig, ShutdownReason};
