//! Interactive session loop
//!
//! Owns the memory, the response cache and the audio collaborators for one
//! run. Each turn is strictly sequential: listen, resolve, speak. The
//! shutdown future is raced against every step so an interrupt ends the
//! session immediately.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::ResponseCache;
use crate::generation::Generator;
use crate::memory::{MemorySnapshot, MemoryStore};
use crate::resolver::{Utterance, resolve};
use crate::{Config, Result};

const REPROMPT_TIMEOUT: &str = "I didn't hear anything. Could you please speak again?";
const REPROMPT_UNCLEAR: &str = "I didn't catch that. Could you please repeat?";
const REPROMPT_SERVICE: &str = "I'm having trouble accessing the speech recognition service.";

/// What the capture collaborator heard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// Recognized text, as transcribed
    Utterance(String),
    /// Nothing was said before the listen timeout
    Timeout,
    /// Speech was captured but not understood
    Unclear,
    /// The recognition service could not be reached
    ServiceUnavailable,
    /// The input source is gone for good
    Closed,
}

/// Source of user utterances
#[async_trait(?Send)]
pub trait Capture {
    /// Wait for one utterance
    ///
    /// `timeout` bounds the wait for speech to start; `phrase_limit` bounds
    /// the utterance itself.
    async fn capture_utterance(&mut self, timeout: Duration, phrase_limit: Duration) -> Heard;
}

/// Sink for spoken replies
#[async_trait(?Send)]
pub trait Playback {
    /// Say `text`; failures are the implementation's to log
    async fn speak(&mut self, text: &str);
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Loading memory and checking the backend
    Startup,
    /// Waiting for the user
    Listening,
    /// Resolving an utterance
    Resolving,
    /// Speaking a reply
    Speaking,
    /// Persisting memory on the way out
    ShuttingDown,
    /// Finished
    Shutdown,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The user said goodbye
    Farewell,
    /// The shutdown signal fired
    Interrupted,
    /// The capture source closed
    InputClosed,
}

/// Session tunables
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Assistant name used in the greeting
    pub name: String,
    /// How long to wait for speech to start
    pub listen_timeout: Duration,
    /// Longest utterance accepted
    pub phrase_limit: Duration,
    /// Save memory between turns this often
    pub autosave_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "Helper".to_string(),
            listen_timeout: Duration::from_secs(3),
            phrase_limit: Duration::from_secs(5),
            autosave_interval: None,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            name: config.name.clone(),
            listen_timeout: config.voice.listen_timeout(),
            phrase_limit: config.voice.phrase_limit(),
            autosave_interval: config.autosave_secs.map(Duration::from_secs),
        }
    }
}

/// One interactive session
pub struct Session<C, P, G> {
    config: SessionConfig,
    capture: C,
    playback: P,
    generator: G,
    store: MemoryStore,
    memory: MemorySnapshot,
    cache: ResponseCache,
    state: SessionState,
    last_save: Instant,
}

impl<C: Capture, P: Playback, G: Generator> Session<C, P, G> {
    /// Assemble a session; memory is loaded when it runs
    pub fn new(
        config: SessionConfig,
        capture: C,
        playback: P,
        generator: G,
        store: MemoryStore,
        cache: ResponseCache,
    ) -> Self {
        Self {
            config,
            capture,
            playback,
            generator,
            store,
            memory: MemorySnapshot::default(),
            cache,
            state: SessionState::Startup,
            last_save: Instant::now(),
        }
    }

    /// Run until farewell, interruption or closed input
    ///
    /// Memory is saved once on every exit path, including startup failure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BackendUnavailable`] if the generation backend
    /// fails its startup check
    pub async fn run<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<ShutdownReason> {
        let mut shutdown = std::pin::pin!(shutdown);
        let result = self.drive(shutdown.as_mut()).await;

        self.state = SessionState::ShuttingDown;
        match &result {
            Ok(reason) => tracing::info!(?reason, "session ending"),
            Err(e) => tracing::error!(error = %e, "session failed"),
        }
        self.store.save(&self.memory);
        self.state = SessionState::Shutdown;

        result
    }

    async fn drive<F: Future<Output = ()>>(
        &mut self,
        mut shutdown: Pin<&mut F>,
    ) -> Result<ShutdownReason> {
        self.state = SessionState::Startup;
        self.memory = self.store.load();
        self.last_save = Instant::now();

        tokio::select! {
            biased;
            () = &mut shutdown => return Ok(ShutdownReason::Interrupted),
            ready = self.generator.prepare() => ready?,
        }

        let greeting = format!(
            "Hello! I'm {}, your voice assistant. How can I help you today?",
            self.config.name
        );
        if self.speak(&greeting, &mut shutdown).await {
            return Ok(ShutdownReason::Interrupted);
        }

        loop {
            self.state = SessionState::Listening;
            let heard = tokio::select! {
                biased;
                () = &mut shutdown => return Ok(ShutdownReason::Interrupted),
                heard = self
                    .capture
                    .capture_utterance(self.config.listen_timeout, self.config.phrase_limit) => heard,
            };

            let raw = match heard {
                Heard::Utterance(text) => text,
                Heard::Closed => return Ok(ShutdownReason::InputClosed),
                other => {
                    tracing::debug!(heard = ?other, "no utterance");
                    if self.speak(reprompt(&other), &mut shutdown).await {
                        return Ok(ShutdownReason::Interrupted);
                    }
                    continue;
                }
            };

            let utterance = Utterance::new(&raw);
            if utterance.is_empty() {
                if self.speak(REPROMPT_UNCLEAR, &mut shutdown).await {
                    return Ok(ShutdownReason::Interrupted);
                }
                continue;
            }

            tracing::info!(text = %raw.trim(), "heard");
            self.memory.record_conversation(raw.trim());

            self.state = SessionState::Resolving;
            let outcome = tokio::select! {
                biased;
                () = &mut shutdown => return Ok(ShutdownReason::Interrupted),
                outcome = resolve(&utterance, &mut self.memory, &mut self.cache, &self.generator) => outcome,
            };

            if self.speak(&outcome.response_text, &mut shutdown).await {
                return Ok(ShutdownReason::Interrupted);
            }

            if outcome.should_terminate_session {
                return Ok(ShutdownReason::Farewell);
            }

            self.autosave();
        }
    }

    /// Speak unless interrupted; returns true if the shutdown fired
    async fn speak<F: Future<Output = ()>>(
        &mut self,
        text: &str,
        shutdown: &mut Pin<&mut F>,
    ) -> bool {
        self.state = SessionState::Speaking;

        tokio::select! {
            biased;
            () = shutdown.as_mut() => true,
            () = self.playback.speak(text) => false,
        }
    }

    fn autosave(&mut self) {
        let Some(interval) = self.config.autosave_interval else {
            return;
        };

        if self.last_save.elapsed() >= interval {
            tracing::debug!("periodic memory save");
            self.store.save(&self.memory);
            self.last_save = Instant::now();
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Memory as of the last completed step
    #[must_use]
    pub const fn memory(&self) -> &MemorySnapshot {
        &self.memory
    }

    /// The response cache
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The capture collaborator
    #[must_use]
    pub const fn capture(&self) -> &C {
        &self.capture
    }

    /// The playback collaborator
    #[must_use]
    pub const fn playback(&self) -> &P {
        &self.playback
    }

    /// The generator
    #[must_use]
    pub const fn generator(&self) -> &G {
        &self.generator
    }
}

fn reprompt(heard: &Heard) -> &'static str {
    match heard {
        Heard::Timeout => REPROMPT_TIMEOUT,
        Heard::ServiceUnavailable => REPROMPT_SERVICE,
        Heard::Unclear | Heard::Utterance(_) | Heard::Closed => REPROMPT_UNCLEAR,
    }
}
