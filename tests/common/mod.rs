//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use voice_helper::generation::{APOLOGY, Generated, Generator};
use voice_helper::session::{Capture, Heard, Playback, SessionConfig};
use voice_helper::{Error, MemorySnapshot, MemoryStore, Result};

/// Capture that replays a fixed script, then reports closed input
pub struct ScriptedCapture {
    script: VecDeque<Heard>,
    pub calls: usize,
}

impl ScriptedCapture {
    pub fn new(script: impl IntoIterator<Item = Heard>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: 0,
        }
    }

    /// Script made of recognized utterances only
    pub fn saying(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| Heard::Utterance((*l).to_string())))
    }
}

#[async_trait(?Send)]
impl Capture for ScriptedCapture {
    async fn capture_utterance(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Heard {
        self.calls += 1;
        self.script.pop_front().unwrap_or(Heard::Closed)
    }
}

/// Capture that never hears anything
pub struct SilentCapture;

#[async_trait(?Send)]
impl Capture for SilentCapture {
    async fn capture_utterance(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Heard {
        std::future::pending().await
    }
}

/// Scripted capture that reads the memory file before every turn
pub struct DiskReadingCapture {
    inner: ScriptedCapture,
    store: MemoryStore,
    pub seen: Vec<MemorySnapshot>,
}

impl DiskReadingCapture {
    pub fn saying(path: impl Into<PathBuf>, lines: &[&str]) -> Self {
        Self {
            inner: ScriptedCapture::saying(lines),
            store: MemoryStore::new(path),
            seen: Vec::new(),
        }
    }
}

#[async_trait(?Send)]
impl Capture for DiskReadingCapture {
    async fn capture_utterance(&mut self, timeout: Duration, phrase_limit: Duration) -> Heard {
        self.seen.push(self.store.load());
        self.inner.capture_utterance(timeout, phrase_limit).await
    }
}

/// Playback that records everything it was asked to say
#[derive(Default)]
pub struct RecordingPlayback {
    pub spoken: Vec<String>,
}

#[async_trait(?Send)]
impl Playback for RecordingPlayback {
    async fn speak(&mut self, text: &str) {
        self.spoken.push(text.to_string());
    }
}

/// Generator that answers every prompt and counts the calls
#[derive(Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, prompt: &str) -> Generated {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        Generated::Fresh(format!("Answer number {n}"))
    }
}

/// Generator whose backend always fails
#[derive(Default)]
pub struct FailingGenerator {
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Generated {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Generated::Fallback(APOLOGY)
    }
}

/// Generator that never finishes a reply
#[derive(Default)]
pub struct PendingGenerator {
    calls: AtomicUsize,
}

impl PendingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for PendingGenerator {
    async fn generate(&self, _prompt: &str) -> Generated {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Generator whose backend cannot be reached at startup
pub struct UnreachableGenerator;

#[async_trait]
impl Generator for UnreachableGenerator {
    async fn prepare(&self) -> Result<()> {
        Err(Error::BackendUnavailable("connection refused".to_string()))
    }

    async fn generate(&self, _prompt: &str) -> Generated {
        Generated::Fallback(APOLOGY)
    }
}

/// Session settings used by the integration tests
pub fn session_config() -> SessionConfig {
    SessionConfig {
        name: "Testy".to_string(),
        ..SessionConfig::default()
    }
}

/// Greeting spoken by a session built with [`session_config`]
pub const GREETING: &str = "Hello! I'm Testy, your voice assistant. How can I help you today?";
