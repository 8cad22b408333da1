//! Text generation through an external model backend
//!
//! Backend calls are blocking, so they run on one dedicated worker thread.
//! The async side sends a job and awaits the reply; jobs are handled one at a
//! time, which keeps at most a single backend call in flight.

pub mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

/// Spoken when the backend fails or returns nothing
pub const APOLOGY: &str = "I'm having trouble processing that right now.";

/// Instruction wrapped around every utterance sent for generation
const PROMPT_PREFIX: &str = "Respond concisely to: ";

/// Build the generation prompt for an utterance
///
/// The result doubles as the response cache key.
#[must_use]
pub fn build_prompt(utterance: &str) -> String {
    format!("{PROMPT_PREFIX}{utterance}")
}

/// Trim a reply and make sure it ends like a sentence
#[must_use]
pub fn finish_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}

/// Outcome of a generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// Text produced by the backend
    Fresh(String),
    /// Backend failed; carries the apology to speak instead
    Fallback(&'static str),
}

impl Generated {
    /// Text to speak
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Fresh(text) => text.as_str(),
            Self::Fallback(text) => *text,
        }
    }

    /// Whether this is a substituted apology
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Blocking model backend
pub trait ChatBackend: Send + 'static {
    /// Send a single user prompt and return the reply text
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached or rejects the request
    fn chat(&self, model: &str, prompt: &str) -> Result<String>;

    /// Make sure `model` is available locally
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be fetched
    fn pull_model(&self, model: &str) -> Result<()>;

    /// List installed models; doubles as a reachability check
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached
    fn list_models(&self) -> Result<Vec<String>>;
}

/// Async generation used by the command resolver
#[async_trait]
pub trait Generator: Send + Sync {
    /// Verify the backend before the session starts listening
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if the backend cannot serve requests
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Generate a reply for `prompt`; failures become [`Generated::Fallback`]
    async fn generate(&self, prompt: &str) -> Generated;
}

enum Job {
    Chat {
        model: String,
        prompt: String,
        reply: oneshot::Sender<Result<String>>,
    },
    Pull {
        model: String,
        reply: oneshot::Sender<Result<()>>,
    },
    List {
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
}

/// [`Generator`] backed by a [`ChatBackend`] on a worker thread
pub struct GenerationClient {
    model: String,
    pull_on_startup: bool,
    jobs: mpsc::UnboundedSender<Job>,
}

impl GenerationClient {
    /// Move `backend` onto a new worker thread
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn<B: ChatBackend>(
        backend: B,
        model: impl Into<String>,
        pull_on_startup: bool,
    ) -> Result<Self> {
        let (jobs, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("generation".to_string())
            .spawn(move || run_worker(&backend, rx))?;

        let model = model.into();
        tracing::debug!(model = %model, "generation worker started");

        Ok(Self {
            model,
            pull_on_startup,
            jobs,
        })
    }

    /// Model used for chat requests
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call<T>(&self, job: Job, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.jobs
            .send(job)
            .map_err(|_| Error::Generation("generation worker stopped".to_string()))?;

        rx.await
            .map_err(|_| Error::Generation("generation worker dropped the request".to_string()))?
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn prepare(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        let models = self
            .call(Job::List { reply }, rx)
            .await
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;

        tracing::info!(installed = models.len(), "generation backend reachable");

        if self.pull_on_startup {
            let (reply, rx) = oneshot::channel();
            let job = Job::Pull {
                model: self.model.clone(),
                reply,
            };
            self.call(job, rx)
                .await
                .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
            tracing::info!(model = %self.model, "model ready");
        } else if !models.iter().any(|m| model_matches(m, &self.model)) {
            tracing::warn!(model = %self.model, "model not installed and pull disabled");
        }

        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Generated {
        let (reply, rx) = oneshot::channel();
        let job = Job::Chat {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            reply,
        };

        match self.call(job, rx).await {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!(chars = text.len(), "generation complete");
                Generated::Fresh(text)
            }
            Ok(_) => {
                tracing::warn!("generation returned empty text");
                Generated::Fallback(APOLOGY)
            }
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                Generated::Fallback(APOLOGY)
            }
        }
    }
}

fn run_worker<B: ChatBackend>(backend: &B, mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.blocking_recv() {
        // A closed reply channel means the caller gave up; nothing to do
        match job {
            Job::Chat {
                model,
                prompt,
                reply,
            } => {
                let _ = reply.send(backend.chat(&model, &prompt));
            }
            Job::Pull { model, reply } => {
                let _ = reply.send(backend.pull_model(&model));
            }
            Job::List { reply } => {
                let _ = reply.send(backend.list_models());
            }
        }
    }

    tracing::debug!("generation worker stopped");
}

/// `tinyllama` matches an installed `tinyllama:latest`
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.split(':').next() == Some(wanted))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Default)]
    struct FakeBackend {
        reply: Option<String>,
        reachable: bool,
        calls: Arc<AtomicUsize>,
        pulls: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ChatBackend for FakeBackend {
        fn chat(&self, _model: &str, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);

            self.reply
                .as_ref()
                .map(|r| format!("{r} ({prompt})"))
                .ok_or_else(|| Error::Generation("connection refused".to_string()))
        }

        fn pull_model(&self, _model: &str) -> Result<()> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn list_models(&self) -> Result<Vec<String>> {
            if self.reachable {
                Ok(vec!["tinyllama:latest".to_string()])
            } else {
                Err(Error::Generation("connection refused".to_string()))
            }
        }
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt("tell me a joke"), "Respond concisely to: tell me a joke");
    }

    #[test]
    fn test_finish_sentence() {
        assert_eq!(finish_sentence("Sure"), "Sure.");
        assert_eq!(finish_sentence("  Really?  "), "Really?");
        assert_eq!(finish_sentence("Great!"), "Great!");
        assert_eq!(finish_sentence("Done."), "Done.");
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("tinyllama:latest", "tinyllama"));
        assert!(model_matches("llama3:8b", "llama3:8b"));
        assert!(!model_matches("llama3:8b", "llama3:70b"));
        assert!(!model_matches("tinyllama2:latest", "tinyllama"));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let backend = FakeBackend {
            reply: Some("Paris".to_string()),
            ..FakeBackend::default()
        };
        let client = GenerationClient::spawn(backend, "tinyllama", false).unwrap();

        let result = client.generate("capital of france").await;
        assert_eq!(result, Generated::Fresh("Paris (capital of france)".to_string()));
        assert!(!result.is_fallback());
    }

    #[tokio::test]
    async fn test_generate_failure_returns_apology() {
        let client = GenerationClient::spawn(FakeBackend::default(), "tinyllama", false).unwrap();

        let result = client.generate("anything").await;
        assert_eq!(result, Generated::Fallback(APOLOGY));
        assert_eq!(result.text(), APOLOGY);
    }

    #[tokio::test]
    async fn test_empty_reply_returns_apology() {
        struct Silent;
        impl ChatBackend for Silent {
            fn chat(&self, _: &str, _: &str) -> Result<String> {
                Ok("  \n".to_string())
            }
            fn pull_model(&self, _: &str) -> Result<()> {
                Ok(())
            }
            fn list_models(&self) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
        }

        let client = GenerationClient::spawn(Silent, "tinyllama", false).unwrap();
        assert!(client.generate("hi").await.is_fallback());
    }

    #[tokio::test]
    async fn test_calls_never_overlap() {
        let backend = FakeBackend {
            reply: Some("ok".to_string()),
            ..FakeBackend::default()
        };
        let peak = Arc::clone(&backend.peak);
        let calls = Arc::clone(&backend.calls);
        let client = GenerationClient::spawn(backend, "tinyllama", false).unwrap();

        let (a, b, c) = tokio::join!(
            client.generate("one"),
            client.generate("two"),
            client.generate("three"),
        );

        assert!(!a.is_fallback() && !b.is_fallback() && !c.is_fallback());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prepare_unreachable_backend() {
        let client = GenerationClient::spawn(FakeBackend::default(), "tinyllama", true).unwrap();

        let err = client.prepare().await.unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_prepare_pulls_when_enabled() {
        let backend = FakeBackend {
            reachable: true,
            ..FakeBackend::default()
        };
        let pulls = Arc::clone(&backend.pulls);

        let client = GenerationClient::spawn(backend.clone(), "tinyllama", true).unwrap();
        client.prepare().await.unwrap();
        assert_eq!(pulls.load(Ordering::SeqCst), 1);

        let client = GenerationClient::spawn(backend, "tinyllama", false).unwrap();
        client.prepare().await.unwrap();
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
    }
}
