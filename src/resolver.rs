//! Command resolution
//!
//! Decides the reply to one utterance. Rules are tried in a fixed order and
//! the first match wins:
//!
//! 1. quick rules (time, date, greeting, farewell)
//! 2. memory rules (recall, clear, remember)
//! 3. generation through the response cache

use chrono::{Local, NaiveDateTime};

use crate::cache::ResponseCache;
use crate::generation::{Generated, Generator, build_prompt, finish_sentence};
use crate::memory::MemorySnapshot;

/// How many remembered tasks a recall reads back
pub const RECALL_LIMIT: usize = 3;

const GREETING: &str = "Hi! How can I help?";
const FAREWELL: &str = "Goodbye! Have a great day!";
const NOTED: &str = "I'll make a note of that.";
const NOTHING_TO_NOTE: &str = "What would you like me to remember?";
const RECALL_HEADER: &str = "Here's what I remember:";
const NOTHING_REMEMBERED: &str = "I don't have any tasks stored in memory yet.";
const MEMORY_CLEARED: &str = "Memory cleared.";

const REMEMBER_TRIGGER: &str = "remember";
const RECALL_PHRASES: [&str; 2] = ["what did i tell you", "what do you remember"];
const CLEAR_PHRASE: &str = "clear memory";

/// One recognized user turn, lower-cased and trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    /// Normalize recognized text
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Normalized text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether nothing is left after normalizing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reply to one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    /// Text to speak
    pub response_text: String,
    /// Whether the session should end after speaking
    pub should_terminate_session: bool,
}

impl ResolutionOutcome {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            response_text: text.into(),
            should_terminate_session: false,
        }
    }

    fn farewell() -> Self {
        Self {
            response_text: FAREWELL.to_string(),
            should_terminate_session: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum QuickRule {
    Time,
    Date,
    Greeting,
    Farewell,
}

/// Keyword table, checked in order
const QUICK_RULES: [(&str, QuickRule); 7] = [
    ("time", QuickRule::Time),
    ("date", QuickRule::Date),
    ("hello", QuickRule::Greeting),
    ("good morning", QuickRule::Greeting),
    ("good evening", QuickRule::Greeting),
    ("bye", QuickRule::Farewell),
    ("goodbye", QuickRule::Farewell),
];

/// Resolve one utterance
///
/// Mutates `memory` for memory rules and `cache` on a successful
/// generation. Never fails: a backend failure is spoken as an apology and
/// left out of the cache.
pub async fn resolve<G: Generator + ?Sized>(
    utterance: &Utterance,
    memory: &mut MemorySnapshot,
    cache: &mut ResponseCache,
    generator: &G,
) -> ResolutionOutcome {
    let text = utterance.as_str();

    if let Some(outcome) = quick_reply(text, Local::now().naive_local()) {
        tracing::debug!(utterance = text, "quick rule matched");
        return outcome;
    }

    if let Some(outcome) = memory_reply(text, memory) {
        tracing::debug!(utterance = text, "memory rule matched");
        return outcome;
    }

    generate_reply(text, cache, generator).await
}

fn quick_reply(text: &str, now: NaiveDateTime) -> Option<ResolutionOutcome> {
    let (_, rule) = QUICK_RULES.iter().find(|(key, _)| text.contains(key))?;

    Some(match rule {
        QuickRule::Time => ResolutionOutcome::reply(format!("It's {}", now.format("%I:%M %p"))),
        QuickRule::Date => {
            ResolutionOutcome::reply(format!("Today is {}", now.format("%B %d, %Y")))
        }
        QuickRule::Greeting => ResolutionOutcome::reply(GREETING),
        QuickRule::Farewell => ResolutionOutcome::farewell(),
    })
}

fn memory_reply(text: &str, memory: &mut MemorySnapshot) -> Option<ResolutionOutcome> {
    // Recall goes first: "what do you remember" also contains the trigger
    if RECALL_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return Some(ResolutionOutcome::reply(recall(memory)));
    }

    if text.contains(CLEAR_PHRASE) {
        memory.clear();
        tracing::info!("memory cleared");
        return Some(ResolutionOutcome::reply(MEMORY_CLEARED));
    }

    if text.contains(REMEMBER_TRIGGER) {
        let task = text.replace(REMEMBER_TRIGGER, "");
        let task = task.trim();
        if task.is_empty() {
            return Some(ResolutionOutcome::reply(NOTHING_TO_NOTE));
        }

        tracing::info!(task, "task remembered");
        memory.remember_task(task);
        return Some(ResolutionOutcome::reply(NOTED));
    }

    None
}

fn recall(memory: &MemorySnapshot) -> String {
    let tasks = memory.recent_tasks(RECALL_LIMIT);
    if tasks.is_empty() {
        return NOTHING_REMEMBERED.to_string();
    }

    let mut reply = RECALL_HEADER.to_string();
    for task in tasks {
        reply.push_str("\n- ");
        reply.push_str(task);
    }
    reply
}

async fn generate_reply<G: Generator + ?Sized>(
    text: &str,
    cache: &mut ResponseCache,
    generator: &G,
) -> ResolutionOutcome {
    let prompt = build_prompt(text);

    let reply = match cache.get(&prompt).map(str::to_owned) {
        Some(cached) => {
            tracing::debug!(prompt = %prompt, "response cache hit");
            cached
        }
        None => match generator.generate(&prompt).await {
            Generated::Fresh(fresh) => {
                cache.put(prompt, fresh.clone());
                fresh
            }
            Generated::Fallback(apology) => apology.to_string(),
        },
    };

    ResolutionOutcome::reply(finish_sentence(&reply))
}
