//! Bounded response cache for generated replies
//!
//! Maps a generation prompt to the text the backend produced for it. Reads
//! never refresh an entry, so the oldest inserted prompt is always the next
//! one evicted.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Default number of cached responses
pub const DEFAULT_CAPACITY: usize = 100;

/// Prompt-to-response store with insertion-order eviction
pub struct ResponseCache {
    entries: LruCache<String, String>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` responses
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up the cached response for an exact prompt
    #[must_use]
    pub fn get(&self, prompt: &str) -> Option<&str> {
        // `peek` keeps recency untouched
        self.entries.peek(prompt).map(String::as_str)
    }

    /// Store a response, evicting the oldest entry when full
    ///
    /// Empty responses are never cached.
    pub fn put(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        let response = response.into();
        if response.trim().is_empty() {
            return;
        }

        if let Some((evicted, _)) = self.entries.push(prompt.into(), response) {
            tracing::trace!(prompt = %evicted, "response cache entry evicted");
        }
    }

    /// Whether a prompt has a cached response
    #[must_use]
    pub fn contains(&self, prompt: &str) -> bool {
        self.entries.contains(prompt)
    }

    /// Number of cached responses
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached responses
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}
