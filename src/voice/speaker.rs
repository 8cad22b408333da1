//! Speaker-backed playback collaborator

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;

use super::{AudioPlayback, TextToSpeech};
use crate::session::Playback;

/// Occasional conversational filler in front of a reply
#[derive(Debug, Clone)]
pub struct Fillers {
    words: Vec<String>,
    probability: f64,
}

impl Fillers {
    /// Prefix one of `words` with the given probability
    ///
    /// The probability is clamped to `0.0..=1.0`; a non-finite value disables fillers.
    #[must_use]
    pub fn new(words: Vec<String>, probability: f64) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self { words, probability }
    }

    /// Never add a filler
    #[must_use]
    pub const fn none() -> Self {
        Self {
            words: Vec::new(),
            probability: 0.0,
        }
    }

    /// Maybe prefix `text` with a filler
    pub fn decorate<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        if !rng.gen_bool(self.probability) {
            return text.to_string();
        }

        self.words
            .choose(rng)
            .map_or_else(|| text.to_string(), |filler| format!("{filler}, {text}"))
    }
}

/// Prints and speaks replies through TTS and the default output device
///
/// Without TTS or an output device it degrades to printing only.
pub struct SpeakerPlayback {
    name: String,
    fillers: Fillers,
    tts: Option<TextToSpeech>,
    playback: Option<AudioPlayback>,
}

impl SpeakerPlayback {
    /// Create a playback collaborator
    #[must_use]
    pub const fn new(
        name: String,
        fillers: Fillers,
        tts: Option<TextToSpeech>,
        playback: Option<AudioPlayback>,
    ) -> Self {
        Self {
            name,
            fillers,
            tts,
            playback,
        }
    }
}

#[async_trait(?Send)]
impl Playback for SpeakerPlayback {
    async fn speak(&mut self, text: &str) {
        let text = self.fillers.decorate(text, &mut rand::thread_rng());
        println!("{}: {text}", self.name);

        let (Some(tts), Some(playback)) = (&self.tts, &mut self.playback) else {
            return;
        };

        let audio = match tts.synthesize(&text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "TTS failed");
                return;
            }
        };

        if let Err(e) = playback.play_mp3(&audio).await {
            tracing::warn!(error = %e, "playback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn words() -> Vec<String> {
        ["ok", "hmm", "ah"].map(String::from).to_vec()
    }

    #[test]
    fn test_never_decorates_at_zero() {
        let fillers = Fillers::new(words(), 0.0);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            assert_eq!(fillers.decorate("Hello", &mut rng), "Hello");
        }
    }

    #[test]
    fn test_always_decorates_at_one() {
        let fillers = Fillers::new(words(), 1.0);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let text = fillers.decorate("Hello", &mut rng);
            let (filler, rest) = text.split_once(", ").unwrap();
            assert!(words().iter().any(|w| w == filler));
            assert_eq!(rest, "Hello");
        }
    }

    #[test]
    fn test_empty_word_list_is_noop() {
        let fillers = Fillers::new(Vec::new(), 1.0);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(fillers.decorate("Hello", &mut rng), "Hello");
        assert_eq!(Fillers::none().decorate("Hi", &mut rng), "Hi");
    }

    #[test]
    fn test_probability_is_clamped() {
        let fillers = Fillers::new(words(), 3.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(fillers.decorate("Hello", &mut rng).ends_with(", Hello"));
    }

    #[test]
    fn test_non_finite_probability_never_decorates() {
        let mut rng = StdRng::seed_from_u64(3);

        for probability in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let fillers = Fillers::new(words(), probability);
            for _ in 0..20 {
                assert_eq!(fillers.decorate("Hello", &mut rng), "Hello");
            }
        }
    }
}
