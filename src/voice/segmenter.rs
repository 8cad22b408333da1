//! Energy-based utterance end-pointing
//!
//! Splits the microphone stream into one spoken phrase: wait for speech to
//! start, collect it, and stop on trailing silence or the phrase limit.

use std::time::Duration;

use super::SAMPLE_RATE;

/// Minimum duration of speech for a phrase (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration that ends a phrase (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No speech yet
    Waiting,
    /// Speech started, accumulating
    Speaking,
}

/// Result of feeding a chunk of audio
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Need more audio
    Pending,
    /// A full phrase was captured
    Complete(Vec<f32>),
    /// No speech started within the listen timeout
    TimedOut,
}

/// Cuts one phrase out of a sample stream
pub struct UtteranceSegmenter {
    energy_threshold: f32,
    timeout_samples: usize,
    phrase_limit_samples: usize,
    state: SegmenterState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    waited: usize,
}

impl UtteranceSegmenter {
    /// Create a segmenter
    ///
    /// `timeout` bounds the wait for speech to begin, `phrase_limit` bounds
    /// the phrase itself.
    #[must_use]
    pub fn new(energy_threshold: f32, timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            energy_threshold,
            timeout_samples: duration_to_samples(timeout),
            phrase_limit_samples: duration_to_samples(phrase_limit).max(MIN_SPEECH_SAMPLES),
            state: SegmenterState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Feed audio samples
    pub fn push(&mut self, samples: &[f32]) -> Segment {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            SegmenterState::Waiting => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                    return self.check_phrase_limit();
                }

                self.waited += samples.len();
                if self.waited >= self.timeout_samples {
                    tracing::debug!(waited = self.waited, "no speech before timeout");
                    self.reset();
                    return Segment::TimedOut;
                }
            }
            SegmenterState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter
                {
                    tracing::debug!(samples = self.speech_buffer.len(), "phrase complete");
                    return self.finish();
                }

                // A short blip followed by silence was not speech
                if self.silence_counter > SILENCE_SAMPLES {
                    tracing::trace!("false start, waiting again");
                    self.waited += self.speech_buffer.len();
                    self.speech_buffer.clear();
                    self.silence_counter = 0;
                    self.state = SegmenterState::Waiting;
                    if self.waited >= self.timeout_samples {
                        self.reset();
                        return Segment::TimedOut;
                    }
                    return Segment::Pending;
                }

                return self.check_phrase_limit();
            }
        }

        Segment::Pending
    }

    fn check_phrase_limit(&mut self) -> Segment {
        if self.speech_buffer.len() >= self.phrase_limit_samples {
            tracing::debug!(samples = self.speech_buffer.len(), "phrase limit reached");
            return self.finish();
        }
        Segment::Pending
    }

    fn finish(&mut self) -> Segment {
        let speech = std::mem::take(&mut self.speech_buffer);
        self.reset();
        Segment::Complete(speech)
    }

    /// Reset to waiting with nothing buffered
    pub fn reset(&mut self) {
        self.state = SegmenterState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
        self.waited = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Audio collected for the current phrase
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn duration_to_samples(duration: Duration) -> usize {
    (duration.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
