//! Microphone-backed capture collaborator

use std::time::Duration;

use async_trait::async_trait;

use super::{AudioCapture, SAMPLE_RATE, Segment, SpeechToText, UtteranceSegmenter, samples_to_wav};
use crate::Result;
use crate::session::{Capture, Heard};

/// Slack on top of timeout + phrase limit before giving up on a silent device
const DEVICE_GRACE: Duration = Duration::from_secs(2);

/// Listens on the default microphone and transcribes one phrase per turn
pub struct MicrophoneCapture {
    capture: AudioCapture,
    stt: SpeechToText,
    energy_threshold: f32,
}

impl MicrophoneCapture {
    /// Open the microphone
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub fn new(stt: SpeechToText, energy_threshold: f32) -> Result<Self> {
        Ok(Self {
            capture: AudioCapture::open()?,
            stt,
            energy_threshold,
        })
    }
}

#[async_trait(?Send)]
impl Capture for MicrophoneCapture {
    async fn capture_utterance(&mut self, timeout: Duration, phrase_limit: Duration) -> Heard {
        tracing::info!("listening");

        let mut segmenter = UtteranceSegmenter::new(self.energy_threshold, timeout, phrase_limit);
        let max_wait = timeout + phrase_limit + DEVICE_GRACE;

        let speech = match self.capture.record_phrase(&mut segmenter, max_wait).await {
            Segment::Complete(speech) => speech,
            Segment::TimedOut | Segment::Pending => return Heard::Timeout,
        };

        let wav = match samples_to_wav(&speech, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode speech");
                return Heard::Unclear;
            }
        };

        match self.stt.transcribe(&wav).await {
            Ok(text) if text.trim().is_empty() => Heard::Unclear,
            Ok(text) => Heard::Utterance(text),
            Err(e) => {
                tracing::warn!(error = %e, "STT failed");
                Heard::ServiceUnavailable
            }
        }
    }
}
