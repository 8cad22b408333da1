//! Voice processing module
//!
//! Audio capture, end-pointing, STT, TTS and playback, plus the capture and
//! playback collaborators the session loop talks to.

mod capture;
mod console;
mod microphone;
mod playback;
mod segmenter;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use console::{ConsoleCapture, ConsolePlayback};
pub use microphone::MicrophoneCapture;
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE};
pub use segmenter::{Segment, SegmenterState, UtteranceSegmenter, calculate_energy};
pub use speaker::{Fillers, SpeakerPlayback};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
