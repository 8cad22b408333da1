//! Microphone input and phrase recording

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};

use super::{Segment, UtteranceSegmenter};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often recorded audio is handed to the segmenter
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Pending = Arc<Mutex<Vec<f32>>>;

/// Live mono 16kHz input stream from the default microphone
///
/// Samples accumulate until drained. Dropping the capture closes the stream.
pub struct AudioCapture {
    pending: Pending,
    _stream: Stream,
}

impl AudioCapture {
    /// Open the default input device and start recording
    ///
    /// # Errors
    ///
    /// Returns error if no mono 16kHz input is available or the stream fails to start
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let rate = SampleRate(SAMPLE_RATE);
        let config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| c.channels() == 1 && (c.min_sample_rate()..=c.max_sample_rate()).contains(&rate))
            .ok_or_else(|| Error::Audio("microphone has no mono 16kHz mode".to_string()))?
            .with_sample_rate(rate)
            .config();

        let pending = Pending::default();
        let sink = Arc::clone(&pending);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(data);
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "microphone recording"
        );

        Ok(Self {
            pending,
            _stream: stream,
        })
    }

    /// Take everything recorded since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Feed recorded audio to `segmenter` until it decides
    ///
    /// Audio recorded before the call is discarded. Gives up with
    /// [`Segment::TimedOut`] after `max_wait` even if the device stays silent
    /// or delivers nothing.
    pub async fn record_phrase(
        &self,
        segmenter: &mut UtteranceSegmenter,
        max_wait: Duration,
    ) -> Segment {
        drop(self.drain());

        let mut ticks = tokio::time::interval(POLL_INTERVAL);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let deadline = tokio::time::Instant::now() + max_wait;

        loop {
            let now = ticks.tick().await;
            if now >= deadline {
                tracing::warn!("microphone delivered no usable audio");
                return Segment::TimedOut;
            }

            let chunk = self.drain();
            if chunk.is_empty() {
                continue;
            }

            match segmenter.push(&chunk) {
                Segment::Pending => {}
                decided => return decided,
            }
        }
    }
}

/// Encode f32 samples as 16-bit mono WAV for STT upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_err = |e: hound::Error| Error::Audio(format!("WAV encoding failed: {e}"));
    let mut out = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut out, spec).map_err(wav_err)?;

    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(pcm).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(out.into_inner())
}
