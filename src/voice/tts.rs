//! Text-to-speech (TTS) processing

use crate::{Error, Result};

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    voice: String,
    speed: f64,
}

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f64,
    response_format: &'a str,
}

impl TextToSpeech {
    /// Create a TTS client for an OpenAI-compatible `/audio/speech` API
    ///
    /// # Errors
    ///
    /// Returns error if the hosted endpoint is used without a key
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        voice: String,
        speed: f64,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let api_key = api_key.filter(|k| !k.is_empty());

        if api_key.is_none() && base_url.contains("api.openai.com") {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            voice,
            speed: speed.clamp(0.25, 4.0),
        })
    }

    /// Synthesize text to MP3 audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let mut builder = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
