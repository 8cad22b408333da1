use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_helper::generation::ollama::OllamaBackend;
use voice_helper::session::{Capture, Playback};
use voice_helper::voice::{
    AudioCapture, AudioPlayback, ConsoleCapture, ConsolePlayback, Fillers, MicrophoneCapture,
    PLAYBACK_SAMPLE_RATE, SAMPLE_RATE, SpeakerPlayback, SpeechToText, TextToSpeech,
    calculate_energy,
};
use voice_helper::{
    Config, Error, GenerationClient, MemorySnapshot, MemoryStore, ResponseCache, Session,
    SessionConfig,
};

/// Helper - a local voice assistant backed by Ollama
#[derive(Parser)]
#[command(name = "helper", version, about)]
struct Cli {
    /// Assistant name used in the greeting
    #[arg(short, long, env = "HELPER_NAME")]
    name: Option<String>,

    /// Ollama model to use
    #[arg(short, long, env = "HELPER_MODEL")]
    model: Option<String>,

    /// Memory file location
    #[arg(long, env = "HELPER_MEMORY_PATH")]
    memory_path: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Type instead of talking (for machines without audio hardware)
    #[arg(long, env = "HELPER_TEXT_MODE")]
    text: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Inspect or reset the assistant's memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print the stored memory as JSON
    Show,
    /// Forget all conversations, tasks and preferences
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voice_helper=info",
        1 => "info,voice_helper=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(Error::BackendUnavailable(_)) = e.downcast_ref::<Error>() {
                eprintln!(
                    "Could not connect to Ollama. Please make sure Ollama is running and try again."
                );
            }
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.text)?;
    if let Some(name) = cli.name {
        config.name = name;
    }
    if let Some(model) = cli.model {
        config.generation.model = model;
    }
    if let Some(path) = cli.memory_path {
        config.memory_path = path;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Memory { action } => memory_command(&config, &action),
        };
    }

    tracing::info!(
        name = %config.name,
        model = %config.generation.model,
        voice = config.voice.enabled,
        "starting voice helper"
    );
    tracing::debug!(?config, "loaded configuration");

    let backend = OllamaBackend::new(
        config.generation.url.clone(),
        Duration::from_secs(config.generation.timeout_secs),
    );
    let generator = GenerationClient::spawn(
        backend,
        config.generation.model.clone(),
        config.generation.pull_on_startup,
    )?;

    // cpal streams aren't Send, so the session stays on this task
    if config.voice.enabled {
        let stt = SpeechToText::new(
            &config.voice.stt_url,
            config.api_keys.openai.clone(),
            config.voice.stt_model.clone(),
        )?;
        let capture = MicrophoneCapture::new(stt, config.voice.energy_threshold)?;
        let playback = speaker_playback(&config);
        run_session(&config, capture, playback, generator).await
    } else {
        let capture = ConsoleCapture::stdin()?;
        let playback = ConsolePlayback::new(config.name.clone());
        println!("Type to talk to {}. Say \"bye\" to quit.", config.name);
        run_session(&config, capture, playback, generator).await
    }
}

/// Speaker collaborator; degrades to printing when TTS or the output device is missing
fn speaker_playback(config: &Config) -> SpeakerPlayback {
    let voice = &config.voice;

    let tts = match TextToSpeech::new(
        &voice.tts_url,
        config.api_keys.openai.clone(),
        voice.tts_model.clone(),
        voice.tts_voice.clone(),
        voice.tts_speed,
    ) {
        Ok(tts) => Some(tts),
        Err(e) => {
            tracing::warn!(error = %e, "TTS unavailable, replies will only be printed");
            None
        }
    };

    let playback = match AudioPlayback::new() {
        Ok(playback) => Some(playback),
        Err(e) => {
            tracing::warn!(error = %e, "no output device, replies will only be printed");
            None
        }
    };

    let fillers = Fillers::new(voice.fillers.clone(), voice.filler_probability);
    SpeakerPlayback::new(config.name.clone(), fillers, tts, playback)
}

#[allow(clippy::future_not_send)]
async fn run_session<C: Capture, P: Playback>(
    config: &Config,
    capture: C,
    playback: P,
    generator: GenerationClient,
) -> anyhow::Result<()> {
    let store = MemoryStore::new(config.memory_path.clone());
    let cache = ResponseCache::new(config.cache_capacity);
    let mut session = Session::new(
        SessionConfig::from(config),
        capture,
        playback,
        generator,
        store,
        cache,
    );

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    let reason = session.run(shutdown).await?;
    tracing::info!(?reason, "voice helper stopped");

    Ok(())
}

/// Show or clear the persisted memory
fn memory_command(config: &Config, action: &MemoryAction) -> anyhow::Result<()> {
    let store = MemoryStore::new(config.memory_path.clone());

    match action {
        MemoryAction::Show => {
            let snapshot = store.load();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        MemoryAction::Clear => {
            store.try_save(&MemorySnapshot::default())?;
            println!("Memory cleared: {}", store.path().display());
        }
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::open()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(capture);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("Speech is detected above an RMS of 0.01 by default.");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let sample_rate = PLAYBACK_SAMPLE_RATE as f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    playback.play(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let voice = &config.voice;
    let tts = TextToSpeech::new(
        &voice.tts_url,
        config.api_keys.openai.clone(),
        voice.tts_model.clone(),
        voice.tts_voice.clone(),
        voice.tts_speed,
    )?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
