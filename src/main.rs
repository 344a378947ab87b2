use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hark::voice::{rms, AudioPlayback, AudioSource, MicCapture, Speaker, SpeechOutput};
use hark::{
    build_detector, Config, DetectorFactory, IntentClassifier, NullSpeech, OsCommands,
    SessionController, SessionParts, SessionSettings, SourceFactory, Transcriber, WhisperStt,
};

/// hark - always-on local voice command assistant
#[derive(Parser)]
#[command(name = "hark", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "HARK_CONFIG")]
    config: Option<PathBuf>,

    /// Suppress spoken responses (log them instead)
    #[arg(short, long)]
    quiet: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
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
    /// Classify a transcript without running a session
    Classify {
        /// Text to classify
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,hark=info",
        1 => "info,hark=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration),
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(config_path, &text),
            Command::Classify { text } => classify(config_path, &text),
        };
    }

    let config = Config::load(config_path)?;
    tracing::debug!(?config_path, "loaded configuration");

    let vocabulary = config.vocabulary()?;
    let classifier = IntentClassifier::new(vocabulary, config.intent.threshold, &config.wake.phrase);
    let router = hark::CommandRouter::new(Box::new(OsCommands::new()));

    let speech: Box<dyn SpeechOutput> = if cli.quiet || !config.tts.enabled {
        Box::new(NullSpeech)
    } else {
        match Speaker::new(&config.tts) {
            Ok(speaker) => Box::new(speaker),
            Err(e) => {
                tracing::warn!(error = %e, "TTS unavailable, responses will be logged only");
                Box::new(NullSpeech)
            }
        }
    };

    let transcriber: Box<dyn Transcriber> = Box::new(WhisperStt::new(&config.stt)?);

    let sample_rate = config.audio.sample_rate;
    let source: SourceFactory =
        Box::new(move || Ok(Box::new(MicCapture::new(sample_rate)) as Box<dyn AudioSource>));
    let wake = config.wake.clone();
    let detector: DetectorFactory = Box::new(move || build_detector(&wake));

    let controller = SessionController::start(
        SessionSettings::from_config(&config),
        SessionParts {
            source,
            detector,
            transcriber,
            classifier,
            router,
            speech,
        },
    )?;

    tracing::info!(phrase = %config.wake.phrase, "hark is running - press ctrl-c to stop");

    let stopper = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping session");
            stopper.stop();
        }
    });

    tokio::task::spawn_blocking(move || controller.join()).await??;
    Ok(())
}

/// Test microphone input with a live level meter
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = MicCapture::new(16_000);
    capture.open()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    // 100ms frames, printed once per second
    let frame_len = sample_rate as usize / 10;
    for i in 0..duration {
        let mut second = Vec::with_capacity(frame_len * 10);
        for _ in 0..10 {
            second.extend(capture.next_frame(frame_len)?);
        }

        let energy = rms(&second);
        let peak = second.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.close();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24_000_f32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples...", samples.len());
    playback.play_samples(&samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If not, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS synthesis and playback
fn test_tts(config_path: Option<&std::path::Path>, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(config_path)?;
    let mut speaker = Speaker::new(&config.tts)?;

    println!("Synthesizing and playing...");
    speaker.speak(text)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Classify a transcript exactly as a session would
fn classify(config_path: Option<&std::path::Path>, text: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let classifier =
        IntentClassifier::new(config.vocabulary()?, config.intent.threshold, &config.wake.phrase);

    if classifier.is_wake_echo(text) {
        println!("wake echo (would be ignored)");
        return Ok(());
    }

    let m = classifier.classify(text);
    println!("intent:     {}", m.intent);
    println!("confidence: {:.2}", m.confidence);
    if let Some(phrase) = &m.matched_phrase {
        println!("matched:    \"{phrase}\"");
    }
    for (key, value) in &m.entities {
        println!("entity:     {key} = {value}");
    }

    Ok(())
}
