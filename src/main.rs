use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use attune::audio::{self, CaptureLoop, CaptureSource, ClipBuffer, MicSource, SimSource};
use attune::classify::{HttpTextClassifier, HttpVoiceClassifier};
use attune::pipeline::{ConsoleSink, MultiSink, Pipeline, ResultSink, Stages, WebhookSink};
use attune::Config;

/// Attune - real-time affect sensing for voice assistants
#[derive(Parser)]
#[command(name = "attune", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the synthetic audio source instead of a microphone
    #[arg(long, env = "ATTUNE_SIMULATE")]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single WAV file and print the fused result
    Classify {
        /// Path to a mono or stereo WAV file
        path: std::path::PathBuf,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Print the taxonomy mapping table
    Mapping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,attune=info",
        1 => "info,attune=debug",
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
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Classify { path } => classify_file(&path).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::Mapping => print_mapping(),
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let pipeline = build_pipeline(&config)?;

    // Ctrl-C drives the shutdown channel
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    tracing::info!(
        clip_secs = config.capture.clip_duration.as_secs_f64(),
        sample_rate = config.capture.sample_rate,
        simulate = cli.simulate,
        "attune listening"
    );

    // cpal streams aren't Send, so the capture loop runs on this task
    if cli.simulate {
        let source = SimSource::new(config.capture.sample_rate, config.capture.poll_interval);
        let capture = CaptureLoop::new(
            source,
            config.capture.clip_duration,
            config.capture.poll_interval,
        );
        pipeline.run(capture, &mut shutdown_rx).await?;
    } else {
        let source = MicSource::new(config.capture.sample_rate)?;
        let capture = CaptureLoop::new(
            source,
            config.capture.clip_duration,
            config.capture.poll_interval,
        );
        pipeline.run(capture, &mut shutdown_rx).await?;
    }

    Ok(())
}

/// Wire the configured collaborators into a pipeline
fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let transcriber = Arc::new(config.speech_to_text()?);
    let voice_classifier = Arc::new(HttpVoiceClassifier::new(config.voice_classifier_url.clone()));
    let text_classifier = Arc::new(HttpTextClassifier::new(config.text_classifier_url.clone()));

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(ConsoleSink)];
    if let Some(webhook) = &config.webhook {
        tracing::info!(url = %webhook.url, session = %webhook.session_id, "webhook sink enabled");
        sinks.push(Box::new(WebhookSink::new(
            webhook.url.clone(),
            webhook.session_id.clone(),
        )));
    }
    let sink: Arc<dyn ResultSink> = Arc::new(MultiSink::new(sinks));

    Ok(Pipeline::new(
        Stages {
            transcriber,
            voice_classifier,
            text_classifier,
            sink,
        },
        config.mapper()?,
        config.weights,
        config.branch_timeout,
        config.shutdown_grace,
    ))
}

/// Classify one WAV file outside the continuous loop
async fn classify_file(path: &std::path::Path) -> anyhow::Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;

    let (samples, sample_rate) = audio::wav_to_samples(path)?;
    if samples.is_empty() {
        anyhow::bail!("{} contains no samples", path.display());
    }

    #[allow(clippy::cast_precision_loss)]
    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));
    let clip = ClipBuffer::new(0, samples, sample_rate, duration);

    tracing::info!(
        path = %path.display(),
        sample_rate,
        secs = duration.as_secs_f64(),
        "classifying file"
    );

    let result = pipeline.classify_clip(clip).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

/// Test microphone input with a live level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let config = Config::load()?;
    let mut source = MicSource::new(config.capture.sample_rate)?;
    source.start()?;

    println!("Sample rate: {} Hz", source.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = source.drain()?;
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

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

    source.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Print the configured taxonomy mapping table
fn print_mapping() -> anyhow::Result<()> {
    let config = Config::load()?;
    let mapper = config.mapper()?;

    println!("{:<8} {:<10} -> canonical", "source", "raw");
    println!("{}", "-".repeat(32));
    for (source, raw, canonical) in mapper.entries() {
        println!("{source:<8} {raw:<10} -> {canonical}");
    }

    if config.taxonomy_overrides.is_empty() {
        println!("\n(defaults; override with ATTUNE_TAXONOMY_OVERRIDES=label=canonical,...)");
    }

    Ok(())
}
