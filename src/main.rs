use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vox_gateway::api::ApiServerBuilder;
use vox_gateway::pipeline::Engine;
use vox_gateway::voice::{self, PiperSynthesizer, SpeechSynthesizer};
use vox_gateway::{Config, Pipeline, config};

/// Vox - talk to a local language model from the browser
#[derive(Parser)]
#[command(name = "vox", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "VOX_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "VOX_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Ciao! Questa è una prova della sintesi vocale.")]
        text: String,
        /// Keep the WAV file here instead of a temporary directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Transcribe one audio file
    Transcribe {
        /// Audio file to transcribe
        file: PathBuf,
    },
    /// Show resolved configuration and engine status
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before parsing so clap's `env` arguments see the file too
    let env_file = config::load_env_file(Path::new(".env"));
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,vox_gateway=info",
        1 => "info,vox_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match env_file {
        Ok(true) => tracing::debug!("loaded variables from .env"),
        Ok(false) => tracing::debug!("no .env file found"),
        Err(e) => tracing::warn!(error = %e, "ignoring .env file"),
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestTts { text, output } => test_tts(&config, &text, output.as_deref()).await,
            Command::Transcribe { file } => transcribe(config, &file).await,
            Command::Check => {
                check(config);
                Ok(())
            }
        };
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        language = %config.language,
        "starting vox gateway"
    );
    tracing::debug!(?config, "loaded configuration");

    let server_config = config.server.clone();
    let pipeline = Arc::new(Pipeline::from_config(config));

    if pipeline.preflight().is_err() {
        tracing::warn!("vox gateway degraded - /process-audio/ will answer 500 until engines load");
    } else {
        tracing::info!("vox gateway ready");
    }

    ApiServerBuilder::new(pipeline)
        .server_config(&server_config)
        .build()
        .run()
        .await?;

    Ok(())
}

/// Synthesize one utterance and report the resulting WAV
async fn test_tts(config: &Config, text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let synthesizer = PiperSynthesizer::load(&config.tts)?;
    println!("Synthesizing with {}...", synthesizer.voice_model().display());

    let scratch = tempfile::tempdir()?;
    let path = output.map_or_else(|| scratch.path().join("test.wav"), Path::to_path_buf);

    let audio = synthesizer.synthesize(text, &path).await?;
    let summary = voice::describe_wav(&audio)?;

    println!(
        "{} bytes, {} Hz, {} channel(s), {:.2}s",
        audio.len(),
        summary.sample_rate,
        summary.channels,
        summary.duration.as_secs_f32()
    );
    if output.is_some() {
        println!("Saved to {}", path.display());
    }

    Ok(())
}

/// Run the configured speech-to-text engine on one file
async fn transcribe(config: Config, file: &Path) -> anyhow::Result<()> {
    let language = config.language;
    let transcriber = voice::load_transcriber(config.stt)?;

    let text = transcriber.transcribe(file, language).await?;
    if text.trim().is_empty() {
        println!("{}", language.phrases().no_speech);
    } else {
        println!("{}", text.trim());
    }

    Ok(())
}

/// Print configuration and the load status of every engine
fn check(config: Config) {
    let config_path = vox_gateway::config::file::config_file_path()
        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string());
    println!("Configuration file: {config_path}");
    println!("{config:#?}\n");

    let pipeline = Pipeline::from_config(config);
    print_engine("transcriber", pipeline.transcriber());
    print_engine("chat", pipeline.chat());
    print_engine("voice model", pipeline.synthesizer());
}

fn print_engine<T: ?Sized>(name: &str, engine: &Engine<T>) {
    match engine.get() {
        Ok(_) => println!("  {name:<12} ok"),
        Err(reason) => println!("  {name:<12} FAILED: {reason}"),
    }
}
