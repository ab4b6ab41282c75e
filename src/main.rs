use anyhow::Result;
use clap::Parser;
use clinscribe::config::Config;
use clinscribe::llm::HttpCompletionBackend;
use clinscribe::pipeline::NotePipeline;
use clinscribe::segment::Segmenter;
use clinscribe::stt::HttpSpeechBackend;
use clinscribe::transcript::TranscriptAssembler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Turn a clinical audio recording into a structured note.
///
/// Stands in for the web layer: runs the pipeline on one WAV file and
/// prints the resulting note as JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "clinscribe", version, about)]
struct Cli {
    /// Path to the WAV recording to process
    audio: PathBuf,

    /// Path to the configuration file
    #[arg(short, long, default_value = "clinscribe.toml")]
    config: PathBuf,

    /// Override the completion request timeout (e.g. "30s", "2m")
    #[arg(long, value_parser = humantime::parse_duration)]
    completion_timeout: Option<Duration>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config)?.with_env_overrides();
    if let Some(timeout) = cli.completion_timeout {
        config.completion.timeout_secs = timeout.as_secs().max(1);
    }
    config.validate()?;

    let speech = Arc::new(HttpSpeechBackend::new(
        &config.speech.base_url,
        config.speech.api_key.clone(),
        config.speech_timeout(),
    )?);
    let completion = Arc::new(HttpCompletionBackend::new(
        &config.completion.base_url,
        &config.completion.api_key,
        &config.completion.model,
        config.completion_timeout(),
    )?);

    let assembler = TranscriptAssembler::with_config(
        speech,
        Segmenter::with_config(config.segmenter_config()),
        config.assembler_config(),
    );
    let pipeline = NotePipeline::with_config(assembler, completion, config.pipeline_config());

    let note = pipeline.process(&cli.audio).await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&note)?
    } else {
        serde_json::to_string(&note)?
    };
    println!("{}", json);
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clinscribe={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
