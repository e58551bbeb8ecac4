// Weave CLI - Command Line Interface Entry Point

mod output;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::info;
use weave_config::{Config, ConfigLoader, parse_override};
use weave_core::{ConversationState, Pipeline};
use weave_protocol::SpeechMode;

use crate::output::ConsoleTransport;

/// Weave - split model output into tool calls, run them, deliver the reply
#[derive(Parser, Debug)]
#[command(name = "weave")]
#[command(version, about, long_about = None)]
struct TopCli {
  #[clap(flatten)]
  config_overrides: CliConfigOverrides,

  #[clap(subcommand)]
  command: Commands,
}

/// CLI configuration overrides
#[derive(Debug, clap::Args)]
struct CliConfigOverrides {
  /// Configuration override in key=value format
  #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
  overrides: Vec<String>,

  /// Extra configuration file, applied after global and project config
  #[arg(long = "config-file", value_name = "PATH", global = true)]
  config_file: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
  /// Run the pipeline on one completion and print the reply
  Run {
    /// File holding the completion (stdin when omitted)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Directory for media results
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// off, on, audio-only or voice-call
    #[arg(long = "speech-mode", default_value = "off")]
    speech_mode: SpeechMode,
  },

  /// Print the segmentation of a completion as JSON lines
  Segment {
    /// File holding the completion (stdin when omitted)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,
  },

  /// Configuration management
  Config {
    #[command(subcommand)]
    config_command: ConfigCommands,
  },
}

/// Configuration commands
#[derive(Debug, Subcommand)]
enum ConfigCommands {
  /// Show the merged configuration
  Show,

  /// Validate configuration
  Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
  // Logs go to stderr so stdout carries only the reply
  tracing_subscriber::fmt()
    .with_env_filter(
      std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .as_str(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = TopCli::parse();
  let loader = config_loader(&cli.config_overrides)?;
  let overrides = cli
    .config_overrides
    .overrides
    .iter()
    .map(|raw| parse_override(raw))
    .collect::<Result<Vec<_>>>()?;

  match cli.command {
    Commands::Run {
      input,
      out_dir,
      speech_mode,
    } => {
      let config = loader.load_with_cli_overrides(overrides)?;
      run(&config, input, out_dir, speech_mode).await?;
    }
    Commands::Segment { input } => {
      let config = loader.load_with_cli_overrides(overrides)?;
      print_segments(&config, input).await?;
    }
    Commands::Config { config_command } => {
      handle_config_command(&loader, overrides, config_command)?;
    }
  }

  Ok(())
}

fn config_loader(args: &CliConfigOverrides) -> Result<ConfigLoader> {
  let mut loader = ConfigLoader::new().with_project_dir(std::env::current_dir()?);
  if let Some(path) = &args.config_file {
    loader = loader.with_config_file(path.clone());
  }
  Ok(loader)
}

/// Run the pipeline on one completion
async fn run(
  config: &Config,
  input: Option<PathBuf>,
  out_dir: PathBuf,
  speech_mode: SpeechMode,
) -> Result<()> {
  let raw = read_completion(input).await?;
  let pipeline = Pipeline::from_config(config).context("failed to set up providers")?;
  let state = ConversationState::new("cli").with_speech_mode(speech_mode);
  let transport = ConsoleTransport::new(out_dir, std::io::stdout());

  let report = pipeline.run(&raw, &state, &transport).await?;
  info!(
    segments = report.segments,
    invocations = report.invocations,
    units = report.units_delivered,
    fallback = report.used_fallback,
    "Done"
  );
  Ok(())
}

async fn print_segments(config: &Config, input: Option<PathBuf>) -> Result<()> {
  let raw = read_completion(input).await?;
  let pipeline = Pipeline::from_config(config).context("failed to set up providers")?;
  for segment in pipeline.segment(&raw) {
    println!("{}", serde_json::to_string(&segment)?);
  }
  Ok(())
}

/// Handle config commands
fn handle_config_command(
  loader: &ConfigLoader,
  overrides: Vec<(String, String)>,
  cmd: ConfigCommands,
) -> Result<()> {
  match cmd {
    ConfigCommands::Show => {
      let config = loader.load_with_cli_overrides(overrides)?;
      print!("{}", toml::to_string_pretty(&config.redacted())?);
    }
    ConfigCommands::Validate => {
      let sources = loader.load_layers()?.sources();
      loader.load_with_cli_overrides(overrides)?;
      println!("Configuration is valid.");
      println!("Layers: {sources:?}");
    }
  }
  Ok(())
}

async fn read_completion(input: Option<PathBuf>) -> Result<String> {
  match input {
    Some(path) => tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read {}", path.display())),
    None => {
      if std::io::stdin().is_terminal() {
        eprintln!("Reading completion from stdin, end with Ctrl-D");
      }
      let mut raw = String::new();
      tokio::io::stdin().read_to_string(&mut raw).await?;
      Ok(raw)
    }
  }
}
