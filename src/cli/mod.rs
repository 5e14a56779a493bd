use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::core::config::{self, AppConfig};
use crate::core::error::ProbeError;
use crate::core::model::ModelId;
use crate::probe::{self, OutputFormat, DEFAULT_MESSAGE};
use crate::storage::InMemorySessionService;

#[derive(Parser, Debug)]
#[command(
    name = "agent-probe",
    version,
    about = "Send one message to a tool-equipped agent and print every event it emits"
)]
pub struct Cli {
    /// Message sent to the agent
    #[arg(short, long, default_value = DEFAULT_MESSAGE)]
    pub message: String,

    /// Model to use, e.g. openai/gpt-5-nano (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// Working directory (where agent-probe.json is looked up)
    #[arg(short = 'c', long = "cwd")]
    pub working_dir: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Stream the response and show partial events
    #[arg(long)]
    pub stream: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.model = ModelId(model.clone());
        }
        if self.stream {
            config.streaming = true;
        }
        if self.debug {
            config.debug = true;
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.working_dir.clone())?;
    cli.apply(&mut config);

    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Checked up front so nothing else runs without a credential
    if let Err(e) = config.require_api_key() {
        exit_missing_credential(&ProbeError::from(e));
    }

    let session_service = Arc::new(InMemorySessionService::new());
    let mut stdout = std::io::stdout().lock();

    match probe::run_probe(
        &config,
        session_service,
        &cli.message,
        cli.output_format,
        &mut stdout,
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.missing_credential().is_some() => exit_missing_credential(&e),
        Err(e) => Err(e.into()),
    }
}

fn exit_missing_credential(err: &ProbeError) -> ! {
    eprintln!("ERROR: {} not set", err.missing_credential().unwrap_or("API key"));
    std::process::exit(1);
}
