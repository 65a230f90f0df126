use crate::console::Console;
use crate::http;
use application::ChatService;
use clap::{Parser, Subcommand};
use domain::{ChatError, SessionId};
use infrastructure::config::{parse_bind, Config};
use infrastructure::json_log::JsonLog;
use infrastructure::ollama_runner::OllamaRunner;
use infrastructure::session_store::SessionStore;
use shared::telemetry::init_logging;
use shared::types::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Relay chat messages to a local model and keep Markdown transcripts.
#[derive(Parser, Debug)]
#[command(name = "chat_relay")]
#[command(about = "Relay chat messages to a local model and keep Markdown transcripts", long_about = None)]
pub struct Cli {
    /// Directory holding chat_history_<N>.md transcripts
    #[arg(long, global = true)]
    pub history_dir: Option<PathBuf>,

    /// Model name passed to `<inference-bin> run <model>`
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Inference executable
    #[arg(long, global = true)]
    pub inference_bin: Option<String>,

    /// Seconds to wait for a reply; 0 waits forever
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Chat interactively in the terminal
    Chat {
        /// Continue an existing session instead of starting a new one
        #[arg(long)]
        resume: Option<u64>,

        /// Also mirror the conversation to this JSON file
        #[arg(long)]
        json_log: Option<PathBuf>,
    },
}

#[derive(Default)]
pub struct CliApp;

impl CliApp {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, cli: Cli) -> Result<()> {
        let mut config = Config::load()?;
        apply_overrides(&mut config, &cli);
        init_logging(&config.log_level, &config.log_format);

        let command = cli.command.unwrap_or(Command::Serve { bind: None });
        if let Command::Serve { bind: Some(bind) } = &command {
            config.bind_addr = parse_bind(bind)?;
        }

        let store = SessionStore::open(&config.history_dir)?;
        let runner = OllamaRunner::from_config(&config);
        tracing::info!(
            model = runner.model(),
            history_dir = %config.history_dir.display(),
            timeout_secs = config.timeout.map(|t| t.as_secs()),
            "chat relay starting"
        );
        let service = Arc::new(ChatService::new(runner, store));

        match command {
            Command::Serve { .. } => http::serve(service, config.bind_addr).await,
            Command::Chat { resume, json_log } => {
                let resume = resume
                    .map(|n| SessionId::new(n).ok_or_else(|| ChatError::NotFound(format!("chat {n}"))))
                    .transpose()?;
                Console::new(service, json_log.map(JsonLog::new)).run(resume).await
            }
        }
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.history_dir {
        config.history_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(bin) = &cli.inference_bin {
        config.inference_bin = bin.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
}
