use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cw_backends::HttpChatBackend;
use cw_core::{AnalyticsSink, ChatWidget, Outcome, ShareLinks, TracingSink};

mod chat;
mod config;
mod setup;
mod signup;

use config::Config;
use signup::TerminalSignup;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Most verbose
    Trace,
    /// Request payloads, timers, placeholder lifecycle
    Debug,
    /// Analytics events
    Info,
    /// Quiet: only absorbed failures and errors
    Warn,
    /// Minimal: only errors
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "cw")]
#[command(author, version, about = "Campaign chat widget for the terminal", long_about = None)]
pub struct Cli {
    /// Ask a single question and print the reply
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Base URL of the chat endpoint (overrides config)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,
    /// Print share links for the configured page
    Share,
    /// Initialize configuration file in ~/.config/cw
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Resolve log level: --debug overrides --log-level
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };

    // Set up logging
    let filter = EnvFilter::new(log_level.as_filter());

    if let Some(log_path) = &cli.log_file {
        // Log file specified: write JSON to file
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match &cli.command {
        Some(Commands::Setup) => setup::run(),
        Some(Commands::Config) => show_config(&load_config(&cli)?),
        Some(Commands::Share) => show_share_links(&load_config(&cli)?),
        None => {
            let config = load_config(&cli)?;
            let analytics: Arc<dyn AnalyticsSink> = Arc::new(TracingSink);
            let signup = Arc::new(TerminalSignup::new());
            let backend = HttpChatBackend::new()
                .with_base_url(config.endpoint.as_str())
                .with_timeout(config.timeout());
            let widget = ChatWidget::builder(Arc::new(backend))
                .with_analytics(Arc::clone(&analytics))
                .with_signup(signup.clone())
                .with_config(config.widget_config())
                .build();

            if let Some(prompt) = &cli.prompt {
                ask_once(&widget, prompt).await
            } else {
                chat::run_chat(&config, widget, signup, analytics).await
            }
        }
    }
}

/// Load the layered config, then apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    Ok(config)
}

/// Quick mode: one question, one reply.
async fn ask_once(widget: &ChatWidget, prompt: &str) -> Result<()> {
    widget.toggle_visibility();
    let Some(outcome) = widget.send(prompt).await else {
        anyhow::bail!("Nothing to send: the prompt is empty");
    };

    if let Some(reply) = widget.messages().last() {
        println!("{}", reply.text);
    }
    if outcome == (Outcome::Replied { follow_up_scheduled: true }) {
        println!("\n{}", widget.config().follow_up_text);
        println!("Run `cw` and type /signup to join.");
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("# {}", Config::config_path()?.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_share_links(config: &Config) -> Result<()> {
    let links = ShareLinks::new(&config.page_url());
    chat::list_share_links(&links, &TracingSink);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["cw", "setup"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Setup)));

        let cli = Cli::try_parse_from(["cw", "-e", "http://localhost:4000", "share"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Share)));
        assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:4000"));

        let cli = Cli::try_parse_from(["cw", "-p", "Where is Amy from?"]).unwrap();
        assert!(cli.command.is_none());
    }
}
