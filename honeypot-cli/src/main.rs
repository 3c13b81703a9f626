//! CLI entry point for the honeypot engine

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Input;
use honeypot_agent::{SessionOrchestrator, SessionSweeper};
use honeypot_core::config::{Config, ConfigLoader, LoggingConfig};
use honeypot_core::logging::init_logging;
use honeypot_providers::build_clients;
use honeypot_server::{run_server, AppState};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "honeypot")]
#[command(about = "Conversational decoy that keeps scammers talking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP endpoint and the idle sweeper
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Talk to the decoy interactively
    Chat {
        /// Session id to continue
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send a single message and print the reply payload
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session id to continue
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Show effective configuration and the provider chain
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };
    let config = config_loader.load()?;

    // Only the server logs to the terminal at the configured level;
    // interactive commands keep stdout for the conversation.
    let quiet = !matches!(cli.command, Commands::Serve { .. });
    let _guard = setup_logging(&config.logging, config_loader.config_dir(), quiet);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            run_serve(&config, port).await?;
        }
        Commands::Chat { session } => {
            run_chat(&config, session).await?;
        }
        Commands::Send { message, session } => {
            run_send(&config, &message, session).await?;
        }
        Commands::Status => {
            run_status(&config_loader, &config);
        }
    }

    Ok(())
}

fn setup_logging(logging: &LoggingConfig, config_dir: &Path, quiet: bool) -> WorkerGuard {
    let mut logging = logging.clone();
    let dir = PathBuf::from(&logging.dir);
    if dir.is_relative() {
        logging.dir = config_dir.join(dir).to_string_lossy().into_owned();
    }
    if quiet {
        logging.level = "warn".to_string();
    }
    init_logging(&logging)
}

async fn run_serve(config: &Config, port: u16) -> Result<()> {
    let state = AppState::from_config(config);
    let orchestrator = state.orchestrator.clone();
    if orchestrator.router().is_empty() {
        println!(
            "{}",
            style("No provider credentials configured, every reply will be a stall line.")
                .yellow()
        );
    }

    println!("{}", style("Starting honeypot...").bold().cyan());
    println!("Providers: {}", orchestrator.router().names().join(" -> "));

    let sweeper = SessionSweeper::new(
        orchestrator.clone(),
        Duration::from_secs(config.session.sweep_interval_secs),
        Duration::from_secs(config.session.idle_timeout_secs),
    );
    sweeper.start().await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let host = config.server.host.clone();
    let mut server_handle =
        tokio::spawn(async move { run_server(state, &host, port, shutdown_rx).await });

    println!(
        "\n{}",
        style(format!("Listening on port {}. Press Ctrl+C to stop.", port)).green()
    );

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            println!("\n{}", style("Shutting down...").yellow());
            let _ = shutdown_tx.send(());
        }
        res = &mut server_handle => {
            sweeper.stop().await;
            return match res {
                Ok(inner) => inner,
                Err(e) => Err(e.into()),
            };
        }
    }

    sweeper.stop().await;
    match server_handle.await {
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    println!("{}", style("Honeypot stopped.").green());
    Ok(())
}

async fn run_chat(config: &Config, session: Option<String>) -> Result<()> {
    let mut config = config.clone();
    // an explicit id typed by the operator should be kept as-is
    config.session.adopt_client_ids = true;
    let orchestrator = SessionOrchestrator::from_config(&config);

    println!("{}", style("Honeypot chat").bold().cyan());
    println!(
        "Providers: {}",
        style(orchestrator.router().names().join(" -> ")).dim()
    );
    println!("Type /quit to leave.\n");

    let mut session_id = session;
    loop {
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;
        let trimmed = line.trim();
        if trimmed == "/quit" || trimmed == "/exit" {
            break;
        }

        let reply = orchestrator.handle_text(session_id.as_deref(), trimmed).await;
        println!("{} {}", style("decoy>").green().bold(), reply.reply);
        session_id = Some(reply.session_id);

        if reply.ended {
            println!("{}", style("Conversation ended.").yellow());
            break;
        }
    }

    if let Some(id) = session_id {
        if let Some(summary) = orchestrator.store().summary(&id).await {
            info!(session_id = %id, turns = summary.turn_count, "Chat finished");
            println!(
                "{}",
                style(format!("session {} ({} turns)", id, summary.turn_count)).dim()
            );
        }
    }
    Ok(())
}

async fn run_send(config: &Config, message: &str, session: Option<String>) -> Result<()> {
    let mut config = config.clone();
    config.session.adopt_client_ids = true;
    let orchestrator = SessionOrchestrator::from_config(&config);

    let reply = orchestrator.handle_text(session.as_deref(), message).await;
    println!("{}", serde_json::to_string(&reply)?);
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) {
    println!("{}", style("Honeypot Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Max turns: {}", config.session.max_turns);
    println!("  History window: {}", config.session.history_window);
    println!("  Min call delay: {}s", config.session.min_call_delay_secs);
    println!("  Idle timeout: {}s", config.session.idle_timeout_secs);
    println!("  Provider timeout: {}s", config.providers.timeout_secs);
    println!(
        "  Listen: {}:{}",
        config.server.host, config.server.port
    );
    println!(
        "  API key: {}",
        config
            .server
            .api_key
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "none".to_string())
    );
    println!();

    println!("{}", style("Provider chain:").bold());
    for name in &config.providers.chain {
        let credential = if name == "botpress" {
            config.providers.botpress.token.as_str()
        } else {
            config
                .providers
                .compat(name)
                .map(|p| p.api_key.as_str())
                .unwrap_or("")
        };
        let status = if credential.trim().is_empty() {
            style("not configured (skipped)".to_string()).red()
        } else {
            style(format!("configured ({})", mask_secret(credential))).green()
        };
        println!("  {}: {}", name, status);
    }

    let active = build_clients(&config.providers);
    println!(
        "\nActive chain: {}",
        if active.is_empty() {
            style("empty".to_string()).red()
        } else {
            style(
                active
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            )
            .green()
        }
    );
}

/// Show only the edges of a secret
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.trim().chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(3));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-1234567890abcdef"), "sk-1...cdef");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_cli_parses_global_config_dir() {
        let cli = Cli::parse_from(["honeypot", "send", "--message", "hi", "--config-dir", "/tmp/x"]);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Commands::Send { message, session } => {
                assert_eq!(message, "hi");
                assert!(session.is_none());
            }
            _ => panic!("expected send"),
        }
    }
}
