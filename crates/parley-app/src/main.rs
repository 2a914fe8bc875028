//! Parley command-line client - composition root.
//!
//! 1. Parse arguments and load configuration from TOML
//! 2. Initialize tracing (stderr, so stdout carries only the transcript)
//! 3. Build the HTTP transport and session controller
//! 4. Run a single `ask` or an interactive `repl`

mod cli;
mod render;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley_chat::{HttpTransport, SessionController, SessionOutcome};
use parley_core::config::GeneralConfig;
use parley_core::ParleyConfig;

use cli::{CliArgs, Command};
use render::TranscriptPrinter;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

/// Submit one query and print the transcript as it changes.
///
/// Ctrl-C pauses the session instead of killing the process.
async fn run_ask(
    controller: &SessionController,
    query: &str,
) -> Result<SessionOutcome, Box<dyn std::error::Error>> {
    let mut updates = controller.subscribe();
    let mut printer = TranscriptPrinter::new(false);
    let mut handle = controller.submit(query)?;

    let outcome = loop {
        tokio::select! {
            joined = &mut handle => break joined?,
            changed = updates.changed() => {
                if changed.is_err() {
                    break handle.await?;
                }
                let snapshot = updates.borrow_and_update().clone();
                printer.print(&snapshot.transcript);
            }
            _ = tokio::signal::ctrl_c() => {
                if controller.pause() {
                    eprintln!("(stopped)");
                }
            }
        }
    };

    printer.print(&controller.snapshot().transcript);
    Ok(outcome)
}

/// Read queries from stdin until EOF or `:quit`.
async fn run_repl(controller: &SessionController) -> Result<(), Box<dyn std::error::Error>> {
    let mut updates = controller.subscribe();
    let mut printer = TranscriptPrinter::new(false);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    ":quit" => break,
                    ":stop" => {
                        if !controller.pause() {
                            eprintln!("(nothing to stop)");
                        }
                    }
                    ":clear" => {
                        if controller.clear() {
                            printer.reset();
                        } else {
                            eprintln!("(busy; :stop first)");
                        }
                    }
                    query => match controller.submit(query) {
                        Ok(handle) => {
                            tokio::spawn(async move {
                                if let Ok(outcome) = handle.await {
                                    tracing::debug!(?outcome, "Query finished");
                                }
                            });
                        }
                        Err(e) => eprintln!("error: {e}"),
                    },
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                printer.print(&snapshot.transcript);
            }
        }
    }

    controller.pause();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config, read before tracing so the configured log level applies.
    let config_file = args.resolve_config_path();
    let loaded = ParleyConfig::load(&config_file);
    let config_level = match &loaded {
        Ok(config) => config.general.log_level.clone(),
        Err(_) => GeneralConfig::default().log_level,
    };
    init_tracing(&args.resolve_log_level(&config_level));

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            if config_file.exists() {
                tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults");
            }
            ParleyConfig::default()
        }
    };
    config.backend.endpoint = args.resolve_endpoint(&config.backend.endpoint);
    tracing::info!(endpoint = %config.backend.endpoint, "Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    let transport = HttpTransport::new(&config.backend)?;
    let controller = SessionController::new(
        Arc::new(transport),
        config.stream.clone(),
        config.chat.clone(),
    );

    match args.command {
        Command::Ask { ref query } => {
            let outcome = run_ask(&controller, query).await?;
            tracing::debug!(?outcome, "Session ended");
            if outcome.is_error() {
                std::process::exit(1);
            }
        }
        Command::Repl => run_repl(&controller).await?,
    }

    Ok(())
}
