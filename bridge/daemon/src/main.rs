//! WineRPC Bridge
//!
//! Serves one Discord Rich Presence client on the Windows named pipe and
//! relays it to the native Linux Discord client, then exits.
//!
//! # Usage
//!
//! ```bash
//! # Under Wine, next to the game
//! wine winerpc-bridge.exe
//!
//! # With session milestones on stderr
//! wine winerpc-bridge.exe --log-level info
//!
//! # Every syscall
//! WINERPC_LOG_LEVEL=trace wine winerpc-bridge.exe
//!
//! # Discord socket in a non-standard location
//! wine winerpc-bridge.exe --socket-dir /run/user/1000/app/com.discordapp.Discord
//! ```
//!
//! # Environment Variables
//!
//! - `WINERPC_LOG_LEVEL`: Same as `--log-level`
//! - `WINERPC_PIPE`: Same as `--pipe`
//! - `WINERPC_SOCKET_DIR`: Same as `--socket-dir`
//! - `RUST_LOG`: Filter directives, used only when no log level is given
//! - `XDG_RUNTIME_DIR`, `TMPDIR`, `TMP`, `TEMP`: Where to look for Discord
//!
//! # Exit Codes
//!
//! - `0`: Session ended without an I/O error
//! - `1`: Pipe, discovery, or relay failure
//! - `2`: Invalid command line

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winerpc_core::{run_session, Kernel, LogLevel, NativePipeServer, SessionReport};

use cli::{Args, LICENSE_NOTICE};

/// How the global subscriber filters events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogSetup {
    /// Fixed maximum level
    Level(LevelFilter),
    /// `RUST_LOG` directives
    FromEnv,
}

fn log_setup(level: Option<LogLevel>, rust_log_set: bool) -> LogSetup {
    match level {
        Some(level) => LogSetup::Level(level.level_filter()),
        None if rust_log_set => LogSetup::FromEnv,
        None => LogSetup::Level(LevelFilter::OFF),
    }
}

fn env_filter(setup: LogSetup) -> Result<EnvFilter> {
    match setup {
        LogSetup::Level(max) => Ok(EnvFilter::default().add_directive(max.into())),
        LogSetup::FromEnv => {
            EnvFilter::try_from_default_env().context("Invalid RUST_LOG directives")
        }
    }
}

/// Install the stderr subscriber; must run before any thread starts
fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let rust_log_set = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = env_filter(log_setup(level, rust_log_set))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to install log subscriber")
}

fn run(args: &Args) -> Result<SessionReport> {
    let config = args.to_config();
    info!(pipe = %config.pipe_name, "Starting WineRPC bridge");

    run_session(&NativePipeServer::default(), &Kernel::native(), &config)
        .with_context(|| format!("Bridge session on {} failed", config.pipe_name))
}

/// Exit status 0 only when a session ran and neither direction failed
fn succeeded(result: &Result<SessionReport>) -> bool {
    matches!(result, Ok(report) if report.is_success())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.license {
        print!("{LICENSE_NOTICE}");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(args.log_level) {
        eprintln!("winerpc-bridge: {e:#}");
        return ExitCode::FAILURE;
    }

    let result = run(&args);
    match &result {
        Ok(report) => {
            for err in report.errors() {
                error!(direction = %err.direction, error = %err, "Relay failed");
            }
            info!(
                to_discord = report.pipe_to_socket.stats.bytes,
                to_client = report.socket_to_pipe.stats.bytes,
                "Session finished"
            );
        }
        Err(e) => error!("Bridge failed: {e:#}"),
    }

    if succeeded(&result) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
