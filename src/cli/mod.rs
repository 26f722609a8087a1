//! Command line interface for distpack.
//!
//! Parses arguments, resolves them into [`Settings`](crate::bundler::Settings),
//! runs the orchestrator against the selected container runtime and maps the
//! outcome to a process exit code. SIGINT and SIGTERM abort the run; the
//! scratch root and any running container process are released before exit.

mod args;
pub mod container;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::bundler::{Orchestrator, RunOutcome};
use crate::error::PackagingError;
use clap::Parser;
use container::RuntimeCli;

/// Parses command line arguments.
///
/// On `--help` / `--version` or a parse error the message is printed and
/// the exit code is returned as the error: 0 for help and version, 1 for
/// invalid arguments.
pub fn parse_args() -> std::result::Result<Args, i32> {
    Args::try_parse().map_err(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        code
    })
}

/// Main CLI entry point. Returns the process exit code.
pub async fn run(args: Args) -> i32 {
    let runtime_config = RuntimeConfig::from(&args);

    let settings = match args.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            report_error(&runtime_config, &e);
            return 1;
        }
    };
    log::debug!("Settings: {:?}", settings);

    let engine = RuntimeCli::new(settings.runtime(), settings.runtime_program());
    let mut orchestrator = Orchestrator::new(settings, engine, runtime_config.clone());

    let result = tokio::select! {
        result = orchestrator.run() => result,
        signal = shutdown_signal() => {
            // The run future is dropped here, which removes the scratch root
            // and kills the runtime child.
            runtime_config.error(&format!("interrupted by {}, cleaning up", signal.name()));
            return signal.exit_code();
        }
    };

    match result {
        Ok(RunOutcome::Completed(_)) => 0,
        Ok(RunOutcome::NotImplemented(format)) => {
            runtime_config.error(&format!("package system '{}' is not yet supported", format));
            1
        }
        Err(e) => {
            report_error(&runtime_config, &e);
            1
        }
    }
}

fn report_error(runtime_config: &RuntimeConfig, error: &PackagingError) {
    runtime_config.error(&error.to_string());
    for suggestion in error.recovery_suggestions() {
        runtime_config.hint(&suggestion);
    }
}

/// Termination request received while a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Interrupt,
    Terminate,
}

impl Shutdown {
    fn name(self) -> &'static str {
        match self {
            Shutdown::Interrupt => "SIGINT",
            Shutdown::Terminate => "SIGTERM",
        }
    }

    /// Shell convention: 128 + signal number.
    fn exit_code(self) -> i32 {
        match self {
            Shutdown::Interrupt => 130,
            Shutdown::Terminate => 143,
        }
    }
}

/// Resolves on the first SIGINT or SIGTERM. Never resolves if no handler
/// can be installed.
async fn shutdown_signal() -> Shutdown {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Shutdown::Interrupt,
            Err(e) => {
                log::warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                Shutdown::Terminate
            }
            Err(e) => {
                log::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Shutdown>();

    tokio::select! {
        signal = interrupt => signal,
        signal = terminate => signal,
    }
}
