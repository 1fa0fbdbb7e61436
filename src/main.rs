//! `fleetctl` - Ground-side mission controller for a UAV fleet

use clap::Parser;
use tokio::sync::oneshot;

use fleetctl::cli::args::Cli;
use fleetctl::cli::commands;
use fleetctl::error::ExitCode;
use fleetctl::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    // Spawn signal handler; the first signal cancels the running command
    let (interrupt_tx, interrupt_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!(error = %e, "could not register SIGTERM handler");
                    return;
                }
            };

        let code = tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
            _ = sigterm.recv() => ExitCode::TERMINATED,
        };
        let _ = interrupt_tx.send(code);
    });

    let result = tokio::select! {
        result = commands::dispatch(cli) => result,
        Ok(code) = interrupt_rx => {
            // The dispatch future is gone by now, and with it every link.
            eprintln!("\ninterrupted; participant links closed");
            std::process::exit(code);
        }
    };

    match result {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
