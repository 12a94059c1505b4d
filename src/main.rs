//! wsbridge command-line entry point.
//!
//! Parses flags, initializes logging and runs the selected bridge.
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Normal close or user interrupt |
//! | 1 | Configuration, transport, TLS or listen error |
//! | 2 | Malformed command line |

// ============================================================================
// Imports
// ============================================================================

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wsbridge::{Args, ClientBridge, Mode, Renderer, Result, ServerBridge, SessionConfig, Style};

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let status = match run(config).await {
        Ok(()) => 0,
        Err(e) if e.is_interrupt() => 0,
        Err(e) => {
            debug!(error = %e, "Session failed");
            1
        }
    };

    // The stdin reader blocks in a runtime thread; exit instead of
    // waiting for runtime shutdown.
    std::process::exit(status);
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging on stderr.
///
/// `--debug` enables crate debug output; otherwise `RUST_LOG` decides and
/// logging is off by default.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("wsbridge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(config: SessionConfig) -> Result<()> {
    let renderer = Renderer::stdout(Style::for_session(config.is_execute(), config.color));

    match config.mode {
        Mode::Connect { .. } => {
            let mut bridge = ClientBridge::new(config, renderer);
            bridge.resolve_passphrase().await?;
            let console = bridge.console_source();
            bridge.run(console).await
        }
        Mode::Listen { .. } => {
            let bridge = ServerBridge::new(config, renderer);
            let console = bridge.console_source();
            bridge.run(console).await
        }
    }
}
