//! Tracing setup for the `gices` binary.
//!
//! Diagnostics go to stderr through `tracing`; command results are printed
//! to stdout. The filter comes from `GICES_LOG` (e.g.
//! `GICES_LOG=gices_raga::seal=debug`), falling back to `gices_raga=info`, or
//! `gices_raga=debug` when `--verbose` is given.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber. Calling it more than once is a no-op.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "gices_raga=debug"
        } else {
            "gices_raga=info"
        };
        let filter =
            EnvFilter::try_from_env("GICES_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
