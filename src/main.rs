//! # GICES-RAGA CLI (`gices`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gices ingest` | Extract normative PDFs into the fragment index |
//! | `gices retrieve "<query>"` | Show the top-K evidence fragments for a query |
//! | `gices compute` | Compute E1-1 / E4-5 KPIs and their explanations |
//! | `gices seal` | Hash the KPI artifacts into a sealed audit archive |
//! | `gices verify <archive>` | Re-check a sealed archive against its manifest |
//!
//! ## Examples
//!
//! ```bash
//! gices --config ./config/gices.toml ingest
//! gices retrieve "nature credits permanence" --k 3 --explain
//! gices compute
//! gices seal
//! gices verify release/audit/GICES_AUDIT_GICES-1718000000000.zip \
//!     --manifest evidence/evidence_manifest.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gices_raga::{compute, config, ingest, logging, search, seal, verify};

/// GICES-RAGA: compliance evidence retrieval and sealed audit packages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "gices",
    about = "GICES-RAGA: compliance evidence retrieval and sealed audit packages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gices.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `GICES_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract PDFs in `[knowledge].pdf_dir` into page fragments.
    ///
    /// Pages with too little text are skipped. Writes the index to
    /// `[knowledge].index_path`, replacing any previous index.
    Ingest,

    /// Retrieve the most relevant fragments for a query.
    ///
    /// Scores fragments by how many distinct query terms they contain.
    Retrieve {
        /// Free-text query.
        query: String,

        /// Maximum number of fragments to return (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print the relevance score of each fragment.
        #[arg(long)]
        explain: bool,
    },

    /// Compute KPIs and write `kpis.json` and `explain.json`.
    Compute,

    /// Seal the KPI artifacts into `GICES_AUDIT_<run_id>.zip`.
    ///
    /// Missing artifacts are replaced by placeholders before hashing. The
    /// manifest is also written to `[audit].evidence_dir`.
    Seal,

    /// Verify a sealed archive.
    ///
    /// Exits with an error when any digest, or the aggregate digest, does
    /// not match.
    Verify {
        /// Path to a `GICES_AUDIT_*.zip` archive.
        archive: PathBuf,

        /// Also check the persisted manifest at this path.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "config file not found; using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Ingest => {
            ingest::run_ingest(&cfg)?;
        }
        Commands::Retrieve { query, k, explain } => {
            search::run_search(&cfg, &query, k, explain)?;
        }
        Commands::Compute => {
            compute::run_compute(&cfg).await?;
        }
        Commands::Seal => {
            seal::run_seal(&cfg)?;
        }
        Commands::Verify { archive, manifest } => {
            verify::run_verify(&archive, manifest.as_deref())?;
        }
    }

    Ok(())
}
