//! Visitor counter service.
//!
//! ```text
//!   browser ──GET──▶ cors ──▶ handler ──▶ VisitCounter ──▶ DocumentStore ──▶ Firestore
//!           ◀─"42"──       ◀──        ◀── atomic / CAS  ◀──
//!   browser ──OPTIONS──▶ cors ──▶ 204 (store untouched)
//! ```

use std::path::PathBuf;

use clap::Parser;

use visitor_counter::config;
use visitor_counter::lifecycle;
use visitor_counter::observability::logging;

#[derive(Parser)]
#[command(name = "visitor-counter")]
#[command(about = "HTTP visitor counter backed by a document store", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "COUNTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("visitor-counter v{} starting", env!("CARGO_PKG_VERSION"));

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
