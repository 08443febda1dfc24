//! Daemon entry point
//!
//! The runtime is built explicitly here, before any store or native
//! extension loads, so nothing initializes against a reactor that is
//! about to be replaced. Everything after that ordering requirement lives
//! in the library crate.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use strata_daemon::{load_config, Daemon};

#[derive(Parser)]
#[command(name = "stratad")]
#[command(about = "The strata cognitive-archaeology daemon")]
#[command(version)]
struct Args {
    /// State directory (defaults to ~/.strata)
    #[arg(short, long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Override the control plane port
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Bootstrap ordering: the runtime exists before anything else runs
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.state_dir)?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    std::fs::create_dir_all(&config.state_dir)?;
    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        config
            .log_path()
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("strata.log")),
    );
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        state_dir = %config.state_dir.display(),
        "Starting strata daemon"
    );

    let daemon = Daemon::build(config).await?;
    daemon.run().await?;
    Ok(())
}
