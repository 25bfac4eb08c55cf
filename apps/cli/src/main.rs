use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::Parser;
use refclock_core::BurnError;
use refclock_core::discovery::DeviceAddr;
use refclock_core::loader::{self, LoaderArgs};
use refclock_core::session::SessionConfig;
use tracing::{error, info};

mod probe;

#[derive(Parser, Debug)]
#[command(author, version, about = "Refclock firmware update utility", long_about = None)]
struct Args {
    /// Device filters, e.g. "addr=192.168.10.3" or "addr=192.168.10.3,revision=4"
    #[arg(long, default_value = "")]
    args: String,

    /// Path to a .bin or .hex firmware image. Defaults to the image for the
    /// unit's revision under the configured images directory.
    #[arg(long)]
    fw_path: Option<PathBuf>,

    /// Path to a TOML session config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match run(&args) {
        Ok(true) => info!("firmware update complete"),
        Ok(false) => {
            info!("no applicable refclock device found");
            std::process::exit(1);
        }
        Err(e) => {
            if let Some(BurnError::AmbiguousDevice(listing)) = e.downcast_ref::<BurnError>() {
                eprintln!("Could not resolve given args to a single refclock device.");
                eprintln!("Applicable devices:");
                for row in listing {
                    eprintln!(" * {} (addr={})", row.name, row.addr);
                }
                eprintln!();
                eprintln!("Specify one of these devices with the given args to load an image onto it.");
            } else {
                error!("firmware update failed: {e:#}");
            }
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let filters: DeviceAddr = args
        .args
        .parse()
        .map_err(|e| anyhow!("invalid device filters: {e}"))?;

    let config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let finder = Arc::new(probe::ProbeFinder::new(Duration::from_millis(
        config.response_timeout_ms,
    )));
    loader::register_refclock_loader(finder, config);

    let handled = loader::load_firmware(&LoaderArgs {
        filters,
        firmware_path: args.fw_path.clone(),
        load_firmware: true,
    })?;
    Ok(handled)
}
