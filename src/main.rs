//! awesome window manager
//!
//! Parses the command line, sets up logging and runs one session on the
//! display named by `DISPLAY`.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{self, SigHandler, Signal};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "awesome",
    disable_version_flag = true,
    about = "A tiling window manager for X11"
)]
struct Args {
    /// Print version information and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// Configuration file (defaults to ~/.config/awesome/awesomerc.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    if args.version {
        println!("awesome-{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // Logs go to stderr; stdout belongs to whoever started the session
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "awesome=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = start(&args) {
        error!("awesome: {:#}", e);
        process::exit(1);
    }
}

fn start(args: &Args) -> Result<()> {
    // Spawned commands are never waited on; let the kernel reap them.
    // SAFETY: SigIgn installs no handler code, and no other thread exists yet.
    unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigIgn) }
        .context("failed to ignore SIGCHLD")?;

    info!("Starting awesome-{}", env!("CARGO_PKG_VERSION"));
    awesome::wm::run(args.config.as_deref())?;
    Ok(())
}
