//! awesome-client
//!
//! Sends control commands to a running awesome session. Commands come from
//! the command line, or from stdin one line per message when none are given.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "awesome-client")]
#[command(about = "Send commands to a running awesome session")]
struct Args {
    /// Write to the control FIFO instead of the control socket
    #[arg(long)]
    fifo: bool,

    /// Override the endpoint path
    #[arg(long)]
    path: Option<PathBuf>,

    /// Command to send, e.g. `0 tag_view 2`. Reads stdin when absent.
    command: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "awesome_client=warn".into()),
        ))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let path = match &args.path {
        Some(path) => path.clone(),
        None if args.fifo => awesome_ipc::fifo_path()?,
        None => awesome_ipc::socket_path()?,
    };

    if !args.command.is_empty() {
        return send(&args, &path, &args.command.join(" "));
    }

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = send(&args, &path, &line) {
            warn!("Dropped command {:?}: {:#}", line, e);
        }
    }

    Ok(())
}

fn send(args: &Args, path: &Path, command: &str) -> Result<()> {
    debug!("Sending {:?} to {:?}", command, path);
    if args.fifo {
        awesome_ipc::write_fifo(path, command)
    } else {
        awesome_ipc::send_command(path, command)
    }
    .with_context(|| format!("Failed to send command to {:?}", path))
}
