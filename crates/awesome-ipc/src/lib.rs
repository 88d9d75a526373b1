//! awesome IPC
//!
//! Control endpoints shared between the window manager and the tools that
//! drive it. Commands are plain text, one command per line, and travel either
//! through a FIFO or as datagrams on a local socket.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// FIFO name, relative to the home directory
pub const CONTROL_FIFO_NAME: &str = ".awesome_ctl";

/// Datagram socket name, relative to the home directory
pub const CONTROL_SOCKET_NAME: &str = ".awesome_so_ctl";

/// Size of the read buffer for one control message, terminator slot included
pub const CONTROL_BUFFER_SIZE: usize = 1024;

/// Longest command text the window manager will interpret
pub const MAX_COMMAND_LEN: usize = CONTROL_BUFFER_SIZE - 1;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("cannot determine home directory")]
    NoHome,

    #[error("command is {len} bytes, limit is {MAX_COMMAND_LEN}")]
    TooLong { len: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Path of the control FIFO
pub fn fifo_path() -> Result<PathBuf, IpcError> {
    home_relative(CONTROL_FIFO_NAME)
}

/// Path of the control socket
pub fn socket_path() -> Result<PathBuf, IpcError> {
    home_relative(CONTROL_SOCKET_NAME)
}

fn home_relative(name: &str) -> Result<PathBuf, IpcError> {
    dirs::home_dir()
        .map(|home| home.join(name))
        .ok_or(IpcError::NoHome)
}

/// Reject command text the window manager would drop unread
pub fn check_len(command: &str) -> Result<(), IpcError> {
    let len = command.len();
    if len > MAX_COMMAND_LEN {
        return Err(IpcError::TooLong { len });
    }
    Ok(())
}

/// Send one command as a single datagram to the control socket at `path`
pub fn send_command(path: &Path, command: &str) -> Result<(), IpcError> {
    check_len(command)?;
    let socket = UnixDatagram::unbound()?;
    socket.send_to(command.as_bytes(), path)?;
    Ok(())
}

/// Write one command to the control FIFO at `path`.
///
/// Blocks until the window manager has the FIFO open for reading.
pub fn write_fifo(path: &Path, command: &str) -> Result<(), IpcError> {
    check_len(command)?;
    let mut fifo = OpenOptions::new().write(true).open(path)?;
    fifo.write_all(command.as_bytes())?;
    Ok(())
}
