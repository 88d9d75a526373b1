//! Control channel
//!
//! Text commands arrive through a FIFO and a datagram socket in the home
//! directory. Either endpoint can fail on its own; a failed endpoint leaves
//! the wait set and the other one keeps working. A FIFO whose writer went
//! away is reopened so the next writer can connect.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use awesome_ipc::CONTROL_BUFFER_SIZE;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use nix::sys::socket::{MsgFlags, recv};
use nix::sys::stat::{Mode, lstat};
use nix::unistd::mkfifo;
use tracing::{debug, error, info, warn};

pub const FIFO_TOKEN: Token = Token(1);
pub const SOCKET_TOKEN: Token = Token(2);

/// What one endpoint yielded during a wake
#[derive(Debug, Default)]
pub struct Drained {
    pub commands: Vec<String>,
    /// Set when the endpoint failed and has been disabled
    pub error: Option<io::Error>,
}

pub struct ControlChannel {
    fifo_path: Option<PathBuf>,
    fifo: Option<File>,
    socket_path: Option<PathBuf>,
    socket: Option<UnixDatagram>,
    buf: Box<[u8; CONTROL_BUFFER_SIZE]>,
}

impl ControlChannel {
    /// Open both endpoints at their home-directory locations
    pub fn open_default() -> Self {
        let fifo_path = awesome_ipc::fifo_path()
            .inspect_err(|e| warn!("Control FIFO disabled: {}", e))
            .ok();
        let socket_path = awesome_ipc::socket_path()
            .inspect_err(|e| warn!("Control socket disabled: {}", e))
            .ok();
        Self::open(fifo_path, socket_path)
    }

    pub fn open(fifo_path: Option<PathBuf>, socket_path: Option<PathBuf>) -> Self {
        let fifo = fifo_path.as_deref().and_then(|path| {
            open_fifo(path)
                .inspect_err(|e| error!("Error opening control FIFO {:?}: {}", path, e))
                .ok()
        });
        let socket = socket_path.as_deref().and_then(|path| {
            bind_socket(path)
                .inspect_err(|e| error!("Error binding control socket {:?}: {}", path, e))
                .ok()
        });

        Self {
            fifo_path,
            fifo,
            socket_path,
            socket,
            buf: Box::new([0; CONTROL_BUFFER_SIZE]),
        }
    }

    /// Swap in an already-open FIFO reader
    #[cfg(test)]
    pub(crate) fn set_fifo(&mut self, fifo: File) {
        self.fifo = Some(fifo);
    }

    pub fn fifo_active(&self) -> bool {
        self.fifo.is_some()
    }

    pub fn socket_active(&self) -> bool {
        self.socket.is_some()
    }

    /// Add the live endpoints to the wait set
    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        if let Some(fifo) = &self.fifo {
            registry.register(&mut SourceFd(&fifo.as_raw_fd()), FIFO_TOKEN, Interest::READABLE)?;
        }
        if let Some(socket) = &self.socket {
            registry.register(&mut SourceFd(&socket.as_raw_fd()), SOCKET_TOKEN, Interest::READABLE)?;
        }
        Ok(())
    }

    /// Read everything the FIFO has.
    ///
    /// A chunk that fills the whole buffer is dropped, and so is the rest of
    /// its line: the next chunk up to and including its first newline.
    pub fn service_fifo(&mut self, registry: &Registry) -> Drained {
        let mut drained = Drained::default();
        let mut overflow = false;

        loop {
            let Some(fifo) = self.fifo.as_mut() else {
                break;
            };
            match fifo.read(&mut self.buf[..]) {
                Ok(0) => {
                    debug!("Control FIFO writer closed, reopening");
                    if let Err(e) = self.reopen_fifo(registry) {
                        error!("awesome: error reopening fifo: {}", e);
                        drained.error = Some(e);
                    }
                    break;
                }
                Ok(n) if n >= CONTROL_BUFFER_SIZE => {
                    warn!("Control FIFO message too long, dropped");
                    overflow = true;
                }
                Ok(n) => {
                    let mut text = &self.buf[..n];
                    if overflow {
                        overflow = false;
                        if let Some(newline) = text.iter().position(|&b| b == b'\n') {
                            text = &text[newline + 1..];
                        }
                    }
                    if !text.is_empty() {
                        drained.commands.push(String::from_utf8_lossy(text).into_owned());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("awesome: error reading fifo: {}", e);
                    self.disable_fifo(registry);
                    drained.error = Some(e);
                    break;
                }
            }
        }
        drained
    }

    /// Read every queued datagram.
    ///
    /// Datagrams longer than the usable buffer are dropped whole.
    pub fn service_socket(&mut self, registry: &Registry) -> Drained {
        let mut drained = Drained::default();

        loop {
            let Some(socket) = self.socket.as_ref() else {
                break;
            };
            let usable = CONTROL_BUFFER_SIZE - 1;
            // MSG_TRUNC reports the full datagram length
            match recv(
                socket.as_raw_fd(),
                &mut self.buf[..usable],
                MsgFlags::MSG_TRUNC | MsgFlags::MSG_DONTWAIT,
            ) {
                Ok(0) => continue,
                Ok(n) if n >= CONTROL_BUFFER_SIZE => {
                    warn!("Control datagram of {} bytes dropped", n);
                }
                Ok(n) => {
                    drained.commands.push(String::from_utf8_lossy(&self.buf[..n]).into_owned());
                }
                Err(nix::errno::Errno::EAGAIN) => break,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(errno) => {
                    let e = io::Error::from(errno);
                    error!("awesome: error reading UNIX domain socket: {}", e);
                    self.disable_socket(registry);
                    drained.error = Some(e);
                    break;
                }
            }
        }
        drained
    }

    fn reopen_fifo(&mut self, registry: &Registry) -> io::Result<()> {
        self.disable_fifo(registry);
        let Some(path) = self.fifo_path.as_deref() else {
            return Ok(());
        };
        let fifo = open_fifo(path)?;
        registry.register(&mut SourceFd(&fifo.as_raw_fd()), FIFO_TOKEN, Interest::READABLE)?;
        self.fifo = Some(fifo);
        Ok(())
    }

    fn disable_fifo(&mut self, registry: &Registry) {
        if let Some(fifo) = self.fifo.take()
            && let Err(e) = registry.deregister(&mut SourceFd(&fifo.as_raw_fd()))
        {
            debug!("Deregistering control FIFO: {}", e);
        }
    }

    fn disable_socket(&mut self, registry: &Registry) {
        if let Some(socket) = self.socket.take()
            && let Err(e) = registry.deregister(&mut SourceFd(&socket.as_raw_fd()))
        {
            debug!("Deregistering control socket: {}", e);
        }
    }

    /// Close the socket and remove its path
    pub fn close(&mut self) {
        self.fifo = None;
        if self.socket.take().is_some()
            && let Some(path) = &self.socket_path
            && let Err(e) = fs::remove_file(path)
        {
            error!("Error unlinking control socket {:?}: {}", path, e);
        }
    }
}

/// Create the FIFO if nothing exists at `path`, then open it for reading
fn open_fifo(path: &Path) -> io::Result<File> {
    if lstat(path).is_err() {
        if let Err(e) = mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
            error!("Error creating control FIFO {:?}: {}", path, e);
        } else {
            info!("Created control FIFO {:?}", path);
        }
    }
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// Bind the socket, replacing one stale path left by an earlier session
fn bind_socket(path: &Path) -> io::Result<UnixDatagram> {
    let socket = match UnixDatagram::bind(path) {
        Ok(socket) => socket,
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            debug!("Control socket path {:?} in use, unlinking", path);
            if let Err(e) = fs::remove_file(path) {
                warn!("Error unlinking stale control socket {:?}: {}", path, e);
            }
            UnixDatagram::bind(path)?
        }
        Err(e) => return Err(e),
    };
    socket.set_nonblocking(true)?;
    info!("Control socket bound at {:?}", path);
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fifo(path: &Path, text: &str) {
        let mut writer = OpenOptions::new().write(true).open(path).unwrap();
        writer.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_fifo_created_owner_only() {
        use std::os::unix::fs::{FileTypeExt, PermissionsExt};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let channel = ControlChannel::open(Some(path.clone()), None);
        assert!(channel.fifo_active());

        let meta = fs::metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_fifo_reopens_after_writer_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(path.clone()), None);
        channel.register(poll.registry()).unwrap();

        write_fifo(&path, "0 setstatustext first");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 setstatustext first"]);
        assert!(drained.error.is_none());
        assert!(channel.fifo_active());

        // a second writer still reaches the reopened FIFO
        write_fifo(&path, "0 setstatustext second");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 setstatustext second"]);
        assert!(channel.fifo_active());
    }

    #[test]
    fn test_fifo_empty_write_then_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(path.clone()), None);
        channel.register(poll.registry()).unwrap();

        write_fifo(&path, "");
        let drained = channel.service_fifo(poll.registry());
        assert!(drained.commands.is_empty());
        assert!(channel.fifo_active());

        write_fifo(&path, "0 quit");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);
    }

    #[test]
    fn test_fifo_rejects_oversized_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(path.clone()), None);
        channel.register(poll.registry()).unwrap();

        write_fifo(&path, &format!("{}\n", "x".repeat(CONTROL_BUFFER_SIZE + 10)));
        let drained = channel.service_fifo(poll.registry());
        assert!(drained.commands.is_empty());

        write_fifo(&path, &"y".repeat(CONTROL_BUFFER_SIZE - 1));
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands.len(), 1);
        assert_eq!(drained.commands[0].len(), CONTROL_BUFFER_SIZE - 1);
    }

    #[test]
    fn test_fifo_command_after_oversized_write_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(path.clone()), None);
        channel.register(poll.registry()).unwrap();

        // one writer fills the buffer, another sends a valid command
        write_fifo(&path, &"x".repeat(CONTROL_BUFFER_SIZE));
        write_fifo(&path, "0 quit");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);
    }

    #[test]
    fn test_fifo_overlong_line_dropped_through_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(path.clone()), None);
        channel.register(poll.registry()).unwrap();

        let text = format!(
            "0 setstatustext {}\n0 setstatustext ok\n",
            "x".repeat(CONTROL_BUFFER_SIZE + 50)
        );
        write_fifo(&path, &text);
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 setstatustext ok\n"]);
    }

    #[test]
    fn test_fifo_read_error_disables_only_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join(".awesome_so_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(None, Some(socket_path.clone()));
        channel.register(poll.registry()).unwrap();
        // reading a directory fails with EISDIR
        channel.set_fifo(File::open(dir.path()).unwrap());

        let drained = channel.service_fifo(poll.registry());
        assert!(drained.commands.is_empty());
        let error = drained.error.expect("read error is reported");
        assert_eq!(error.raw_os_error(), Some(libc::EISDIR));
        assert!(!channel.fifo_active());

        awesome_ipc::send_command(&socket_path, "0 quit").unwrap();
        let drained = channel.service_socket(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);
        assert!(channel.socket_active());
    }

    #[test]
    fn test_socket_delivers_datagrams_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_so_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(None, Some(path.clone()));
        channel.register(poll.registry()).unwrap();

        awesome_ipc::send_command(&path, "0 setstatustext a").unwrap();
        awesome_ipc::send_command(&path, "0 setstatustext b").unwrap();
        let drained = channel.service_socket(poll.registry());
        assert_eq!(drained.commands, vec!["0 setstatustext a", "0 setstatustext b"]);
    }

    #[test]
    fn test_socket_rejects_datagram_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_so_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(None, Some(path.clone()));
        channel.register(poll.registry()).unwrap();

        let sender = UnixDatagram::unbound().unwrap();
        sender.send_to(&[b'x'; CONTROL_BUFFER_SIZE], &path).unwrap();
        sender.send_to(&[b'y'; CONTROL_BUFFER_SIZE - 1], &path).unwrap();

        let drained = channel.service_socket(poll.registry());
        assert_eq!(drained.commands.len(), 1);
        assert!(drained.commands[0].starts_with('y'));
        assert!(channel.socket_active());
    }

    #[test]
    fn test_socket_rebinds_stale_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".awesome_so_ctl");
        // a previous session left its socket file behind
        drop(UnixDatagram::bind(&path).unwrap());
        assert!(path.exists());

        let mut channel = ControlChannel::open(None, Some(path.clone()));
        assert!(channel.socket_active());
        awesome_ipc::send_command(&path, "0 quit").unwrap();
        let poll = mio::Poll::new().unwrap();
        let drained = channel.service_socket(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);

        channel.close();
        assert!(!path.exists());
    }

    #[test]
    fn test_unremovable_stale_path_disables_socket() {
        let dir = tempfile::tempdir().unwrap();
        let fifo_path = dir.path().join(".awesome_ctl");
        // occupied by something unlink cannot remove, even for root
        let socket_path = dir.path().join(".awesome_so_ctl");
        fs::create_dir(&socket_path).unwrap();
        fs::write(socket_path.join("keep"), b"").unwrap();

        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(fifo_path.clone()), Some(socket_path.clone()));
        channel.register(poll.registry()).unwrap();

        assert!(!channel.socket_active());
        assert!(socket_path.is_dir());
        assert!(channel.fifo_active());

        write_fifo(&fifo_path, "0 quit");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);
    }

    #[test]
    fn test_read_only_dir_with_stale_socket_disables_socket() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sockets = dir.path().join("run");
        fs::create_dir(&sockets).unwrap();
        let socket_path = sockets.join(".awesome_so_ctl");
        drop(UnixDatagram::bind(&socket_path).unwrap());
        fs::set_permissions(&sockets, fs::Permissions::from_mode(0o500)).unwrap();

        // permission bits do not bind a privileged user
        if fs::write(sockets.join("write-check"), b"").is_ok() {
            fs::set_permissions(&sockets, fs::Permissions::from_mode(0o700)).unwrap();
            return;
        }

        let fifo_path = dir.path().join(".awesome_ctl");
        let channel = ControlChannel::open(Some(fifo_path), Some(socket_path.clone()));
        assert!(!channel.socket_active());
        assert!(channel.fifo_active());
        assert!(socket_path.exists());

        fs::set_permissions(&sockets, fs::Permissions::from_mode(0o700)).unwrap();
    }

    #[test]
    fn test_bad_socket_path_leaves_fifo_working() {
        let dir = tempfile::tempdir().unwrap();
        let fifo_path = dir.path().join(".awesome_ctl");
        let socket_path = dir.path().join("missing").join(".awesome_so_ctl");
        let poll = mio::Poll::new().unwrap();
        let mut channel = ControlChannel::open(Some(fifo_path.clone()), Some(socket_path));
        channel.register(poll.registry()).unwrap();

        assert!(!channel.socket_active());
        assert!(channel.fifo_active());

        write_fifo(&fifo_path, "0 quit");
        let drained = channel.service_fifo(poll.registry());
        assert_eq!(drained.commands, vec!["0 quit"]);
    }
}
