//! Dispatch loop
//!
//! Blocks on the display connection and the control endpoints with mio. Each
//! wake services the FIFO, then the socket, then drains every queued display
//! event. Sources are edge-triggered, so every source that woke us is read
//! until it would block.

use std::io;
use std::os::unix::io::RawFd;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info};

use crate::error::{Result, WmError};
use crate::wm::Session;
use crate::wm::backend::{Backend, Capabilities};
use crate::wm::control::{ControlChannel, Drained, FIFO_TOKEN, SOCKET_TOKEN};
use crate::wm::events::{Event, EventTable};
use crate::wm::uicb;

pub const DISPLAY_TOKEN: Token = Token(0);

/// Sources that were ready when the wait returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wake {
    pub fifo: bool,
    pub socket: bool,
    pub display: bool,
}

pub struct EventLoop<B: Backend> {
    poll: Poll,
    events: Events,
    table: EventTable<B>,
}

impl<B: Backend> EventLoop<B> {
    /// Build the event table and the wait set
    pub fn new(capabilities: &Capabilities, display_fd: RawFd) -> Result<Self> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&display_fd), DISPLAY_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(8),
            table: EventTable::new(capabilities),
        })
    }

    /// Run until a quit command stops the session
    pub fn run(&mut self, session: &mut Session<B>, control: &mut ControlChannel) -> Result<()> {
        control.register(self.poll.registry())?;

        // anything queued before the first wait
        self.drain_display(session)?;
        session.backend.flush()?;

        info!("Entering dispatch loop");
        while session.is_running() {
            let wake = self.wait()?;
            self.handle_wake(session, control, wake)?;
        }
        info!("Dispatch loop stopped");
        Ok(())
    }

    /// Block with no timeout until a source is readable
    fn wait(&mut self) -> Result<Wake> {
        loop {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WmError::Wait(e)),
            }
        }

        let mut wake = Wake::default();
        for event in self.events.iter() {
            match event.token() {
                FIFO_TOKEN => wake.fifo = true,
                SOCKET_TOKEN => wake.socket = true,
                DISPLAY_TOKEN => wake.display = true,
                _ => {}
            }
        }
        Ok(wake)
    }

    /// Service one wake: FIFO, then socket, then the display queue
    pub fn handle_wake(
        &mut self,
        session: &mut Session<B>,
        control: &mut ControlChannel,
        wake: Wake,
    ) -> Result<()> {
        if wake.fifo {
            let drained = control.service_fifo(self.poll.registry());
            apply(session, drained)?;
        }
        if wake.socket {
            let drained = control.service_socket(self.poll.registry());
            apply(session, drained)?;
        }
        // replies read by handlers can leave events queued without the fd
        // becoming readable again, so the queue is drained on every wake
        self.drain_display(session)?;
        session.backend.flush()
    }

    fn drain_display(&self, session: &mut Session<B>) -> Result<()> {
        while let Some(event) = session.backend.poll_event()? {
            if let Event::Error(error) = event.event {
                if error.is_ignorable() {
                    debug!(
                        "Ignoring protocol error: request code={}, error code={}",
                        error.request_code, error.error_code
                    );
                }
                error.check()?;
                continue;
            }
            self.table.dispatch(session, &event)?;
        }
        Ok(())
    }
}

/// Feed control text to the interpreter; a failed endpoint reports on screen 0
fn apply<B: Backend>(session: &mut Session<B>, drained: Drained) -> Result<()> {
    for text in &drained.commands {
        uicb::parse_control(session, text)?;
    }
    if let Some(e) = drained.error {
        session.set_status_text(0, &e.to_string())?;
    }
    Ok(())
}
