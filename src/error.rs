//! Session error taxonomy and the tolerated protocol-error list.

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto;
use x11rb::x11_utils::X11Error;

#[derive(Debug, Error)]
pub enum WmError {
    #[error("cannot open display: {0}")]
    Connect(#[from] ConnectError),

    #[error("another window manager is already running (screen {screen})")]
    AnotherWmRunning { screen: usize },

    #[error("fatal error: request code={request_code}, error code={error_code}")]
    Protocol { request_code: u8, error_code: u8 },

    #[error("select failed: {0}")]
    Wait(#[source] std::io::Error),

    #[error("X connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("X reply error: {0}")]
    Reply(#[from] ReplyError),

    #[error("X reply or id error: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    #[error(transparent)]
    Config(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WmError>;

/// A protocol error reported asynchronously by the display server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolError {
    pub request_code: u8,
    pub error_code: u8,
}

/// Matches every request code
const ANY_REQUEST: Option<u8> = None;

/// Errors caused by requests racing a window's destruction.
static IGNORED_ERRORS: &[(Option<u8>, u8)] = &[
    (ANY_REQUEST, xproto::WINDOW_ERROR),
    (Some(xproto::SET_INPUT_FOCUS_REQUEST), xproto::MATCH_ERROR),
    (Some(xproto::POLY_TEXT8_REQUEST), xproto::DRAWABLE_ERROR),
    (Some(xproto::POLY_FILL_RECTANGLE_REQUEST), xproto::DRAWABLE_ERROR),
    (Some(xproto::POLY_SEGMENT_REQUEST), xproto::DRAWABLE_ERROR),
    (Some(xproto::CONFIGURE_WINDOW_REQUEST), xproto::MATCH_ERROR),
    (Some(xproto::GRAB_KEY_REQUEST), xproto::ACCESS_ERROR),
    (Some(xproto::COPY_AREA_REQUEST), xproto::DRAWABLE_ERROR),
];

impl ProtocolError {
    pub fn new(request_code: u8, error_code: u8) -> Self {
        Self {
            request_code,
            error_code,
        }
    }

    /// True when the error is on the tolerated list and must not end the session
    pub fn is_ignorable(&self) -> bool {
        IGNORED_ERRORS.contains(&(ANY_REQUEST, self.error_code))
            || IGNORED_ERRORS.contains(&(Some(self.request_code), self.error_code))
    }

    /// Pass tolerated errors, turn everything else into a fatal session error
    pub fn check(self) -> Result<()> {
        if self.is_ignorable() {
            return Ok(());
        }
        Err(WmError::Protocol {
            request_code: self.request_code,
            error_code: self.error_code,
        })
    }
}

impl From<&X11Error> for ProtocolError {
    fn from(error: &X11Error) -> Self {
        Self::new(error.major_opcode, error.error_code)
    }
}
