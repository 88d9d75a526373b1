//! Display backend seam
//!
//! Every display-server operation the session performs goes through the
//! [`Backend`] trait. [`crate::wm::x11::X11Backend`] implements it on an x11rb
//! connection.

use std::os::unix::io::RawFd;

use crate::error::Result;
use crate::shared::{Geometry, WmState};
use crate::wm::events::{ConfigureRequest, DisplayEvent};
use crate::wm::keyboard::KeyBinding;

pub type WindowId = u32;
pub type FontId = u32;

/// An opened core font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontInfo {
    pub id: FontId,
    /// Ascent plus descent
    pub height: u16,
    pub ascent: u16,
}

/// Window attributes read during discovery and adoption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAttributes {
    pub geometry: Geometry,
    pub border_width: u16,
    pub override_redirect: bool,
    pub viewable: bool,
}

/// Optional protocol extensions and the event codes the server assigned them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub shape_event: Option<u8>,
    pub randr_event: Option<u8>,
}

impl Capabilities {
    pub fn have_shape(&self) -> bool {
        self.shape_event.is_some()
    }

    pub fn have_randr(&self) -> bool {
        self.randr_event.is_some()
    }
}

/// A logical screen: one monitor area and the X screen that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenArea {
    pub phys_screen: usize,
    pub geometry: Geometry,
}

/// The three cursors each screen installs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    pub normal: u32,
    pub resize: u32,
    pub moving: u32,
}

/// Server-side resources behind a status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarResources {
    pub window: WindowId,
    pub drawable: u32,
    pub gc: u32,
}

/// One text cell of the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarCell {
    pub text: String,
    pub x: i16,
    pub width: u16,
    pub fg: u32,
    pub bg: u32,
}

pub trait Backend {
    /// Number of X screens (roots)
    fn screen_count(&self) -> usize;

    /// Root window of an X screen
    fn root(&self, phys_screen: usize) -> WindowId;

    /// Descriptor the dispatch loop waits on for display input
    fn fd(&self) -> RawFd;

    /// Select the exclusive substructure-redirect class on a root window.
    ///
    /// Any protocol error means another client owns it.
    fn claim_root(&mut self, phys_screen: usize) -> Result<()>;

    fn query_capabilities(&mut self) -> Result<Capabilities>;

    /// Logical screens, in index order
    fn screen_areas(&mut self) -> Result<Vec<ScreenArea>>;

    fn create_cursors(&mut self) -> Result<Cursors>;
    fn free_cursors(&mut self, cursors: &Cursors) -> Result<()>;

    /// Install the root event mask and default cursor
    fn select_root_input(&mut self, phys_screen: usize, cursor: u32) -> Result<()>;

    fn grab_keys(&mut self, phys_screen: usize, keys: &[KeyBinding]) -> Result<()>;
    fn ungrab_keys(&mut self, phys_screen: usize) -> Result<()>;
    fn refresh_keyboard_mapping(&mut self) -> Result<()>;

    /// Publish the supported-capabilities atom list on a root window
    fn advertise_supported(&mut self, phys_screen: usize) -> Result<()>;

    /// Open a core font, falling back to `fixed` when `name` is unknown
    fn open_font(&mut self, name: &str) -> Result<FontInfo>;
    fn close_font(&mut self, font: FontId) -> Result<()>;
    fn text_width(&mut self, font: FontId, text: &str) -> Result<u32>;

    fn create_statusbar(
        &mut self,
        phys_screen: usize,
        geometry: Geometry,
        cursor: u32,
    ) -> Result<BarResources>;
    fn draw_statusbar(
        &mut self,
        bar: &BarResources,
        geometry: Geometry,
        font: &FontInfo,
        cells: &[BarCell],
    ) -> Result<()>;
    fn destroy_statusbar(&mut self, bar: &BarResources) -> Result<()>;

    /// Top-level windows of a root, bottom to top
    fn children(&mut self, phys_screen: usize) -> Result<Vec<WindowId>>;
    /// `None` when the window no longer exists
    fn window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>>;
    fn transient_for(&mut self, window: WindowId) -> Result<Option<WindowId>>;
    fn wm_state(&mut self, window: WindowId) -> Result<Option<WmState>>;
    fn set_wm_state(&mut self, window: WindowId, state: WmState) -> Result<()>;
    /// `class:instance:name` string rules are matched against
    fn window_identity(&mut self, window: WindowId) -> Result<String>;
    fn window_name(&mut self, window: WindowId) -> Result<String>;

    fn select_client_input(&mut self, window: WindowId) -> Result<()>;
    fn map_window(&mut self, window: WindowId) -> Result<()>;
    fn configure_window(&mut self, window: WindowId, geometry: Geometry, border: u16) -> Result<()>;
    fn apply_configure_request(&mut self, request: &ConfigureRequest) -> Result<()>;
    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry, border: u16) -> Result<()>;
    fn set_border_color(&mut self, window: WindowId, pixel: u32) -> Result<()>;
    fn raise_window(&mut self, window: WindowId) -> Result<()>;
    /// `None` gives focus back to the pointer root
    fn set_input_focus(&mut self, window: Option<WindowId>) -> Result<()>;
    fn close_window(&mut self, window: WindowId) -> Result<()>;
    fn apply_shape(&mut self, window: WindowId) -> Result<()>;

    /// Next queued display event, without blocking
    fn poll_event(&mut self) -> Result<Option<DisplayEvent>>;
    fn flush(&mut self) -> Result<()>;
    /// Round trip: every request sent so far has been processed
    fn sync(&mut self) -> Result<()>;
}
