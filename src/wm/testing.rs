//! In-memory backend for session tests

use std::collections::{HashMap, VecDeque};
use std::os::fd::AsRawFd;
use std::os::unix::io::RawFd;
use std::os::unix::net::UnixDatagram;

use crate::config::Config;
use crate::error::{Result, WmError};
use crate::shared::{Geometry, WmState};
use crate::wm::Session;
use crate::wm::backend::{
    Backend, BarCell, BarResources, Capabilities, Cursors, FontInfo, ScreenArea, WindowAttributes,
    WindowId,
};
use crate::wm::events::{ConfigureRequest, DisplayEvent};
use crate::wm::keyboard::KeyBinding;

const ROOT_BASE: WindowId = 0x100_0000;

/// Records every call as a line of text
pub struct FakeBackend {
    pub areas: Vec<ScreenArea>,
    pub phys_screens: usize,
    pub capabilities: Capabilities,
    /// Another client holds the roots
    pub root_owned: bool,
    windows: Vec<(WindowId, WindowAttributes)>,
    transients: HashMap<WindowId, WindowId>,
    states: HashMap<WindowId, WmState>,
    events: VecDeque<DisplayEvent>,
    calls: Vec<String>,
    next_id: u32,
    // never readable; stands in for the display connection
    wake: (UnixDatagram, UnixDatagram),
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::with_screens(1)
    }

    /// `count` X screens of 1280x1024
    pub fn with_screens(count: usize) -> Self {
        let areas = (0..count)
            .map(|phys_screen| ScreenArea {
                phys_screen,
                geometry: Geometry::new(0, 0, 1280, 1024),
            })
            .collect();
        Self::build(areas, count)
    }

    /// One X screen split into monitors
    pub fn with_monitors(monitors: &[Geometry]) -> Self {
        let areas = monitors
            .iter()
            .map(|&geometry| ScreenArea {
                phys_screen: 0,
                geometry,
            })
            .collect();
        Self::build(areas, 1)
    }

    fn build(areas: Vec<ScreenArea>, phys_screens: usize) -> Self {
        Self {
            areas,
            phys_screens,
            capabilities: Capabilities::default(),
            root_owned: false,
            windows: Vec::new(),
            transients: HashMap::new(),
            states: HashMap::new(),
            events: VecDeque::new(),
            calls: Vec::new(),
            next_id: 1,
            wake: UnixDatagram::pair().unwrap(),
        }
    }

    /// Add a top-level window to the first root, above the existing ones
    pub fn add_window(&mut self, window: WindowId, attrs: WindowAttributes) {
        self.windows.push((window, attrs));
    }

    pub fn set_transient(&mut self, window: WindowId, parent: WindowId) {
        self.transients.insert(window, parent);
    }

    pub fn set_wm_state_raw(&mut self, window: WindowId, state: WmState) {
        self.states.insert(window, state);
    }

    pub fn queue_event(&mut self, event: DisplayEvent) {
        self.events.push_back(event);
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn log(&mut self, call: String) {
        self.calls.push(call);
    }

    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// A bootstrapped session on `backend` with the default configuration
pub fn session_with(backend: FakeBackend) -> Session<FakeBackend> {
    let mut session = Session::new(backend);
    session.bootstrap(&Config::default()).unwrap();
    session
}

impl Backend for FakeBackend {
    fn screen_count(&self) -> usize {
        self.phys_screens
    }

    fn root(&self, phys_screen: usize) -> WindowId {
        ROOT_BASE + phys_screen as WindowId
    }

    fn fd(&self) -> RawFd {
        self.wake.0.as_raw_fd()
    }

    fn claim_root(&mut self, phys_screen: usize) -> Result<()> {
        self.log(format!("claim_root {}", phys_screen));
        if self.root_owned {
            return Err(WmError::Protocol {
                request_code: x11rb::protocol::xproto::CHANGE_WINDOW_ATTRIBUTES_REQUEST,
                error_code: x11rb::protocol::xproto::ACCESS_ERROR,
            });
        }
        Ok(())
    }

    fn query_capabilities(&mut self) -> Result<Capabilities> {
        self.log("query_capabilities".to_string());
        Ok(self.capabilities)
    }

    fn screen_areas(&mut self) -> Result<Vec<ScreenArea>> {
        Ok(self.areas.clone())
    }

    fn create_cursors(&mut self) -> Result<Cursors> {
        self.log("create_cursors".to_string());
        Ok(Cursors {
            normal: self.id(),
            resize: self.id(),
            moving: self.id(),
        })
    }

    fn free_cursors(&mut self, cursors: &Cursors) -> Result<()> {
        self.log(format!("free_cursors {}", cursors.normal));
        Ok(())
    }

    fn select_root_input(&mut self, phys_screen: usize, _cursor: u32) -> Result<()> {
        self.log(format!("select_root_input {}", phys_screen));
        Ok(())
    }

    fn grab_keys(&mut self, phys_screen: usize, keys: &[KeyBinding]) -> Result<()> {
        self.log(format!("grab_keys {} {}", phys_screen, keys.len()));
        Ok(())
    }

    fn ungrab_keys(&mut self, phys_screen: usize) -> Result<()> {
        self.log(format!("ungrab_keys {}", phys_screen));
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        self.log("refresh_keyboard_mapping".to_string());
        Ok(())
    }

    fn advertise_supported(&mut self, phys_screen: usize) -> Result<()> {
        self.log(format!("advertise_supported {}", phys_screen));
        Ok(())
    }

    fn open_font(&mut self, name: &str) -> Result<FontInfo> {
        self.log(format!("open_font {}", name));
        Ok(FontInfo {
            id: self.id(),
            height: 14,
            ascent: 11,
        })
    }

    fn close_font(&mut self, font: u32) -> Result<()> {
        self.log(format!("close_font {}", font));
        Ok(())
    }

    fn text_width(&mut self, _font: u32, text: &str) -> Result<u32> {
        Ok(6 * text.chars().count() as u32)
    }

    fn create_statusbar(
        &mut self,
        phys_screen: usize,
        _geometry: Geometry,
        _cursor: u32,
    ) -> Result<BarResources> {
        self.log(format!("create_statusbar {}", phys_screen));
        Ok(BarResources {
            window: self.id(),
            drawable: self.id(),
            gc: self.id(),
        })
    }

    fn draw_statusbar(
        &mut self,
        bar: &BarResources,
        _geometry: Geometry,
        _font: &FontInfo,
        cells: &[BarCell],
    ) -> Result<()> {
        let status = cells.last().map(|c| c.text.as_str()).unwrap_or_default();
        self.log(format!("draw_statusbar {} {}", bar.window, status));
        Ok(())
    }

    fn destroy_statusbar(&mut self, bar: &BarResources) -> Result<()> {
        self.log(format!("destroy_statusbar {}", bar.window));
        Ok(())
    }

    fn children(&mut self, phys_screen: usize) -> Result<Vec<WindowId>> {
        if phys_screen != 0 {
            return Ok(Vec::new());
        }
        Ok(self.windows.iter().map(|(w, _)| *w).collect())
    }

    fn window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>> {
        Ok(self
            .windows
            .iter()
            .find(|(w, _)| *w == window)
            .map(|(_, a)| *a))
    }

    fn transient_for(&mut self, window: WindowId) -> Result<Option<WindowId>> {
        Ok(self.transients.get(&window).copied())
    }

    fn wm_state(&mut self, window: WindowId) -> Result<Option<WmState>> {
        Ok(self.states.get(&window).copied())
    }

    fn set_wm_state(&mut self, window: WindowId, state: WmState) -> Result<()> {
        self.log(format!("set_wm_state {} {:?}", window, state));
        self.states.insert(window, state);
        Ok(())
    }

    fn window_identity(&mut self, _window: WindowId) -> Result<String> {
        Ok("XTerm:xterm".to_string())
    }

    fn window_name(&mut self, window: WindowId) -> Result<String> {
        Ok(format!("window {}", window))
    }

    fn select_client_input(&mut self, window: WindowId) -> Result<()> {
        self.log(format!("select_client_input {}", window));
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.log(format!("map_window {}", window));
        Ok(())
    }

    fn configure_window(&mut self, window: WindowId, geometry: Geometry, border: u16) -> Result<()> {
        self.log(format!("configure_window {} {:?} {}", window, geometry, border));
        Ok(())
    }

    fn apply_configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        self.log(format!("apply_configure_request {}", request.window));
        Ok(())
    }

    fn send_configure_notify(&mut self, window: WindowId, _geometry: Geometry, _border: u16) -> Result<()> {
        self.log(format!("send_configure_notify {}", window));
        Ok(())
    }

    fn set_border_color(&mut self, window: WindowId, pixel: u32) -> Result<()> {
        self.log(format!("set_border_color {} {:06x}", window, pixel));
        Ok(())
    }

    fn raise_window(&mut self, window: WindowId) -> Result<()> {
        self.log(format!("raise_window {}", window));
        Ok(())
    }

    fn set_input_focus(&mut self, window: Option<WindowId>) -> Result<()> {
        match window {
            Some(window) => self.log(format!("set_input_focus {}", window)),
            None => self.log("set_input_focus PointerRoot".to_string()),
        }
        Ok(())
    }

    fn close_window(&mut self, window: WindowId) -> Result<()> {
        self.log(format!("close_window {}", window));
        Ok(())
    }

    fn apply_shape(&mut self, window: WindowId) -> Result<()> {
        self.log(format!("apply_shape {}", window));
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<DisplayEvent>> {
        Ok(self.events.pop_front())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.log("sync".to_string());
        Ok(())
    }
}
