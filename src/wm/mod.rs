//! Window Manager Module
//!
//! The session runtime: probe, bootstrap, window discovery, the event and
//! control dispatch loop, and teardown.

pub mod backend;
pub mod cleanup;
pub mod client;
pub mod control;
pub mod event_loop;
pub mod events;
pub mod keyboard;
pub mod layout;
pub mod scan;
pub mod screen;
pub mod startup;
pub mod statusbar;
pub mod uicb;
pub mod x11;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::shared::Geometry;
use crate::wm::backend::{Backend, Capabilities, WindowId};
use crate::wm::client::ClientList;
use crate::wm::control::ControlChannel;
use crate::wm::event_loop::EventLoop;
use crate::wm::screen::ScreenConfig;
use crate::wm::x11::X11Backend;

/// One window manager session.
///
/// Owns the screens, the client list shared by all of them, and the display
/// backend.
pub struct Session<B: Backend> {
    pub backend: B,
    pub screens: Vec<ScreenConfig>,
    pub clients: ClientList,
    pub selected: Option<WindowId>,
    pub capabilities: Capabilities,
    /// `DISPLAY` handed to spawned commands
    pub display: Option<String>,
    running: bool,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            screens: Vec::new(),
            clients: ClientList::new(),
            selected: None,
            capabilities: Capabilities::default(),
            display: None,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// X screen index of a root window
    pub fn phys_of_root(&self, root: WindowId) -> Option<usize> {
        (0..self.backend.screen_count()).find(|&phys| self.backend.root(phys) == root)
    }

    /// First logical screen on an X screen
    pub fn first_screen_of(&self, phys_screen: usize) -> usize {
        self.screens
            .iter()
            .position(|s| s.phys_screen == phys_screen)
            .unwrap_or(0)
    }

    /// Logical screen containing a point of an X screen; the first match wins
    pub fn screen_at(&self, phys_screen: usize, x: i32, y: i32) -> usize {
        self.screens
            .iter()
            .position(|s| s.phys_screen == phys_screen && s.geometry.contains(x, y))
            .unwrap_or_else(|| self.first_screen_of(phys_screen))
    }

    /// Logical screen whose status bar is `window`
    pub fn screen_of_bar(&self, window: WindowId) -> Option<usize> {
        self.screens.iter().position(|s| {
            s.statusbar
                .as_ref()
                .is_some_and(|bar| bar.resources.window == window)
        })
    }

    /// `DISPLAY` for commands started from a screen
    pub fn display_for(&self, screen: usize) -> Option<String> {
        let display = self.display.as_deref()?;
        let phys = self.screens.get(screen).map_or(0, |s| s.phys_screen);
        // host:display[.screen]
        let base = match display.rfind(':') {
            Some(colon) => match display[colon..].find('.') {
                Some(dot) => &display[..colon + dot],
                None => display,
            },
            None => display,
        };
        Some(format!("{}.{}", base, phys))
    }

    /// Drop the selection without picking another client
    pub fn unfocus(&mut self, screen: usize) -> Result<()> {
        if let Some(previous) = self.selected.take()
            && let Some(client) = self.clients.get(previous)
            && let Some(config) = self.screens.get(client.screen)
        {
            let pixel = config.colors.normal_border;
            self.backend.set_border_color(previous, pixel)?;
        }
        self.backend.set_input_focus(None)?;
        self.draw_statusbar(screen)
    }

    /// Follow a size change of an X screen that is not split into monitors
    pub fn resize_phys_screen(&mut self, phys_screen: usize, width: u32, height: u32) -> Result<()> {
        let logical: Vec<usize> = self
            .screens
            .iter()
            .enumerate()
            .filter(|(_, s)| s.phys_screen == phys_screen)
            .map(|(i, _)| i)
            .collect();
        let &[screen] = logical.as_slice() else {
            return Ok(());
        };
        let geometry = Geometry::new(0, 0, width, height);
        if self.screens[screen].geometry == geometry {
            return Ok(());
        }
        info!("Screen {} resized to {}x{}", screen, width, height);
        self.screens[screen].set_geometry(geometry);
        self.arrange(screen)
    }
}

/// Run a complete session on the X display named by `DISPLAY`
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let mut backend = X11Backend::connect(None)?;
    startup::probe(&mut backend)?;

    let config = Config::load(config_path)?;

    let mut session = Session::new(backend);
    session.display = std::env::var("DISPLAY").ok();
    session.bootstrap(&config)?;
    session.scan()?;
    session.backend.sync()?;

    let mut control = ControlChannel::open_default();
    let result = match EventLoop::new(&session.capabilities, session.backend.fd()) {
        Ok(mut event_loop) => event_loop.run(&mut session, &mut control),
        Err(e) => Err(e),
    };
    control.close();
    result?;

    session.teardown()?;
    info!("Session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{FakeBackend, session_with};

    #[test]
    fn test_screen_at_first_match_wins() {
        let backend = FakeBackend::with_monitors(&[
            Geometry::new(0, 0, 1280, 1024),
            // overlaps the first monitor
            Geometry::new(0, 0, 800, 600),
        ]);
        let session = session_with(backend);
        assert_eq!(session.screen_at(0, 10, 10), 0);
        assert_eq!(session.screen_at(0, 1000, 900), 0);
        assert_eq!(session.screen_at(0, -5, -5), 0);
    }

    #[test]
    fn test_display_for_screen() {
        let mut session = session_with(FakeBackend::with_screens(2));
        session.display = Some(":1".to_string());
        assert_eq!(session.display_for(1).as_deref(), Some(":1.1"));
        session.display = Some("host:0.0".to_string());
        assert_eq!(session.display_for(1).as_deref(), Some("host:0.1"));
        session.display = None;
        assert_eq!(session.display_for(0), None);
    }

    #[test]
    fn test_root_resize_updates_geometry() {
        let mut session = session_with(FakeBackend::new());
        let root = session.backend.root(0);
        let phys = session.phys_of_root(root).unwrap();
        session.resize_phys_screen(phys, 1920, 1080).unwrap();
        assert_eq!(session.screens[0].geometry, Geometry::new(0, 0, 1920, 1080));
        assert_eq!(session.screens[0].workarea().height, 1080 - 16);
    }
}
