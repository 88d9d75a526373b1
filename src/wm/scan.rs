//! Window discovery
//!
//! Adopts the windows that already exist when the session starts. Each root
//! is walked twice: ordinary windows first, transients second, so a transient
//! always finds its owner in the client list.

use tracing::{debug, info};

use crate::error::Result;
use crate::shared::WmState;
use crate::wm::Session;
use crate::wm::backend::{Backend, WindowAttributes, WindowId};

impl<B: Backend> Session<B> {
    pub fn scan(&mut self) -> Result<()> {
        for phys_screen in 0..self.backend.screen_count() {
            let children = self.backend.children(phys_screen)?;
            debug!("Scanning {} windows on X screen {}", children.len(), phys_screen);

            let mut transients = Vec::new();
            for &window in &children {
                let Some(attrs) = self.adoptable(window)? else {
                    continue;
                };
                if self.backend.transient_for(window)?.is_some() {
                    transients.push((window, attrs));
                    continue;
                }
                self.adopt(phys_screen, window, &attrs)?;
            }
            for (window, attrs) in transients {
                self.adopt(phys_screen, window, &attrs)?;
            }
        }
        info!("Scan done, {} clients", self.clients.len());
        Ok(())
    }

    /// Attributes of a window discovery should adopt
    fn adoptable(&mut self, window: WindowId) -> Result<Option<WindowAttributes>> {
        let Some(attrs) = self.backend.window_attributes(window)? else {
            return Ok(None);
        };
        if attrs.override_redirect {
            return Ok(None);
        }
        if attrs.viewable || self.backend.wm_state(window)? == Some(WmState::Iconic) {
            return Ok(Some(attrs));
        }
        Ok(None)
    }

    fn adopt(&mut self, phys_screen: usize, window: WindowId, attrs: &WindowAttributes) -> Result<()> {
        // only the first X screen is split into monitors
        let screen = if phys_screen == 0 {
            self.screen_at(phys_screen, attrs.geometry.x, attrs.geometry.y)
        } else {
            self.first_screen_of(phys_screen)
        };
        self.manage(window, attrs, screen)
    }
}
