//! Startup
//!
//! The probe for a competing window manager and the per-screen bootstrap.

use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Result, WmError};
use crate::wm::Session;
use crate::wm::backend::Backend;
use crate::wm::screen::ScreenConfig;

/// Claim substructure redirection on every root window.
///
/// Nothing else has been allocated yet; any error here means the display
/// already has a window manager.
pub fn probe<B: Backend>(backend: &mut B) -> Result<()> {
    for phys_screen in 0..backend.screen_count() {
        if let Err(e) = backend.claim_root(phys_screen) {
            error!("awesome: another window manager is already running");
            debug!("Root claim on screen {} failed: {}", phys_screen, e);
            return Err(WmError::AnotherWmRunning {
                screen: phys_screen,
            });
        }
    }
    backend.sync()?;
    debug!("Root windows claimed on {} screen(s)", backend.screen_count());
    Ok(())
}

impl<B: Backend> Session<B> {
    /// Build every screen record and advertise what we support.
    ///
    /// Extensions are probed once and shared by all screens.
    pub fn bootstrap(&mut self, config: &Config) -> Result<()> {
        self.capabilities = self.backend.query_capabilities()?;
        info!(
            "Extensions: shape={:?} randr={:?}",
            self.capabilities.shape_event, self.capabilities.randr_event
        );

        let areas = self.backend.screen_areas()?;
        for (index, area) in areas.into_iter().enumerate() {
            let screen = ScreenConfig::setup(
                &mut self.backend,
                index,
                area,
                config.screen_settings(index),
                self.capabilities,
            )?;
            self.screens.push(screen);
        }

        for phys_screen in 0..self.backend.screen_count() {
            self.backend.advertise_supported(phys_screen)?;
        }
        for screen in 0..self.screens.len() {
            self.draw_statusbar(screen)?;
        }
        Ok(())
    }
}
