//! Session teardown

use tracing::{debug, info};

use crate::error::Result;
use crate::shared::WmState;
use crate::wm::Session;
use crate::wm::backend::Backend;

impl<B: Backend> Session<B> {
    /// Release every client, then every screen's resources, then the session.
    ///
    /// Takes the session by value so nothing is released twice.
    pub fn teardown(mut self) -> Result<B> {
        info!("Tearing down session");

        for screen in 0..self.screens.len() {
            loop {
                let Some(window) = self.clients.on_screen(screen).next().map(|c| c.window) else {
                    break;
                };
                self.unban(window)?;
                self.unmanage(window, WmState::Normal)?;
            }
        }
        // clients on a screen index that no longer exists
        loop {
            let Some(window) = self.clients.first().map(|c| c.window) else {
                break;
            };
            self.unmanage(window, WmState::Normal)?;
        }

        let screens = std::mem::take(&mut self.screens);
        for screen in screens {
            screen.release(&mut self.backend)?;
        }

        self.backend.set_input_focus(None)?;
        self.backend.sync()?;
        self.selected = None;
        debug!("Teardown complete");

        Ok(self.backend)
    }
}

#[cfg(test)]
mod tests {
    use crate::shared::Geometry;
    use crate::wm::backend::WindowAttributes;
    use crate::wm::testing::{FakeBackend, session_with};

    fn count(calls: &[String], prefix: &str) -> usize {
        calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    #[test]
    fn test_teardown_with_no_clients() {
        let session = session_with(FakeBackend::with_screens(2));
        assert!(session.clients.is_empty());

        let backend = session.teardown().unwrap();
        let calls = backend.calls();
        assert_eq!(count(calls, "close_font"), 2);
        assert_eq!(count(calls, "ungrab_keys"), 2);
        assert_eq!(count(calls, "destroy_statusbar"), 2);
        assert_eq!(count(calls, "free_cursors"), 2);
        assert_eq!(calls.last().map(String::as_str), Some("sync"));
        assert!(calls.iter().any(|c| c == "set_input_focus PointerRoot"));
    }

    #[test]
    fn test_teardown_releases_clients_before_screens() {
        let mut backend = FakeBackend::new();
        for window in [1, 2, 3] {
            backend.add_window(window, WindowAttributes {
                geometry: Geometry::new(0, 0, 100, 100),
                border_width: 0,
                override_redirect: false,
                viewable: true,
            });
        }
        let mut session = session_with(backend);
        session.scan().unwrap();
        // hide everything so the clients are banned at teardown
        session.screens[0].view_tag(4);
        session.arrange(0).unwrap();
        assert_eq!(session.clients.len(), 3);

        let backend = session.teardown().unwrap();
        let calls = backend.calls();
        let last_normal = calls
            .iter()
            .rposition(|c| c.starts_with("set_wm_state") && c.ends_with("Normal"))
            .unwrap();
        let first_release = calls.iter().position(|c| c.starts_with("close_font")).unwrap();
        assert!(last_normal < first_release);
        assert_eq!(count(calls, "close_font"), 1);
    }
}
