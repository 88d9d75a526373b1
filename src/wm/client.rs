//! Managed clients
//!
//! A client is an adopted top-level window. The list is owned by the session
//! and shared by every screen; per-screen views are filters over it.

use tracing::{debug, info};

use crate::error::Result;
use crate::shared::{Geometry, WmState};
use crate::wm::Session;
use crate::wm::backend::{Backend, WindowAttributes, WindowId};

#[derive(Debug, Clone)]
pub struct Client {
    pub window: WindowId,
    /// Logical screen index
    pub screen: usize,
    /// Geometry the client has when shown
    pub geometry: Geometry,
    pub border_width: u16,
    pub transient_for: Option<WindowId>,
    /// Tag membership, parallel to the screen's tag list
    pub tags: Vec<bool>,
    pub floating: bool,
    pub name: String,
    /// Moved off-screen because none of its tags is selected
    pub banned: bool,
}

impl Client {
    pub fn is_visible(&self, selected_tags: &[bool]) -> bool {
        self.tags
            .iter()
            .zip(selected_tags)
            .any(|(&tagged, &selected)| tagged && selected)
    }
}

/// The session's client list, newest first.
///
/// A window appears at most once.
#[derive(Debug, Default)]
pub struct ClientList {
    clients: Vec<Client>,
}

impl ClientList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.clients.iter().any(|c| c.window == window)
    }

    /// Insert at the head; refuses a window that is already listed
    pub fn insert(&mut self, client: Client) -> bool {
        if self.contains(client.window) {
            return false;
        }
        self.clients.insert(0, client);
        true
    }

    pub fn remove(&mut self, window: WindowId) -> Option<Client> {
        let index = self.clients.iter().position(|c| c.window == window)?;
        Some(self.clients.remove(index))
    }

    pub fn get(&self, window: WindowId) -> Option<&Client> {
        self.clients.iter().find(|c| c.window == window)
    }

    pub fn get_mut(&mut self, window: WindowId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.window == window)
    }

    pub fn first(&self) -> Option<&Client> {
        self.clients.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter()
    }

    pub fn on_screen(&self, screen: usize) -> impl Iterator<Item = &Client> {
        self.clients.iter().filter(move |c| c.screen == screen)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl<B: Backend> Session<B> {
    /// Adopt a window on a logical screen.
    ///
    /// A window already in the list is left alone.
    pub fn manage(&mut self, window: WindowId, attrs: &WindowAttributes, screen: usize) -> Result<()> {
        if self.clients.contains(window) {
            debug!("Window {} is already managed", window);
            return Ok(());
        }
        let Some(config) = self.screens.get(screen) else {
            return Ok(());
        };

        let transient_for = self.backend.transient_for(window)?;
        let name = self.backend.window_name(window)?;
        let identity = format!("{}:{}", self.backend.window_identity(window)?, name);

        let mut screen = screen;
        let mut floating = transient_for.is_some();
        let mut tags = vec![false; config.tags.len()];

        match transient_for.and_then(|parent| self.clients.get(parent)) {
            Some(parent) => {
                screen = parent.screen;
                tags = parent.tags.clone();
            }
            None => {
                for rule in config.rules.iter().filter(|r| r.pattern.is_match(&identity)) {
                    floating |= rule.floating;
                    for (i, tag) in config.tags.iter().enumerate() {
                        if rule.tags.iter().any(|t| *t == tag.name) {
                            tags[i] = true;
                        }
                    }
                }
                if !tags.contains(&true) {
                    tags = config.tags.iter().map(|t| t.selected).collect();
                }
            }
        }

        let (border_width, normal_border) = match self.screens.get(screen) {
            Some(config) => (config.general.border_width, config.colors.normal_border),
            None => return Ok(()),
        };

        info!("Managing window {} ({:?}) on screen {}", window, identity, screen);

        self.backend.select_client_input(window)?;
        self.backend.set_border_color(window, normal_border)?;
        self.backend.configure_window(window, attrs.geometry, border_width)?;
        self.backend.set_wm_state(window, WmState::Normal)?;

        self.clients.insert(Client {
            window,
            screen,
            geometry: attrs.geometry,
            border_width,
            transient_for,
            tags,
            floating,
            name,
            banned: false,
        });

        self.backend.map_window(window)?;
        self.arrange(screen)?;

        let visible = self.is_visible(window);
        if visible {
            self.focus(Some(window), screen)?;
        }
        Ok(())
    }

    /// Release a client and leave `state` on its window
    pub fn unmanage(&mut self, window: WindowId, state: WmState) -> Result<()> {
        let Some(client) = self.clients.remove(window) else {
            return Ok(());
        };
        info!("Unmanaging window {}", window);

        if self.selected == Some(window) {
            self.selected = None;
        }
        self.backend.set_wm_state(window, state)?;
        self.arrange(client.screen)
    }

    /// Move a client off-screen, keeping its geometry
    pub fn ban(&mut self, window: WindowId) -> Result<()> {
        let Some(client) = self.clients.get(window) else {
            return Ok(());
        };
        if client.banned {
            return Ok(());
        }
        let screen_width = self
            .screens
            .get(client.screen)
            .map_or(0, |s| s.geometry.width);
        let mut hidden = client.geometry;
        hidden.x += 2 * screen_width as i32;
        let border = client.border_width;

        self.backend.configure_window(window, hidden, border)?;
        if let Some(client) = self.clients.get_mut(window) {
            client.banned = true;
        }
        Ok(())
    }

    /// Bring a banned client back to its geometry
    pub fn unban(&mut self, window: WindowId) -> Result<()> {
        let Some(client) = self.clients.get(window) else {
            return Ok(());
        };
        if !client.banned {
            return Ok(());
        }
        let (geometry, border) = (client.geometry, client.border_width);
        self.backend.configure_window(window, geometry, border)?;
        if let Some(client) = self.clients.get_mut(window) {
            client.banned = false;
        }
        Ok(())
    }

    /// Set a client's geometry and tell it
    pub fn resize(&mut self, window: WindowId, geometry: Geometry) -> Result<()> {
        let Some(client) = self.clients.get_mut(window) else {
            return Ok(());
        };
        client.geometry = geometry;
        let border = client.border_width;
        self.backend.configure_window(window, geometry, border)?;
        self.backend.send_configure_notify(window, geometry, border)
    }

    /// Focus a client, or the first visible client of `screen` when `None`
    pub fn focus(&mut self, window: Option<WindowId>, screen: usize) -> Result<()> {
        let target = window.or_else(|| self.first_visible(screen));

        if let Some(previous) = self.selected.filter(|p| Some(*p) != target)
            && let Some(client) = self.clients.get(previous)
            && let Some(config) = self.screens.get(client.screen)
        {
            let pixel = config.colors.normal_border;
            let old_screen = client.screen;
            self.backend.set_border_color(previous, pixel)?;
            self.selected = None;
            if old_screen != screen {
                self.draw_statusbar(old_screen)?;
            }
        }

        match target.and_then(|w| self.clients.get(w)) {
            Some(client) => {
                let window = client.window;
                let client_screen = client.screen;
                if let Some(config) = self.screens.get(client_screen) {
                    let pixel = config.colors.focus_border;
                    self.backend.set_border_color(window, pixel)?;
                }
                self.selected = Some(window);
                self.backend.set_input_focus(Some(window))?;
                self.draw_statusbar(client_screen)?;
            }
            None => {
                self.selected = None;
                self.backend.set_input_focus(None)?;
                self.draw_statusbar(screen)?;
            }
        }
        Ok(())
    }

    /// Ask the selected client to close
    pub fn kill_selected(&mut self) -> Result<()> {
        match self.selected {
            Some(window) => self.backend.close_window(window),
            None => Ok(()),
        }
    }

    pub fn is_visible(&self, window: WindowId) -> bool {
        let Some(client) = self.clients.get(window) else {
            return false;
        };
        self.screens
            .get(client.screen)
            .is_some_and(|config| client.is_visible(&config.selected_tags()))
    }

    fn first_visible(&self, screen: usize) -> Option<WindowId> {
        self.clients
            .on_screen(screen)
            .map(|c| c.window)
            .find(|w| self.is_visible(*w))
    }

    /// Visible clients of a screen, in list order
    pub fn visible_on(&self, screen: usize) -> Vec<WindowId> {
        self.clients
            .on_screen(screen)
            .map(|c| c.window)
            .filter(|w| self.is_visible(*w))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(window: WindowId) -> Client {
        Client {
            window,
            screen: 0,
            geometry: Geometry::new(0, 0, 100, 100),
            border_width: 1,
            transient_for: None,
            tags: vec![true, false],
            floating: false,
            name: String::new(),
            banned: false,
        }
    }

    #[test]
    fn test_insert_refuses_duplicates() {
        let mut list = ClientList::new();
        assert!(list.insert(client(1)));
        assert!(list.insert(client(2)));
        assert!(!list.insert(client(1)));
        assert_eq!(list.len(), 2);
        // newest first
        assert_eq!(list.first().map(|c| c.window), Some(2));
    }

    #[test]
    fn test_remove() {
        let mut list = ClientList::new();
        list.insert(client(1));
        assert!(list.remove(1).is_some());
        assert!(list.remove(1).is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn test_visibility_follows_selected_tags() {
        let c = client(1);
        assert!(c.is_visible(&[true, false]));
        assert!(c.is_visible(&[true, true]));
        assert!(!c.is_visible(&[false, true]));
    }
}
