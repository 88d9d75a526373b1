//! Events Module
//!
//! Display events as the session sees them, and the dispatch table that maps
//! protocol event codes to handlers. The table is sized once, after extension
//! probing, to cover the core codes and the SHAPE/RANDR codes the server
//! assigned. Codes without a handler are dropped.

use tracing::{debug, trace};
use x11rb::protocol::xproto;

use crate::error::{ProtocolError, Result};
use crate::shared::WmState;
use crate::wm::Session;
use crate::wm::backend::{Backend, Capabilities, WindowId};
use crate::wm::{layout, uicb};

/// One past the highest core protocol event code
pub const LAST_EVENT: usize = 36;

/// Event plus the protocol code it arrived with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEvent {
    pub code: u8,
    pub event: Event,
}

impl DisplayEvent {
    pub fn new(code: u8, event: Event) -> Self {
        Self { code, event }
    }
}

/// A configure request as the client sent it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigureRequest {
    pub window: WindowId,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u16,
    pub sibling: WindowId,
    pub stack_mode: xproto::StackMode,
    /// Which of the fields above the client asked for
    pub value_mask: u16,
}

impl ConfigureRequest {
    pub fn has(&self, field: xproto::ConfigWindow) -> bool {
        self.value_mask & u16::from(field) != 0
    }
}

/// Which property changed on a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    TransientFor,
    Name,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ButtonPress {
        window: WindowId,
        root: WindowId,
        button: u8,
        event_x: i32,
        event_y: i32,
    },
    KeyPress {
        root: WindowId,
        keysym: u32,
        state: u16,
    },
    ConfigureRequest(ConfigureRequest),
    ConfigureNotify {
        window: WindowId,
        width: u32,
        height: u32,
    },
    DestroyNotify {
        window: WindowId,
    },
    EnterNotify {
        window: WindowId,
        /// Normal crossing, not an inferior or grab transition
        normal: bool,
    },
    LeaveNotify {
        window: WindowId,
        same_screen: bool,
    },
    Expose {
        window: WindowId,
        count: u16,
    },
    MappingNotify {
        keyboard: bool,
    },
    MapRequest {
        window: WindowId,
        parent: WindowId,
    },
    PropertyNotify {
        window: WindowId,
        kind: PropertyKind,
        deleted: bool,
    },
    UnmapNotify {
        window: WindowId,
    },
    ShapeNotify {
        window: WindowId,
        bounding: bool,
    },
    ScreenChange {
        root: WindowId,
        width: u32,
        height: u32,
    },
    /// Asynchronous protocol error
    Error(ProtocolError),
    Other,
}

pub type Handler<B> = fn(&mut Session<B>, &Event) -> Result<()>;

/// Event code to handler mapping, fixed for the session lifetime
pub struct EventTable<B: Backend> {
    handlers: Box<[Option<Handler<B>>]>,
}

impl<B: Backend> EventTable<B> {
    pub fn new(capabilities: &Capabilities) -> Self {
        let size = [capabilities.shape_event, capabilities.randr_event]
            .into_iter()
            .flatten()
            .map(|code| usize::from(code) + 1)
            .fold(LAST_EVENT, usize::max);

        let mut handlers: Vec<Option<Handler<B>>> = vec![None; size];
        let core: [(u8, Handler<B>); 12] = [
            (xproto::BUTTON_PRESS_EVENT, handle_button_press),
            (xproto::CONFIGURE_REQUEST_EVENT, handle_configure_request),
            (xproto::CONFIGURE_NOTIFY_EVENT, handle_configure_notify),
            (xproto::DESTROY_NOTIFY_EVENT, handle_destroy_notify),
            (xproto::ENTER_NOTIFY_EVENT, handle_enter_notify),
            (xproto::LEAVE_NOTIFY_EVENT, handle_leave_notify),
            (xproto::EXPOSE_EVENT, handle_expose),
            (xproto::KEY_PRESS_EVENT, handle_key_press),
            (xproto::MAPPING_NOTIFY_EVENT, handle_mapping_notify),
            (xproto::MAP_REQUEST_EVENT, handle_map_request),
            (xproto::PROPERTY_NOTIFY_EVENT, handle_property_notify),
            (xproto::UNMAP_NOTIFY_EVENT, handle_unmap_notify),
        ];
        for (code, handler) in core {
            handlers[usize::from(code)] = Some(handler);
        }
        if let Some(code) = capabilities.shape_event {
            handlers[usize::from(code)] = Some(handle_shape_notify);
        }
        if let Some(code) = capabilities.randr_event {
            handlers[usize::from(code)] = Some(handle_screen_change);
        }

        debug!("Event table built with {} slots", size);
        Self {
            handlers: handlers.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handler(&self, code: u8) -> Option<Handler<B>> {
        self.handlers.get(usize::from(code)).copied().flatten()
    }

    /// Run the handler for an event. Returns false when the code has none.
    pub fn dispatch(&self, session: &mut Session<B>, event: &DisplayEvent) -> Result<bool> {
        match self.handler(event.code) {
            Some(handler) => {
                handler(session, &event.event)?;
                Ok(true)
            }
            None => {
                trace!("No handler for event code {}", event.code);
                Ok(false)
            }
        }
    }
}

fn handle_button_press<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::ButtonPress {
        window,
        root,
        button,
        event_x,
        ..
    } = *event
    else {
        return Ok(());
    };

    if let Some(screen) = session.screen_of_bar(window) {
        let tag = session.screens[screen]
            .statusbar
            .as_ref()
            .and_then(|bar| bar.tag_at(event_x));
        if let Some(tag) = tag
            && button == 1
        {
            session.screens[screen].view_tag(tag);
            return session.arrange(screen);
        }
        return Ok(());
    }

    if let Some(client) = session.clients.get(window) {
        let screen = client.screen;
        session.focus(Some(window), screen)?;
        return session.backend.raise_window(window);
    }

    if window == root {
        debug!("Button {} on root window {}", button, root);
    }
    Ok(())
}

fn handle_configure_request<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::ConfigureRequest(request) = event else {
        return Ok(());
    };

    let Some(client) = session.clients.get(request.window) else {
        return session.backend.apply_configure_request(request);
    };

    let floating_layout = session
        .screens
        .get(client.screen)
        .is_some_and(|s| s.layout().kind == crate::config::LayoutKind::Floating);

    if client.floating || floating_layout {
        let mut geometry = client.geometry;
        if request.has(xproto::ConfigWindow::X) {
            geometry.x = request.x;
        }
        if request.has(xproto::ConfigWindow::Y) {
            geometry.y = request.y;
        }
        if request.has(xproto::ConfigWindow::WIDTH) {
            geometry.width = request.width;
        }
        if request.has(xproto::ConfigWindow::HEIGHT) {
            geometry.height = request.height;
        }
        if let Some(config) = session.screens.get(client.screen) {
            geometry = layout::snap_to_area(
                geometry,
                client.border_width,
                config.workarea(),
                config.general.snap,
            );
        }
        let window = request.window;
        let visible = session.is_visible(window);
        if let Some(client) = session.clients.get_mut(window) {
            client.geometry = geometry;
        }
        if visible {
            session.resize(window, geometry)?;
        }
        Ok(())
    } else {
        // tiled clients keep the geometry the layout gave them
        let (geometry, border) = (client.geometry, client.border_width);
        session
            .backend
            .send_configure_notify(request.window, geometry, border)
    }
}

fn handle_configure_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::ConfigureNotify {
        window,
        width,
        height,
    } = *event
    else {
        return Ok(());
    };
    match session.phys_of_root(window) {
        Some(phys) => session.resize_phys_screen(phys, width, height),
        None => Ok(()),
    }
}

fn handle_destroy_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::DestroyNotify { window } = *event else {
        return Ok(());
    };
    session.unmanage(window, WmState::Withdrawn)
}

fn handle_enter_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::EnterNotify { window, normal } = *event else {
        return Ok(());
    };
    if !normal {
        return Ok(());
    }
    match session.clients.get(window) {
        Some(client) => {
            let screen = client.screen;
            session.focus(Some(window), screen)
        }
        None => Ok(()),
    }
}

fn handle_leave_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::LeaveNotify {
        window,
        same_screen,
    } = *event
    else {
        return Ok(());
    };
    if same_screen {
        return Ok(());
    }
    match session.phys_of_root(window) {
        Some(phys) => session.unfocus(session.first_screen_of(phys)),
        None => Ok(()),
    }
}

fn handle_expose<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::Expose { window, count } = *event else {
        return Ok(());
    };
    if count != 0 {
        return Ok(());
    }
    match session.screen_of_bar(window) {
        Some(screen) => session.draw_statusbar(screen),
        None => Ok(()),
    }
}

fn handle_key_press<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::KeyPress {
        root,
        keysym,
        state,
    } = *event
    else {
        return Ok(());
    };
    let Some(phys) = session.phys_of_root(root) else {
        return Ok(());
    };
    let screen = session
        .selected
        .and_then(|w| session.clients.get(w))
        .map(|c| c.screen)
        .filter(|s| session.screens.get(*s).is_some_and(|c| c.phys_screen == phys))
        .unwrap_or_else(|| session.first_screen_of(phys));

    let bindings: Vec<(String, Option<String>)> = session.screens[screen]
        .keys
        .iter()
        .filter(|k| k.matches(keysym, state))
        .map(|k| (k.command.clone(), k.arg.clone()))
        .collect();

    for (command, arg) in bindings {
        uicb::execute(session, screen, &command, arg.as_deref())?;
    }
    Ok(())
}

fn handle_mapping_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::MappingNotify { keyboard } = *event else {
        return Ok(());
    };
    if !keyboard {
        return Ok(());
    }
    session.backend.refresh_keyboard_mapping()?;
    for screen in &session.screens {
        session.backend.ungrab_keys(screen.phys_screen)?;
        session.backend.grab_keys(screen.phys_screen, &screen.keys)?;
    }
    Ok(())
}

fn handle_map_request<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::MapRequest { window, parent } = *event else {
        return Ok(());
    };
    let Some(attrs) = session.backend.window_attributes(window)? else {
        return Ok(());
    };
    if attrs.override_redirect || session.clients.contains(window) {
        return Ok(());
    }
    let phys = session.phys_of_root(parent).unwrap_or(0);
    let screen = session.screen_at(phys, attrs.geometry.x, attrs.geometry.y);
    session.manage(window, &attrs, screen)
}

fn handle_property_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::PropertyNotify {
        window,
        kind,
        deleted,
    } = *event
    else {
        return Ok(());
    };
    if deleted {
        return Ok(());
    }
    let Some(screen) = session.clients.get(window).map(|c| c.screen) else {
        return Ok(());
    };

    match kind {
        PropertyKind::TransientFor => {
            let parent = session.backend.transient_for(window)?;
            let managed_parent = parent.is_some_and(|p| session.clients.contains(p));
            if let Some(client) = session.clients.get_mut(window) {
                client.transient_for = parent;
                if managed_parent {
                    client.floating = true;
                }
            }
            session.arrange(screen)
        }
        PropertyKind::Name => {
            let name = session.backend.window_name(window)?;
            if let Some(client) = session.clients.get_mut(window) {
                client.name = name;
            }
            session.draw_statusbar(screen)
        }
        PropertyKind::Other => Ok(()),
    }
}

fn handle_unmap_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::UnmapNotify { window } = *event else {
        return Ok(());
    };
    session.unmanage(window, WmState::Withdrawn)
}

fn handle_shape_notify<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::ShapeNotify { window, bounding } = *event else {
        return Ok(());
    };
    if bounding && session.clients.contains(window) {
        session.backend.apply_shape(window)?;
    }
    Ok(())
}

fn handle_screen_change<B: Backend>(session: &mut Session<B>, event: &Event) -> Result<()> {
    let Event::ScreenChange {
        root,
        width,
        height,
    } = *event
    else {
        return Ok(());
    };
    match session.phys_of_root(root) {
        Some(phys) => session.resize_phys_screen(phys, width, height),
        None => Ok(()),
    }
}
