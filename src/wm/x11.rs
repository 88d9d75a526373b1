//! X11 backend
//!
//! [`Backend`] on an x11rb `RustConnection`: root claiming, extension
//! probing, cursors, key grabs, status bar drawing, window properties and
//! event translation.

use std::os::unix::io::{AsRawFd, RawFd};

use tracing::{debug, info, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ReplyError;
use x11rb::protocol::Event as XEvent;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::error::{ProtocolError, Result, WmError};
use crate::shared::{Geometry, WmState};
use crate::wm::backend::{
    Backend, BarCell, BarResources, Capabilities, Cursors, FontId, FontInfo, ScreenArea,
    WindowAttributes, WindowId,
};
use crate::wm::events::{ConfigureRequest, DisplayEvent, Event, PropertyKind};
use crate::wm::keyboard::{KeyBinding, Modifiers};

/// Cursor font glyphs
const XC_LEFT_PTR: u16 = 68;
const XC_SIZING: u16 = 120;
const XC_FLEUR: u16 = 52;

/// Focus target that follows the pointer
const POINTER_ROOT: Window = 1;

/// Atoms the session reads or publishes
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub wm_state: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub net_supported: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
}

impl Atoms {
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            wm_state: intern("WM_STATE")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            net_supported: intern("_NET_SUPPORTED")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            utf8_string: intern("UTF8_STRING")?,
        })
    }

    /// Contents of `_NET_SUPPORTED`
    fn supported(&self) -> [Atom; 2] {
        [self.net_supported, self.net_wm_name]
    }
}

/// Keycode to keysym table
#[derive(Debug, Default)]
struct KeyboardMap {
    min_keycode: u8,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
}

impl KeyboardMap {
    fn load(conn: &RustConnection) -> Result<Self> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()?;
        Ok(Self {
            min_keycode: min,
            keysyms_per_keycode: usize::from(reply.keysyms_per_keycode),
            keysyms: reply.keysyms,
        })
    }

    /// Unshifted keysym of a keycode
    fn keysym(&self, keycode: u8) -> u32 {
        if keycode < self.min_keycode || self.keysyms_per_keycode == 0 {
            return 0;
        }
        let index = usize::from(keycode - self.min_keycode) * self.keysyms_per_keycode;
        self.keysyms.get(index).copied().unwrap_or(0)
    }

    fn keycodes(&self, keysym: u32) -> Vec<u8> {
        if self.keysyms_per_keycode == 0 {
            return Vec::new();
        }
        self.keysyms
            .chunks(self.keysyms_per_keycode)
            .enumerate()
            .filter(|(_, syms)| syms.contains(&keysym))
            .filter_map(|(i, _)| u8::try_from(i + usize::from(self.min_keycode)).ok())
            .collect()
    }
}

pub struct X11Backend {
    conn: RustConnection,
    atoms: Atoms,
    keyboard: KeyboardMap,
    capabilities: Capabilities,
    /// RandR 1.5 monitor requests are available
    randr_monitors: bool,
}

impl X11Backend {
    /// Connect to `display`, or to `$DISPLAY` when `None`
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, default_screen) = x11rb::connect(display)?;
        info!(
            "Connected to X server ({} screen(s), default {})",
            conn.setup().roots.len(),
            default_screen
        );
        let atoms = Atoms::new(&conn)?;
        let keyboard = KeyboardMap::load(&conn)?;
        Ok(Self {
            conn,
            atoms,
            keyboard,
            capabilities: Capabilities::default(),
            randr_monitors: false,
        })
    }

    fn screen(&self, phys_screen: usize) -> &Screen {
        let roots = &self.conn.setup().roots;
        &roots[phys_screen.min(roots.len() - 1)]
    }

    /// Read a property; `None` when the window is gone or the property unset
    fn property(&self, window: Window, property: Atom, type_: Atom, length: u32) -> Result<Option<GetPropertyReply>> {
        match self
            .conn
            .get_property(false, window, property, type_, 0, length)?
            .reply()
        {
            Ok(reply) if reply.type_ != NONE => Ok(Some(reply)),
            Ok(_) => Ok(None),
            Err(ReplyError::X11Error(e)) => {
                debug!("Property read on window {} failed: {:?}", window, e.error_kind);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn text_property(&self, window: Window, property: Atom, type_: Atom) -> Result<Option<String>> {
        Ok(self
            .property(window, property, type_, 1024)?
            .map(|reply| String::from_utf8_lossy(&reply.value).into_owned()))
    }

    fn monitors(&self) -> Result<Vec<Geometry>> {
        let root = self.screen(0).root;
        let reply = self.conn.randr_get_monitors(root, true)?.reply()?;
        Ok(reply
            .monitors
            .iter()
            .map(|m| {
                Geometry::new(
                    i32::from(m.x),
                    i32::from(m.y),
                    u32::from(m.width),
                    u32::from(m.height),
                )
            })
            .collect())
    }

    fn translate(&self, event: XEvent) -> DisplayEvent {
        let code = event.response_type();
        let event = match event {
            XEvent::Error(e) => Event::Error(ProtocolError::from(&e)),
            XEvent::ButtonPress(e) => Event::ButtonPress {
                window: e.event,
                root: e.root,
                button: e.detail,
                event_x: i32::from(e.event_x),
                event_y: i32::from(e.event_y),
            },
            XEvent::KeyPress(e) => Event::KeyPress {
                root: e.root,
                keysym: self.keyboard.keysym(e.detail),
                state: u16::from(e.state),
            },
            XEvent::ConfigureRequest(e) => Event::ConfigureRequest(ConfigureRequest {
                window: e.window,
                x: i32::from(e.x),
                y: i32::from(e.y),
                width: u32::from(e.width),
                height: u32::from(e.height),
                border_width: e.border_width,
                sibling: e.sibling,
                stack_mode: e.stack_mode,
                value_mask: u16::from(e.value_mask),
            }),
            XEvent::ConfigureNotify(e) => Event::ConfigureNotify {
                window: e.window,
                width: u32::from(e.width),
                height: u32::from(e.height),
            },
            XEvent::DestroyNotify(e) => Event::DestroyNotify { window: e.window },
            XEvent::EnterNotify(e) => Event::EnterNotify {
                window: e.event,
                normal: e.mode == NotifyMode::NORMAL && e.detail != NotifyDetail::INFERIOR,
            },
            XEvent::LeaveNotify(e) => Event::LeaveNotify {
                window: e.event,
                // bit 0 is focus, bit 1 same-screen
                same_screen: e.same_screen_focus & 0x02 != 0,
            },
            XEvent::Expose(e) => Event::Expose {
                window: e.window,
                count: e.count,
            },
            XEvent::MappingNotify(e) => Event::MappingNotify {
                keyboard: e.request != Mapping::POINTER,
            },
            XEvent::MapRequest(e) => Event::MapRequest {
                window: e.window,
                parent: e.parent,
            },
            XEvent::PropertyNotify(e) => {
                let kind = if e.atom == Atom::from(AtomEnum::WM_TRANSIENT_FOR) {
                    PropertyKind::TransientFor
                } else if e.atom == Atom::from(AtomEnum::WM_NAME) || e.atom == self.atoms.net_wm_name {
                    PropertyKind::Name
                } else {
                    PropertyKind::Other
                };
                Event::PropertyNotify {
                    window: e.window,
                    kind,
                    deleted: e.state == Property::DELETE,
                }
            }
            XEvent::UnmapNotify(e) => Event::UnmapNotify { window: e.window },
            XEvent::ShapeNotify(e) => Event::ShapeNotify {
                window: e.affected_window,
                bounding: e.shape_kind == shape::SK::BOUNDING,
            },
            XEvent::RandrScreenChangeNotify(e) => Event::ScreenChange {
                root: e.root,
                width: u32::from(e.width),
                height: u32::from(e.height),
            },
            _ => Event::Other,
        };
        DisplayEvent::new(code, event)
    }
}

impl Backend for X11Backend {
    fn screen_count(&self) -> usize {
        self.conn.setup().roots.len()
    }

    fn root(&self, phys_screen: usize) -> WindowId {
        self.screen(phys_screen).root
    }

    fn fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    fn claim_root(&mut self, phys_screen: usize) -> Result<()> {
        let root = self.screen(phys_screen).root;
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::SUBSTRUCTURE_REDIRECT);
        self.conn.change_window_attributes(root, &aux)?.check()?;
        Ok(())
    }

    fn query_capabilities(&mut self) -> Result<Capabilities> {
        let shape_event = self
            .conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .map(|info| info.first_event + shape::NOTIFY_EVENT);

        let randr_event = match self.conn.extension_information(randr::X11_EXTENSION_NAME)? {
            Some(info) => {
                let version = self.conn.randr_query_version(1, 5)?.reply()?;
                debug!("RandR {}.{}", version.major_version, version.minor_version);
                self.randr_monitors = supports_monitors(version.major_version, version.minor_version);
                for phys_screen in 0..self.screen_count() {
                    let root = self.screen(phys_screen).root;
                    self.conn
                        .randr_select_input(root, randr::NotifyMask::SCREEN_CHANGE)?;
                }
                Some(info.first_event + randr::SCREEN_CHANGE_NOTIFY_EVENT)
            }
            None => None,
        };

        self.capabilities = Capabilities {
            shape_event,
            randr_event,
        };
        Ok(self.capabilities)
    }

    fn screen_areas(&mut self) -> Result<Vec<ScreenArea>> {
        if self.screen_count() == 1 && self.randr_monitors {
            match self.monitors() {
                Ok(monitors) if monitors.len() > 1 => {
                    return Ok(monitors
                        .into_iter()
                        .map(|geometry| ScreenArea {
                            phys_screen: 0,
                            geometry,
                        })
                        .collect());
                }
                Ok(_) => {}
                Err(WmError::Reply(ReplyError::X11Error(e))) => {
                    warn!("RandR monitor query failed ({:?}), using the whole screen", e.error_kind);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((0..self.screen_count())
            .map(|phys_screen| {
                let screen = self.screen(phys_screen);
                ScreenArea {
                    phys_screen,
                    geometry: Geometry::new(
                        0,
                        0,
                        u32::from(screen.width_in_pixels),
                        u32::from(screen.height_in_pixels),
                    ),
                }
            })
            .collect())
    }

    fn create_cursors(&mut self) -> Result<Cursors> {
        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?;

        let create_cursor = |glyph: u16| -> Result<u32> {
            let cursor = self.conn.generate_id()?;
            self.conn.create_glyph_cursor(
                cursor,
                font,
                font,
                glyph,
                glyph + 1,
                0,
                0,
                0,
                0xffff,
                0xffff,
                0xffff,
            )?;
            Ok(cursor)
        };

        let cursors = Cursors {
            normal: create_cursor(XC_LEFT_PTR)?,
            resize: create_cursor(XC_SIZING)?,
            moving: create_cursor(XC_FLEUR)?,
        };
        self.conn.close_font(font)?;
        Ok(cursors)
    }

    fn free_cursors(&mut self, cursors: &Cursors) -> Result<()> {
        for cursor in [cursors.normal, cursors.resize, cursors.moving] {
            self.conn.free_cursor(cursor)?;
        }
        Ok(())
    }

    fn select_root_input(&mut self, phys_screen: usize, cursor: u32) -> Result<()> {
        let root = self.screen(phys_screen).root;
        let aux = ChangeWindowAttributesAux::new()
            .event_mask(root_event_mask())
            .cursor(cursor);
        self.conn.change_window_attributes(root, &aux)?;
        Ok(())
    }

    fn grab_keys(&mut self, phys_screen: usize, keys: &[KeyBinding]) -> Result<()> {
        let root = self.screen(phys_screen).root;
        let ignored = [
            Modifiers::empty(),
            Modifiers::LOCK,
            Modifiers::MOD2,
            Modifiers::IGNORED,
        ];
        for key in keys {
            for keycode in self.keyboard.keycodes(key.keysym) {
                for extra in ignored {
                    self.conn.grab_key(
                        true,
                        root,
                        ModMask::from((key.modifiers | extra).bits()),
                        keycode,
                        GrabMode::ASYNC,
                        GrabMode::ASYNC,
                    )?;
                }
            }
        }
        debug!("Grabbed {} key bindings on screen {}", keys.len(), phys_screen);
        Ok(())
    }

    fn ungrab_keys(&mut self, phys_screen: usize) -> Result<()> {
        let root = self.screen(phys_screen).root;
        self.conn.ungrab_key(Grab::ANY, root, ModMask::ANY)?;
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<()> {
        self.keyboard = KeyboardMap::load(&self.conn)?;
        Ok(())
    }

    fn advertise_supported(&mut self, phys_screen: usize) -> Result<()> {
        let root = self.screen(phys_screen).root;
        self.conn.change_property32(
            PropMode::REPLACE,
            root,
            self.atoms.net_supported,
            AtomEnum::ATOM,
            &self.atoms.supported(),
        )?;
        Ok(())
    }

    fn open_font(&mut self, name: &str) -> Result<FontInfo> {
        let font = self.conn.generate_id()?;
        if let Err(e) = self.conn.open_font(font, name.as_bytes())?.check() {
            warn!("Font {:?} unavailable ({}), falling back to fixed", name, e);
            self.conn.open_font(font, b"fixed")?.check()?;
        }
        let reply = self.conn.query_font(font)?.reply()?;
        let ascent = reply.font_ascent.max(0) as u16;
        let descent = reply.font_descent.max(0) as u16;
        Ok(FontInfo {
            id: font,
            height: ascent + descent,
            ascent,
        })
    }

    fn close_font(&mut self, font: FontId) -> Result<()> {
        self.conn.close_font(font)?;
        Ok(())
    }

    fn text_width(&mut self, font: FontId, text: &str) -> Result<u32> {
        if text.is_empty() {
            return Ok(0);
        }
        let chars: Vec<Char2b> = core_font_bytes(text)
            .into_iter()
            .map(|byte2| Char2b { byte1: 0, byte2 })
            .collect();
        let reply = self.conn.query_text_extents(font, &chars)?.reply()?;
        Ok(reply.overall_width.max(0) as u32)
    }

    fn create_statusbar(&mut self, phys_screen: usize, geometry: Geometry, cursor: u32) -> Result<BarResources> {
        let screen = self.screen(phys_screen);
        let (root, depth) = (screen.root, screen.root_depth);
        let pixmap_width = screen.width_in_pixels.max(geometry.width as u16);
        let height = geometry.height as u16;

        let window = self.conn.generate_id()?;
        let aux = CreateWindowAux::new()
            .override_redirect(1)
            .event_mask(EventMask::BUTTON_PRESS | EventMask::EXPOSURE)
            .cursor(cursor);
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width as u16,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;

        let drawable = self.conn.generate_id()?;
        self.conn
            .create_pixmap(depth, drawable, root, pixmap_width, height)?;
        let gc = self.conn.generate_id()?;
        self.conn
            .create_gc(gc, drawable, &CreateGCAux::new().graphics_exposures(0))?;

        self.conn.map_window(window)?;
        debug!("Status bar window {} on screen {}", window, phys_screen);
        Ok(BarResources {
            window,
            drawable,
            gc,
        })
    }

    fn draw_statusbar(&mut self, bar: &BarResources, geometry: Geometry, font: &FontInfo, cells: &[BarCell]) -> Result<()> {
        let height = geometry.height as u16;
        for cell in cells {
            self.conn.change_gc(bar.gc, &ChangeGCAux::new().foreground(cell.bg))?;
            self.conn.poly_fill_rectangle(
                bar.drawable,
                bar.gc,
                &[Rectangle {
                    x: cell.x,
                    y: 0,
                    width: cell.width,
                    height,
                }],
            )?;
            if cell.text.is_empty() {
                continue;
            }
            self.conn.change_gc(
                bar.gc,
                &ChangeGCAux::new().foreground(cell.fg).font(font.id),
            )?;
            let baseline = (height.saturating_sub(font.height) / 2 + font.ascent) as i16;
            let pad = (font.height / 2) as i16;
            self.conn.poly_text8(
                bar.drawable,
                bar.gc,
                cell.x.saturating_add(pad),
                baseline,
                &text_items(&cell.text),
            )?;
        }

        self.conn.configure_window(
            bar.window,
            &ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width)
                .height(geometry.height),
        )?;
        self.conn.copy_area(
            bar.drawable,
            bar.window,
            bar.gc,
            0,
            0,
            0,
            0,
            geometry.width as u16,
            height,
        )?;
        Ok(())
    }

    fn destroy_statusbar(&mut self, bar: &BarResources) -> Result<()> {
        self.conn.free_gc(bar.gc)?;
        self.conn.free_pixmap(bar.drawable)?;
        self.conn.destroy_window(bar.window)?;
        Ok(())
    }

    fn children(&mut self, phys_screen: usize) -> Result<Vec<WindowId>> {
        let root = self.screen(phys_screen).root;
        Ok(self.conn.query_tree(root)?.reply()?.children)
    }

    fn window_attributes(&mut self, window: WindowId) -> Result<Option<WindowAttributes>> {
        let attrs = match self.conn.get_window_attributes(window)?.reply() {
            Ok(attrs) => attrs,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let geometry = match self.conn.get_geometry(window)?.reply() {
            Ok(geometry) => geometry,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(WindowAttributes {
            geometry: Geometry::new(
                i32::from(geometry.x),
                i32::from(geometry.y),
                u32::from(geometry.width),
                u32::from(geometry.height),
            ),
            border_width: geometry.border_width,
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        }))
    }

    fn transient_for(&mut self, window: WindowId) -> Result<Option<WindowId>> {
        Ok(self
            .property(window, AtomEnum::WM_TRANSIENT_FOR.into(), AtomEnum::WINDOW.into(), 1)?
            .and_then(|reply| reply.value32().and_then(|mut v| v.next()))
            .filter(|&parent| parent != NONE))
    }

    fn wm_state(&mut self, window: WindowId) -> Result<Option<WmState>> {
        let state = self.atoms.wm_state;
        Ok(self
            .property(window, state, state, 2)?
            .and_then(|reply| reply.value32().and_then(|mut v| v.next()))
            .and_then(WmState::from_raw))
    }

    fn set_wm_state(&mut self, window: WindowId, state: WmState) -> Result<()> {
        let atom = self.atoms.wm_state;
        self.conn
            .change_property32(PropMode::REPLACE, window, atom, atom, &[state.to_raw(), NONE])?;
        Ok(())
    }

    fn window_identity(&mut self, window: WindowId) -> Result<String> {
        // WM_CLASS is "instance\0class\0"
        let raw = self
            .text_property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into())?
            .unwrap_or_default();
        let mut parts = raw.split('\0');
        let instance = parts.next().unwrap_or_default();
        let class = parts.next().unwrap_or_default();
        Ok(format!("{}:{}", class, instance))
    }

    fn window_name(&mut self, window: WindowId) -> Result<String> {
        if let Some(name) = self.text_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)? {
            return Ok(name);
        }
        Ok(self
            .text_property(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into())?
            .unwrap_or_default())
    }

    fn select_client_input(&mut self, window: WindowId) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().event_mask(
            EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY,
        );
        self.conn.change_window_attributes(window, &aux)?;
        if self.capabilities.have_shape() {
            self.conn.shape_select_input(window, true)?;
        }
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn configure_window(&mut self, window: WindowId, geometry: Geometry, border: u16) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(geometry.x)
            .y(geometry.y)
            .width(geometry.width)
            .height(geometry.height)
            .border_width(u32::from(border));
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn apply_configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        let mut aux = ConfigureWindowAux::new();
        if request.has(ConfigWindow::X) {
            aux = aux.x(request.x);
        }
        if request.has(ConfigWindow::Y) {
            aux = aux.y(request.y);
        }
        if request.has(ConfigWindow::WIDTH) {
            aux = aux.width(request.width);
        }
        if request.has(ConfigWindow::HEIGHT) {
            aux = aux.height(request.height);
        }
        if request.has(ConfigWindow::BORDER_WIDTH) {
            aux = aux.border_width(u32::from(request.border_width));
        }
        if request.has(ConfigWindow::SIBLING) {
            aux = aux.sibling(request.sibling);
        }
        if request.has(ConfigWindow::STACK_MODE) {
            aux = aux.stack_mode(request.stack_mode);
        }
        self.conn.configure_window(request.window, &aux)?;
        Ok(())
    }

    fn send_configure_notify(&mut self, window: WindowId, geometry: Geometry, border: u16) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: border,
            override_redirect: false,
        };
        self.conn
            .send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn set_border_color(&mut self, window: WindowId, pixel: u32) -> Result<()> {
        let aux = ChangeWindowAttributesAux::new().border_pixel(pixel);
        self.conn.change_window_attributes(window, &aux)?;
        Ok(())
    }

    fn raise_window(&mut self, window: WindowId) -> Result<()> {
        let aux = ConfigureWindowAux::new().stack_mode(StackMode::ABOVE);
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn set_input_focus(&mut self, window: Option<WindowId>) -> Result<()> {
        let target = window.unwrap_or(POINTER_ROOT);
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, target, CURRENT_TIME)?;
        Ok(())
    }

    fn close_window(&mut self, window: WindowId) -> Result<()> {
        let supports_delete = self
            .property(window, self.atoms.wm_protocols, AtomEnum::ATOM.into(), 64)?
            .and_then(|reply| reply.value32().map(|mut v| v.any(|a| a == self.atoms.wm_delete_window)))
            .unwrap_or(false);

        if supports_delete {
            let event = ClientMessageEvent::new(
                32,
                window,
                self.atoms.wm_protocols,
                [self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0],
            );
            self.conn
                .send_event(false, window, EventMask::NO_EVENT, event)?;
        } else {
            self.conn.kill_client(window)?;
        }
        Ok(())
    }

    fn apply_shape(&mut self, window: WindowId) -> Result<()> {
        let extents = match self.conn.shape_query_extents(window)?.reply() {
            Ok(extents) => extents,
            Err(ReplyError::X11Error(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if extents.bounding_shaped {
            debug!("Window {} has a bounding shape", window);
            self.conn.shape_combine(
                shape::SO::SET,
                shape::SK::BOUNDING,
                shape::SK::BOUNDING,
                window,
                0,
                0,
                window,
            )?;
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<DisplayEvent>> {
        Ok(self.conn.poll_for_event()?.map(|event| self.translate(event)))
    }

    fn flush(&mut self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.conn.sync()?;
        Ok(())
    }
}

/// Root window events: redirection, crossings, structure and properties.
///
/// ButtonPress is left out; only one client may select it on a window.
fn root_event_mask() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::ENTER_WINDOW
        | EventMask::LEAVE_WINDOW
        | EventMask::STRUCTURE_NOTIFY
        | EventMask::PROPERTY_CHANGE
}

/// `RRGetMonitors` arrived in RandR 1.5
fn supports_monitors(major: u32, minor: u32) -> bool {
    major > 1 || (major == 1 && minor >= 5)
}

/// Core fonts are indexed by single Latin-1 bytes; anything above U+00FF
/// becomes `?`
fn core_font_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Encode text as PolyText8 items of at most 254 bytes each
fn text_items(text: &str) -> Vec<u8> {
    let bytes = core_font_bytes(text);
    let mut items = Vec::with_capacity(bytes.len() + 2 * (bytes.len() / 254 + 1));
    for chunk in bytes.chunks(254) {
        items.push(chunk.len() as u8);
        items.push(0);
        items.extend_from_slice(chunk);
    }
    items
}
