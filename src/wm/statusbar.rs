//! Status bar
//!
//! One override-redirect window per screen showing the tag names, the layout
//! symbol and a free-form status text set over the control channel.

use tracing::debug;

use crate::config::StatusbarPosition;
use crate::error::Result;
use crate::shared::Geometry;
use crate::wm::Session;
use crate::wm::backend::{Backend, BarCell, BarResources, FontInfo};
use crate::wm::screen::ScreenConfig;

/// Bytes reserved for the status text, terminator slot included
pub const STATUS_TEXT_CAPACITY: usize = 256;

/// Bounded status text: never longer than `STATUS_TEXT_CAPACITY - 1` bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusText(String);

impl StatusText {
    pub fn new(text: &str) -> Self {
        let mut status = Self::default();
        status.set(text);
        status
    }

    /// Replace the text, truncating on a character boundary
    pub fn set(&mut self, text: &str) {
        let mut end = text.len().min(STATUS_TEXT_CAPACITY - 1);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.0.clear();
        self.0.push_str(&text[..end]);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A tag cell's horizontal extent, kept for click hit-testing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    pub x: i32,
    pub width: u32,
}

#[derive(Debug)]
pub struct StatusBar {
    pub resources: BarResources,
    pub position: StatusbarPosition,
    pub geometry: Geometry,
    /// Tag cell extents from the last draw
    pub tag_spans: Vec<TagSpan>,
}

impl StatusBar {
    /// Bar rectangle for a screen area, or `None` when the bar is disabled
    pub fn placement(position: StatusbarPosition, area: Geometry, height: u16) -> Option<Geometry> {
        let height = u32::from(height);
        match position {
            StatusbarPosition::Off => None,
            StatusbarPosition::Top => Some(Geometry::new(area.x, area.y, area.width, height)),
            StatusbarPosition::Bottom => Some(Geometry::new(
                area.x,
                area.y + area.height.saturating_sub(height) as i32,
                area.width,
                height,
            )),
        }
    }

    /// Tag index under a bar-relative x coordinate
    pub fn tag_at(&self, x: i32) -> Option<usize> {
        self.tag_spans
            .iter()
            .position(|span| x >= span.x && i64::from(x) < i64::from(span.x) + i64::from(span.width))
    }
}

/// Height of a bar drawn with `font`
pub fn bar_height(font: &FontInfo) -> u16 {
    font.height.saturating_add(2)
}

/// Redraw the bar of one screen
pub fn draw<B: Backend>(backend: &mut B, screen: &mut ScreenConfig, selected_name: Option<&str>) -> Result<()> {
    let Some(bar) = screen.statusbar.as_ref() else {
        return Ok(());
    };
    let resources = bar.resources;
    let geometry = bar.geometry;
    let pad = u32::from(screen.font.height);

    let mut cells = Vec::with_capacity(screen.tags.len() + 3);
    let mut spans = Vec::with_capacity(screen.tags.len());
    let mut x: i32 = 0;
    let colors = &screen.colors;

    for tag in &screen.tags {
        let width = backend.text_width(screen.font.id, &tag.name)? + pad;
        let (fg, bg) = if tag.selected {
            (colors.focus_fg, colors.focus_bg)
        } else {
            (colors.normal_fg, colors.normal_bg)
        };
        cells.push(cell(&tag.name, x, width, fg, bg));
        spans.push(TagSpan { x, width });
        x += width as i32;
    }

    let symbol = screen.layout().symbol.as_str();
    let width = backend.text_width(screen.font.id, symbol)? + pad;
    cells.push(cell(symbol, x, width, colors.normal_fg, colors.normal_bg));
    x += width as i32;

    let status = screen.status_text.as_str();
    let status_width = (backend.text_width(screen.font.id, status)? + pad).min(geometry.width);
    let status_x = (geometry.width - status_width) as i32;

    if status_x > x {
        let title = selected_name.unwrap_or_default();
        let (fg, bg) = if selected_name.is_some() {
            (colors.focus_fg, colors.focus_bg)
        } else {
            (colors.normal_fg, colors.normal_bg)
        };
        cells.push(cell(title, x, (status_x - x) as u32, fg, bg));
    }
    cells.push(cell(status, status_x, status_width, colors.normal_fg, colors.normal_bg));

    debug!("Drawing status bar of screen {} ({} cells)", screen.index, cells.len());
    backend.draw_statusbar(&resources, geometry, &screen.font, &cells)?;

    if let Some(bar) = screen.statusbar.as_mut() {
        bar.tag_spans = spans;
    }
    Ok(())
}

impl<B: Backend> Session<B> {
    /// Redraw a screen's bar with the title of the selected client, if it lives there
    pub fn draw_statusbar(&mut self, screen: usize) -> Result<()> {
        let title = self
            .selected
            .and_then(|w| self.clients.get(w))
            .filter(|c| c.screen == screen)
            .map(|c| c.name.as_str());
        match self.screens.get_mut(screen) {
            Some(config) => draw(&mut self.backend, config, title),
            None => Ok(()),
        }
    }

    /// Replace a screen's status text and redraw its bar
    pub fn set_status_text(&mut self, screen: usize, text: &str) -> Result<()> {
        if let Some(config) = self.screens.get_mut(screen) {
            config.status_text.set(text);
        }
        self.draw_statusbar(screen)
    }
}

fn cell(text: &str, x: i32, width: u32, fg: u32, bg: u32) -> BarCell {
    BarCell {
        text: text.to_string(),
        x: x.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16,
        width: width.min(u32::from(u16::MAX)) as u16,
        fg,
        bg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_truncates_to_capacity() {
        let long = "x".repeat(1000);
        let status = StatusText::new(&long);
        assert_eq!(status.len(), STATUS_TEXT_CAPACITY - 1);

        assert!(StatusText::new("").is_empty());
        let status = StatusText::new("load 0.42");
        assert_eq!(status.as_str(), "load 0.42");
    }

    #[test]
    fn test_status_text_truncates_on_char_boundary() {
        // 254 ASCII bytes followed by a two-byte character straddling the limit
        let text = format!("{}é", "a".repeat(254));
        let status = StatusText::new(&text);
        assert_eq!(status.len(), 254);
        assert!(status.as_str().chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_placement() {
        let area = Geometry::new(0, 0, 1280, 1024);
        assert_eq!(
            StatusBar::placement(StatusbarPosition::Top, area, 14),
            Some(Geometry::new(0, 0, 1280, 14))
        );
        assert_eq!(
            StatusBar::placement(StatusbarPosition::Bottom, area, 14),
            Some(Geometry::new(0, 1010, 1280, 14))
        );
        assert_eq!(StatusBar::placement(StatusbarPosition::Off, area, 14), None);
    }

    #[test]
    fn test_tag_hit_testing() {
        let bar = StatusBar {
            resources: BarResources {
                window: 1,
                drawable: 2,
                gc: 3,
            },
            position: StatusbarPosition::Top,
            geometry: Geometry::new(0, 0, 800, 14),
            tag_spans: vec![TagSpan { x: 0, width: 20 }, TagSpan { x: 20, width: 20 }],
        };
        assert_eq!(bar.tag_at(0), Some(0));
        assert_eq!(bar.tag_at(19), Some(0));
        assert_eq!(bar.tag_at(20), Some(1));
        assert_eq!(bar.tag_at(40), None);
    }
}
