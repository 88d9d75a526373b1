//! Layouts
//!
//! Visibility by selected tags and placement of the visible tiled clients.

use tracing::debug;

use crate::config::LayoutKind;
use crate::error::Result;
use crate::shared::Geometry;
use crate::wm::Session;
use crate::wm::backend::{Backend, WindowId};

/// Master column on the left, remaining clients stacked on the right
pub fn tile(area: Geometry, count: usize, mwfact: f32, border: u16) -> Vec<Geometry> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![inset(area, border)];
    }

    let master_width = (area.width as f32 * mwfact) as u32;
    let mut cells = Vec::with_capacity(count);
    cells.push(inset(
        Geometry::new(area.x, area.y, master_width, area.height),
        border,
    ));

    let stack = (count - 1) as u32;
    let stack_x = area.x + master_width as i32;
    let stack_width = area.width - master_width;
    let cell_height = area.height / stack;
    for i in 0..stack {
        let y = area.y + (i * cell_height) as i32;
        // last cell takes the rounding remainder
        let height = if i == stack - 1 {
            area.height - i * cell_height
        } else {
            cell_height
        };
        cells.push(inset(Geometry::new(stack_x, y, stack_width, height), border));
    }
    cells
}

/// Every client fills the whole area
pub fn max(area: Geometry, count: usize, border: u16) -> Vec<Geometry> {
    vec![inset(area, border); count]
}

/// Pull a floating client flush with the area edges it comes within `snap` pixels of
pub fn snap_to_area(geometry: Geometry, border: u16, area: Geometry, snap: u16) -> Geometry {
    let snap = i64::from(snap);
    let b = 2 * i64::from(border);
    let (outer_w, outer_h) = (i64::from(geometry.width) + b, i64::from(geometry.height) + b);
    let (left, top) = (i64::from(area.x), i64::from(area.y));
    let (right, bottom) = (left + i64::from(area.width), top + i64::from(area.height));

    let mut x = i64::from(geometry.x);
    let mut y = i64::from(geometry.y);
    if (x - left).abs() < snap {
        x = left;
    } else if (x + outer_w - right).abs() < snap {
        x = right - outer_w;
    }
    if (y - top).abs() < snap {
        y = top;
    } else if (y + outer_h - bottom).abs() < snap {
        y = bottom - outer_h;
    }
    Geometry::new(x as i32, y as i32, geometry.width, geometry.height)
}

/// Shrink an outer cell so the client plus its border fits inside
fn inset(cell: Geometry, border: u16) -> Geometry {
    let b = 2 * u32::from(border);
    Geometry::new(
        cell.x,
        cell.y,
        cell.width.saturating_sub(b).max(1),
        cell.height.saturating_sub(b).max(1),
    )
}

impl<B: Backend> Session<B> {
    /// Ban clients with no selected tag, unban and place the others
    pub fn arrange(&mut self, screen: usize) -> Result<()> {
        let Some(config) = self.screens.get(screen) else {
            return Ok(());
        };
        let selected_tags = config.selected_tags();
        let kind = config.layout().kind;
        let area = config.workarea();
        let mwfact = config.general.mwfact;
        let border = config.general.border_width;

        let mut tiled: Vec<WindowId> = Vec::new();
        let windows: Vec<WindowId> = self.clients.on_screen(screen).map(|c| c.window).collect();
        for window in windows {
            let visible = self
                .clients
                .get(window)
                .is_some_and(|c| c.is_visible(&selected_tags));
            if visible {
                self.unban(window)?;
                if self.clients.get(window).is_some_and(|c| !c.floating) {
                    tiled.push(window);
                }
            } else {
                self.ban(window)?;
            }
        }

        let cells = match kind {
            LayoutKind::Tile => tile(area, tiled.len(), mwfact, border),
            LayoutKind::Max => max(area, tiled.len(), border),
            LayoutKind::Floating => Vec::new(),
        };
        debug!("Arranging screen {}: {} tiled clients", screen, cells.len());
        for (window, geometry) in tiled.iter().zip(cells) {
            self.resize(*window, geometry)?;
        }

        let selection_hidden = match self.selected {
            Some(window) => self
                .clients
                .get(window)
                .is_some_and(|c| c.screen == screen && !c.is_visible(&selected_tags)),
            None => true,
        };
        if selection_hidden {
            self.focus(None, screen)?;
        } else {
            self.draw_statusbar(screen)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_single_client_fills_area() {
        let area = Geometry::new(0, 14, 1000, 786);
        assert_eq!(tile(area, 1, 0.6, 1), vec![Geometry::new(0, 14, 998, 784)]);
    }

    #[test]
    fn test_tile_master_and_stack() {
        let area = Geometry::new(0, 0, 1000, 800);
        let cells = tile(area, 4, 0.6, 0);
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0], Geometry::new(0, 0, 600, 800));
        assert_eq!(cells[1], Geometry::new(600, 0, 400, 266));
        assert_eq!(cells[2], Geometry::new(600, 266, 400, 266));
        // remainder goes to the last stack cell
        assert_eq!(cells[3], Geometry::new(600, 532, 400, 268));
    }

    #[test]
    fn test_snap_to_area_edges() {
        let area = Geometry::new(0, 16, 1280, 1008);
        // near the top left corner
        let snapped = snap_to_area(Geometry::new(5, 20, 200, 100), 1, area, 8);
        assert_eq!(snapped, Geometry::new(0, 16, 200, 100));
        // near the bottom right corner, border included
        let snapped = snap_to_area(Geometry::new(1075, 918, 200, 100), 1, area, 8);
        assert_eq!(snapped, Geometry::new(1078, 922, 200, 100));
        // far from every edge
        let g = Geometry::new(300, 300, 200, 100);
        assert_eq!(snap_to_area(g, 1, area, 8), g);
        // zero disables snapping
        assert_eq!(snap_to_area(Geometry::new(3, 20, 200, 100), 1, area, 0).x, 3);
    }

    #[test]
    fn test_tile_no_clients() {
        assert!(tile(Geometry::new(0, 0, 10, 10), 0, 0.5, 1).is_empty());
    }

    #[test]
    fn test_max_stacks_everything_on_the_area() {
        let area = Geometry::new(1280, 0, 1280, 1024);
        let cells = max(area, 3, 2);
        assert_eq!(cells, vec![Geometry::new(1280, 0, 1276, 1020); 3]);
    }
}
