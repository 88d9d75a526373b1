//! Screen Module
//!
//! Per-screen state: tags, layouts, key bindings, rules, cursors, status bar
//! and status text. One record per logical screen; several logical screens
//! can share one X screen when it spans monitors.

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{ColorsConfig, GeneralConfig, LayoutConfig, ScreenSettings};
use crate::error::Result;
use crate::shared::Geometry;
use crate::wm::backend::{Backend, Capabilities, Cursors, FontInfo, ScreenArea};
use crate::wm::keyboard::KeyBinding;
use crate::wm::statusbar::{self, StatusBar, StatusText};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub selected: bool,
}

/// Compiled client rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Regex,
    pub tags: Vec<String>,
    pub floating: bool,
}

#[derive(Debug)]
pub struct ScreenConfig {
    /// Logical screen index
    pub index: usize,
    /// X screen owning this area
    pub phys_screen: usize,
    /// Full monitor area, status bar included
    pub geometry: Geometry,
    pub tags: Vec<Tag>,
    pub layouts: Vec<LayoutConfig>,
    /// Index of the active layout
    pub layout: usize,
    pub keys: Vec<KeyBinding>,
    pub rules: Vec<Rule>,
    pub cursors: Cursors,
    pub statusbar: Option<StatusBar>,
    pub font: FontInfo,
    /// Extension availability, identical on every screen
    pub capabilities: Capabilities,
    pub status_text: StatusText,
    pub general: GeneralConfig,
    pub colors: ColorsConfig,
}

impl ScreenConfig {
    /// Build a screen record and its server resources
    pub fn setup<B: Backend>(
        backend: &mut B,
        index: usize,
        area: ScreenArea,
        settings: ScreenSettings,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let tags = settings
            .tags
            .iter()
            .enumerate()
            .map(|(i, name)| Tag {
                name: name.clone(),
                selected: i == 0,
            })
            .collect();

        let rules = settings
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| -> anyhow::Result<Rule> {
                let pattern = Regex::new(&rule.pattern)
                    .with_context(|| format!("rule {}: invalid pattern {:?}", i, rule.pattern))?;
                Ok(Rule {
                    pattern,
                    tags: rule.tags.clone(),
                    floating: rule.floating,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let keys = settings
            .keys
            .iter()
            .map(KeyBinding::from_config)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let font = backend.open_font(&settings.general.font)?;
        let cursors = backend.create_cursors()?;
        backend.select_root_input(area.phys_screen, cursors.normal)?;
        backend.grab_keys(area.phys_screen, &keys)?;

        let statusbar = match StatusBar::placement(
            settings.general.statusbar,
            area.geometry,
            statusbar::bar_height(&font),
        ) {
            Some(geometry) => {
                let resources = backend.create_statusbar(area.phys_screen, geometry, cursors.normal)?;
                Some(StatusBar {
                    resources,
                    position: settings.general.statusbar,
                    geometry,
                    tag_spans: Vec::new(),
                })
            }
            None => None,
        };

        info!(
            "Screen {} (X screen {}): {}x{}+{}+{}, {} keys, {} rules",
            index,
            area.phys_screen,
            area.geometry.width,
            area.geometry.height,
            area.geometry.x,
            area.geometry.y,
            keys.len(),
            rules.len()
        );

        Ok(Self {
            index,
            phys_screen: area.phys_screen,
            geometry: area.geometry,
            tags,
            layouts: settings.layouts,
            layout: 0,
            keys,
            rules,
            cursors,
            statusbar,
            font,
            capabilities,
            status_text: StatusText::new(&format!("awesome-{}", env!("CARGO_PKG_VERSION"))),
            general: settings.general,
            colors: settings.colors,
        })
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layouts[self.layout.min(self.layouts.len() - 1)]
    }

    /// Area left to clients once the bar is taken out
    pub fn workarea(&self) -> Geometry {
        let mut area = self.geometry;
        if let Some(bar) = &self.statusbar {
            area.height = area.height.saturating_sub(bar.geometry.height);
            if bar.geometry.y == area.y {
                area.y += bar.geometry.height as i32;
            }
        }
        area
    }

    /// Follow a size change of the screen area, moving the bar with it
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        let height = statusbar::bar_height(&self.font);
        if let Some(bar) = self.statusbar.as_mut()
            && let Some(placed) = StatusBar::placement(bar.position, geometry, height)
        {
            bar.geometry = placed;
        }
    }

    pub fn selected_tags(&self) -> Vec<bool> {
        self.tags.iter().map(|t| t.selected).collect()
    }

    /// Select exactly one tag
    pub fn view_tag(&mut self, index: usize) -> bool {
        if index >= self.tags.len() {
            return false;
        }
        for (i, tag) in self.tags.iter_mut().enumerate() {
            tag.selected = i == index;
        }
        true
    }

    /// Shift the single selected tag by `delta`, wrapping
    pub fn view_relative(&mut self, delta: isize) {
        let count = self.tags.len() as isize;
        let current = self.tags.iter().position(|t| t.selected).unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(count);
        self.view_tag(next as usize);
    }

    /// Cycle the layout list by `delta`, wrapping
    pub fn cycle_layout(&mut self, delta: isize) {
        let count = self.layouts.len() as isize;
        self.layout = (self.layout as isize + delta).rem_euclid(count) as usize;
    }

    /// Release the server resources and owned arrays of this screen
    pub fn release<B: Backend>(self, backend: &mut B) -> Result<()> {
        debug!("Releasing screen {}", self.index);
        backend.close_font(self.font.id)?;
        backend.ungrab_keys(self.phys_screen)?;
        if let Some(bar) = &self.statusbar {
            backend.destroy_statusbar(&bar.resources)?;
        }
        backend.free_cursors(&self.cursors)?;
        // tags, keys, layouts and rules go with `self`
        Ok(())
    }
}
