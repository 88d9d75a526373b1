//! Configuration system for the awesome session
//!
//! Loads configuration from TOML, by default at
//! `~/.config/awesome/awesomerc.toml`. Auto-generates the default config file
//! on first run if missing.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tag names, in display order
    pub tags: Vec<String>,
    pub general: GeneralConfig,
    pub colors: ColorsConfig,
    pub layouts: Vec<LayoutConfig>,
    pub rules: Vec<RuleConfig>,
    pub keys: Vec<KeyConfig>,
    /// Per-screen overrides, keyed by screen number
    pub screens: BTreeMap<String, ScreenOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tags: (1..=9).map(|i| i.to_string()).collect(),
            general: GeneralConfig::default(),
            colors: ColorsConfig::default(),
            layouts: vec![
                LayoutConfig::new("[]=", LayoutKind::Tile),
                LayoutConfig::new("[M]", LayoutKind::Max),
                LayoutConfig::new("><>", LayoutKind::Floating),
            ],
            rules: vec![
                RuleConfig {
                    pattern: "Gimp".to_string(),
                    tags: Vec::new(),
                    floating: true,
                },
                RuleConfig {
                    pattern: "MPlayer".to_string(),
                    tags: Vec::new(),
                    floating: true,
                },
            ],
            keys: default_keys(),
            screens: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file is created from
    /// the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    info!("Config file not found at {:?}, using defaults", default_path);
                    if let Err(e) = Self::save_default(&default_path) {
                        warn!("Failed to create default config file: {}", e);
                    }
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tags.is_empty() {
            bail!("at least one tag is required");
        }
        if self.layouts.is_empty() {
            bail!("at least one layout is required");
        }
        if !(0.1..=0.9).contains(&self.general.mwfact) {
            bail!("general.mwfact must be between 0.1 and 0.9");
        }
        for (key, overrides) in &self.screens {
            key.parse::<usize>()
                .with_context(|| format!("screen override key {:?} is not a screen number", key))?;
            if overrides.tags.as_ref().is_some_and(Vec::is_empty) {
                bail!("screens.{}: tag list is empty", key);
            }
            if overrides.layouts.as_ref().is_some_and(Vec::is_empty) {
                bail!("screens.{}: layout list is empty", key);
            }
        }
        Ok(())
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("awesome");

        Ok(config_dir.join("awesomerc.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    /// Settings for one screen, with its overrides applied
    pub fn screen_settings(&self, screen: usize) -> ScreenSettings {
        let overrides = self.screens.get(&screen.to_string());

        ScreenSettings {
            tags: overrides
                .and_then(|o| o.tags.clone())
                .unwrap_or_else(|| self.tags.clone()),
            layouts: overrides
                .and_then(|o| o.layouts.clone())
                .unwrap_or_else(|| self.layouts.clone()),
            rules: self.rules.clone(),
            keys: self.keys.clone(),
            general: self.general.clone(),
            colors: self.colors.clone(),
        }
    }
}

/// Resolved settings for a single screen
#[derive(Debug, Clone)]
pub struct ScreenSettings {
    pub tags: Vec<String>,
    pub layouts: Vec<LayoutConfig>,
    pub rules: Vec<RuleConfig>,
    pub keys: Vec<KeyConfig>,
    pub general: GeneralConfig,
    pub colors: ColorsConfig,
}

/// General behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Core font used by the status bar
    pub font: String,
    /// Client border width in pixels
    pub border_width: u16,
    /// Snap distance in pixels for floating clients
    pub snap: u16,
    /// Master area share for the tile layout
    pub mwfact: f32,
    /// Status bar placement
    pub statusbar: StatusbarPosition,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            font: "fixed".to_string(),
            border_width: 1,
            snap: 8,
            mwfact: 0.6,
            statusbar: StatusbarPosition::Top,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusbarPosition {
    Top,
    Bottom,
    Off,
}

/// Colors (hex: 0xRRGGBB)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub normal_border: u32,
    pub normal_bg: u32,
    pub normal_fg: u32,
    pub focus_border: u32,
    pub focus_bg: u32,
    pub focus_fg: u32,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            normal_border: 0xdddddd,
            normal_bg: 0xffffff,
            normal_fg: 0x000000,
            focus_border: 0xff0000,
            focus_bg: 0x0066ff,
            focus_fg: 0xffffff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub symbol: String,
    pub kind: LayoutKind,
}

impl LayoutConfig {
    fn new(symbol: &str, kind: LayoutKind) -> Self {
        Self {
            symbol: symbol.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Tile,
    Max,
    Floating,
}

/// Client placement rule, matched against `class:instance:name`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub floating: bool,
}

/// Key binding: modifiers + key name run a control command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub key: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
}

impl KeyConfig {
    fn new(modifiers: &[&str], key: &str, command: &str, arg: Option<&str>) -> Self {
        Self {
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            key: key.to_string(),
            command: command.to_string(),
            arg: arg.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenOverride {
    pub tags: Option<Vec<String>>,
    pub layouts: Option<Vec<LayoutConfig>>,
}

fn default_keys() -> Vec<KeyConfig> {
    let mut keys = vec![
        KeyConfig::new(&["Mod4"], "Return", "spawn", Some("exec xterm")),
        KeyConfig::new(&["Mod4"], "space", "setlayout", Some("+1")),
        KeyConfig::new(&["Mod4", "Shift"], "space", "setlayout", Some("-1")),
        KeyConfig::new(&["Mod4"], "j", "client_focusnext", None),
        KeyConfig::new(&["Mod4"], "k", "client_focusprev", None),
        KeyConfig::new(&["Mod4"], "Left", "tag_viewprev", None),
        KeyConfig::new(&["Mod4"], "Right", "tag_viewnext", None),
        KeyConfig::new(&["Mod4", "Shift"], "c", "client_kill", None),
        KeyConfig::new(&["Mod4", "Control"], "space", "client_togglefloating", None),
        KeyConfig::new(&["Mod4", "Control"], "q", "quit", None),
    ];
    for n in 1..=9 {
        let index = n.to_string();
        keys.push(KeyConfig::new(&["Mod4"], &index, "tag_view", Some(&index)));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tags.len(), 9);
    }

    #[test]
    fn test_default_config_survives_serialization() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.keys.len(), Config::default().keys.len());
        assert_eq!(parsed.layouts[1].kind, LayoutKind::Max);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config = Config::parse(
            r#"
            tags = ["web", "mail"]

            [general]
            border_width = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.tags, vec!["web", "mail"]);
        assert_eq!(config.general.border_width, 3);
        assert_eq!(config.general.font, "fixed");
        assert_eq!(config.layouts.len(), 3);
    }

    #[test]
    fn test_screen_override_replaces_tags_only_for_that_screen() {
        let config = Config::parse(
            r#"
            tags = ["a", "b"]

            [screens.1]
            tags = ["x"]
            "#,
        )
        .unwrap();
        assert_eq!(config.screen_settings(0).tags, vec!["a", "b"]);
        assert_eq!(config.screen_settings(1).tags, vec!["x"]);
        assert_eq!(config.screen_settings(1).layouts.len(), 3);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::parse("tags = []").is_err());
        assert!(Config::parse("[general]\nmwfact = 1.5").is_err());
        assert!(Config::parse("[screens.left]\ntags = [\"a\"]").is_err());
        assert!(Config::parse("tags = 3").is_err());
        assert!(Config::parse("[screens.0]\nlayouts = []").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nfont = \"9x15\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.general.font, "9x15");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
