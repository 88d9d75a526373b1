//! Keyboard Module
//!
//! Key bindings: modifier masks, key names and the commands they run.

use anyhow::{Context, Result, bail};
use bitflags::bitflags;

use crate::config::KeyConfig;

bitflags! {
    /// Core protocol modifier bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

impl Modifiers {
    /// Lock and NumLock never take part in matching
    pub const IGNORED: Self = Self::LOCK.union(Self::MOD2);

    /// Modifier named in a key binding, case-insensitive
    pub fn from_config_name(name: &str) -> Option<Self> {
        let modifier = match name.to_ascii_lowercase().as_str() {
            "shift" => Self::SHIFT,
            "lock" => Self::LOCK,
            "control" | "ctrl" => Self::CONTROL,
            "mod1" | "alt" => Self::MOD1,
            "mod2" => Self::MOD2,
            "mod3" => Self::MOD3,
            "mod4" | "super" => Self::MOD4,
            "mod5" => Self::MOD5,
            _ => return None,
        };
        Some(modifier)
    }

    /// Modifier state of an input event, without Lock/NumLock
    pub fn clean(state: u16) -> Self {
        Self::from_bits_truncate(state) - Self::IGNORED
    }
}

/// Resolve a key name to its keysym
pub fn keysym_from_name(name: &str) -> Option<u32> {
    let keysym = match name {
        "Return" => 0xff0d,
        "space" => 0x0020,
        "Tab" => 0xff09,
        "Escape" => 0xff1b,
        "BackSpace" => 0xff08,
        "Delete" => 0xffff,
        "Home" => 0xff50,
        "Left" => 0xff51,
        "Up" => 0xff52,
        "Right" => 0xff53,
        "Down" => 0xff54,
        "End" => 0xff57,
        _ => {
            if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
                if (1..=12).contains(&n) {
                    return Some(0xffbe + n - 1);
                }
                return None;
            }
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_lowercase() as u32,
                _ => return None,
            }
        }
    };
    Some(keysym)
}

/// Key binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub modifiers: Modifiers,
    pub keysym: u32,
    pub command: String,
    pub arg: Option<String>,
}

impl KeyBinding {
    pub fn from_config(config: &KeyConfig) -> Result<Self> {
        let mut modifiers = Modifiers::empty();
        for name in &config.modifiers {
            modifiers |= Modifiers::from_config_name(name)
                .with_context(|| format!("unknown modifier {:?}", name))?;
        }

        let Some(keysym) = keysym_from_name(&config.key) else {
            bail!("unknown key {:?}", config.key);
        };

        Ok(Self {
            modifiers,
            keysym,
            command: config.command.clone(),
            arg: config.arg.clone(),
        })
    }

    /// Does a key press with this keysym and raw modifier state trigger the binding?
    pub fn matches(&self, keysym: u32, state: u16) -> bool {
        self.keysym == keysym && self.modifiers == Modifiers::clean(state)
    }
}
