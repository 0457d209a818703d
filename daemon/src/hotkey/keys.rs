//! Hotkey combination parsing and matching
//!
//! A combo is one or more modifiers plus exactly one key, written like
//! `ctrl+alt+e` or `cmd+shift+F5`.

use std::str::FromStr;

use super::HotkeyError;

/// Tracks which modifier keys are pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Control key is held
    pub control: bool,
    /// Option/Alt key is held
    pub alt: bool,
    /// Shift key is held
    pub shift: bool,
    /// Command/Super key is held
    pub meta: bool,
}

impl Modifiers {
    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.control && !self.alt && !self.shift && !self.meta
    }

    /// Create from macOS CGEventFlags
    #[cfg(target_os = "macos")]
    pub fn from_flags(flags: core_graphics::event::CGEventFlags) -> Self {
        use core_graphics::event::CGEventFlags;

        Self {
            control: flags.contains(CGEventFlags::CGEventFlagControl),
            alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
            shift: flags.contains(CGEventFlags::CGEventFlagShift),
            meta: flags.contains(CGEventFlags::CGEventFlagCommand),
        }
    }
}

/// The non-modifier key of a combo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// `a`-`z` (stored lowercase) or `0`-`9`
    Char(char),
    /// F1-F12
    Function(u8),
    Space,
}

impl Key {
    fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return (c.is_ascii_alphanumeric()).then(|| Key::Char(c.to_ascii_lowercase()));
        }

        if token == "space" {
            return Some(Key::Space);
        }

        token
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=12).contains(n))
            .map(Key::Function)
    }

    /// macOS virtual keycode (ANSI layout)
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    pub fn mac_keycode(&self) -> u16 {
        match self {
            Key::Space => 0x31,
            Key::Function(n) => {
                const F: [u16; 12] = [
                    0x7A, 0x78, 0x63, 0x76, 0x60, 0x61, 0x62, 0x64, 0x65, 0x6D, 0x67, 0x6F,
                ];
                n.checked_sub(1)
                    .and_then(|i| F.get(usize::from(i)))
                    .copied()
                    .unwrap_or(u16::MAX)
            }
            Key::Char(c) => match c {
                'a' => 0x00,
                's' => 0x01,
                'd' => 0x02,
                'f' => 0x03,
                'h' => 0x04,
                'g' => 0x05,
                'z' => 0x06,
                'x' => 0x07,
                'c' => 0x08,
                'v' => 0x09,
                'b' => 0x0B,
                'q' => 0x0C,
                'w' => 0x0D,
                'e' => 0x0E,
                'r' => 0x0F,
                'y' => 0x10,
                't' => 0x11,
                '1' => 0x12,
                '2' => 0x13,
                '3' => 0x14,
                '4' => 0x15,
                '6' => 0x16,
                '5' => 0x17,
                '9' => 0x19,
                '7' => 0x1A,
                '8' => 0x1C,
                '0' => 0x1D,
                'o' => 0x1F,
                'u' => 0x20,
                'i' => 0x22,
                'p' => 0x23,
                'l' => 0x25,
                'j' => 0x26,
                'k' => 0x28,
                'n' => 0x2D,
                'm' => 0x2E,
                _ => u16::MAX,
            },
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Function(n) => write!(f, "f{}", n),
            Key::Space => write!(f, "space"),
        }
    }
}

/// A global hotkey combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyCombo {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl HotkeyCombo {
    /// Check a key press against this combo; modifiers must match exactly
    pub fn matches(&self, modifiers: Modifiers, key: Key) -> bool {
        self.key == key && self.modifiers == modifiers
    }
}

impl FromStr for HotkeyCombo {
    type Err = HotkeyError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let unsupported = || HotkeyError::UnsupportedCombo(spec.to_string());

        let mut modifiers = Modifiers::default();
        let mut key = None;

        for token in spec.split('+').map(|t| t.trim().to_ascii_lowercase()) {
            let flag = match token.as_str() {
                "ctrl" | "control" => &mut modifiers.control,
                "alt" | "option" | "opt" => &mut modifiers.alt,
                "shift" => &mut modifiers.shift,
                "cmd" | "command" | "super" | "meta" | "win" => &mut modifiers.meta,
                other => {
                    if key.is_some() {
                        return Err(unsupported());
                    }
                    key = Some(Key::parse(other).ok_or_else(unsupported)?);
                    continue;
                }
            };
            if *flag {
                return Err(unsupported());
            }
            *flag = true;
        }

        // A bare key would swallow ordinary typing
        if modifiers.is_empty() {
            return Err(unsupported());
        }

        Ok(Self {
            modifiers,
            key: key.ok_or_else(unsupported)?,
        })
    }
}

impl std::fmt::Display for HotkeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.modifiers;
        for (held, name) in [
            (m.control, "ctrl"),
            (m.alt, "alt"),
            (m.shift, "shift"),
            (m.meta, "cmd"),
        ] {
            if held {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}
