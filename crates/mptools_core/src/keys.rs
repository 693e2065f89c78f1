use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Feature;

/// A key press with its modifiers, e.g. `alt+1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub key: char,
}

impl KeyCombo {
    pub fn alt(key: char) -> Self {
        Self {
            alt: true,
            ctrl: false,
            shift: false,
            key,
        }
    }

    /// The feature bound to this combo: Alt with a digit 1 to 4. Other
    /// modifiers do not matter.
    pub fn feature(&self) -> Option<Feature> {
        if !self.alt {
            return None;
        }
        match self.key {
            '1' => Some(Feature::AutoAdvance),
            '2' => Some(Feature::Sanitizer),
            '3' => Some(Feature::SelectionUnlock),
            '4' => Some(Feature::Calculator),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key combo")]
    Empty,
    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),
    #[error("expected a single key, found {0:?}")]
    InvalidKey(String),
}

impl FromStr for KeyCombo {
    type Err = KeyParseError;

    /// Parses `+`-separated combos such as `alt+1` or `Ctrl+Alt+4`. The last
    /// part is the key; everything before it must be a modifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key_part = parts.pop().unwrap_or_default();
        let mut chars = key_part.chars();
        let key = match (chars.next(), chars.next()) {
            (Some(key), None) => key.to_ascii_lowercase(),
            _ => return Err(KeyParseError::InvalidKey(key_part.to_string())),
        };

        let mut combo = KeyCombo {
            alt: false,
            ctrl: false,
            shift: false,
            key,
        };
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "alt" | "option" => combo.alt = true,
                "ctrl" | "control" => combo.ctrl = true,
                "shift" => combo.shift = true,
                _ => return Err(KeyParseError::UnknownModifier(modifier.to_string())),
            }
        }
        Ok(combo)
    }
}
