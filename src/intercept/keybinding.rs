//! Key chord parser: "Ctrl+Shift+V" → (modifier set, key).
//!
//! `Mod` is the platform's primary command modifier: Meta on macOS, Ctrl
//! everywhere else.

use std::fmt;
use std::ops::BitOr;

use super::event::KeyEvent;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("empty binding")]
    Empty,
    #[error("bare key without modifier: {0:?}")]
    NoModifier(String),
    #[error("unknown modifier: {0:?}")]
    UnknownModifier(String),
    #[error("unknown key: {0:?}")]
    UnknownKey(String),
}

/// Set of held modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1);
    pub const CTRL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const META: Self = Self(1 << 3);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CTRL, "Ctrl"),
            (Self::ALT, "Alt"),
            (Self::SHIFT, "Shift"),
            (Self::META, "Meta"),
        ];
        let held: Vec<_> = names
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, n)| *n)
            .collect();
        f.write_str(&held.join("+"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Mac,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Mac
        } else {
            Self::Other
        }
    }

    fn command_modifier(self) -> Modifiers {
        match self {
            Self::Mac => Modifiers::META,
            Self::Other => Modifiers::CTRL,
        }
    }
}

/// A parsed key chord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Modifiers,
    /// Canonical lowercase key name.
    pub key: String,
    /// Original user-provided string.
    pub raw: String,
}

impl KeyChord {
    /// True if `event` presses exactly this chord. Letter case is ignored
    /// since Shift already appears in the modifier set.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.modifiers == self.modifiers
            && canonical_key(&event.key).is_some_and(|k| k == self.key)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a chord specification.
///
/// Format: `Modifier[+Modifier...]+Key`
///
/// Modifiers: `Shift`, `Control`/`Ctrl`, `Alt`/`Option`, `Meta`/`Cmd`/`Super`,
/// `Mod`. Keys: single letter, digit, F1-F12, or a named key (space,
/// enter, escape, tab, backspace, delete, arrows, ...).
///
/// At least one modifier is required.
pub fn parse_chord(spec: &str, platform: Platform) -> Result<KeyChord, BindingError> {
    let parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    if parts.iter().all(|p| p.is_empty()) {
        return Err(BindingError::Empty);
    }
    if parts.len() < 2 {
        return Err(BindingError::NoModifier(spec.to_string()));
    }

    let (modifier_parts, key_name) = parts.split_at(parts.len() - 1);
    let key_name = key_name[0];

    let mut modifiers = Modifiers::NONE;
    for &m in modifier_parts {
        modifiers = modifiers
            | parse_modifier(m, platform)
                .ok_or_else(|| BindingError::UnknownModifier(m.to_string()))?;
    }

    let key = canonical_key(key_name).ok_or_else(|| BindingError::UnknownKey(key_name.into()))?;

    Ok(KeyChord {
        modifiers,
        key,
        raw: spec.to_string(),
    })
}

fn parse_modifier(name: &str, platform: Platform) -> Option<Modifiers> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Some(Modifiers::SHIFT),
        "control" | "ctrl" => Some(Modifiers::CTRL),
        "alt" | "option" => Some(Modifiers::ALT),
        "meta" | "cmd" | "command" | "super" => Some(Modifiers::META),
        "mod" => Some(platform.command_modifier()),
        _ => None,
    }
}

/// Map a binding key name or a browser key value onto one canonical name.
fn canonical_key(name: &str) -> Option<String> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphanumeric() {
            return Some(ch.to_ascii_lowercase().to_string());
        }
        if ch == ' ' {
            return Some("space".into());
        }
    }

    if let Some(rest) = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))
        && let Ok(n) = rest.parse::<u32>()
        && (1..=12).contains(&n)
    {
        return Some(format!("f{n}"));
    }

    let named = match name.to_ascii_lowercase().as_str() {
        "space" | "spacebar" => "space",
        "return" | "enter" => "enter",
        "escape" | "esc" => "escape",
        "tab" => "tab",
        "backspace" => "backspace",
        "delete" | "del" => "delete",
        "insert" => "insert",
        "home" => "home",
        "end" => "end",
        "page_up" | "pageup" => "pageup",
        "page_down" | "pagedown" => "pagedown",
        "up" | "arrowup" => "up",
        "down" | "arrowdown" => "down",
        "left" | "arrowleft" => "left",
        "right" | "arrowright" => "right",
        _ => return None,
    };
    Some(named.to_string())
}

/// Chord specifications, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpecs {
    pub paste: String,
    pub quick_swap: String,
    pub swap_mode: String,
}

impl Default for BindingSpecs {
    fn default() -> Self {
        Self {
            paste: "Mod+V".into(),
            quick_swap: "Alt+X".into(),
            swap_mode: "Alt+S".into(),
        }
    }
}

/// Parsed hotkeys recognized by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBindings {
    /// Observed only; the paste itself arrives as a separate event.
    pub paste: KeyChord,
    pub quick_swap: KeyChord,
    pub swap_mode: KeyChord,
}

impl HotkeyBindings {
    pub fn parse(specs: &BindingSpecs, platform: Platform) -> Result<Self, BindingError> {
        Ok(Self {
            paste: parse_chord(&specs.paste, platform)?,
            quick_swap: parse_chord(&specs.quick_swap, platform)?,
            swap_mode: parse_chord(&specs.swap_mode, platform)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modifier_aliases() {
        let p = Platform::Other;
        assert_eq!(parse_modifier("Ctrl", p), Some(Modifiers::CTRL));
        assert_eq!(parse_modifier("control", p), Some(Modifiers::CTRL));
        assert_eq!(parse_modifier("Option", p), Some(Modifiers::ALT));
        assert_eq!(parse_modifier("Cmd", p), Some(Modifiers::META));
        assert_eq!(parse_modifier("Hyper", p), None);
    }

    #[test]
    fn mod_follows_platform() {
        assert_eq!(parse_modifier("Mod", Platform::Mac), Some(Modifiers::META));
        assert_eq!(parse_modifier("Mod", Platform::Other), Some(Modifiers::CTRL));
    }

    #[test]
    fn canonical_key_forms() {
        assert_eq!(canonical_key("V").as_deref(), Some("v"));
        assert_eq!(canonical_key("7").as_deref(), Some("7"));
        assert_eq!(canonical_key("F12").as_deref(), Some("f12"));
        assert_eq!(canonical_key(" ").as_deref(), Some("space"));
        assert_eq!(canonical_key("ArrowLeft").as_deref(), Some("left"));
        assert_eq!(canonical_key("Return").as_deref(), Some("enter"));
        assert_eq!(canonical_key("F13"), None);
        assert_eq!(canonical_key("FooBar"), None);
        assert_eq!(canonical_key(""), None);
    }

    #[test]
    fn parse_chord_ok() {
        let chord = parse_chord("Ctrl+Shift+D", Platform::Other).unwrap();
        assert_eq!(chord.modifiers, Modifiers::CTRL | Modifiers::SHIFT);
        assert_eq!(chord.key, "d");
        assert_eq!(chord.to_string(), "Ctrl+Shift+D");
    }

    #[test]
    fn parse_chord_errors() {
        let p = Platform::Other;
        assert_eq!(parse_chord("", p), Err(BindingError::Empty));
        assert!(matches!(parse_chord("V", p), Err(BindingError::NoModifier(_))));
        assert!(matches!(
            parse_chord("Hyper+V", p),
            Err(BindingError::UnknownModifier(_))
        ));
        assert!(matches!(
            parse_chord("Alt+Nope", p),
            Err(BindingError::UnknownKey(_))
        ));
    }

    #[test]
    fn chord_matches_exact_modifiers() {
        let chord = parse_chord("Alt+X", Platform::Other).unwrap();
        assert!(chord.matches(&KeyEvent::new("x", Modifiers::ALT)));
        assert!(chord.matches(&KeyEvent::new("X", Modifiers::ALT)));
        assert!(!chord.matches(&KeyEvent::new("x", Modifiers::ALT | Modifiers::SHIFT)));
        assert!(!chord.matches(&KeyEvent::new("s", Modifiers::ALT)));
    }

    #[test]
    fn default_bindings_parse() {
        let b = HotkeyBindings::parse(&BindingSpecs::default(), Platform::Mac).unwrap();
        assert_eq!(b.paste.modifiers, Modifiers::META);
        assert_eq!(b.quick_swap.key, "x");
        assert_eq!(b.swap_mode.modifiers, Modifiers::ALT);
    }

    #[test]
    fn modifiers_display() {
        assert_eq!((Modifiers::SHIFT | Modifiers::CTRL).to_string(), "Ctrl+Shift");
        assert_eq!(Modifiers::NONE.to_string(), "");
    }
}
