// Virtual-key codes and the names used for them in settings.json

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A Win32 virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualKey(pub u32);

const VK_F1: u32 = 0x70;
const VK_NUMPAD0: u32 = 0x60;

/// Keys that have no derivable name (letters, digits, F-keys and numpad
/// digits are handled separately).
const NAMED_KEYS: &[(&str, u32)] = &[
    ("Backspace", 0x08),
    ("Tab", 0x09),
    ("Enter", 0x0D),
    ("Shift", 0x10),
    ("Ctrl", 0x11),
    ("Alt", 0x12),
    ("Pause", 0x13),
    ("CapsLock", 0x14),
    ("Escape", 0x1B),
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("PrintScreen", 0x2C),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("LWin", 0x5B),
    ("RWin", 0x5C),
    ("Apps", 0x5D),
    ("Multiply", 0x6A),
    ("Add", 0x6B),
    ("Subtract", 0x6D),
    ("Decimal", 0x6E),
    ("Divide", 0x6F),
    ("NumLock", 0x90),
    ("ScrollLock", 0x91),
    ("LShift", 0xA0),
    ("RShift", 0xA1),
    ("LCtrl", 0xA2),
    ("RCtrl", 0xA3),
    ("LAlt", 0xA4),
    ("RAlt", 0xA5),
    ("Semicolon", 0xBA),
    ("Equals", 0xBB),
    ("Comma", 0xBC),
    ("Minus", 0xBD),
    ("Period", 0xBE),
    ("Slash", 0xBF),
    ("Backquote", 0xC0),
    ("LBracket", 0xDB),
    ("Backslash", 0xDC),
    ("RBracket", 0xDD),
    ("Quote", 0xDE),
];

const ALIASES: &[(&str, &str)] = &[
    ("Esc", "Escape"),
    ("Return", "Enter"),
    ("Back", "Backspace"),
    ("Control", "Ctrl"),
    ("Menu", "Alt"),
    ("PgUp", "PageUp"),
    ("PgDn", "PageDown"),
    ("Del", "Delete"),
    ("Ins", "Insert"),
    ("PrtSc", "PrintScreen"),
    ("Snapshot", "PrintScreen"),
    ("Tilde", "Backquote"),
];

impl VirtualKey {
    pub const F8: VirtualKey = VirtualKey(0x77);

    /// Parse a key name such as `"F8"`, `"space"`, `"VK_F8"` or `"0x77"`.
    /// Matching is case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = strip_prefix_ignore_case(name, "VK_").unwrap_or(name);
        if name.is_empty() {
            return None;
        }

        let name = ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, target)| *target)
            .unwrap_or(name);

        if let [byte] = name.as_bytes() {
            let c = byte.to_ascii_uppercase();
            return match c {
                b'A'..=b'Z' | b'0'..=b'9' => Some(VirtualKey(c as u32)),
                _ => None,
            };
        }

        if let Some(hex) = strip_prefix_ignore_case(name, "0x") {
            if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            let code = u32::from_str_radix(hex, 16).ok()?;
            return (1..=0xFE).contains(&code).then_some(VirtualKey(code));
        }

        if let Some(n) = strip_prefix_ignore_case(name, "Numpad").and_then(parse_index) {
            return (n <= 9).then_some(VirtualKey(VK_NUMPAD0 + n));
        }

        if let Some(n) = strip_prefix_ignore_case(name, "F").and_then(parse_index) {
            return (1..=24).contains(&n).then_some(VirtualKey(VK_F1 + n - 1));
        }

        NAMED_KEYS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, code)| VirtualKey(*code))
    }

    /// Canonical name; codes without one are rendered as hex (`0xE2`).
    pub fn name(self) -> String {
        let code = self.0;
        match code {
            0x30..=0x39 | 0x41..=0x5A => char::from_u32(code)
                .map(String::from)
                .unwrap_or_default(),
            VK_NUMPAD0..=0x69 => format!("Numpad{}", code - VK_NUMPAD0),
            VK_F1..=0x87 => format!("F{}", code - VK_F1 + 1),
            _ => NAMED_KEYS
                .iter()
                .find(|(_, known)| *known == code)
                .map(|(name, _)| (*name).to_string())
                .unwrap_or_else(|| format!("0x{code:02X}")),
        }
    }
}

/// Plain decimal suffix of `F8` or `Numpad3`: digits only, no sign, no
/// leading zero.
fn parse_index(digits: &str) -> Option<u32> {
    let well_formed = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !well_formed {
        return None;
    }
    digits.parse().ok()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

impl fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for VirtualKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for VirtualKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VirtualKeyVisitor)
    }
}

/// Accepts key names as well as the raw integer codes older settings files
/// were written with.
struct VirtualKeyVisitor;

impl Visitor<'_> for VirtualKeyVisitor {
    type Value = VirtualKey;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a key name like \"F8\" or a virtual-key code")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<VirtualKey, E> {
        VirtualKey::from_name(value)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<VirtualKey, E> {
        match u32::try_from(value) {
            Ok(code) if (1..=0xFE).contains(&code) => Ok(VirtualKey(code)),
            _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<VirtualKey, E> {
        match u64::try_from(value) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(de::Unexpected::Signed(value), &self)),
        }
    }
}
