//! Raw keyboard codes delivered to scripts

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

/// Virtual key code (low 16 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Keys(pub u32);

impl Keys {
    pub const NONE: Keys = Keys(0x00);
    pub const BACK: Keys = Keys(0x08);
    pub const TAB: Keys = Keys(0x09);
    pub const ENTER: Keys = Keys(0x0D);
    pub const SHIFT_KEY: Keys = Keys(0x10);
    pub const CONTROL_KEY: Keys = Keys(0x11);
    pub const MENU: Keys = Keys(0x12);
    pub const PAUSE: Keys = Keys(0x13);
    pub const ESCAPE: Keys = Keys(0x1B);
    pub const SPACE: Keys = Keys(0x20);
    pub const PAGE_UP: Keys = Keys(0x21);
    pub const PAGE_DOWN: Keys = Keys(0x22);
    pub const END: Keys = Keys(0x23);
    pub const HOME: Keys = Keys(0x24);
    pub const LEFT: Keys = Keys(0x25);
    pub const UP: Keys = Keys(0x26);
    pub const RIGHT: Keys = Keys(0x27);
    pub const DOWN: Keys = Keys(0x28);
    pub const INSERT: Keys = Keys(0x2D);
    pub const DELETE: Keys = Keys(0x2E);
    pub const NUMPAD0: Keys = Keys(0x60);
    pub const F1: Keys = Keys(0x70);
    pub const F24: Keys = Keys(0x87);

    pub const KEY_CODE_MASK: u32 = 0xFFFF;

    /// Digit key `0`..=`9`
    pub fn digit(n: u8) -> Option<Keys> {
        (n <= 9).then(|| Keys(0x30 + n as u32))
    }

    /// Letter key, case-insensitive
    pub fn letter(c: char) -> Option<Keys> {
        c.is_ascii_alphabetic()
            .then(|| Keys(c.to_ascii_uppercase() as u32))
    }

    /// Function key `F1`..=`F24`
    pub fn function(n: u8) -> Option<Keys> {
        (1..=24)
            .contains(&n)
            .then(|| Keys(Self::F1.0 + n as u32 - 1))
    }

    pub fn code(self) -> u32 {
        self.0 & Self::KEY_CODE_MASK
    }
}

const NAMED: &[(&str, Keys)] = &[
    ("None", Keys::NONE),
    ("Back", Keys::BACK),
    ("Tab", Keys::TAB),
    ("Enter", Keys::ENTER),
    ("Return", Keys::ENTER),
    ("ShiftKey", Keys::SHIFT_KEY),
    ("ControlKey", Keys::CONTROL_KEY),
    ("Menu", Keys::MENU),
    ("Pause", Keys::PAUSE),
    ("Escape", Keys::ESCAPE),
    ("Space", Keys::SPACE),
    ("PageUp", Keys::PAGE_UP),
    ("PageDown", Keys::PAGE_DOWN),
    ("End", Keys::END),
    ("Home", Keys::HOME),
    ("Left", Keys::LEFT),
    ("Up", Keys::UP),
    ("Right", Keys::RIGHT),
    ("Down", Keys::DOWN),
    ("Insert", Keys::INSERT),
    ("Delete", Keys::DELETE),
];

impl FromStr for Keys {
    type Err = crate::Error;

    /// Accepts names (`F5`, `A`, `D7`, `NumPad3`, `Space`) or a numeric code
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || crate::Error::Settings(format!("Unknown key: {}", s));

        if let Some(&(_, key)) = NAMED.iter().find(|(name, _)| name.eq_ignore_ascii_case(s)) {
            return Ok(key);
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16).map(Keys).map_err(|_| invalid());
        }

        let mut chars = s.chars();
        match (chars.next(), chars.as_str()) {
            (Some(c), "") => Keys::letter(c)
                .or_else(|| c.to_digit(10).and_then(|d| Keys::digit(d as u8)))
                .ok_or_else(invalid),
            _ if s.bytes().all(|b| b.is_ascii_digit()) => s.parse().map(Keys).map_err(|_| invalid()),
            (Some('F' | 'f'), rest) => rest
                .parse::<u8>()
                .ok()
                .and_then(Keys::function)
                .ok_or_else(invalid),
            (Some('D' | 'd'), rest) => rest
                .parse::<u8>()
                .ok()
                .and_then(Keys::digit)
                .ok_or_else(invalid),
            _ => {
                let lower = s.to_ascii_lowercase();
                lower
                    .strip_prefix("numpad")
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|&n| n <= 9)
                    .map(|n| Keys(Keys::NUMPAD0.0 + n))
                    .ok_or_else(invalid)
            }
        }
    }
}

impl fmt::Display for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        if let Some((name, _)) = NAMED.iter().find(|(_, key)| key.0 == code) {
            return f.write_str(name);
        }
        match code {
            0x30..=0x39 => write!(f, "D{}", code - 0x30),
            0x41..=0x5A => write!(f, "{}", code as u8 as char),
            0x60..=0x69 => write!(f, "NumPad{}", code - 0x60),
            0x70..=0x87 => write!(f, "F{}", code - 0x70 + 1),
            _ => write!(f, "{:#04x}", code),
        }
    }
}

bitflags! {
    /// Modifier state at the time of a key transition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 0x0001_0000;
        const CONTROL = 0x0002_0000;
        const ALT = 0x0004_0000;
    }
}

/// One raw key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Keys,
    pub modifiers: Modifiers,
    pub down: bool,
}

impl KeyEvent {
    pub fn new(key: Keys, modifiers: Modifiers, down: bool) -> Self {
        Self {
            key,
            modifiers,
            down,
        }
    }

    pub fn down(key: Keys) -> Self {
        Self::new(key, Modifiers::empty(), true)
    }

    pub fn up(key: Keys) -> Self {
        Self::new(key, Modifiers::empty(), false)
    }

    /// Build from the arguments of the host's keyboard callback
    pub fn from_raw(code: u32, down: bool, ctrl: bool, shift: bool, alt: bool) -> Self {
        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::CONTROL, ctrl);
        modifiers.set(Modifiers::SHIFT, shift);
        modifiers.set(Modifiers::ALT, alt);
        Self::new(Keys(code & Keys::KEY_CODE_MASK), modifiers, down)
    }

    /// Key code combined with modifier bits
    pub fn key_data(&self) -> u32 {
        self.key.code() | self.modifiers.bits()
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CONTROL, "Ctrl+"),
            (Modifiers::SHIFT, "Shift+"),
            (Modifiers::ALT, "Alt+"),
        ] {
            if self.modifiers.contains(flag) {
                f.write_str(name)?;
            }
        }
        write!(f, "{} {}", self.key, if self.down { "down" } else { "up" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_names() {
        assert_eq!("F5".parse::<Keys>().unwrap(), Keys(0x74));
        assert_eq!("a".parse::<Keys>().unwrap(), Keys(0x41));
        assert_eq!("7".parse::<Keys>().unwrap(), Keys(0x37));
        assert_eq!("D0".parse::<Keys>().unwrap(), Keys(0x30));
        assert_eq!("NumPad3".parse::<Keys>().unwrap(), Keys(0x63));
        assert_eq!("space".parse::<Keys>().unwrap(), Keys::SPACE);
        assert_eq!("0x75".parse::<Keys>().unwrap(), Keys(0x75));
        assert_eq!("117".parse::<Keys>().unwrap(), Keys(0x75));
        assert!("F25".parse::<Keys>().is_err());
        assert!("Hyper".parse::<Keys>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for key in [Keys::F1, Keys(0x41), Keys(0x35), Keys(0x69), Keys::ESCAPE] {
            assert_eq!(key.to_string().parse::<Keys>().unwrap(), key);
        }
    }

    #[test]
    fn test_event_from_raw() {
        let event = KeyEvent::from_raw(0x0002_0041, true, true, false, true);
        assert_eq!(event.key, Keys(0x41));
        assert!(event.modifiers.contains(Modifiers::CONTROL | Modifiers::ALT));
        assert!(!event.modifiers.contains(Modifiers::SHIFT));
        assert_eq!(event.key_data(), 0x0006_0041);
        assert_eq!(event.to_string(), "Ctrl+Alt+A down");
    }
}
