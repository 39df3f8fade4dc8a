//! Pinned native strings

use std::ffi::CString;

/// A NUL-terminated copy of a Rust string whose address is handed to the host.
///
/// The heap buffer never moves while the value is alive, so the address
/// returned by [`PinnedString::address`] stays valid until it is dropped.
#[derive(Debug)]
pub struct PinnedString(CString);

impl PinnedString {
    /// Copy `text`; an interior NUL ends the string there, as the host would read it
    pub fn new(text: &str) -> Self {
        let end = text.find('\0').unwrap_or(text.len());
        // No NUL remains in text[..end]
        let inner = CString::new(&text[..end]).unwrap_or_default();
        Self(inner)
    }

    pub fn address(&self) -> u64 {
        self.0.as_ptr() as u64
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or_default()
    }
}

/// Every pinned string consumed during the current tick.
///
/// Frames own their pins until they execute; afterwards the arena holds them
/// until the driving thread finishes the tick.
#[derive(Debug, Default)]
pub struct StringArena {
    pins: Vec<PinnedString>,
}

impl StringArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a string directly on the driving thread
    pub fn pin(&mut self, text: &str) -> u64 {
        let pin = PinnedString::new(text);
        let address = pin.address();
        self.pins.push(pin);
        address
    }

    /// Take ownership of pins from an executed frame
    pub fn adopt(&mut self, pins: impl IntoIterator<Item = PinnedString>) {
        self.pins.extend(pins);
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Free everything pinned this tick; returns how many strings were released
    pub fn end_tick(&mut self) -> usize {
        let released = self.pins.len();
        self.pins.clear();
        released
    }
}
