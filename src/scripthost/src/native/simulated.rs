//! In-process stand-in for the host's native table
//!
//! Maps hashes to Rust closures so the invoker and scheduler can be driven
//! without a host process. Unknown hashes are accepted and return zero,
//! the same way the real table trusts the caller.

use super::host::NativeHost;
use super::value::Vector3;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Arc;

/// Hashes invoked so far, in call order
pub type CallLog = Arc<Mutex<Vec<u64>>>;

type Handler = Box<dyn FnMut(&CallArgs) -> NativeReturn + Send>;

/// Argument words pushed for one simulated call
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    words: Vec<u64>,
}

impl CallArgs {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Raw word `index`, or 0 if fewer were pushed
    pub fn word(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }

    pub fn int(&self, index: usize) -> i32 {
        self.word(index) as u32 as i32
    }

    pub fn uint(&self, index: usize) -> u32 {
        self.word(index) as u32
    }

    pub fn float(&self, index: usize) -> f32 {
        f32::from_bits(self.word(index) as u32)
    }

    pub fn bool(&self, index: usize) -> bool {
        self.word(index) as u32 != 0
    }

    /// Read word `index` as a C string
    ///
    /// # Safety
    ///
    /// The word must be null or the address of a live NUL-terminated buffer,
    /// e.g. one pinned by the call frame.
    pub unsafe fn c_str(&self, index: usize) -> String {
        let ptr = self.word(index) as usize as *const c_char;
        if ptr.is_null() {
            return String::new();
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }

    /// Write three words through the pointer in word `index`
    ///
    /// # Safety
    ///
    /// The word must be the address of a writable buffer of at least three
    /// words, e.g. an `OutputArgument`.
    pub unsafe fn write_output(&self, index: usize, words: [u64; 3]) {
        let ptr = self.word(index) as usize as *mut u64;
        if !ptr.is_null() {
            std::ptr::copy_nonoverlapping(words.as_ptr(), ptr, 3);
        }
    }
}

/// What a simulated native returns
#[derive(Debug, Clone, PartialEq)]
pub enum NativeReturn {
    Void,
    Word(u64),
    Vector(Vector3),
    Str(String),
}

impl From<()> for NativeReturn {
    fn from(_: ()) -> Self {
        NativeReturn::Void
    }
}

impl From<bool> for NativeReturn {
    fn from(value: bool) -> Self {
        NativeReturn::Word(value as u64)
    }
}

impl From<i32> for NativeReturn {
    fn from(value: i32) -> Self {
        NativeReturn::Word(value as u32 as u64)
    }
}

impl From<u32> for NativeReturn {
    fn from(value: u32) -> Self {
        NativeReturn::Word(value as u64)
    }
}

impl From<i64> for NativeReturn {
    fn from(value: i64) -> Self {
        NativeReturn::Word(value as u64)
    }
}

impl From<u64> for NativeReturn {
    fn from(value: u64) -> Self {
        NativeReturn::Word(value)
    }
}

impl From<f32> for NativeReturn {
    fn from(value: f32) -> Self {
        NativeReturn::Word(value.to_bits() as u64)
    }
}

impl From<Vector3> for NativeReturn {
    fn from(value: Vector3) -> Self {
        NativeReturn::Vector(value)
    }
}

impl From<&str> for NativeReturn {
    fn from(value: &str) -> Self {
        NativeReturn::Str(value.to_string())
    }
}

impl From<String> for NativeReturn {
    fn from(value: String) -> Self {
        NativeReturn::Str(value)
    }
}

/// A native table backed by closures
pub struct SimulatedHost {
    handlers: HashMap<u64, Handler>,
    pending: Option<(u64, CallArgs)>,
    result: Box<[u64; 3]>,
    /// Returned string; valid until the next call
    returned: Option<CString>,
    log: CallLog,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            pending: None,
            result: Box::new([0; 3]),
            returned: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builder form of [`SimulatedHost::register`]
    pub fn with_native<F, R>(mut self, hash: u64, handler: F) -> Self
    where
        F: FnMut(&CallArgs) -> R + Send + 'static,
        R: Into<NativeReturn>,
    {
        self.register(hash, handler);
        self
    }

    pub fn register<F, R>(&mut self, hash: u64, mut handler: F)
    where
        F: FnMut(&CallArgs) -> R + Send + 'static,
        R: Into<NativeReturn>,
    {
        self.handlers
            .insert(hash, Box::new(move |args| handler(args).into()));
    }

    /// Shared log of every invoked hash
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.log)
    }

    fn store(&mut self, value: NativeReturn) {
        self.returned = None;
        *self.result = match value {
            NativeReturn::Void => [0; 3],
            NativeReturn::Word(word) => [word, 0, 0],
            NativeReturn::Vector(v) => [
                v.x.to_bits() as u64,
                v.y.to_bits() as u64,
                v.z.to_bits() as u64,
            ],
            NativeReturn::Str(text) => {
                let end = text.find('\0').unwrap_or(text.len());
                let text = CString::new(&text[..end]).unwrap_or_default();
                let address = text.as_ptr() as u64;
                self.returned = Some(text);
                [address, 0, 0]
            }
        };
    }
}

impl NativeHost for SimulatedHost {
    fn init(&mut self, hash: u64) {
        self.pending = Some((hash, CallArgs::default()));
    }

    fn push(&mut self, word: u64) {
        if let Some((_, args)) = self.pending.as_mut() {
            args.words.push(word);
        }
    }

    fn invoke(&mut self) -> *const u64 {
        let Some((hash, args)) = self.pending.take() else {
            tracing::warn!("native invoked without init");
            return std::ptr::null();
        };

        self.log.lock().push(hash);

        let value = match self.handlers.get_mut(&hash) {
            Some(handler) => handler(&args),
            None => {
                tracing::debug!(
                    hash = format_args!("{:#018x}", hash),
                    args = args.len(),
                    "no simulated native for hash"
                );
                NativeReturn::Word(0)
            }
        };

        self.store(value);
        self.result.as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(host: &mut SimulatedHost, hash: u64, words: &[u64]) -> [u64; 3] {
        host.init(hash);
        for &w in words {
            host.push(w);
        }
        let ptr = host.invoke();
        unsafe { [*ptr, *ptr.add(1), *ptr.add(2)] }
    }

    #[test]
    fn test_handlers_receive_pushed_words() {
        let mut host = SimulatedHost::new().with_native(1, |args: &CallArgs| args.int(0) + args.int(1));
        assert_eq!(call(&mut host, 1, &[40, 2])[0], 42);
    }

    #[test]
    fn test_unknown_hash_returns_zero_and_is_logged() {
        let mut host = SimulatedHost::new();
        let log = host.call_log();
        assert_eq!(call(&mut host, 0xDEAD, &[1, 2, 3]), [0, 0, 0]);
        assert_eq!(*log.lock(), vec![0xDEAD]);
    }

    #[test]
    fn test_vector_and_string_returns() {
        let mut host = SimulatedHost::new()
            .with_native(2, |_: &CallArgs| Vector3::new(1.0, 2.0, 3.0))
            .with_native(3, |_: &CallArgs| "label");

        let v = call(&mut host, 2, &[]);
        assert_eq!(f32::from_bits(v[1] as u32), 2.0);

        let s = call(&mut host, 3, &[]);
        let text = unsafe { CStr::from_ptr(s[0] as usize as *const c_char) };
        assert_eq!(text.to_str().unwrap(), "label");
    }

    #[test]
    fn test_invoke_without_init_is_null() {
        let mut host = SimulatedHost::new();
        assert!(host.invoke().is_null());
    }
}
