//! Native call ABI
//!
//! The host exposes three entry points: begin a call for a hash, push one
//! 64-bit argument word, and invoke. Invocation returns a pointer to the
//! result buffer, valid until the next call.

/// The three-step native call protocol
pub trait NativeHost: Send {
    fn init(&mut self, hash: u64);

    fn push(&mut self, word: u64);

    /// Run the call; null when the native returns nothing
    fn invoke(&mut self) -> *const u64;
}

pub type NativeInitFn = unsafe extern "C" fn(hash: u64);
pub type NativePushFn = unsafe extern "C" fn(value: u64);
pub type NativeCallFn = unsafe extern "C" fn() -> *mut u64;

/// Entry points exported by the host's scripting runtime
#[derive(Debug, Clone, Copy)]
pub struct FunctionTable {
    init: NativeInitFn,
    push: NativePushFn,
    call: NativeCallFn,
}

impl FunctionTable {
    /// # Safety
    ///
    /// The pointers must be the host's `nativeInit`, `nativePush64` and
    /// `nativeCall` exports, and the table may only be driven from the
    /// host's driving thread.
    pub unsafe fn new(init: NativeInitFn, push: NativePushFn, call: NativeCallFn) -> Self {
        Self { init, push, call }
    }

    /// # Safety
    ///
    /// Same contract as [`FunctionTable::new`], with raw addresses.
    pub unsafe fn from_addresses(init: usize, push: usize, call: usize) -> Self {
        Self::new(
            std::mem::transmute::<usize, NativeInitFn>(init),
            std::mem::transmute::<usize, NativePushFn>(push),
            std::mem::transmute::<usize, NativeCallFn>(call),
        )
    }
}

impl NativeHost for FunctionTable {
    fn init(&mut self, hash: u64) {
        // SAFETY: upheld by the constructor contract
        unsafe { (self.init)(hash) }
    }

    fn push(&mut self, word: u64) {
        // SAFETY: upheld by the constructor contract
        unsafe { (self.push)(word) }
    }

    fn invoke(&mut self) -> *const u64 {
        // SAFETY: upheld by the constructor contract
        unsafe { (self.call)() as *const u64 }
    }
}
