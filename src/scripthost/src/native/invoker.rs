//! Native call marshalling
//!
//! A [`NativeCallFrame`] is built wherever the call originates (usually a
//! script worker) and executed by the [`NativeInvoker`] on the driving
//! thread. Strings are pinned when the frame is built and stay owned by the
//! frame until it executes; the invoker then hands them to the tick's
//! [`StringArena`].

use super::arena::{PinnedString, StringArena};
use super::arg::NativeArg;
use super::host::NativeHost;
use super::value::{FromNative, RawResult};
use crate::Result;

/// One encoded native call, ready to execute
#[derive(Debug)]
pub struct NativeCallFrame {
    hash: u64,
    words: Vec<u64>,
    pins: Vec<PinnedString>,
}

impl NativeCallFrame {
    pub fn new<I>(hash: u64, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        let mut pins = Vec::new();
        let words = args
            .into_iter()
            .map(|arg| arg.into().encode(&mut pins))
            .collect();
        Self { hash, words, pins }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn pinned_strings(&self) -> usize {
        self.pins.len()
    }
}

/// Drives a [`NativeHost`]; only ever touched on the driving thread
pub struct NativeInvoker {
    host: Box<dyn NativeHost>,
    calls: u64,
}

impl NativeInvoker {
    pub fn new(host: impl NativeHost + 'static) -> Self {
        Self {
            host: Box::new(host),
            calls: 0,
        }
    }

    /// Run `frame` and copy out the result words.
    ///
    /// Unrecognized hashes are passed through; the host is trusted.
    pub fn execute(&mut self, frame: NativeCallFrame, arena: &mut StringArena) -> RawResult {
        let NativeCallFrame { hash, words, pins } = frame;

        self.host.init(hash);
        for &word in &words {
            self.host.push(word);
        }
        let result = self.host.invoke();
        self.calls += 1;

        let copied = if result.is_null() {
            [0; 3]
        } else {
            // SAFETY: the host's result buffer holds at least three words
            // and stays valid until the next call on this thread.
            unsafe { std::ptr::read(result as *const [u64; 3]) }
        };

        arena.adopt(pins);

        tracing::trace!(
            hash = format_args!("{:#018x}", hash),
            args = words.len(),
            result = format_args!("{:#x}", copied[0]),
            "native call"
        );

        // SAFETY: pointer payloads come from the host and live until the
        // next call; decoding happens before that on this thread.
        unsafe { RawResult::new(copied) }
    }

    /// Encode, execute and decode in one step
    pub fn call<T, I>(&mut self, arena: &mut StringArena, hash: u64, args: I) -> Result<T>
    where
        T: FromNative,
        I: IntoIterator,
        I::Item: Into<NativeArg>,
    {
        self.execute(NativeCallFrame::new(hash, args), arena).decode()
    }

    /// Total calls executed
    pub fn calls(&self) -> u64 {
        self.calls
    }
}
