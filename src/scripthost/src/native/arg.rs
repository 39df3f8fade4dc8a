//! Native call arguments
//!
//! Every argument kind the native ABI understands is one variant of
//! [`NativeArg`]. Conversions from Rust types are explicit `From` impls;
//! anything else is rejected with [`Error::InvalidCast`].

use super::arena::PinnedString;
use super::value::{FromNative, RawResult, Vector3};
use crate::{Error, Result};

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// Argument list for natives that take none
pub const NO_ARGS: [NativeArg; 0] = [];

/// One argument of a native call
#[derive(Debug, Clone, PartialEq)]
pub enum NativeArg {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    /// Passed as the address of a pinned copy
    Str(String),
    Handle(i32),
    Pointer(u64),
    /// Scratch buffer the native writes through
    Output(OutputArgument),
}

impl NativeArg {
    /// Encode as a single 64-bit word, pinning strings into `pins`
    pub fn encode(&self, pins: &mut Vec<PinnedString>) -> u64 {
        match self {
            NativeArg::Bool(v) => *v as u64,
            NativeArg::Int(v) => *v as u64,
            NativeArg::UInt(v) => *v,
            NativeArg::Float(v) => v.to_bits() as u64,
            NativeArg::Str(text) => {
                let pin = PinnedString::new(text);
                let address = pin.address();
                pins.push(pin);
                address
            }
            NativeArg::Handle(v) => *v as i64 as u64,
            NativeArg::Pointer(v) => *v,
            NativeArg::Output(out) => out.address(),
        }
    }

    /// Convert a type-erased value, failing for types with no native encoding
    pub fn from_any<T: Any>(value: &T) -> Result<Self> {
        let value: &dyn Any = value;

        macro_rules! try_types {
            ($($ty:ty),*) => {
                $(
                    if let Some(v) = value.downcast_ref::<$ty>() {
                        return Ok(NativeArg::from(v.clone()));
                    }
                )*
            };
        }

        try_types!(
            NativeArg, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String,
            &'static str, OutputArgument, super::Entity, super::Ped, super::Vehicle, super::Prop,
            super::Player
        );

        Err(Error::invalid_cast::<T>())
    }
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for NativeArg {
            fn from(value: $ty) -> Self {
                NativeArg::Int(value as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for NativeArg {
            fn from(value: $ty) -> Self {
                NativeArg::UInt(value as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<bool> for NativeArg {
    fn from(value: bool) -> Self {
        NativeArg::Bool(value)
    }
}

impl From<f32> for NativeArg {
    fn from(value: f32) -> Self {
        NativeArg::Float(value)
    }
}

/// Narrowed to f32; the ABI has no double arguments
impl From<f64> for NativeArg {
    fn from(value: f64) -> Self {
        NativeArg::Float(value as f32)
    }
}

impl From<&str> for NativeArg {
    fn from(value: &str) -> Self {
        NativeArg::Str(value.to_string())
    }
}

impl From<String> for NativeArg {
    fn from(value: String) -> Self {
        NativeArg::Str(value)
    }
}

impl From<&String> for NativeArg {
    fn from(value: &String) -> Self {
        NativeArg::Str(value.clone())
    }
}

impl From<OutputArgument> for NativeArg {
    fn from(value: OutputArgument) -> Self {
        NativeArg::Output(value)
    }
}

impl From<&OutputArgument> for NativeArg {
    fn from(value: &OutputArgument) -> Self {
        NativeArg::Output(value.clone())
    }
}

/// Scratch buffer for natives that return through a pointer parameter.
///
/// Clones share the buffer, so a script keeps one handle while the call
/// frame carries another to the driving thread.
#[derive(Debug, Clone, Default)]
pub struct OutputArgument {
    buffer: Arc<Mutex<Box<[u64; 3]>>>,
}

impl OutputArgument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the heap buffer; stable for the argument's lifetime
    pub fn address(&self) -> u64 {
        self.buffer.lock().as_mut_ptr() as u64
    }

    pub fn words(&self) -> [u64; 3] {
        **self.buffer.lock()
    }

    /// Decode what the native wrote. String pointers are refused; use
    /// [`OutputArgument::c_str`] for natives that write one.
    pub fn get<T: FromNative>(&self) -> Result<T> {
        RawResult::from_words(self.words()).decode()
    }

    /// Read the C string a native wrote into word 0
    ///
    /// # Safety
    ///
    /// Word 0 must be null or point at a NUL-terminated buffer that is
    /// still alive, as for natives that write a string pointer here.
    pub unsafe fn c_str(&self) -> Result<String> {
        RawResult::new(self.words()).decode()
    }

    /// Shorthand for natives that write a vector
    pub fn vector(&self) -> Result<Vector3> {
        self.get()
    }
}

impl PartialEq for OutputArgument {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}
