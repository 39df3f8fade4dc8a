//! Native return values
//!
//! A native call writes its result into a three-word scratch buffer. The
//! requested Rust type decides how those words are reinterpreted.

use super::arg::NativeArg;
use crate::memory::PoolHandle;
use crate::{Error, Result};

use std::ffi::CStr;
use std::fmt;
use std::os::raw::c_char;

/// Three f32 components, laid out by the host at 8-byte strides
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(self, other: Vector3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Natives take vectors as three float arguments
    pub fn to_args(self) -> [NativeArg; 3] {
        [self.x.into(), self.y.into(), self.z.into()]
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Words read back from the result buffer of one native call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawResult {
    words: [u64; 3],
    /// Word 0 may be dereferenced as a C string
    strings: bool,
}

impl RawResult {
    /// # Safety
    ///
    /// When decoded as a string, `words[0]` is dereferenced as a C string
    /// pointer. It must be null or point at a NUL-terminated buffer that
    /// outlives every decode of this value.
    pub unsafe fn new(words: [u64; 3]) -> Self {
        Self {
            words,
            strings: true,
        }
    }

    /// Words with no pointer payload; decoding a non-null string fails
    pub fn from_words(words: [u64; 3]) -> Self {
        Self {
            words,
            strings: false,
        }
    }

    pub fn from_scalar(word: u64) -> Self {
        Self::from_words([word, 0, 0])
    }

    pub fn word(&self) -> u64 {
        self.words[0]
    }

    pub fn words(&self) -> [u64; 3] {
        self.words
    }

    pub fn decode<T: FromNative>(&self) -> Result<T> {
        T::from_raw(self)
    }
}

/// Reinterpret a native result buffer as a Rust value
pub trait FromNative: Sized {
    fn from_raw(raw: &RawResult) -> Result<Self>;
}

impl FromNative for () {
    fn from_raw(_: &RawResult) -> Result<Self> {
        Ok(())
    }
}

impl FromNative for bool {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(raw.word() as u32 != 0)
    }
}

impl FromNative for i32 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(raw.word() as u32 as i32)
    }
}

impl FromNative for u32 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(raw.word() as u32)
    }
}

impl FromNative for i64 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(raw.word() as i64)
    }
}

impl FromNative for u64 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(raw.word())
    }
}

impl FromNative for f32 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(f32::from_bits(raw.word() as u32))
    }
}

impl FromNative for f64 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        Ok(f32::from_raw(raw)? as f64)
    }
}

impl FromNative for String {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        let ptr = raw.word() as usize as *const c_char;
        if ptr.is_null() {
            return Ok(String::new());
        }
        if !raw.strings {
            return Err(Error::InvalidCast {
                type_name: format!("String from scalar word {:#x}", raw.word()),
            });
        }
        // SAFETY: `RawResult::new` requires a valid C string or null in word 0.
        let text = unsafe { CStr::from_ptr(ptr) };
        Ok(text.to_string_lossy().into_owned())
    }
}

impl FromNative for Vector3 {
    fn from_raw(raw: &RawResult) -> Result<Self> {
        let [x, y, z] = raw.words();
        Ok(Vector3::new(
            f32::from_bits(x as u32),
            f32::from_bits(y as u32),
            f32::from_bits(z as u32),
        ))
    }
}

/// A game object addressed by its script handle
pub trait HandleObject: Copy {
    fn from_handle(handle: i32) -> Self;

    fn handle(&self) -> i32;

    fn pool_handle(&self) -> PoolHandle {
        PoolHandle::from_raw(self.handle() as u32)
    }

    /// Handle 0 never names a live object
    fn is_null(&self) -> bool {
        self.handle() == 0
    }
}

macro_rules! handle_types {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
            pub struct $name(pub i32);

            impl HandleObject for $name {
                fn from_handle(handle: i32) -> Self {
                    Self(handle)
                }

                fn handle(&self) -> i32 {
                    self.0
                }
            }

            impl FromNative for $name {
                fn from_raw(raw: &RawResult) -> Result<Self> {
                    Ok(Self::from_handle(i32::from_raw(raw)?))
                }
            }

            impl From<$name> for NativeArg {
                fn from(value: $name) -> Self {
                    NativeArg::Handle(value.0)
                }
            }

            impl From<&$name> for NativeArg {
                fn from(value: &$name) -> Self {
                    NativeArg::Handle(value.0)
                }
            }
        )*
    };
}

handle_types! {
    /// Any world entity
    Entity,
    /// A pedestrian (player characters included)
    Ped,
    Vehicle,
    Prop,
    /// Player index, not an entity handle
    Player,
}

macro_rules! entity_upcast {
    ($($name:ident),*) => {
        $(
            impl From<$name> for Entity {
                fn from(value: $name) -> Self {
                    Entity(value.0)
                }
            }
        )*
    };
}

entity_upcast!(Ped, Vehicle, Prop);

/// Return type named at runtime (CLI and config driven calls)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Void,
    Bool,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    String,
    Vector3,
    Handle,
}

impl NativeType {
    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "void" | "()" => NativeType::Void,
            "bool" => NativeType::Bool,
            "int" | "i32" => NativeType::Int,
            "uint" | "u32" | "hash" => NativeType::UInt,
            "long" | "i64" => NativeType::Long,
            "ulong" | "u64" | "pointer" => NativeType::ULong,
            "float" | "f32" => NativeType::Float,
            "double" | "f64" => NativeType::Double,
            "string" | "str" => NativeType::String,
            "vector3" | "vec3" => NativeType::Vector3,
            "handle" | "entity" | "ped" | "vehicle" | "prop" | "player" => NativeType::Handle,
            _ => {
                return Err(Error::InvalidCast {
                    type_name: name.to_string(),
                })
            }
        })
    }

    pub fn decode(self, raw: &RawResult) -> Result<NativeValue> {
        Ok(match self {
            NativeType::Void => NativeValue::Void,
            NativeType::Bool => NativeValue::Bool(raw.decode()?),
            NativeType::Int => NativeValue::Int(raw.decode()?),
            NativeType::UInt => NativeValue::UInt(raw.decode()?),
            NativeType::Long => NativeValue::Long(raw.decode()?),
            NativeType::ULong => NativeValue::ULong(raw.decode()?),
            NativeType::Float => NativeValue::Float(raw.decode()?),
            NativeType::Double => NativeValue::Double(raw.decode()?),
            NativeType::String => NativeValue::String(raw.decode()?),
            NativeType::Vector3 => NativeValue::Vector3(raw.decode()?),
            NativeType::Handle => NativeValue::Handle(raw.decode::<Entity>()?.0),
        })
    }
}

/// A decoded value of a runtime-named type
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Void,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
    Vector3(Vector3),
    Handle(i32),
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Void => write!(f, "void"),
            NativeValue::Bool(v) => write!(f, "{}", v),
            NativeValue::Int(v) => write!(f, "{}", v),
            NativeValue::UInt(v) => write!(f, "{:#x}", v),
            NativeValue::Long(v) => write!(f, "{}", v),
            NativeValue::ULong(v) => write!(f, "{:#x}", v),
            NativeValue::Float(v) => write!(f, "{}", v),
            NativeValue::Double(v) => write!(f, "{}", v),
            NativeValue::String(v) => write!(f, "{:?}", v),
            NativeValue::Vector3(v) => write!(f, "{}", v),
            NativeValue::Handle(v) => write!(f, "handle {}", v),
        }
    }
}

/// Decode `raw` as the type called `type_name`
pub fn decode_dynamic(raw: &RawResult, type_name: &str) -> Result<NativeValue> {
    NativeType::parse(type_name)?.decode(raw)
}
