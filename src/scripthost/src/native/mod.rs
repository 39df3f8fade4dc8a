//! Native call bridge
//!
//! - `arg` - argument sum type and output buffers
//! - `value` - result decoding, vectors and handle types
//! - `arena` - pinned strings and the per-tick arena
//! - `host` - the host's three-step call ABI
//! - `invoker` - call frames and their execution
//! - `simulated` - closure-backed native table for tools and tests

mod arena;
mod arg;
mod host;
mod invoker;
mod simulated;
mod value;

pub use arena::{PinnedString, StringArena};
pub use arg::{NativeArg, OutputArgument, NO_ARGS};
pub use host::{FunctionTable, NativeCallFn, NativeHost, NativeInitFn, NativePushFn};
pub use invoker::{NativeCallFrame, NativeInvoker};
pub use simulated::{CallArgs, CallLog, NativeReturn, SimulatedHost};
pub use value::{
    decode_dynamic, Entity, FromNative, HandleObject, NativeType, NativeValue, Ped, Player, Prop,
    RawResult, Vector3, Vehicle,
};
