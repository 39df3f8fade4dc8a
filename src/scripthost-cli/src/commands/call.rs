//! One-off native calls against the simulated host

use super::demo;
use anyhow::{bail, Context, Result};
use scripthost::memory::joaat;
use scripthost::native::{decode_dynamic, NativeArg, NativeCallFrame, NativeValue, Ped, Vehicle};
use scripthost::HostState;
use std::any::Any;
use std::str::FromStr;

pub fn handle(hash: u64, args: &[String], returns: &str) -> Result<()> {
    let value = invoke(hash, args, returns)?;
    println!("{:#018x} -> {}", hash, value);
    Ok(())
}

/// Run `hash` with arguments given as `type:value` (or untyped) and decode
/// the result as the type named `returns`
pub fn invoke(hash: u64, args: &[String], returns: &str) -> Result<NativeValue> {
    let args = args
        .iter()
        .map(|arg| parse_arg(arg))
        .collect::<Result<Vec<_>>>()?;

    let mut state = HostState::new(demo::simulated_host());
    let raw = state.execute(NativeCallFrame::new(hash, args));
    decode_dynamic(&raw, returns).with_context(|| format!("Cannot read result as '{}'", returns))
}

fn typed<T>(text: &str) -> Result<NativeArg>
where
    T: FromStr + Any,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: T = text
        .parse()
        .with_context(|| format!("Invalid {} '{}'", std::any::type_name::<T>(), text))?;
    Ok(NativeArg::from_any(&value)?)
}

fn parse_arg(text: &str) -> Result<NativeArg> {
    let Some((kind, value)) = text.split_once(':') else {
        return infer(text);
    };
    match kind.to_ascii_lowercase().as_str() {
        "bool" => typed::<bool>(value),
        "int" | "i32" => typed::<i32>(value),
        "uint" | "u32" => typed::<u32>(value),
        "long" | "i64" => typed::<i64>(value),
        "float" | "f32" => typed::<f32>(value),
        "str" | "string" => typed::<String>(value),
        "hash" => Ok(NativeArg::from_any(&joaat(value))?),
        "ped" => Ok(NativeArg::from_any(&Ped(value.parse()?))?),
        "vehicle" => Ok(NativeArg::from_any(&Vehicle(value.parse()?))?),
        other => bail!("Unknown argument type '{}'", other),
    }
}

/// Integers, then floats, then booleans; anything else is a string
fn infer(text: &str) -> Result<NativeArg> {
    typed::<i32>(text)
        .or_else(|_| typed::<f32>(text))
        .or_else(|_| typed::<bool>(text))
        .or_else(|_| typed::<String>(text))
}
