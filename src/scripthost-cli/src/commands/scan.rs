//! Offline signature scanning against a module image on disk

use anyhow::{bail, Context, Result};
use scripthost::memory::{MappedFile, MemorySource, ModuleImage, Pattern, PatternScanner, SignatureSet};
use scripthost::Config;
use std::path::Path;

fn open_image(image: &Path, base: usize) -> Result<MappedFile> {
    let mapped = MappedFile::open(image, base)
        .with_context(|| format!("Failed to map {}", image.display()))?;
    if mapped.is_empty() {
        bail!("{} is empty", image.display());
    }
    Ok(mapped)
}

/// Space-separated uppercase hex, e.g. `48 8B 05`
fn hex_bytes(bytes: &[u8]) -> String {
    let encoded = hex::encode_upper(bytes);
    encoded
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bytes at `address`, clamped to the end of the image
fn context_bytes(source: &MappedFile, address: usize, count: usize) -> Vec<u8> {
    let end = source.base_address() + source.len();
    let count = count.min(end.saturating_sub(address));
    source.read_bytes(address, count).unwrap_or_default()
}

pub fn scan(image: &Path, pattern: &str, base: usize, all: bool, context: usize) -> Result<()> {
    let pattern = Pattern::parse(pattern).context("Invalid pattern")?;
    let mapped = open_image(image, base)?;
    let module = ModuleImage::new(base, mapped.len());
    let scanner = PatternScanner::new(&mapped, module)?;

    let matches = if all {
        scanner.find_all(&pattern)
    } else {
        scanner.find(&pattern).into_iter().collect()
    };

    if matches.is_empty() {
        bail!("Pattern not found: {}", pattern);
    }

    println!("Pattern: {} ({})", pattern, pattern.mask_string());
    for address in &matches {
        println!(
            "  {:#x} (+{:#x})  {}",
            address,
            address - base,
            hex_bytes(&context_bytes(&mapped, *address, context))
        );
    }
    println!("{} match(es)", matches.len());

    Ok(())
}

pub fn resolve(image: &Path, base: usize, config: &Config, keep_going: bool) -> Result<()> {
    let mapped = open_image(image, base)?;
    let module = ModuleImage::new(base, mapped.len());
    let scanner = PatternScanner::new(&mapped, module)?;
    let set = SignatureSet::builtin()
        .with_overrides(&config.signatures)
        .context("Invalid signature override")?;

    if !keep_going {
        let resolved = set.resolve_all(&scanner)?;
        for (name, address) in resolved.iter() {
            println!("  {:<24} {:#x}", name, address);
        }
        println!("{} signature(s) resolved", resolved.len());
        return Ok(());
    }

    let mut missing = 0;
    for signature in set.iter() {
        match scanner.resolve(signature) {
            Ok(address) => println!("  {:<24} {:#x}", signature.name, address),
            Err(err) => {
                missing += 1;
                println!("  {:<24} MISSING ({})", signature.name, err);
            }
        }
    }

    if missing > 0 {
        bail!("{} of {} signature(s) did not resolve", missing, set.len());
    }
    Ok(())
}
