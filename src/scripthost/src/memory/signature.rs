//! Signature definitions
//!
//! Signatures are configuration data, not logic: they change with every
//! host binary update. The built-in set can be replaced or extended from the
//! `[signatures]` table of the config file without touching the scanner.

use super::pattern::{Pattern, PatternScanner, Resolve};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Global holding a pointer to the entity handle pool
pub const ENTITY_POOL: &str = "entity_pool";
/// Global holding a pointer to the vehicle pool (bit-array layout)
pub const VEHICLE_POOL: &str = "vehicle_pool";
/// Global holding a pointer to the ped pool
pub const PED_POOL: &str = "ped_pool";
/// Global holding a pointer to the prop/object pool
pub const OBJECT_POOL: &str = "object_pool";
/// Global holding a pointer to the pickup object pool
pub const PICKUP_OBJECT_POOL: &str = "pickup_object_pool";
/// `CEntity* GetEntityAddress(int handle)`
pub const ENTITY_ADDRESS_FUNC: &str = "entity_address_func";
/// `int AddEntityToPool(CEntity* entity)` - returns the entity's script handle
pub const ADD_ENTITY_TO_POOL_FUNC: &str = "add_entity_to_pool_func";
/// Label text table used by text lookups
pub const STRING_LABEL_TABLE: &str = "string_label_table";

/// A named signature and the rule that turns its match into an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub pattern: Pattern,
    pub resolve: Resolve,
}

impl Signature {
    pub fn new(name: &str, pattern: &str, resolve: Resolve) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            pattern: Pattern::parse(pattern)?,
            resolve,
        })
    }

    /// Scan for this signature and apply its resolution rule
    pub fn resolve(&self, scanner: &PatternScanner<'_>) -> Result<usize> {
        let matched = scanner.find(&self.pattern).map_err(|err| match err {
            Error::PatternNotFound { .. } => Error::PatternNotFound {
                name: self.name.clone(),
            },
            other => other,
        })?;
        scanner.apply(matched, self.resolve)
    }
}

impl PatternScanner<'_> {
    pub fn resolve(&self, signature: &Signature) -> Result<usize> {
        signature.resolve(self)
    }
}

/// Signature as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDef {
    pub pattern: String,
    #[serde(default)]
    pub resolve: Resolve,
}

const fn rip(displacement_offset: usize, instruction_length: usize) -> Resolve {
    Resolve::Relative {
        displacement_offset,
        instruction_length,
    }
}

/// Built-in signatures for host build 1.0.2372.0
const BUILTIN: &[(&str, &str, Resolve)] = &[
    (ENTITY_POOL, "4C 8B 0D ?? ?? ?? ?? 44 8B C1 49 8B 41 08", rip(3, 7)),
    (VEHICLE_POOL, "48 8B 05 ?? ?? ?? ?? F3 0F 59 F6 48 8B 08", rip(3, 7)),
    (PED_POOL, "48 8B 05 ?? ?? ?? ?? 41 0F BF C8 0F BF 40 10", rip(3, 7)),
    (OBJECT_POOL, "48 8B 05 ?? ?? ?? ?? 8B 78 10 85 FF", rip(3, 7)),
    (PICKUP_OBJECT_POOL, "4C 8B 05 ?? ?? ?? ?? 40 8A F2 8B E9", rip(3, 7)),
    (ENTITY_ADDRESS_FUNC, "E8 ?? ?? ?? ?? 48 8B D8 48 85 C0 74 2E 48 83 3D", rip(1, 5)),
    (
        ADD_ENTITY_TO_POOL_FUNC,
        "48 F7 F9 49 8B 48 08 48 63 D0 C1 E0 08 0F B6 1C 11 03 D8",
        Resolve::Direct { offset: -0x68 },
    ),
    (STRING_LABEL_TABLE, "84 C0 74 34 48 8D 0D ?? ?? ?? ?? 48 8B D3", rip(7, 11)),
];

/// An ordered, named collection of signatures
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    signatures: BTreeMap<String, Signature>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default signatures shipped with the library
    pub fn builtin() -> Self {
        let mut set = Self::new();
        for &(name, pattern, resolve) in BUILTIN {
            // Built-in text is a compile-time constant covered by tests
            if let Ok(signature) = Signature::new(name, pattern, resolve) {
                set.insert(signature);
            }
        }
        set
    }

    /// Replace or add signatures from config definitions
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, SignatureDef>) -> Result<Self> {
        for (name, def) in overrides {
            tracing::info!(signature = %name, pattern = %def.pattern, "signature override");
            self.insert(Signature::new(name, &def.pattern, def.resolve)?);
        }
        Ok(self)
    }

    pub fn insert(&mut self, signature: Signature) {
        self.signatures.insert(signature.name.clone(), signature);
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.values()
    }

    /// Resolve every signature. A single miss fails the whole set: every
    /// dependent subsystem assumes its address is valid afterwards.
    pub fn resolve_all(&self, scanner: &PatternScanner<'_>) -> Result<ResolvedAddresses> {
        let mut addresses = BTreeMap::new();

        for signature in self.iter() {
            match signature.resolve(scanner) {
                Ok(address) => {
                    tracing::debug!(
                        signature = %signature.name,
                        address = format_args!("{:#x}", address),
                        "signature resolved"
                    );
                    addresses.insert(signature.name.clone(), address);
                }
                Err(err) => {
                    tracing::error!(
                        signature = %signature.name,
                        pattern = %signature.pattern,
                        error = %err,
                        "signature resolution failed"
                    );
                    return Err(err);
                }
            }
        }

        Ok(ResolvedAddresses { addresses })
    }
}

/// Addresses resolved once at startup and immutable afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    addresses: BTreeMap<String, usize>,
}

impl ResolvedAddresses {
    pub fn from_map(addresses: BTreeMap<String, usize>) -> Self {
        Self { addresses }
    }

    /// Address for `name`; a missing entry is reported as an unresolved pattern
    pub fn get(&self, name: &str) -> Result<usize> {
        self.addresses
            .get(name)
            .copied()
            .ok_or_else(|| Error::PatternNotFound {
                name: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.addresses.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
