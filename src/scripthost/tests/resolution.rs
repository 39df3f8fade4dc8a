//! Signatures resolved from a module image feed the pool accessor and label table

use parking_lot::Mutex;
use scripthost::domain::{ScriptDomain, ScriptRegistry};
use scripthost::memory::signature::{
    ADD_ENTITY_TO_POOL_FUNC, ENTITY_ADDRESS_FUNC, ENTITY_POOL, OBJECT_POOL, PED_POOL,
    PICKUP_OBJECT_POOL, STRING_LABEL_TABLE, VEHICLE_POOL,
};
use scripthost::memory::source::MockMemorySource;
use scripthost::memory::{
    joaat, LabelTable, MemoryRegion, MemorySource, ModuleImage, PatternScanner, PoolAccessor,
    PoolFilter, PoolHandle, PoolKind, Resolve, ResolvedAddresses, SignatureSet,
};
use scripthost::native::{SimulatedHost, Vector3};
use scripthost::script::{Script, ScriptContext, ScriptResult};
use scripthost::{Config, HostState};
use std::collections::BTreeMap;
use std::sync::Arc;

const CODE: usize = 0x10000;
const CODE_SIZE: usize = 0x800;
const DATA: usize = CODE + CODE_SIZE;

const ENTITY_GLOBAL: usize = DATA;
const PED_GLOBAL: usize = DATA + 0x08;
const VEHICLE_GLOBAL: usize = DATA + 0x10;
const OBJECT_GLOBAL: usize = DATA + 0x18;
const PICKUP_GLOBAL: usize = DATA + 0x20;
const ENTITY_ADDRESS_ROUTINE: usize = CODE + 0x10;

const HANDLE_POOL: usize = DATA + 0x100;
const HANDLE_GENS: usize = DATA + 0x180;
const HANDLE_ITEMS: usize = DATA + 0x200;
const PED_POOL_HEADER: usize = DATA + 0x300;
const PED_GENS: usize = DATA + 0x380;
const PED_ITEMS: usize = DATA + 0x400;
const VEHICLE_POOL_HEADER: usize = DATA + 0x600;
const LABEL_TABLE: usize = DATA + 0x700;
const LABEL_ENTRIES: usize = DATA + 0x740;
const LABEL_TEXT: usize = DATA + 0x780;

const PED_HANDLE: PoolHandle = PoolHandle::from_raw((2 << 8) | 7);

/// Write every built-in signature into the code section, pointing its
/// operand at `targets[name]`. Returns the addresses resolution must yield.
fn emit_signatures(mem: &mut MockMemorySource, targets: &BTreeMap<&str, usize>) -> BTreeMap<String, usize> {
    let mut expected = BTreeMap::new();

    for (i, signature) in SignatureSet::builtin().iter().enumerate() {
        let at = CODE + 0x100 + i * 0x40;
        let bytes: Vec<u8> = signature
            .pattern
            .to_string()
            .split_whitespace()
            .map(|token| u8::from_str_radix(token, 16).unwrap_or(0))
            .collect();
        mem.put_bytes(at, &bytes);

        let address = match signature.resolve {
            Resolve::Relative {
                displacement_offset,
                instruction_length,
            } => {
                let target = targets[signature.name.as_str()];
                let disp = target as i64 - (at + instruction_length) as i64;
                mem.put_bytes(at + displacement_offset, &(disp as i32).to_le_bytes());
                target
            }
            Resolve::Direct { offset } => at.wrapping_add_signed(offset),
        };
        expected.insert(signature.name.clone(), address);
    }
    expected
}

fn populate_pools(mem: &mut MockMemorySource) -> usize {
    mem.put_u64(ENTITY_GLOBAL, HANDLE_POOL as u64);
    mem.put_u64(HANDLE_POOL, HANDLE_ITEMS as u64);
    mem.put_u64(HANDLE_POOL + 0x08, HANDLE_GENS as u64);
    mem.put_u32(HANDLE_POOL + 0x10, 4);
    mem.put_u32(HANDLE_POOL + 0x14, 0x10);
    for slot in 0..4 {
        mem.put_u8(HANDLE_GENS + slot, 0x80);
    }

    mem.put_u64(PED_GLOBAL, PED_POOL_HEADER as u64);
    mem.put_u64(PED_POOL_HEADER, PED_ITEMS as u64);
    mem.put_u64(PED_POOL_HEADER + 0x08, PED_GENS as u64);
    mem.put_u32(PED_POOL_HEADER + 0x10, 1);
    mem.put_u32(PED_POOL_HEADER + 0x14, 0x100);

    let ped = PED_ITEMS;
    mem.put_u8(PED_GENS, 1);
    mem.put_f32(ped + 0x90, 12.0);
    mem.put_f32(ped + 0x94, -4.5);
    mem.put_f32(ped + 0x98, 70.25);

    mem.put_u8(HANDLE_GENS + PED_HANDLE.index(), PED_HANDLE.generation());
    mem.put_u64(HANDLE_ITEMS + PED_HANDLE.index() * 0x10 + 0x08, ped as u64);

    // Empty vehicle pool; object and pickup globals stay null
    mem.put_u64(VEHICLE_GLOBAL, VEHICLE_POOL_HEADER as u64);
    ped
}

fn populate_labels(mem: &mut MockMemorySource) {
    let text = b"Truffade Adder\0";
    mem.put_u64(LABEL_TABLE, LABEL_ENTRIES as u64);
    mem.put_u32(LABEL_TABLE + 0x08, 1);
    mem.put_u32(LABEL_ENTRIES, joaat("ADDER"));
    mem.put_u64(LABEL_ENTRIES + 0x08, LABEL_TEXT as u64);
    mem.put_bytes(LABEL_TEXT, text);
}

/// A host image with code and data sections, plus the resolved addresses
fn host_image() -> (Arc<dyn MemorySource>, ResolvedAddresses, usize) {
    let regions = vec![
        MemoryRegion::new(CODE, DATA, "r-xp").with_path("host.exe"),
        MemoryRegion::new(DATA, DATA + 0x1000, "rw-p").with_path("host.exe"),
    ];
    let mut mem = MockMemorySource::with_regions(vec![0; CODE_SIZE + 0x1000], CODE, regions);

    let targets: BTreeMap<&str, usize> = [
        (ENTITY_POOL, ENTITY_GLOBAL),
        (PED_POOL, PED_GLOBAL),
        (VEHICLE_POOL, VEHICLE_GLOBAL),
        (OBJECT_POOL, OBJECT_GLOBAL),
        (PICKUP_OBJECT_POOL, PICKUP_GLOBAL),
        (ENTITY_ADDRESS_FUNC, ENTITY_ADDRESS_ROUTINE),
        (STRING_LABEL_TABLE, LABEL_TABLE),
    ]
    .into_iter()
    .collect();
    let expected = emit_signatures(&mut mem, &targets);
    let ped = populate_pools(&mut mem);
    populate_labels(&mut mem);

    let source: Arc<dyn MemorySource> = Arc::new(mem);
    let scanner = PatternScanner::new(source.as_ref(), ModuleImage::new(CODE, CODE_SIZE)).unwrap();
    let resolved = SignatureSet::builtin().resolve_all(&scanner).unwrap();

    for (name, address) in &expected {
        assert_eq!(resolved.get(name).unwrap(), *address, "{name}");
    }
    assert_eq!(
        resolved.get(ADD_ENTITY_TO_POOL_FUNC).unwrap(),
        expected[ADD_ENTITY_TO_POOL_FUNC]
    );
    (source, resolved, ped)
}

/// Pools from resolved addresses, with host routines replaced so nothing
/// jumps into the mock image
fn pools(source: &Arc<dyn MemorySource>, resolved: &ResolvedAddresses, ped: usize) -> PoolAccessor {
    // SAFETY: both host routines are overridden below before any lookup
    unsafe { PoolAccessor::from_addresses(Arc::clone(source), resolved) }
        .unwrap()
        .with_handle_source(Arc::new(move |address: usize| {
            (address == ped).then_some(PED_HANDLE)
        }))
        .with_address_source(Arc::new(move |handle: PoolHandle| {
            if handle == PED_HANDLE {
                ped
            } else {
                0
            }
        }))
}

#[test]
fn test_resolved_addresses_drive_pools() {
    let (source, resolved, ped) = host_image();
    let pools = pools(&source, &resolved, ped);

    assert_eq!(pools.resolve_handle(PED_HANDLE), HANDLE_ITEMS + 2 * 0x10);
    assert_eq!(pools.entity_address(PED_HANDLE), ped);
    assert_eq!(pools.entity_address(PoolHandle::new(2, 8)), 0);
    assert_eq!(
        pools.entity_position(PED_HANDLE),
        Some(Vector3::new(12.0, -4.5, 70.25))
    );

    assert_eq!(pools.list_handles(PoolKind::Ped, &PoolFilter::all()), vec![PED_HANDLE]);
    assert_eq!(pools.count(PoolKind::Ped), 1);
    assert_eq!(pools.count(PoolKind::Vehicle), 0);
    assert!(pools.list_handles(PoolKind::Prop, &PoolFilter::all()).is_empty());

    let labels = LabelTable::from_addresses(Arc::clone(&source), &resolved).unwrap();
    assert_eq!(labels.text("adder").as_deref(), Some("Truffade Adder"));
}

/// Reads a label and a ped position from inside a script
struct Inspector {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Script for Inspector {
    fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        let label = ctx.label_text("ADDER")?.unwrap_or_default();
        let position = ctx
            .with_pools(|pools| pools.entity_position(PED_HANDLE))?
            .flatten()
            .unwrap_or_default();
        self.seen.lock().push(format!("{label} at {position}"));
        ctx.abort()
    }
}

#[test]
fn test_scripts_see_resolved_host_data() {
    let (source, resolved, ped) = host_image();
    let state = HostState::new(SimulatedHost::new())
        .with_pools(pools(&source, &resolved, ped))
        .with_labels(LabelTable::from_addresses(Arc::clone(&source), &resolved).unwrap());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let inspector_seen = Arc::clone(&seen);
    let mut registry = ScriptRegistry::new();
    registry.register_with("Inspector", None, &[], move || {
        Ok(Box::new(Inspector {
            seen: Arc::clone(&inspector_seen),
        }) as Box<dyn Script>)
    });

    let config = Config {
        scripts_dir: "/nonexistent/scripts".into(),
        ..Config::default()
    };
    let mut domain = ScriptDomain::with_host_state(config, state).unwrap();
    domain.load(&registry).unwrap();
    domain.start().unwrap();
    domain.tick();

    assert_eq!(*seen.lock(), vec!["Truffade Adder at (12, -4.5, 70.25)"]);
}
