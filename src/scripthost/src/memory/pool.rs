//! Entity Pools
//!
//! The host keeps live objects in fixed-capacity slot tables. Two layouts
//! exist and both are normalized behind [`PoolLayout`]:
//!
//! - Generic pools: items stored inline with a stride, plus one generation
//!   byte per slot (high bit set = free).
//! - Bit-array pools: an array of object pointers plus an occupancy bitmap.
//!
//! Script handles encode `(slot << 8) | generation`. Handles are recycled by
//! the host, so every dereference re-validates the generation byte.
//! Everything here reads live host memory and must run on the driving thread.

use super::layout;
use super::signature::{self, ResolvedAddresses};
use super::source::MemorySource;
use crate::native::Vector3;
use crate::Result;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A 32-bit pool handle: `(index << 8) | generation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle(u32);

impl PoolHandle {
    /// Largest slot index a handle can carry
    pub const MAX_INDEX: u32 = 0x00FF_FFFF;

    /// Pack a slot index and generation. Indices above [`Self::MAX_INDEX`]
    /// do not fit and are masked to their low 24 bits.
    pub fn new(index: u32, generation: u8) -> Self {
        debug_assert!(
            index <= Self::MAX_INDEX,
            "pool index {index:#x} exceeds 24 bits"
        );
        Self(((index & Self::MAX_INDEX) << 8) | generation as u32)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        (self.0 >> 8) as usize
    }

    pub fn generation(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Slot-level view of one pool
pub trait PoolLayout {
    fn capacity(&self) -> usize;

    /// Whether slot `index` currently holds a live object
    fn is_occupied(&self, source: &dyn MemorySource, index: usize) -> bool;

    /// Address of the object in slot `index`
    fn slot_address(&self, source: &dyn MemorySource, index: usize) -> Option<usize>;

    /// Handle encoded from the slot itself, when the layout carries generations
    fn handle_at(&self, source: &dyn MemorySource, index: usize) -> Option<PoolHandle>;
}

/// Byte-mask pool snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericPool {
    pub items: usize,
    pub generations: usize,
    pub size: u32,
    pub item_size: u32,
}

impl GenericPool {
    /// Read the pool header at `pool`
    pub fn read(source: &dyn MemorySource, pool: usize) -> Result<Self> {
        Ok(Self {
            items: source.read_ptr(layout::generic_pool_items_address(pool))?,
            generations: source.read_ptr(layout::generic_pool_generations_address(pool))?,
            size: source.read_u32(layout::generic_pool_size_address(pool))?,
            item_size: source.read_u32(layout::generic_pool_item_size_address(pool))?,
        })
    }

    fn generation_byte(&self, source: &dyn MemorySource, index: usize) -> Option<u8> {
        if index >= self.size as usize {
            return None;
        }
        source.read_u8(self.generations + index).ok()
    }

    /// Slot address for `handle`, or 0 when the handle is stale or malformed
    pub fn resolve(&self, source: &dyn MemorySource, handle: PoolHandle) -> usize {
        match self.generation_byte(source, handle.index()) {
            Some(generation)
                if generation & layout::SLOT_FREE_BIT == 0
                    && generation == handle.generation() =>
            {
                self.items + handle.index() * self.item_size as usize
            }
            _ => 0,
        }
    }
}

impl PoolLayout for GenericPool {
    fn capacity(&self) -> usize {
        self.size as usize
    }

    fn is_occupied(&self, source: &dyn MemorySource, index: usize) -> bool {
        self.generation_byte(source, index)
            .map(|generation| generation & layout::SLOT_FREE_BIT == 0)
            .unwrap_or(false)
    }

    fn slot_address(&self, _source: &dyn MemorySource, index: usize) -> Option<usize> {
        (index < self.capacity()).then(|| self.items + index * self.item_size as usize)
    }

    fn handle_at(&self, source: &dyn MemorySource, index: usize) -> Option<PoolHandle> {
        let generation = self.generation_byte(source, index)?;
        (generation & layout::SLOT_FREE_BIT == 0).then(|| PoolHandle::new(index as u32, generation))
    }
}

/// Pointer-array pool with an occupancy bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitArrayPool {
    pub items: usize,
    pub size: u32,
    pub occupancy: usize,
}

impl BitArrayPool {
    pub fn read(source: &dyn MemorySource, pool: usize) -> Result<Self> {
        Ok(Self {
            items: source.read_ptr(layout::bit_array_pool_items_address(pool))?,
            size: source.read_u32(layout::bit_array_pool_size_address(pool))?,
            occupancy: source.read_ptr(layout::bit_array_pool_occupancy_address(pool))?,
        })
    }
}

impl PoolLayout for BitArrayPool {
    fn capacity(&self) -> usize {
        self.size as usize
    }

    fn is_occupied(&self, source: &dyn MemorySource, index: usize) -> bool {
        if index >= self.capacity() {
            return false;
        }
        source
            .read_u32(self.occupancy + (index >> 5) * 4)
            .map(|word| (word >> (index & 0x1F)) & 1 != 0)
            .unwrap_or(false)
    }

    fn slot_address(&self, source: &dyn MemorySource, index: usize) -> Option<usize> {
        if index >= self.capacity() {
            return None;
        }
        source
            .read_ptr(self.items + index * 8)
            .ok()
            .filter(|&address| address != 0)
    }

    fn handle_at(&self, _source: &dyn MemorySource, _index: usize) -> Option<PoolHandle> {
        None
    }
}

/// Which pool a query iterates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// The entity handle pool itself
    Entity,
    Ped,
    Vehicle,
    Prop,
    PickupObject,
}

/// Where a pool lives: the address of the global holding its pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolLocation {
    Generic(usize),
    BitArray(usize),
}

/// Maps an object address to its script handle (host's add-to-pool routine)
pub trait HandleSource: Send + Sync {
    fn handle_for_address(&self, address: usize) -> Option<PoolHandle>;
}

impl<F> HandleSource for F
where
    F: Fn(usize) -> Option<PoolHandle> + Send + Sync,
{
    fn handle_for_address(&self, address: usize) -> Option<PoolHandle> {
        self(address)
    }
}

/// Host routine `int AddEntityToPool(CEntity*)` resolved by signature
pub struct HostHandleFunction {
    func: unsafe extern "C" fn(u64) -> i32,
}

impl HostHandleFunction {
    /// # Safety
    ///
    /// `address` must be the entry point of the host's add-to-pool routine,
    /// and the returned source may only be used on the driving thread.
    pub unsafe fn from_address(address: usize) -> Self {
        Self {
            func: std::mem::transmute::<usize, unsafe extern "C" fn(u64) -> i32>(address),
        }
    }
}

impl HandleSource for HostHandleFunction {
    fn handle_for_address(&self, address: usize) -> Option<PoolHandle> {
        // SAFETY: guaranteed by `from_address`; the address came from a live pool slot.
        let handle = unsafe { (self.func)(address as u64) };
        (handle > 0).then(|| PoolHandle::from_raw(handle as u32))
    }
}

/// Maps a validated script handle to its object address (host's
/// get-entity-address routine)
pub trait AddressSource: Send + Sync {
    fn address_for_handle(&self, handle: PoolHandle) -> usize;
}

impl<F> AddressSource for F
where
    F: Fn(PoolHandle) -> usize + Send + Sync,
{
    fn address_for_handle(&self, handle: PoolHandle) -> usize {
        self(handle)
    }
}

/// Host routine `CEntity* GetEntityAddress(int handle)` resolved by signature
pub struct HostAddressFunction {
    func: unsafe extern "C" fn(i32) -> u64,
}

impl HostAddressFunction {
    /// # Safety
    ///
    /// `address` must be the entry point of the host's get-entity-address
    /// routine, and the returned source may only be used on the driving
    /// thread.
    pub unsafe fn from_address(address: usize) -> Self {
        Self {
            func: std::mem::transmute::<usize, unsafe extern "C" fn(i32) -> u64>(address),
        }
    }
}

impl AddressSource for HostAddressFunction {
    fn address_for_handle(&self, handle: PoolHandle) -> usize {
        // SAFETY: guaranteed by `from_address`; the handle passed the generation check.
        unsafe { (self.func)(handle.raw() as i32) as usize }
    }
}

/// Filters applied while iterating, before handles are materialized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolFilter {
    /// Keep objects within `radius` of a point
    pub near: Option<(Vector3, f32)>,
    /// Keep objects whose model hash is in the set
    pub models: Option<Vec<u32>>,
}

impl PoolFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn near(mut self, position: Vector3, radius: f32) -> Self {
        self.near = Some((position, radius));
        self
    }

    pub fn models(mut self, models: impl IntoIterator<Item = u32>) -> Self {
        self.models = Some(models.into_iter().collect());
        self
    }

    fn accepts(&self, source: &dyn MemorySource, object: usize) -> bool {
        if let Some((center, radius)) = self.near {
            match read_position(source, object) {
                Some(position) if position.distance_squared(center) <= radius * radius => {}
                _ => return false,
            }
        }
        if let Some(models) = &self.models {
            match read_model_hash(source, object) {
                Some(hash) if models.contains(&hash) => {}
                _ => return false,
            }
        }
        true
    }
}

fn read_position(source: &dyn MemorySource, object: usize) -> Option<Vector3> {
    let at = layout::entity_position_address(object);
    Some(Vector3::new(
        source.read_f32(at).ok()?,
        source.read_f32(at + 4).ok()?,
        source.read_f32(at + 8).ok()?,
    ))
}

fn read_model_hash(source: &dyn MemorySource, object: usize) -> Option<u32> {
    let model_info = source
        .read_ptr(layout::entity_model_info_address(object))
        .ok()
        .filter(|&p| p != 0)?;
    source.read_u32(layout::model_info_hash_address(model_info)).ok()
}

/// Handle resolution and pool iteration over one memory source
pub struct PoolAccessor {
    source: Arc<dyn MemorySource>,
    pools: HashMap<PoolKind, PoolLocation>,
    handles: Option<Arc<dyn HandleSource>>,
    addresses: Option<Arc<dyn AddressSource>>,
}

impl PoolAccessor {
    /// `entity_pool` is the global holding the entity handle pool pointer
    pub fn new(source: Arc<dyn MemorySource>, entity_pool: usize) -> Self {
        let mut pools = HashMap::new();
        pools.insert(PoolKind::Entity, PoolLocation::Generic(entity_pool));
        Self {
            source,
            pools,
            handles: None,
            addresses: None,
        }
    }

    /// Build from signature-resolved addresses
    ///
    /// # Safety
    ///
    /// `source` must describe the process the addresses were resolved in,
    /// since the add-to-pool and get-entity-address routines are called
    /// directly.
    pub unsafe fn from_addresses(
        source: Arc<dyn MemorySource>,
        addresses: &ResolvedAddresses,
    ) -> Result<Self> {
        let handle_func = HostHandleFunction::from_address(
            addresses.get(signature::ADD_ENTITY_TO_POOL_FUNC)?,
        );
        let address_func =
            HostAddressFunction::from_address(addresses.get(signature::ENTITY_ADDRESS_FUNC)?);
        Ok(Self::new(source, addresses.get(signature::ENTITY_POOL)?)
            .with_pool(PoolKind::Ped, PoolLocation::Generic(addresses.get(signature::PED_POOL)?))
            .with_pool(
                PoolKind::Vehicle,
                PoolLocation::BitArray(addresses.get(signature::VEHICLE_POOL)?),
            )
            .with_pool(PoolKind::Prop, PoolLocation::Generic(addresses.get(signature::OBJECT_POOL)?))
            .with_pool(
                PoolKind::PickupObject,
                PoolLocation::Generic(addresses.get(signature::PICKUP_OBJECT_POOL)?),
            )
            .with_handle_source(Arc::new(handle_func))
            .with_address_source(Arc::new(address_func)))
    }

    pub fn with_pool(mut self, kind: PoolKind, location: PoolLocation) -> Self {
        self.pools.insert(kind, location);
        self
    }

    pub fn with_handle_source(mut self, handles: Arc<dyn HandleSource>) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Route [`PoolAccessor::entity_address`] through a host routine
    /// instead of reading the handle slot
    pub fn with_address_source(mut self, addresses: Arc<dyn AddressSource>) -> Self {
        self.addresses = Some(addresses);
        self
    }

    pub fn source(&self) -> &dyn MemorySource {
        self.source.as_ref()
    }

    fn entity_pool(&self) -> Option<GenericPool> {
        match self.pools.get(&PoolKind::Entity)? {
            PoolLocation::Generic(global) => {
                let pool = self.source.read_ptr(*global).ok().filter(|&p| p != 0)?;
                GenericPool::read(self.source.as_ref(), pool).ok()
            }
            PoolLocation::BitArray(_) => None,
        }
    }

    /// Slot address of `handle` in the entity handle pool, or 0 if invalid
    pub fn resolve_handle(&self, handle: PoolHandle) -> usize {
        self.entity_pool()
            .map(|pool| pool.resolve(self.source.as_ref(), handle))
            .unwrap_or(0)
    }

    /// Object address behind `handle`, or 0 if invalid. The generation is
    /// checked here even when a host routine does the lookup.
    pub fn entity_address(&self, handle: PoolHandle) -> usize {
        match (self.resolve_handle(handle), &self.addresses) {
            (0, _) => 0,
            (_, Some(addresses)) => addresses.address_for_handle(handle),
            (slot, None) => self
                .source
                .read_ptr(layout::handle_slot_entity_address(slot))
                .unwrap_or(0),
        }
    }

    /// World position of the entity behind `handle`
    pub fn entity_position(&self, handle: PoolHandle) -> Option<Vector3> {
        match self.entity_address(handle) {
            0 => None,
            entity => read_position(self.source.as_ref(), entity),
        }
    }

    /// Ragdoll state word of the ped behind `handle`
    pub fn ragdoll_state(&self, handle: PoolHandle) -> Option<u32> {
        match self.entity_address(handle) {
            0 => None,
            ped => self.source.read_u32(layout::ragdoll_state_address(ped)).ok(),
        }
    }

    fn with_layout<R>(&self, kind: PoolKind, f: impl FnOnce(&dyn PoolLayout) -> R) -> Option<R> {
        let source = self.source.as_ref();
        match *self.pools.get(&kind)? {
            PoolLocation::Generic(global) => {
                let pool = source.read_ptr(global).ok().filter(|&p| p != 0)?;
                let pool = GenericPool::read(source, pool).ok()?;
                Some(f(&pool))
            }
            PoolLocation::BitArray(global) => {
                let pool = source.read_ptr(global).ok().filter(|&p| p != 0)?;
                let pool = BitArrayPool::read(source, pool).ok()?;
                Some(f(&pool))
            }
        }
    }

    /// Script handles of every object registered in the entity handle pool,
    /// keyed by object address
    fn registered_handles(&self) -> HashMap<usize, PoolHandle> {
        let source = self.source.as_ref();
        let Some(pool) = self.entity_pool() else {
            return HashMap::new();
        };
        (0..pool.capacity())
            .filter_map(|i| {
                let handle = pool.handle_at(source, i)?;
                let slot = pool.slot_address(source, i)?;
                let object = source
                    .read_ptr(layout::handle_slot_entity_address(slot))
                    .ok()
                    .filter(|&p| p != 0)?;
                Some((object, handle))
            })
            .collect()
    }

    /// Handles of every live object in a pool that passes `filter`.
    ///
    /// Handles always come from the entity handle pool. Objects in other
    /// pools are mapped through the [`HandleSource`] when one is set, or
    /// else looked up among already-registered entities; unregistered
    /// objects are skipped.
    pub fn list_handles(&self, kind: PoolKind, filter: &PoolFilter) -> Vec<PoolHandle> {
        let source = self.source.as_ref();
        let registered = (kind != PoolKind::Entity && self.handles.is_none())
            .then(|| self.registered_handles());

        self.with_layout(kind, |pool| {
            (0..pool.capacity())
                .filter(|&i| pool.is_occupied(source, i))
                .filter_map(|i| {
                    let address = pool.slot_address(source, i)?;
                    if kind == PoolKind::Entity {
                        let object =
                            source.read_ptr(layout::handle_slot_entity_address(address)).ok()?;
                        return filter
                            .accepts(source, object)
                            .then(|| pool.handle_at(source, i))
                            .flatten();
                    }
                    if !filter.accepts(source, address) {
                        return None;
                    }
                    match (&self.handles, &registered) {
                        (Some(handles), _) => handles.handle_for_address(address),
                        (None, Some(registered)) => registered.get(&address).copied(),
                        (None, None) => None,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
    }

    /// Number of occupied slots in a pool
    pub fn count(&self, kind: PoolKind) -> usize {
        let source = self.source.as_ref();
        self.with_layout(kind, |pool| {
            (0..pool.capacity())
                .filter(|&i| pool.is_occupied(source, i))
                .count()
        })
        .unwrap_or(0)
    }
}
