//! Host Structure Layout
//!
//! Offsets into undocumented host structures. Every offset is reached
//! through exactly one accessor so a host update only touches this file.
//!
//! All values were derived from host build 1.0.2372.0 (x64).

// -- Generic pool (byte-mask) --
//
// struct GenericPool {
//   uint8_t *items;        // +0x00
//   uint8_t *generations;  // +0x08  one byte per slot, high bit = free
//   uint32_t size;         // +0x10
//   uint32_t itemSize;     // +0x14
// };

const GENERIC_POOL_ITEMS: usize = 0x00;
const GENERIC_POOL_GENERATIONS: usize = 0x08;
const GENERIC_POOL_SIZE: usize = 0x10;
const GENERIC_POOL_ITEM_SIZE: usize = 0x14;

/// Generation byte bit marking a free slot
pub const SLOT_FREE_BIT: u8 = 0x80;

pub fn generic_pool_items_address(pool: usize) -> usize {
    pool + GENERIC_POOL_ITEMS
}

pub fn generic_pool_generations_address(pool: usize) -> usize {
    pool + GENERIC_POOL_GENERATIONS
}

pub fn generic_pool_size_address(pool: usize) -> usize {
    pool + GENERIC_POOL_SIZE
}

pub fn generic_pool_item_size_address(pool: usize) -> usize {
    pool + GENERIC_POOL_ITEM_SIZE
}

// -- Vehicle pool (bit array) --
//
// struct VehiclePool {
//   CVehicle **items;      // +0x00
//   uint32_t size;         // +0x08
//   ...
//   uint32_t *occupancy;   // +0x30  one bit per slot, set = occupied
// };

const BIT_POOL_ITEMS: usize = 0x00;
const BIT_POOL_SIZE: usize = 0x08;
const BIT_POOL_OCCUPANCY: usize = 0x30;

pub fn bit_array_pool_items_address(pool: usize) -> usize {
    pool + BIT_POOL_ITEMS
}

pub fn bit_array_pool_size_address(pool: usize) -> usize {
    pool + BIT_POOL_SIZE
}

pub fn bit_array_pool_occupancy_address(pool: usize) -> usize {
    pool + BIT_POOL_OCCUPANCY
}

// -- Entity handle pool item --
//
// Each slot of the entity handle pool is 0x10 bytes; the entity pointer
// sits in the second qword.

const HANDLE_SLOT_ENTITY: usize = 0x08;

pub fn handle_slot_entity_address(slot: usize) -> usize {
    slot + HANDLE_SLOT_ENTITY
}

// -- CEntity --

const ENTITY_MODEL_INFO: usize = 0x20;
const ENTITY_POSITION: usize = 0x90;

/// `CBaseModelInfo*` of an entity
pub fn entity_model_info_address(entity: usize) -> usize {
    entity + ENTITY_MODEL_INFO
}

/// World position (three f32) of an entity
pub fn entity_position_address(entity: usize) -> usize {
    entity + ENTITY_POSITION
}

// -- CBaseModelInfo --

const MODEL_INFO_HASH: usize = 0x18;

/// Model name hash (u32) stored in a model info
pub fn model_info_hash_address(model_info: usize) -> usize {
    model_info + MODEL_INFO_HASH
}

// -- CPed --

const PED_RAGDOLL_STATE: usize = 0x1398;

/// Ragdoll/physics state (u32) of a ped
pub fn ragdoll_state_address(ped: usize) -> usize {
    ped + PED_RAGDOLL_STATE
}

// -- Label table --
//
// struct LabelTable {
//   LabelEntry *entries;   // +0x00  sorted by hash
//   uint32_t count;        // +0x08
// };
// struct LabelEntry {      // 0x10 bytes
//   uint32_t hash;         // +0x00
//   const char *text;      // +0x08
// };

const LABEL_TABLE_ENTRIES: usize = 0x00;
const LABEL_TABLE_COUNT: usize = 0x08;
const LABEL_ENTRY_SIZE: usize = 0x10;
const LABEL_ENTRY_HASH: usize = 0x00;
const LABEL_ENTRY_TEXT: usize = 0x08;

pub fn label_table_entries_address(table: usize) -> usize {
    table + LABEL_TABLE_ENTRIES
}

pub fn label_table_count_address(table: usize) -> usize {
    table + LABEL_TABLE_COUNT
}

/// Address of entry `index` in an entry array
pub fn label_entry_address(entries: usize, index: usize) -> usize {
    entries + index * LABEL_ENTRY_SIZE
}

pub fn label_entry_hash_address(entry: usize) -> usize {
    entry + LABEL_ENTRY_HASH
}

pub fn label_entry_text_address(entry: usize) -> usize {
    entry + LABEL_ENTRY_TEXT
}
