//! Node page layout.
//!
//! ```text
//! | type | nkeys | pointers   | offsets    | key-values
//! |  2B  |  2B   | nkeys * 8B | nkeys * 2B | ...
//! ```
//!
//! Each key-value record is laid out as
//!
//! ```text
//! | klen | vlen | key | value |
//! |  2B  |  2B  | ... | ...   |
//! ```
//!
//! All integers are little-endian. Only the codec in `node` calls into this module.

/// Default size of a node page in bytes.
pub const PAGE_SIZE: usize = 4096;
/// Default limit on the key of one record.
pub const MAX_KEY_SIZE: usize = 1000;
/// Default limit on the value of one record.
pub const MAX_VALUE_SIZE: usize = 3000;

pub const PTR_SIZE: usize = 8;
pub const OFFSET_SIZE: usize = 2;

/// Common Node header layout (four bytes in total)
pub const NODE_TYPE_OFFSET: usize = 0;
pub const NODE_TYPE_SIZE: usize = 2;
pub const KEY_COUNT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const KEY_COUNT_SIZE: usize = 2;
pub const HEADER_SIZE: usize = NODE_TYPE_SIZE + KEY_COUNT_SIZE;

/// Key-value record prefix layout (four bytes in total)
pub const KEY_LEN_SIZE: usize = 2;
pub const VALUE_LEN_SIZE: usize = 2;
pub const KV_HEADER_SIZE: usize = KEY_LEN_SIZE + VALUE_LEN_SIZE;

/// Position of the `idx`th pointer.
pub(crate) fn pointer_pos(idx: usize) -> usize {
  HEADER_SIZE + PTR_SIZE * idx
}

/// Position of the stored offset for record `idx`; offset 0 is implicit, so `idx >= 1`.
pub(crate) fn offset_pos(key_count: usize, idx: usize) -> usize {
  debug_assert!(idx >= 1);
  HEADER_SIZE + PTR_SIZE * key_count + OFFSET_SIZE * (idx - 1)
}

/// First byte of the key-value area.
pub(crate) fn kv_area_start(key_count: usize) -> usize {
  HEADER_SIZE + (PTR_SIZE + OFFSET_SIZE) * key_count
}

/// Bytes taken in the key-value area by one record.
pub(crate) fn record_size(key_len: usize, value_len: usize) -> usize {
  KV_HEADER_SIZE + key_len + value_len
}

/// Size of a node holding exactly one record.
pub(crate) fn single_record_node_size(key_len: usize, value_len: usize) -> usize {
  kv_area_start(1) + record_size(key_len, value_len)
}
