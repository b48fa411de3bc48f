//! Single-node splices of the copy-on-write B+tree.
//!
//! Every splice borrows the old node, writes a brand-new node into a page
//! handed in by the caller and returns it. The old node is never touched, so
//! readers holding it keep seeing a consistent page until the caller publishes
//! the replacement.
use crate::config::PageConfig;
use crate::error::Error;
use crate::node::{Node, NodeBuilder};
use crate::node_type::NodeType;
use crate::page::Page;
use tracing::{debug, trace};

/// Greatest index `i` in `1..key_count` with `key(i) <= key`, or 0 if none.
///
/// Index 0 is never compared: in an interior node it is the copy of the
/// parent's separator. Equal keys return their own index.
pub fn lookup_position(node: &Node, key: &[u8]) -> Result<u16, Error> {
  // first index in 1..key_count whose key is greater than `key`
  let (mut lo, mut hi) = (1u16, node.key_count());
  while lo < hi {
    let mid = lo + (hi - lo) / 2;
    if node.key(mid)? <= key {
      lo = mid + 1;
    } else {
      hi = mid;
    }
  }
  Ok(lo - 1)
}

/// Index of the record whose key equals `key`, if any.
pub fn lookup_exact(node: &Node, key: &[u8]) -> Result<Option<u16>, Error> {
  if node.key_count() == 0 {
    return Ok(None);
  }
  let idx = lookup_position(node, key)?;
  if node.key(idx)? == key {
    Ok(Some(idx))
  } else {
    Ok(None)
  }
}

/// Builds `old[0..idx) + (key, value) + old[idx..)` into `new` as a leaf.
pub fn leaf_insert(
  config: &PageConfig,
  new: Page,
  old: &Node,
  idx: u16,
  key: &[u8],
  value: &[u8],
) -> Result<Node, Error> {
  config.check_kv(key, value)?;
  expect_leaf(old)?;
  let key_count = old.key_count();
  if idx > key_count {
    return Err(Error::OutOfRange {
      index: idx as usize,
      key_count,
    });
  }
  let capacity = new.len();
  let new_count = key_count.checked_add(1).ok_or(Error::CapacityExceeded {
    required: key_count as usize + 1,
    capacity: u16::MAX as usize,
  })?;

  let result = NodeBuilder::new(new, NodeType::Leaf, new_count).and_then(|mut builder| {
    builder.append_range(old, 0, idx)?;
    builder.append_kv(0, key, value)?;
    builder.append_range(old, idx, key_count - idx)?;
    builder.finish()
  });
  finish_splice("leaf_insert", idx, capacity, result)
}

/// Builds a copy of `old` with record `idx` replaced by `(key, value)`.
pub fn leaf_update(
  config: &PageConfig,
  new: Page,
  old: &Node,
  idx: u16,
  key: &[u8],
  value: &[u8],
) -> Result<Node, Error> {
  config.check_kv(key, value)?;
  expect_leaf(old)?;
  let key_count = old.key_count();
  if idx >= key_count {
    return Err(Error::OutOfRange {
      index: idx as usize,
      key_count,
    });
  }
  let capacity = new.len();

  let result = NodeBuilder::new(new, NodeType::Leaf, key_count).and_then(|mut builder| {
    builder.append_range(old, 0, idx)?;
    builder.append_kv(0, key, value)?;
    builder.append_range(old, idx + 1, key_count - idx - 1)?;
    builder.finish()
  });
  finish_splice("leaf_update", idx, capacity, result)
}

/// Builds a copy of `old` without record `idx`.
pub fn leaf_delete(new: Page, old: &Node, idx: u16) -> Result<Node, Error> {
  expect_leaf(old)?;
  let key_count = old.key_count();
  if idx >= key_count {
    return Err(Error::OutOfRange {
      index: idx as usize,
      key_count,
    });
  }
  let capacity = new.len();

  let result = NodeBuilder::new(new, NodeType::Leaf, key_count - 1).and_then(|mut builder| {
    builder.append_range(old, 0, idx)?;
    builder.append_range(old, idx + 1, key_count - idx - 1)?;
    builder.finish()
  });
  finish_splice("leaf_delete", idx, capacity, result)
}

/// Replaces the value of `key` if present, otherwise inserts it in order.
///
/// The new key lands right after `lookup_position`, or at index 0 when the
/// leaf is empty or `key` sorts before its first record.
pub fn leaf_upsert(
  config: &PageConfig,
  new: Page,
  old: &Node,
  key: &[u8],
  value: &[u8],
) -> Result<Node, Error> {
  if old.key_count() == 0 {
    return leaf_insert(config, new, old, 0, key, value);
  }
  let idx = lookup_position(old, key)?;
  let found = old.key(idx)?;
  if found == key {
    leaf_update(config, new, old, idx, key, value)
  } else if idx == 0 && found > key {
    leaf_insert(config, new, old, 0, key, value)
  } else {
    leaf_insert(config, new, old, idx + 1, key, value)
  }
}

fn expect_leaf(node: &Node) -> Result<(), Error> {
  if node.node_type() != NodeType::Leaf {
    return Err(Error::WrongNodeType {
      expected: NodeType::Leaf,
      found: node.node_type(),
    });
  }
  Ok(())
}

fn finish_splice(
  op: &'static str,
  idx: u16,
  capacity: usize,
  result: Result<Node, Error>,
) -> Result<Node, Error> {
  match &result {
    Ok(node) => trace!(
      target: "bnode::splice",
      op,
      idx,
      key_count = node.key_count(),
      nbytes = node.nbytes().unwrap_or_default(),
      "built node"
    ),
    Err(Error::CapacityExceeded { required, .. }) => debug!(
      target: "bnode::splice",
      op,
      idx,
      required = *required,
      capacity,
      "node does not fit in page"
    ),
    Err(_) => {}
  }
  result
}
