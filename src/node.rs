use crate::config::PageConfig;
use crate::error::Error;
use crate::node_type::NodeType;
use crate::page::Page;
use crate::page_layout::{
  kv_area_start, offset_pos, pointer_pos, record_size, KEY_COUNT_OFFSET, KEY_LEN_SIZE,
  KV_HEADER_SIZE, NODE_TYPE_OFFSET,
};
use std::convert::TryFrom;

/// Node is an immutable, decoded view of one B+tree node page.
///
/// Nodes are produced either by decoding a persisted page with `Node::from_page`
/// or by finishing a `NodeBuilder`. There is no way to mutate a node once built;
/// splices read from an old node and produce a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
  page: Page,
  node_type: NodeType,
  key_count: u16,
}

impl Node {
  /// Decodes the header of `page` and checks the fixed-size arrays fit in it.
  pub fn from_page(page: Page) -> Result<Node, Error> {
    let node_type = NodeType::try_from(page.read_u16(NODE_TYPE_OFFSET)?)?;
    let key_count = page.read_u16(KEY_COUNT_OFFSET)?;
    if kv_area_start(key_count as usize) > page.len() {
      return Err(Error::Malformed("pointer and offset arrays exceed page"));
    }
    Ok(Node {
      page,
      node_type,
      key_count,
    })
  }

  pub fn node_type(&self) -> NodeType {
    self.node_type
  }

  pub fn key_count(&self) -> u16 {
    self.key_count
  }

  /// The `idx`th child pointer. Leaves carry zero here.
  pub fn pointer(&self, idx: u16) -> Result<u64, Error> {
    self.check_entry(idx)?;
    self.page.read_u64(pointer_pos(idx as usize))
  }

  /// Cumulative length of the records before `idx`, relative to the KV area.
  pub fn offset(&self, idx: u16) -> Result<u16, Error> {
    if idx > self.key_count {
      return Err(self.out_of_range(idx));
    }
    read_offset(&self.page, self.key_count, idx)
  }

  /// Absolute position of record `idx`; `kv_pos(key_count)` is the end of the KV area.
  pub fn kv_pos(&self, idx: u16) -> Result<u16, Error> {
    let pos = kv_area_start(self.key_count as usize) + self.offset(idx)? as usize;
    u16::try_from(pos).map_err(|_| Error::Malformed("record position overflows u16"))
  }

  pub fn key(&self, idx: u16) -> Result<&[u8], Error> {
    let (pos, key_len, _) = self.record_header(idx)?;
    self.page.slice(pos + KV_HEADER_SIZE, key_len)
  }

  pub fn value(&self, idx: u16) -> Result<&[u8], Error> {
    let (pos, key_len, value_len) = self.record_header(idx)?;
    self.page.slice(pos + KV_HEADER_SIZE + key_len, value_len)
  }

  /// Total bytes occupied by the node.
  pub fn nbytes(&self) -> Result<u16, Error> {
    self.kv_pos(self.key_count)
  }

  /// True when the node no longer fits a page under `config` and must be split.
  pub fn exceeds(&self, config: &PageConfig) -> Result<bool, Error> {
    Ok(self.nbytes()? as usize > config.page_size())
  }

  /// Iterates `(key, value)` pairs in index order.
  pub fn records(&self) -> Records<'_> {
    Records { node: self, idx: 0 }
  }

  pub fn as_bytes(&self) -> &[u8] {
    self.page.as_bytes()
  }

  pub fn into_page(self) -> Page {
    self.page
  }

  /// The contiguous KV bytes of records `[from, to)`.
  fn kv_bytes(&self, from: u16, to: u16) -> Result<&[u8], Error> {
    let begin = self.kv_pos(from)? as usize;
    let end = self.kv_pos(to)? as usize;
    if end < begin {
      return Err(Error::Malformed("offsets are not monotonic"));
    }
    self.page.slice(begin, end - begin)
  }

  fn record_header(&self, idx: u16) -> Result<(usize, usize, usize), Error> {
    self.check_entry(idx)?;
    let pos = self.kv_pos(idx)? as usize;
    let key_len = self.page.read_u16(pos)? as usize;
    let value_len = self.page.read_u16(pos + KEY_LEN_SIZE)? as usize;
    Ok((pos, key_len, value_len))
  }

  fn check_entry(&self, idx: u16) -> Result<(), Error> {
    if idx >= self.key_count {
      return Err(self.out_of_range(idx));
    }
    Ok(())
  }

  fn out_of_range(&self, idx: u16) -> Error {
    Error::OutOfRange {
      index: idx as usize,
      key_count: self.key_count,
    }
  }
}

/// Iterator over the records of a node, see `Node::records`.
pub struct Records<'a> {
  node: &'a Node,
  idx: u16,
}

impl<'a> Iterator for Records<'a> {
  type Item = Result<(&'a [u8], &'a [u8]), Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.idx >= self.node.key_count {
      return None;
    }
    let node = self.node;
    let idx = self.idx;
    self.idx += 1;
    let record = node.key(idx).and_then(|key| Ok((key, node.value(idx)?)));
    if record.is_err() {
      // a corrupt record ends the iteration
      self.idx = node.key_count;
    }
    Some(record)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = (self.node.key_count - self.idx) as usize;
    (0, Some(remaining))
  }
}

fn read_offset(page: &Page, key_count: u16, idx: u16) -> Result<u16, Error> {
  if idx == 0 {
    return Ok(0);
  }
  page.read_u16(offset_pos(key_count as usize, idx as usize))
}

/// NodeBuilder writes a new node into a fresh page.
///
/// Construction is three-phase: `new` fixes the header (and with it every
/// position in the page), records are appended in index order with
/// `append_kv` and `append_range`, and `finish` hands back a read-only `Node`.
/// Every write is checked against the page length.
pub struct NodeBuilder {
  page: Page,
  node_type: NodeType,
  key_count: u16,
  // index of the next record to write
  next: u16,
}

impl NodeBuilder {
  pub fn new(mut page: Page, node_type: NodeType, key_count: u16) -> Result<NodeBuilder, Error> {
    let required = kv_area_start(key_count as usize);
    if required > page.len() {
      return Err(Error::CapacityExceeded {
        required,
        capacity: page.len(),
      });
    }
    page.write_u16(NODE_TYPE_OFFSET, node_type.into())?;
    page.write_u16(KEY_COUNT_OFFSET, key_count)?;
    Ok(NodeBuilder {
      page,
      node_type,
      key_count,
      next: 0,
    })
  }

  pub fn key_count(&self) -> u16 {
    self.key_count
  }

  /// Records written so far.
  pub fn written(&self) -> u16 {
    self.next
  }

  /// Overwrites the `idx`th pointer. The pointer array is sized by the header,
  /// so this may target any `idx < key_count`, written or not.
  pub fn set_pointer(&mut self, idx: u16, pointer: u64) -> Result<(), Error> {
    if idx >= self.key_count {
      return Err(Error::OutOfRange {
        index: idx as usize,
        key_count: self.key_count,
      });
    }
    self.page.write_u64(pointer_pos(idx as usize), pointer)
  }

  /// Appends one record at the next index.
  pub fn append_kv(&mut self, pointer: u64, key: &[u8], value: &[u8]) -> Result<(), Error> {
    let idx = self.next;
    self.check_room(idx as usize, 1)?;
    let key_len = u16::try_from(key.len()).map_err(|_| Error::KeyTooLarge {
      size: key.len(),
      max: u16::MAX as usize,
    })?;
    let value_len = u16::try_from(value.len()).map_err(|_| Error::ValueTooLarge {
      size: value.len(),
      max: u16::MAX as usize,
    })?;

    let offset = read_offset(&self.page, self.key_count, idx)? as usize;
    let next_offset = offset + record_size(key.len(), value.len());
    let pos = self.kv_start() + offset;
    self.check_capacity(self.kv_start() + next_offset)?;

    self.page.write_u64(pointer_pos(idx as usize), pointer)?;
    self.page.write_u16(pos, key_len)?;
    self.page.write_u16(pos + KEY_LEN_SIZE, value_len)?;
    self.page.write_bytes(pos + KV_HEADER_SIZE, key)?;
    self.page.write_bytes(pos + KV_HEADER_SIZE + key.len(), value)?;
    self.set_offset(idx + 1, next_offset)?;
    self.next += 1;
    Ok(())
  }

  /// Copies `n` records of `old` starting at `src_start` to the next indexes.
  ///
  /// Offsets are rebased onto what has been written so far and the KV bytes are
  /// copied as a single block.
  pub fn append_range(&mut self, old: &Node, src_start: u16, n: u16) -> Result<(), Error> {
    if n == 0 {
      return Ok(());
    }
    let src_end = src_start as usize + n as usize;
    if src_end > old.key_count as usize {
      return Err(Error::OutOfRange {
        index: src_end - 1,
        key_count: old.key_count,
      });
    }
    let dst_start = self.next;
    self.check_room(dst_start as usize, n)?;

    let src_end = src_end as u16;
    let src_base = old.offset(src_start)? as usize;
    let dst_base = read_offset(&self.page, self.key_count, dst_start)? as usize;
    let block = old.kv_bytes(src_start, src_end)?;
    self.check_capacity(self.kv_start() + dst_base + block.len())?;

    for i in 0..n {
      self
        .page
        .write_u64(pointer_pos((dst_start + i) as usize), old.pointer(src_start + i)?)?;
    }
    for i in 1..=n {
      let src_offset = old.offset(src_start + i)? as usize;
      if src_offset < src_base {
        return Err(Error::Malformed("offsets are not monotonic"));
      }
      self.set_offset(dst_start + i, src_offset - src_base + dst_base)?;
    }
    let pos = self.kv_start() + dst_base;
    self.page.write_bytes(pos, block)?;
    self.next += n;
    Ok(())
  }

  /// Seals the node. Fails unless exactly `key_count` records were written.
  pub fn finish(self) -> Result<Node, Error> {
    if self.next != self.key_count {
      return Err(Error::IncompleteNode {
        written: self.next,
        key_count: self.key_count,
      });
    }
    Ok(Node {
      page: self.page,
      node_type: self.node_type,
      key_count: self.key_count,
    })
  }

  fn kv_start(&self) -> usize {
    kv_area_start(self.key_count as usize)
  }

  fn set_offset(&mut self, idx: u16, offset: usize) -> Result<(), Error> {
    debug_assert!(idx >= 1);
    let offset = u16::try_from(offset).map_err(|_| Error::CapacityExceeded {
      required: self.kv_start() + offset,
      capacity: self.page.len(),
    })?;
    self
      .page
      .write_u16(offset_pos(self.key_count as usize, idx as usize), offset)
  }

  fn check_room(&self, dst_start: usize, n: u16) -> Result<(), Error> {
    let end = dst_start + n as usize;
    if end > self.key_count as usize {
      return Err(Error::OutOfRange {
        index: end - 1,
        key_count: self.key_count,
      });
    }
    Ok(())
  }

  fn check_capacity(&self, required: usize) -> Result<(), Error> {
    if required > self.page.len() || required > u16::MAX as usize {
      return Err(Error::CapacityExceeded {
        required,
        capacity: self.page.len(),
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf(records: &[(&str, &str)]) -> Node {
    let mut builder =
      NodeBuilder::new(Page::zeroed(4096), NodeType::Leaf, records.len() as u16).unwrap();
    for (key, value) in records {
      builder.append_kv(0, key.as_bytes(), value.as_bytes()).unwrap();
    }
    builder.finish().unwrap()
  }

  #[test]
  fn header_and_layout_are_bit_exact() {
    let node = leaf(&[("ab", "xyz"), ("c", "")]);
    let bytes = node.as_bytes();
    // kind = 2, key_count = 2
    assert_eq!(&bytes[0..4], &[2, 0, 2, 0]);
    // two zero pointers
    assert_eq!(&bytes[4..20], &[0u8; 16][..]);
    // offset[1] = 4 + 2 + 3 = 9, offset[2] = 9 + 4 + 1 = 14
    assert_eq!(&bytes[20..24], &[9, 0, 14, 0]);
    // first record: klen 2, vlen 3, "ab", "xyz"
    assert_eq!(&bytes[24..33], &[2, 0, 3, 0, b'a', b'b', b'x', b'y', b'z']);
    assert_eq!(&bytes[33..38], &[1, 0, 0, 0, b'c']);
    assert_eq!(node.nbytes().unwrap(), 38);
  }

  #[test]
  fn reads_back_keys_values_and_offsets() {
    let node = leaf(&[("a", "1"), ("bb", "22"), ("ccc", "333")]);
    assert_eq!(node.node_type(), NodeType::Leaf);
    assert_eq!(node.key_count(), 3);
    assert_eq!(node.key(1).unwrap(), b"bb");
    assert_eq!(node.value(2).unwrap(), b"333");
    assert_eq!(node.offset(0).unwrap(), 0);
    assert_eq!(node.offset(1).unwrap(), 6);
    assert_eq!(node.offset(3).unwrap(), 6 + 8 + 10);
    assert_eq!(node.kv_pos(0).unwrap(), 4 + 30);
    assert_eq!(node.nbytes().unwrap(), 4 + 30 + 24);
    let records: Vec<_> = node.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(
      records,
      vec![
        (&b"a"[..], &b"1"[..]),
        (&b"bb"[..], &b"22"[..]),
        (&b"ccc"[..], &b"333"[..])
      ]
    );
  }

  #[test]
  fn accessors_are_bounds_checked() {
    let node = leaf(&[("a", "1")]);
    let out_of_range = |index| Error::OutOfRange {
      index,
      key_count: 1,
    };
    assert_eq!(node.key(1), Err(out_of_range(1)));
    assert_eq!(node.value(1), Err(out_of_range(1)));
    assert_eq!(node.pointer(1), Err(out_of_range(1)));
    assert_eq!(node.offset(2), Err(out_of_range(2)));
    assert_eq!(node.kv_pos(2), Err(out_of_range(2)));
    assert!(node.kv_pos(1).is_ok());
  }

  #[test]
  fn internal_nodes_keep_pointers() {
    let mut builder = NodeBuilder::new(Page::zeroed(256), NodeType::Internal, 2).unwrap();
    builder.append_kv(7, b"", b"").unwrap();
    builder.append_kv(9, b"m", b"").unwrap();
    builder.set_pointer(0, 11).unwrap();
    assert_eq!(
      builder.set_pointer(2, 1),
      Err(Error::OutOfRange {
        index: 2,
        key_count: 2
      })
    );
    let node = builder.finish().unwrap();
    assert_eq!(node.node_type(), NodeType::Internal);
    assert_eq!(node.pointer(0).unwrap(), 11);
    assert_eq!(node.pointer(1).unwrap(), 9);
  }

  #[test]
  fn append_range_rebases_offsets() {
    let old = leaf(&[("a", "1"), ("b", "2"), ("c", "3")]);
    let mut builder = NodeBuilder::new(Page::zeroed(4096), NodeType::Leaf, 3).unwrap();
    builder.append_kv(0, b"zz", b"long value").unwrap();
    builder.append_range(&old, 1, 2).unwrap();
    let node = builder.finish().unwrap();
    assert_eq!(node.key(0).unwrap(), b"zz");
    assert_eq!(node.key(1).unwrap(), b"b");
    assert_eq!(node.value(2).unwrap(), b"3");
    assert_eq!(node.offset(1).unwrap(), 16);
    assert_eq!(node.offset(2).unwrap(), 22);
    assert_eq!(node.offset(3).unwrap(), 28);
  }

  #[test]
  fn append_range_carries_pointers() {
    let mut builder = NodeBuilder::new(Page::zeroed(256), NodeType::Internal, 3).unwrap();
    builder.append_kv(11, b"", b"").unwrap();
    builder.append_kv(22, b"g", b"").unwrap();
    builder.append_kv(33, b"p", b"").unwrap();
    let old = builder.finish().unwrap();

    let mut builder = NodeBuilder::new(Page::zeroed(256), NodeType::Internal, 3).unwrap();
    builder.append_kv(99, b"", b"").unwrap();
    builder.append_range(&old, 1, 2).unwrap();
    let node = builder.finish().unwrap();
    let pointers: Vec<u64> = (0..3).map(|i| node.pointer(i).unwrap()).collect();
    assert_eq!(pointers, vec![99, 22, 33]);
    assert_eq!(node.key(1).unwrap(), b"g");
    assert_eq!(node.key(2).unwrap(), b"p");
  }

  #[test]
  fn empty_range_copy_writes_nothing() {
    let old = leaf(&[("a", "1")]);
    let mut builder = NodeBuilder::new(Page::zeroed(64), NodeType::Leaf, 1).unwrap();
    let before = builder.page.clone();
    builder.append_range(&old, 0, 0).unwrap();
    builder.append_range(&old, 1, 0).unwrap();
    assert_eq!(builder.page, before);
    assert_eq!(builder.written(), 0);
  }

  #[test]
  fn append_range_checks_both_nodes() {
    let old = leaf(&[("a", "1"), ("b", "2")]);
    let mut builder = NodeBuilder::new(Page::zeroed(4096), NodeType::Leaf, 1).unwrap();
    assert_eq!(
      builder.append_range(&old, 1, 2),
      Err(Error::OutOfRange {
        index: 2,
        key_count: 2
      })
    );
    assert_eq!(
      builder.append_range(&old, 0, 2),
      Err(Error::OutOfRange {
        index: 1,
        key_count: 1
      })
    );
  }

  #[test]
  fn capacity_is_checked_before_writing() {
    // header 4 + pointer 8 + offset 2 leaves 6 bytes for the record
    let mut builder = NodeBuilder::new(Page::zeroed(20), NodeType::Leaf, 1).unwrap();
    assert_eq!(
      builder.append_kv(0, b"abc", b"d"),
      Err(Error::CapacityExceeded {
        required: 22,
        capacity: 20
      })
    );
    builder.append_kv(0, b"a", b"b").unwrap();
    assert_eq!(builder.finish().unwrap().nbytes().unwrap(), 20);

    assert_eq!(
      NodeBuilder::new(Page::zeroed(20), NodeType::Leaf, 2).err(),
      Some(Error::CapacityExceeded {
        required: 24,
        capacity: 20
      })
    );
  }

  #[test]
  fn positions_past_u16_are_rejected_on_large_pages() {
    let mut builder = NodeBuilder::new(Page::zeroed(200_000), NodeType::Leaf, 2).unwrap();
    builder.append_kv(0, &[1; 60_000], b"").unwrap();
    // kv area starts at 24: 24 + 60_004 + 6_004 no longer fits a u16 offset
    assert_eq!(
      builder.append_kv(0, b"", &[2; 6_000]),
      Err(Error::CapacityExceeded {
        required: 66_032,
        capacity: 200_000
      })
    );
    assert_eq!(builder.written(), 1);
  }

  #[test]
  fn builder_enforces_record_count() {
    let mut builder = NodeBuilder::new(Page::zeroed(64), NodeType::Leaf, 2).unwrap();
    builder.append_kv(0, b"a", b"1").unwrap();
    assert_eq!(
      builder.finish().err(),
      Some(Error::IncompleteNode {
        written: 1,
        key_count: 2
      })
    );

    let mut builder = NodeBuilder::new(Page::zeroed(64), NodeType::Leaf, 1).unwrap();
    builder.append_kv(0, b"a", b"1").unwrap();
    assert_eq!(
      builder.append_kv(0, b"b", b"2"),
      Err(Error::OutOfRange {
        index: 1,
        key_count: 1
      })
    );
  }

  #[test]
  fn from_page_round_trips_a_built_node() {
    let node = leaf(&[("k", "v")]);
    let decoded = Node::from_page(node.clone().into_page()).unwrap();
    assert_eq!(decoded, node);
  }

  #[test]
  fn from_page_rejects_garbage() {
    assert_eq!(
      Node::from_page(Page::zeroed(4096)).err(),
      Some(Error::UnexpectedNodeType(0))
    );
    // leaf claiming 1000 keys in a 64-byte page
    let mut bytes = vec![0u8; 64];
    bytes[0] = 2;
    bytes[2..4].copy_from_slice(&1000u16.to_le_bytes());
    assert!(matches!(
      Node::from_page(Page::from(bytes)),
      Err(Error::Malformed(_))
    ));
  }

  #[test]
  fn corrupt_lengths_are_reported() {
    let node = leaf(&[("a", "1")]);
    let mut bytes = node.into_page().into_bytes().into_vec();
    // klen of record 0 now points far past the page
    bytes[14..16].copy_from_slice(&5000u16.to_le_bytes());
    let node = Node::from_page(Page::from(bytes)).unwrap();
    assert_eq!(node.key(0), Err(Error::Malformed("read past end of page")));
  }

  #[test]
  fn records_stop_after_a_corrupt_record() {
    let node = leaf(&[("a", "1"), ("b", "2")]);
    let mut bytes = node.into_page().into_bytes().into_vec();
    // klen of record 0 (kv area starts at 24) points past the page
    bytes[24..26].copy_from_slice(&5000u16.to_le_bytes());
    let node = Node::from_page(Page::from(bytes)).unwrap();
    let mut records = node.records();
    assert_eq!(records.size_hint(), (0, Some(2)));
    assert!(records.next().unwrap().is_err());
    assert!(records.next().is_none());
    assert_eq!(records.size_hint(), (0, Some(0)));
  }

  #[test]
  fn exceeds_compares_against_page_size() {
    let config = PageConfig::default();
    let node = leaf(&[("a", "1")]);
    assert!(!node.exceeds(&config).unwrap());

    let mut builder = NodeBuilder::new(Page::zeroed(8192), NodeType::Leaf, 2).unwrap();
    builder.append_kv(0, &[1; 1000], &[0; 3000]).unwrap();
    builder.append_kv(0, &[2; 1000], &[0; 3000]).unwrap();
    assert!(builder.finish().unwrap().exceeds(&config).unwrap());
  }
}
