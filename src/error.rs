use crate::node_type::NodeType;
use thiserror::Error;

/// Errors raised while reading or building a node page.
///
/// None of these are retryable: they mean a caller bug or a corrupt page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
  #[error("index {index} out of range for node with {key_count} keys")]
  OutOfRange { index: usize, key_count: u16 },

  #[error("node needs {required} bytes but the page holds {capacity}")]
  CapacityExceeded { required: usize, capacity: usize },

  #[error("key too large: {size} bytes (max: {max})")]
  KeyTooLarge { size: usize, max: usize },

  #[error("value too large: {size} bytes (max: {max})")]
  ValueTooLarge { size: usize, max: usize },

  #[error("unexpected node type tag {0}")]
  UnexpectedNodeType(u16),

  #[error("wrong node type: expected {expected:?}, found {found:?}")]
  WrongNodeType { expected: NodeType, found: NodeType },

  #[error("malformed page: {0}")]
  Malformed(&'static str),

  #[error("node built with {written} of {key_count} records")]
  IncompleteNode { written: u16, key_count: u16 },

  #[error("invalid page config: {0}")]
  InvalidConfig(&'static str),
}
