use crate::error::Error;
use std::convert::TryFrom;

/// NodeType tags a page as an internal node or a leaf.
/// The discriminants are the on-page values of the `kind` header field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
  /// Pointers reference child pages.
  Internal = 1,
  /// Pointers are unused and conventionally zero.
  Leaf = 2,
}

impl TryFrom<u16> for NodeType {
  type Error = Error;

  fn try_from(tag: u16) -> Result<Self, Self::Error> {
    match tag {
      0x01 => Ok(NodeType::Internal),
      0x02 => Ok(NodeType::Leaf),
      _ => Err(Error::UnexpectedNodeType(tag)),
    }
  }
}

impl From<NodeType> for u16 {
  fn from(node_type: NodeType) -> u16 {
    node_type as u16
  }
}
