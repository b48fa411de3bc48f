use crate::error::Error;
use byteorder::{ByteOrder, LittleEndian};

/// Page is a fixed-length byte buffer backing one node.
///
/// Reads past the end report `Error::Malformed`, writes past the end report
/// `Error::CapacityExceeded`; nothing here ever indexes out of bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
  data: Box<[u8]>,
}

impl Page {
  /// A zero-filled page of `size` bytes.
  pub fn zeroed(size: usize) -> Page {
    Page {
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn into_bytes(self) -> Box<[u8]> {
    self.data
  }

  pub(crate) fn slice(&self, pos: usize, len: usize) -> Result<&[u8], Error> {
    pos
      .checked_add(len)
      .and_then(|end| self.data.get(pos..end))
      .ok_or(Error::Malformed("read past end of page"))
  }

  fn slice_mut(&mut self, pos: usize, len: usize) -> Result<&mut [u8], Error> {
    let capacity = self.data.len();
    let end = pos.saturating_add(len);
    self
      .data
      .get_mut(pos..end)
      .ok_or(Error::CapacityExceeded {
        required: end,
        capacity,
      })
  }

  pub(crate) fn read_u16(&self, pos: usize) -> Result<u16, Error> {
    Ok(LittleEndian::read_u16(self.slice(pos, 2)?))
  }

  pub(crate) fn read_u64(&self, pos: usize) -> Result<u64, Error> {
    Ok(LittleEndian::read_u64(self.slice(pos, 8)?))
  }

  pub(crate) fn write_u16(&mut self, pos: usize, value: u16) -> Result<(), Error> {
    LittleEndian::write_u16(self.slice_mut(pos, 2)?, value);
    Ok(())
  }

  pub(crate) fn write_u64(&mut self, pos: usize, value: u64) -> Result<(), Error> {
    LittleEndian::write_u64(self.slice_mut(pos, 8)?, value);
    Ok(())
  }

  pub(crate) fn write_bytes(&mut self, pos: usize, bytes: &[u8]) -> Result<(), Error> {
    self.slice_mut(pos, bytes.len())?.copy_from_slice(bytes);
    Ok(())
  }
}

impl From<Vec<u8>> for Page {
  fn from(bytes: Vec<u8>) -> Page {
    Page {
      data: bytes.into_boxed_slice(),
    }
  }
}
