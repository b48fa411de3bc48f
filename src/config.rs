use crate::error::Error;
use crate::page::Page;
use crate::page_layout::{single_record_node_size, MAX_KEY_SIZE, MAX_VALUE_SIZE, PAGE_SIZE};

/// PageConfig carries the size limits every node page is built under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageConfig {
  page_size: usize,
  max_key_size: usize,
  max_value_size: usize,
}

impl PageConfig {
  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn max_key_size(&self) -> usize {
    self.max_key_size
  }

  pub fn max_value_size(&self) -> usize {
    self.max_value_size
  }

  /// Hands out a zeroed, page-sized buffer for a new node.
  pub fn allocate(&self) -> Page {
    Page::zeroed(self.page_size)
  }

  /// Rejects a record whose key or value is over the configured limits.
  pub fn check_kv(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
    if key.len() > self.max_key_size {
      return Err(Error::KeyTooLarge {
        size: key.len(),
        max: self.max_key_size,
      });
    }
    if value.len() > self.max_value_size {
      return Err(Error::ValueTooLarge {
        size: value.len(),
        max: self.max_value_size,
      });
    }
    Ok(())
  }
}

impl Default for PageConfig {
  fn default() -> Self {
    PageConfig {
      page_size: PAGE_SIZE,
      max_key_size: MAX_KEY_SIZE,
      max_value_size: MAX_VALUE_SIZE,
    }
  }
}

/// PageConfigBuilder is a Builder for the PageConfig struct
pub struct PageConfigBuilder {
  /// Size of every node page in bytes
  page_size: usize,
  /// Largest key a record may carry
  max_key_size: usize,
  /// Largest value a record may carry
  max_value_size: usize,
}

impl PageConfigBuilder {
  pub fn new() -> PageConfigBuilder {
    PageConfigBuilder {
      page_size: 0,
      max_key_size: 0,
      max_value_size: 0,
    }
  }

  pub fn page_size(mut self, page_size: usize) -> PageConfigBuilder {
    self.page_size = page_size;
    self
  }

  pub fn max_key_size(mut self, max_key_size: usize) -> PageConfigBuilder {
    self.max_key_size = max_key_size;
    self
  }

  pub fn max_value_size(mut self, max_value_size: usize) -> PageConfigBuilder {
    self.max_value_size = max_value_size;
    self
  }

  pub fn build(&self) -> Result<PageConfig, Error> {
    if self.page_size == 0 {
      return Err(Error::InvalidConfig("page size must be non-zero"));
    }
    // nbytes and every offset are stored as u16
    if self.page_size > u16::MAX as usize {
      return Err(Error::InvalidConfig("page size must fit in u16"));
    }
    if self.max_key_size == 0 {
      return Err(Error::InvalidConfig("max key size must be non-zero"));
    }
    // a node with one maximum-size record must always fit
    if single_record_node_size(self.max_key_size, self.max_value_size) > self.page_size {
      return Err(Error::InvalidConfig(
        "a maximum-size record does not fit in one page",
      ));
    }
    Ok(PageConfig {
      page_size: self.page_size,
      max_key_size: self.max_key_size,
      max_value_size: self.max_value_size,
    })
  }
}

impl Default for PageConfigBuilder {
  /// A default PageConfigBuilder provides a builder with:
  /// - page size set to 4096
  /// - max key size set to 1000
  /// - max value size set to 3000
  fn default() -> Self {
    PageConfigBuilder::new()
      .page_size(PAGE_SIZE)
      .max_key_size(MAX_KEY_SIZE)
      .max_value_size(MAX_VALUE_SIZE)
  }
}
