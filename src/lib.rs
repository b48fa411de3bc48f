//! On-page node format and copy-on-write splices for an embedded B+tree.
//!
//! A node lives in one fixed-size page: a 4-byte header, one 8-byte pointer
//! per key, a table of cumulative record offsets and the packed key-value
//! records. `Node` reads that layout, `NodeBuilder` writes it, and the
//! functions in `btree` build new nodes out of old ones.
//!
//! ```
//! use bnode::{btree, NodeBuilder, NodeType, PageConfig};
//!
//! let config = PageConfig::default();
//! let mut builder = NodeBuilder::new(config.allocate(), NodeType::Leaf, 2)?;
//! builder.append_kv(0, b"a", b"1")?;
//! builder.append_kv(0, b"c", b"2")?;
//! let old = builder.finish()?;
//!
//! let idx = btree::lookup_position(&old, b"b")?;
//! let new = btree::leaf_insert(&config, config.allocate(), &old, idx + 1, b"b", b"x")?;
//! assert_eq!(new.key(1)?, b"b");
//! assert_eq!(old.key_count(), 2);
//! # Ok::<(), bnode::Error>(())
//! ```

pub mod btree;
pub mod config;
pub mod error;
pub mod node;
pub mod node_type;
pub mod page;
pub mod page_layout;

pub use config::{PageConfig, PageConfigBuilder};
pub use error::Error;
pub use node::{Node, NodeBuilder, Records};
pub use node_type::NodeType;
pub use page::Page;
