//! B+ tree secondary indexes: a fixed-width key encoding, split/redistribute
//! page-local operations, and the tree algorithm that orchestrates them
//! against a [`crate::buffer::BufferPoolManager`].

mod b_plus_tree;
mod internal_page;
mod iterator;
mod key;
mod leaf_page;
mod page;
mod roots;

pub use b_plus_tree::BPlusTree;
pub use iterator::IndexIterator;
pub use key::IndexKey;
