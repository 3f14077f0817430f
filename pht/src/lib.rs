//! Concurrent construction and persistence of perfect hash tables.
//!
//! A [perfect hash function][phf] maps a fixed set of keys to distinct slots. This crate builds
//! such functions for sets of 32-bit keys, stores a 32-bit value per key, and saves the result to a
//! self-describing file that can be loaded back without rebuilding.
//!
//! [phf]: https://en.wikipedia.org/wiki/Perfect_hash_function
//!
//!
//! # Usage
//!
//! [`create`] searches for a table over a [`KeySet`] with the algorithm of the given id. The search
//! runs on several threads coordinated by a [`Context`]: the first worker to find a solution wins,
//! and the key space is grown if too many attempts fail. [`create_with_context`] lets the caller
//! keep a handle on the context to cancel the run or wait for its [`Signal`]s.
//!
//! The resulting [`PerfectHashTable`] supports the operations of [`TableOps`], can be saved with
//! [`PerfectHashTable::save`] and reopened with [`load`]. Every byte of table memory is owned
//! through a caller-provided [`Allocator`]; [`destroy`] returns it.
//!
//! ```
//! use pht::{create, Algorithm, CreateOptions, HeapAllocator, KeySet, TableOps};
//!
//! let allocator = HeapAllocator::new();
//! let keys = KeySet::new([(0x2e, 10), (7, 20), (1 << 20, 30)]);
//! let table = create(&keys, Algorithm::Chm01.id(), &allocator, &CreateOptions::default())?;
//! assert_eq!(table.lookup(7)?, 20);
//! # Ok::<(), pht::Error>(())
//! ```
//!
//! [`self_test`] runs the whole cycle over a directory of `*.keys` files.

#![deny(unsafe_op_in_unsafe_fn)]

mod error;

pub mod algorithm;
pub mod allocator;
mod bitmap;
pub mod chm01;
pub mod context;
pub mod format;
pub mod hash;
pub mod keys;
mod lifecycle;
pub mod mask;
mod table;

pub use algorithm::{Algorithm, Capabilities};
pub use allocator::{Allocator, Buffer, HeapAllocator};
pub use context::{Attempt, ConstructionStats, Context, ContextConfig, Signal, Solved, Solver};
pub use error::{Error, Result};
pub use hash::{HashFunctionId, Seeds};
pub use keys::{table_path_for_keys, KeySet};
pub use lifecycle::{
    create, create_with_context, destroy, load, load_from_bytes, test, CreateOptions, TEST_KEY,
    TEST_VALUE,
};
pub use mask::MaskFunctionId;
pub use self_test::{self_test, SelfTestReport};
pub use table::{PerfectHashTable, TableOps};

#[cfg(test)]
mod tests;
