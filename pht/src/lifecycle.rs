//! Create, load, destroy and smoke-test tables.

use crate::algorithm::Algorithm;
use crate::allocator::Allocator;
use crate::context::{Context, ContextConfig};
use crate::error::{Error, Result};
use crate::hash::HashFunctionId;
use crate::keys::KeySet;
use crate::mask::MaskFunctionId;
use crate::table::{PerfectHashTable, TableOps};
use core::mem::ManuallyDrop;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Key written by [`test`].
pub const TEST_KEY: u32 = 0x2e;
/// Value written by [`test`].
pub const TEST_VALUE: u32 = 0xe2;

/// Options of [`create`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct CreateOptions {
    /// Hash function to search with.
    pub hash_function: HashFunctionId,
    /// Masking function to search with.
    pub mask_function: MaskFunctionId,
    /// Construction context tunables.
    pub context: ContextConfig,
    /// Where to save the table after construction, if anywhere.
    pub output_path: Option<PathBuf>,
}

impl CreateOptions {
    /// Set [`CreateOptions::hash_function`].
    #[inline]
    #[must_use]
    pub const fn with_hash_function(mut self, hash_function: HashFunctionId) -> Self {
        self.hash_function = hash_function;
        self
    }

    /// Set [`CreateOptions::mask_function`].
    #[inline]
    #[must_use]
    pub const fn with_mask_function(mut self, mask_function: MaskFunctionId) -> Self {
        self.mask_function = mask_function;
        self
    }

    /// Set [`CreateOptions::context`].
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }

    /// Set [`CreateOptions::output_path`].
    #[inline]
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Build a perfect hash table for `keys` with algorithm `algorithm_id`.
///
/// Construction runs on a fresh [`Context`] configured from `options`. See [`create_with_context`]
/// to observe or cancel the run.
///
/// # Errors
///
/// See [`create_with_context`].
#[inline]
pub fn create<'a>(
    keys: &KeySet,
    algorithm_id: u32,
    allocator: &'a dyn Allocator,
    options: &CreateOptions,
) -> Result<PerfectHashTable<'a>> {
    let context = Context::new(options.context.clone());
    create_with_context(&context, keys, algorithm_id, allocator, options)
}

/// Build a perfect hash table on a caller-provided context.
///
/// The key set is checked before anything is allocated. If [`CreateOptions::output_path`] is set,
/// the table is saved there before being returned.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for an empty key set.
/// - [`Error::NotImplemented`] for an unknown algorithm id.
/// - [`Error::DuplicateKey`] if a key occurs twice.
/// - [`Error::ConstructionFailed`] or [`Error::Cancelled`] if no table was found.
/// - [`Error::OutOfMemory`] or [`Error::Io`] if allocating or saving fails.
pub fn create_with_context<'a>(
    context: &Context,
    keys: &KeySet,
    algorithm_id: u32,
    allocator: &'a dyn Allocator,
    options: &CreateOptions,
) -> Result<PerfectHashTable<'a>> {
    if keys.is_empty() {
        return Err(Error::InvalidArgument("empty key set"));
    }
    let algorithm = Algorithm::from_id(algorithm_id).ok_or(Error::NotImplemented(algorithm_id))?;
    let number_of_keys = keys.validate()?;
    debug!(
        "creating {} table for {number_of_keys} keys with {:?}/{:?}",
        algorithm.name(),
        options.hash_function,
        options.mask_function,
    );

    let table = algorithm.construct(keys, options, context, allocator)?;
    if let Some(path) = &options.output_path {
        table.save(path)?;
        info!("saved table to {}", path.display());
    }
    Ok(table)
}

/// Load a table file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, and any error of [`load_from_bytes`].
#[inline]
pub fn load<'a>(path: impl AsRef<Path>, allocator: &'a dyn Allocator) -> Result<PerfectHashTable<'a>> {
    let bytes = std::fs::read(path)?;
    load_from_bytes(&bytes, allocator)
}

/// Load a table from an in-memory copy of its file.
///
/// # Errors
///
/// See [`format::deserialize`](crate::format::deserialize).
#[inline]
pub fn load_from_bytes<'a>(bytes: &[u8], allocator: &'a dyn Allocator) -> Result<PerfectHashTable<'a>> {
    crate::format::deserialize(bytes, allocator)
}

/// Release a table and clear the caller's handle.
///
/// An empty handle is a no-op. When the process is terminating, the memory is abandoned rather than
/// returned to the allocator. Otherwise the table's structure size is checked first; on mismatch
/// the handle is left untouched.
///
/// # Errors
///
/// Returns [`Error::StructuralSizeMismatch`] if the handle holds a table from a different build.
pub fn destroy(table: &mut Option<PerfectHashTable<'_>>, is_process_terminating: bool) -> Result<()> {
    let Some(existing) = table.take() else {
        return Ok(());
    };
    if is_process_terminating {
        let _abandoned = ManuallyDrop::new(existing);
        return Ok(());
    }
    if let Err(error) = existing.check_structure() {
        *table = Some(existing);
        return Err(error);
    }
    drop(existing);
    Ok(())
}

/// Smoke-test a table: store [`TEST_VALUE`] under [`TEST_KEY`], read it back and restore the slot.
///
/// Returns whether the value read back matched. Tables that reject inserts or lookups fail.
pub fn test(table: &mut PerfectHashTable<'_>) -> bool {
    if let Err(error) = table.check_structure() {
        warn!("refusing to test table: {error}");
        return false;
    }
    match round_trip_test_value(table) {
        Ok(matched) => matched,
        Err(error) => {
            warn!("table test failed: {error}");
            false
        }
    }
}

fn round_trip_test_value(table: &mut PerfectHashTable<'_>) -> Result<bool> {
    let previous = table.insert(TEST_KEY, TEST_VALUE)?;
    let value = table.lookup(TEST_KEY)?;
    table.insert(TEST_KEY, previous)?;
    Ok(value == TEST_VALUE)
}
