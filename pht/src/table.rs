//! Runtime table.

use crate::algorithm::Algorithm;
use crate::allocator::{Allocator, Buffer};
use crate::chm01::Parameters;
use crate::context::ConstructionStats;
use crate::error::{Error, Result};
use crate::hash::{HashFunctionId, Seeds};
use crate::keys::KeySet;
use crate::mask::MaskFunctionId;
use std::path::Path;

/// Size recorded in every table, checked before teardown.
#[allow(clippy::cast_possible_truncation, reason = "the structure is far below 4 GiB")]
pub(crate) const STRUCT_SIZE: u32 = core::mem::size_of::<PerfectHashTable<'static>>() as u32;

/// Operations on a constructed or loaded table.
///
/// Which of these are available depends on the table's [`Algorithm`]; unsupported operations fail
/// with [`Error::UnsupportedOperation`]. Keys outside the construction set are not detected: they
/// map to some slot, and reads and writes go to that slot.
pub trait TableOps {
    /// Slot index of `key`, below the table size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if the algorithm cannot compute indices.
    fn index(&self, key: u32) -> Result<u32>;

    /// Value stored in `key`'s slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if the algorithm does not support lookups.
    fn lookup(&self, key: u32) -> Result<u32>;

    /// Store `value` in `key`'s slot and return the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if the algorithm does not support inserts.
    fn insert(&mut self, key: u32, value: u32) -> Result<u32>;

    /// Reset `key`'s slot to zero and return the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if the algorithm does not support deletes.
    fn delete(&mut self, key: u32) -> Result<u32>;
}

/// A perfect hash table: hash parameters, per-vertex values and one value slot per index.
///
/// All memory is owned through the allocator the table was created or loaded with, and returned to
/// it when the table is dropped.
#[derive(Debug)]
pub struct PerfectHashTable<'a> {
    pub(crate) size_of_struct: u32,
    algorithm: Algorithm,
    parameters: Parameters,
    number_of_keys: u32,
    assigned: Buffer<'a, u32>,
    values: Buffer<'a, u32>,
    stats: Option<ConstructionStats>,
}

impl<'a> PerfectHashTable<'a> {
    /// Assemble a table from loaded parts.
    pub(crate) fn from_parts(
        algorithm: Algorithm,
        parameters: Parameters,
        number_of_keys: u32,
        assigned: Buffer<'a, u32>,
        values: Buffer<'a, u32>,
        stats: Option<ConstructionStats>,
    ) -> Self {
        Self {
            size_of_struct: STRUCT_SIZE,
            algorithm,
            parameters,
            number_of_keys,
            assigned,
            values,
            stats,
        }
    }

    /// Assemble a freshly constructed table and store the key set's values in it.
    pub(crate) fn from_construction(
        algorithm: Algorithm,
        parameters: Parameters,
        keys: &KeySet,
        assigned: Buffer<'a, u32>,
        stats: Option<ConstructionStats>,
    ) -> Result<Self> {
        let number_of_keys =
            u32::try_from(keys.len()).map_err(|_| Error::InvalidArgument("too many keys"))?;
        let mut values = Buffer::zeroed(
            assigned.allocator(),
            parameters.dimensions.table_size as usize,
        )?;
        for (key, value) in keys.iter() {
            values[parameters.index(key, &assigned) as usize] = value;
        }
        Ok(Self::from_parts(
            algorithm,
            parameters,
            number_of_keys,
            assigned,
            values,
            stats,
        ))
    }

    /// Algorithm the table was built with.
    #[inline]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Hash parameters.
    #[inline]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Hash function id.
    #[inline]
    pub const fn hash_function(&self) -> HashFunctionId {
        self.parameters.hash_function
    }

    /// Masking function id.
    #[inline]
    pub const fn mask_function(&self) -> MaskFunctionId {
        self.parameters.mask_function
    }

    /// Seeds of the winning attempt.
    #[inline]
    pub const fn seeds(&self) -> &Seeds {
        &self.parameters.seeds
    }

    /// Number of keys the table was built for.
    #[inline]
    pub const fn number_of_keys(&self) -> u32 {
        self.number_of_keys
    }

    /// Number of value slots.
    #[inline]
    pub const fn table_size(&self) -> u32 {
        self.parameters.dimensions.table_size
    }

    /// Number of graph vertices.
    #[inline]
    pub const fn number_of_vertices(&self) -> u32 {
        self.parameters.dimensions.number_of_vertices
    }

    /// Per-vertex values.
    #[inline]
    pub fn assigned(&self) -> &[u32] {
        &self.assigned
    }

    /// Value slots.
    #[inline]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Statistics of the construction run, if known.
    #[inline]
    pub const fn stats(&self) -> Option<&ConstructionStats> {
        self.stats.as_ref()
    }

    /// The allocator owning the table's memory.
    #[inline]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.values.allocator()
    }

    /// Size of the structure as recorded in the table.
    #[inline]
    pub const fn size_of_struct(&self) -> u32 {
        self.size_of_struct
    }

    /// Verify the recorded structure size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralSizeMismatch`] if the table was not produced by this build.
    #[inline]
    pub fn check_structure(&self) -> Result<()> {
        if self.size_of_struct == STRUCT_SIZE {
            Ok(())
        } else {
            Err(Error::StructuralSizeMismatch {
                recorded: self.size_of_struct,
                expected: STRUCT_SIZE,
            })
        }
    }

    /// Whether every key of `keys` has a distinct slot holding its value.
    pub fn verify(&self, keys: &KeySet) -> bool {
        let mut slots: Vec<u32> = keys
            .iter()
            .map(|(key, _)| self.parameters.index(key, &self.assigned))
            .collect();
        let values_match = keys
            .iter()
            .zip(&slots)
            .all(|((_, value), &slot)| self.values[slot as usize] == value);
        radsort::sort(&mut slots);
        values_match && slots.windows(2).all(|pair| pair[0] != pair[1])
    }

    /// Serialize the table into the on-disk format.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors of the in-memory writer.
    #[inline]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::format::serialize(self)
    }

    /// Write the table to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn require(&self, supported: bool, operation: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation {
                operation,
                algorithm: self.algorithm.name(),
            })
        }
    }

    fn slot(&self, key: u32) -> usize {
        self.parameters.index(key, &self.assigned) as usize
    }
}

impl TableOps for PerfectHashTable<'_> {
    #[inline]
    fn index(&self, key: u32) -> Result<u32> {
        self.require(self.algorithm.capabilities().index, "index")?;
        Ok(self.parameters.index(key, &self.assigned))
    }

    #[inline]
    fn lookup(&self, key: u32) -> Result<u32> {
        self.require(self.algorithm.capabilities().lookup, "lookup")?;
        Ok(self.values[self.slot(key)])
    }

    #[inline]
    fn insert(&mut self, key: u32, value: u32) -> Result<u32> {
        self.require(self.algorithm.capabilities().insert, "insert")?;
        let slot = self.slot(key);
        Ok(core::mem::replace(&mut self.values[slot], value))
    }

    #[inline]
    fn delete(&mut self, key: u32) -> Result<u32> {
        self.require(self.algorithm.capabilities().delete, "delete")?;
        let slot = self.slot(key);
        Ok(core::mem::take(&mut self.values[slot]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;
    use crate::{create, CreateOptions};

    fn small_table(allocator: &HeapAllocator) -> (KeySet, PerfectHashTable<'_>) {
        let keys = KeySet::new((0..300).map(|i| (i * 31 + 7, i * 2)));
        let table = create(&keys, Algorithm::Chm01.id(), allocator, &CreateOptions::default())
            .unwrap();
        (keys, table)
    }

    #[test]
    fn lookups_return_inserted_values() {
        let allocator = HeapAllocator::new();
        let (keys, mut table) = small_table(&allocator);
        assert!(table.verify(&keys));
        for (key, value) in keys.iter() {
            assert_eq!(table.lookup(key).unwrap(), value);
        }
        assert_eq!(table.insert(7, 1234).unwrap(), 0);
        assert_eq!(table.lookup(7).unwrap(), 1234);
        assert_eq!(table.insert(7, 0).unwrap(), 1234);
    }

    #[test]
    fn indices_are_distinct_and_in_range() {
        let allocator = HeapAllocator::new();
        let (keys, table) = small_table(&allocator);
        let mut seen = vec![false; table.table_size() as usize];
        for (key, _) in keys.iter() {
            let index = table.index(key).unwrap();
            assert!(index < table.table_size());
            assert!(!seen[index as usize], "collision at {index}");
            seen[index as usize] = true;
        }
        // Unknown keys still land in bounds.
        assert!(table.index(0xffff_fff0).unwrap() < table.table_size());
    }

    #[test]
    fn delete_is_unsupported() {
        let allocator = HeapAllocator::new();
        let (_, mut table) = small_table(&allocator);
        assert!(matches!(
            table.delete(7),
            Err(Error::UnsupportedOperation {
                operation: "delete",
                algorithm: "Chm01"
            })
        ));
    }

    #[test]
    fn structure_check() {
        let allocator = HeapAllocator::new();
        let (_, mut table) = small_table(&allocator);
        table.check_structure().unwrap();
        table.size_of_struct += 1;
        assert!(matches!(
            table.check_structure(),
            Err(Error::StructuralSizeMismatch { .. })
        ));
    }

    #[test]
    fn memory_returns_to_allocator() {
        let allocator = HeapAllocator::new();
        drop(small_table(&allocator));
        assert_eq!(allocator.outstanding(), 0);
        assert!(allocator.total_allocations() > 0);
    }
}
