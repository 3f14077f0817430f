//! Bitmap API.

use crate::allocator::{Allocator, Buffer};
use crate::error::Result;

/// Bit-compressed `[bool]` living in allocator memory.
pub struct BitMap<'a> {
    /// Underlying words.
    ///
    /// Bit `index` is stored in word `index / 64` at bit `index % 64`, counting from LSB.
    data: Buffer<'a, u64>,
    /// Number of addressable bits.
    len: usize,
}

impl<'a> BitMap<'a> {
    /// Create a bitmap of a given length, filled with zero bits.
    pub fn new_zeros(allocator: &'a dyn Allocator, len: usize) -> Result<Self> {
        Ok(Self {
            data: Buffer::zeroed(allocator, len.div_ceil(64))?,
            len,
        })
    }

    #[cfg(test)]
    /// Number of addressable bits.
    pub const fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    /// Read the bit at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index out of bounds");
        self.data[index / 64] & (1 << (index % 64)) != 0
    }

    /// Set the bit at `index` and return its previous value.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn test_and_set(&mut self, index: usize) -> bool {
        assert!(index < self.len, "bit index out of bounds");
        let word = &mut self.data[index / 64];
        let mask = 1 << (index % 64);
        let was_set = *word & mask != 0;
        *word |= mask;
        was_set
    }

    /// Reset every bit to zero.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[cfg(test)]
    /// Number of one bits.
    pub fn count_ones(&self) -> usize {
        self.data.iter().map(|word| word.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;

    #[test]
    fn set_and_clear() {
        let allocator = HeapAllocator::new();
        let mut bitmap = BitMap::new_zeros(&allocator, 130).unwrap();
        assert_eq!(bitmap.len(), 130);
        assert!(!bitmap.test_and_set(0));
        assert!(!bitmap.test_and_set(64));
        assert!(!bitmap.test_and_set(129));
        assert!(bitmap.test_and_set(129));
        assert!(bitmap.get(64));
        assert!(!bitmap.get(65));
        assert_eq!(bitmap.count_ones(), 3);
        bitmap.clear();
        assert_eq!(bitmap.count_ones(), 0);
    }

    #[test]
    #[should_panic(expected = "bit index out of bounds")]
    fn out_of_bounds() {
        let allocator = HeapAllocator::new();
        let bitmap = BitMap::new_zeros(&allocator, 10).unwrap();
        bitmap.get(10);
    }
}
