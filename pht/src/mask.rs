//! Masking of hash halves and slot indices into bounded ranges.

/// Identifier of a masking function.
///
/// Modulus masking works with any table size and produces minimal tables. The other functions
/// require power-of-two sizes and round the table up accordingly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
#[non_exhaustive]
pub enum MaskFunctionId {
    /// Remainder of division.
    #[default]
    Modulus = 1,
    /// Bitwise AND with `size - 1`.
    And = 2,
    /// Fold the upper half onto the lower half, then AND with `size - 1`.
    XorAnd = 3,
}

impl MaskFunctionId {
    /// Every known masking function.
    pub const ALL: [Self; 3] = [Self::Modulus, Self::And, Self::XorAnd];

    /// The persisted id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Look up a persisted id.
    #[inline]
    #[must_use]
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Modulus),
            2 => Some(Self::And),
            3 => Some(Self::XorAnd),
            _ => None,
        }
    }

    /// Whether sizes may be arbitrary.
    #[inline]
    #[must_use]
    pub const fn is_modulus(self) -> bool {
        matches!(self, Self::Modulus)
    }

    /// Round `size` up to the nearest size this function supports.
    ///
    /// Returns `None` if the rounded size does not fit in `u32` or `size` is zero.
    #[inline]
    #[must_use]
    pub fn round_size(self, size: u32) -> Option<u32> {
        if size == 0 {
            return None;
        }
        match self {
            Self::Modulus => Some(size),
            Self::And | Self::XorAnd => size.checked_next_power_of_two(),
        }
    }

    /// Whether `size` can be used with this function.
    #[inline]
    #[must_use]
    pub const fn accepts_size(self, size: u32) -> bool {
        match self {
            Self::Modulus => size != 0,
            Self::And | Self::XorAnd => size.is_power_of_two(),
        }
    }

    /// Map a hash half into `0..size`.
    #[inline]
    #[must_use]
    pub const fn mask_hash(self, hash: u32, size: u32) -> u32 {
        match self {
            Self::Modulus => hash % size,
            Self::And => hash & (size - 1),
            Self::XorAnd => (hash ^ (hash >> 16)) & (size - 1),
        }
    }

    /// Map the sum of two assigned values into a slot index in `0..size`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "the result is below `size`")]
    pub const fn mask_index(self, sum: u64, size: u32) -> u32 {
        match self {
            Self::Modulus => (sum % size as u64) as u32,
            Self::And => (sum as u32) & (size - 1),
            Self::XorAnd => ((sum as u32) ^ (sum >> 32) as u32) & (size - 1),
        }
    }

    /// Solve `mask_index(result + other) == index` for `result` in `0..size`.
    ///
    /// `index` and `other` must both be below `size`.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "the result is below `size`")]
    pub const fn assignment(self, index: u32, other: u32, size: u32) -> u32 {
        match self {
            Self::Modulus => ((index as u64 + size as u64 - other as u64) % size as u64) as u32,
            Self::And | Self::XorAnd => index.wrapping_sub(other) & (size - 1),
        }
    }
}
