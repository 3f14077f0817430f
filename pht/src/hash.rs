//! Seeded hash family.
//!
//! Every hash function maps a 32-bit key to two 32-bit halves under four 32-bit seeds. The halves
//! are masked into the two sides of the construction graph, so a key whose halves coincide is
//! rejected during construction and a fresh set of seeds is drawn.
//!
//! The functions are identified by stable numeric ids because the id is persisted in table files.

use core::hash::Hasher;
use rapidhash::{RapidHasher, RapidRng};

/// Number of seeds every hash function consumes.
pub const NUMBER_OF_SEEDS: usize = 4;

/// Seeds of one construction attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Seeds([u32; NUMBER_OF_SEEDS]);

impl Seeds {
    /// Initialize from saved data.
    #[inline]
    #[must_use]
    pub const fn from_raw_parts(seeds: [u32; NUMBER_OF_SEEDS]) -> Self {
        Self(seeds)
    }

    /// The raw seed values.
    #[inline]
    #[must_use]
    pub const fn as_array(&self) -> &[u32; NUMBER_OF_SEEDS] {
        &self.0
    }

    /// Draw fresh seeds from `rng`.
    #[inline]
    #[allow(clippy::cast_possible_truncation, reason = "splitting into halves")]
    pub fn random(rng: &mut RapidRng) -> Self {
        let first = rng.next();
        let second = rng.next();
        Self([
            first as u32,
            (first >> 32) as u32,
            second as u32,
            (second >> 32) as u32,
        ])
    }

    /// Iterate through pseudo-random seeds.
    ///
    /// This returns an infinite iterator whose values are fully determined by `start`.
    #[inline]
    pub fn iter(start: u64) -> impl Iterator<Item = Self> {
        let mut rng = RapidRng::new(start);
        core::iter::repeat_with(move || Self::random(&mut rng))
    }
}

/// Identifier of a hash function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
#[non_exhaustive]
pub enum HashFunctionId {
    /// rapidhash over the key, seeded with the first two seeds.
    #[default]
    Rapid = 1,
    /// Two CRC32 steps over the key and its rotation.
    Crc32Rotate = 2,
    /// Rotations of the key mixed with each seed.
    RotateXor = 3,
    /// Additions and subtractions of seeds, then XOR.
    AddSubXor = 4,
    /// The key XORed with the first two seeds.
    ///
    /// Cheap, but the two halves always differ by the same value, so many key sets never produce
    /// an acyclic graph with it.
    Xor = 5,
}

impl HashFunctionId {
    /// Every known hash function.
    pub const ALL: [Self; 5] = [
        Self::Rapid,
        Self::Crc32Rotate,
        Self::RotateXor,
        Self::AddSubXor,
        Self::Xor,
    ];

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
            1 => Some(Self::Rapid),
            2 => Some(Self::Crc32Rotate),
            3 => Some(Self::RotateXor),
            4 => Some(Self::AddSubXor),
            5 => Some(Self::Xor),
            _ => None,
        }
    }

    /// Hash `key` into two halves.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "splitting into halves")]
    pub fn hash(self, key: u32, seeds: &Seeds) -> (u32, u32) {
        let [s1, s2, s3, s4] = seeds.0;
        match self {
            Self::Rapid => {
                let mut state = RapidHasher::new(u64::from(s1) | (u64::from(s2) << 32));
                state.write_u32(key);
                let hash = state.finish();
                (hash as u32, (hash >> 32) as u32)
            }
            Self::Crc32Rotate => {
                let a = crc32(s1, key);
                let b = crc32(s2, key.rotate_left(15));
                let c = s3 ^ key;
                (a, crc32(b, c))
            }
            Self::RotateXor => {
                let a = (key ^ s1).rotate_left(15);
                let b = key.wrapping_add(s2).rotate_left(7);
                let c = key.wrapping_sub(s3).rotate_right(11);
                let d = (key ^ s4).rotate_right(20);
                (a ^ c, b ^ d)
            }
            Self::AddSubXor => {
                let a = key.wrapping_add(s1);
                let b = key.wrapping_sub(s2);
                (a, a ^ b ^ s3)
            }
            Self::Xor => (key ^ s1, key ^ s2),
        }
    }
}

/// CRC32 of the little-endian bytes of `value`, continuing from `initial`.
fn crc32(initial: u32, value: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(initial);
    hasher.update(&value.to_le_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for function in HashFunctionId::ALL {
            assert_eq!(HashFunctionId::from_id(function.id()), Some(function));
        }
        assert_eq!(HashFunctionId::from_id(0), None);
        assert_eq!(HashFunctionId::from_id(6), None);
        assert_eq!(HashFunctionId::default(), HashFunctionId::Rapid);
    }

    #[test]
    fn deterministic() {
        let seeds = Seeds::from_raw_parts([0x1234_5678, 0x9abc_def0, 0x0f0f_0f0f, 0xf0f0_f0f0]);
        for function in HashFunctionId::ALL {
            for key in [0, 1, 0x2e, u32::MAX] {
                assert_eq!(function.hash(key, &seeds), function.hash(key, &seeds));
            }
        }
    }

    #[test]
    fn seeds_change_output() {
        let mut iter = Seeds::iter(0x243f_6a88_85a3_08d3);
        let first = iter.next().unwrap();
        let second = iter.next().unwrap();
        assert_ne!(first, second);
        for function in HashFunctionId::ALL {
            assert_ne!(
                (0..64).map(|key| function.hash(key, &first)).collect::<Vec<_>>(),
                (0..64).map(|key| function.hash(key, &second)).collect::<Vec<_>>(),
                "{function:?} ignores its seeds",
            );
        }
    }

    #[test]
    fn seed_stream_is_reproducible() {
        let a: Vec<Seeds> = Seeds::iter(7).take(8).collect();
        let b: Vec<Seeds> = Seeds::iter(7).take(8).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn simple_functions() {
        let seeds = Seeds::from_raw_parts([1, 2, 3, 4]);
        assert_eq!(HashFunctionId::Xor.hash(0x10, &seeds), (0x11, 0x12));
        assert_eq!(
            HashFunctionId::AddSubXor.hash(10, &seeds),
            (11, 11 ^ 8 ^ 3),
        );
    }
}
