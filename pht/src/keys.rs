//! Key sets and key files.
//!
//! A key file (`*.keys`) is a packed array of little-endian `u32` keys. The value stored for each
//! key defaults to its position in the file.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::path::{Path, PathBuf};

/// Extension appended to a key file's name to form the default table path.
pub const TABLE_EXTENSION: &str = "pht1";

/// Extension of key files picked up by the self-test.
pub const KEYS_EXTENSION: &str = "keys";

/// Keys and the values associated with them.
///
/// Keys and values are stored side by side so that construction can borrow the keys as a plain
/// slice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<u32>,
    values: Vec<u32>,
}

impl KeySet {
    /// Build a key set from `(key, value)` pairs.
    #[inline]
    pub fn new(entries: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let (keys, values) = entries.into_iter().unzip();
        Self { keys, values }
    }

    /// Build a key set whose values are the positions of the keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if there are more than `u32::MAX` keys.
    #[inline]
    pub fn from_keys(keys: Vec<u32>) -> Result<Self> {
        let len = u32::try_from(keys.len()).map_err(|_| Error::InvalidArgument("too many keys"))?;
        Ok(Self {
            keys,
            values: (0..len).collect(),
        })
    }

    /// Read a key file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::CorruptFormat`] if its length
    /// is not a multiple of four.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() % 4 != 0 {
            return Err(Error::CorruptFormat("key file length is not a multiple of 4"));
        }
        let mut keys = vec![0; bytes.len() / 4];
        LittleEndian::read_u32_into(&bytes, &mut keys);
        Self::from_keys(keys)
    }

    /// Write the keys, without values, as a key file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save_keys(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut bytes = vec![0; self.keys.len() * 4];
        LittleEndian::write_u32_into(&self.keys, &mut bytes);
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// The keys, in insertion order.
    #[inline]
    pub fn keys(&self) -> &[u32] {
        &self.keys
    }

    /// The values, parallel to [`KeySet::keys`].
    #[inline]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Iterate over `(key, value)` pairs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.keys.iter().copied().zip(self.values.iter().copied())
    }

    /// Number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether there are no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check that the set is non-empty, fits in 32-bit counts and holds no duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty or oversized sets and [`Error::DuplicateKey`]
    /// naming one of the repeated keys.
    pub fn validate(&self) -> Result<u32> {
        if self.keys.is_empty() {
            return Err(Error::InvalidArgument("empty key set"));
        }
        let len =
            u32::try_from(self.keys.len()).map_err(|_| Error::InvalidArgument("too many keys"))?;

        let mut sorted = self.keys.clone();
        radsort::sort(&mut sorted);
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::DuplicateKey(pair[0]));
        }
        Ok(len)
    }
}

impl FromIterator<(u32, u32)> for KeySet {
    #[inline]
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Default table path for a key file: the key file's name with `.pht1` appended.
#[inline]
pub fn table_path_for_keys(keys_path: &Path) -> PathBuf {
    let mut name = keys_path.as_os_str().to_owned();
    name.push(".");
    name.push(TABLE_EXTENSION);
    PathBuf::from(name)
}
