//! Registry of construction algorithms.
//!
//! Algorithms are identified by stable numeric ids, persisted in table files. Every algorithm
//! provides a construction routine, a load routine and a description of the runtime operations
//! its tables support.

use crate::allocator::Allocator;
use crate::context::{ConstructionStats, Context};
use crate::error::Result;
use crate::format::Header;
use crate::keys::KeySet;
use crate::table::PerfectHashTable;
use crate::{chm01, CreateOptions};

/// Identifier of a construction algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
#[non_exhaustive]
pub enum Algorithm {
    /// CHM over an acyclic random bipartite graph.
    #[default]
    Chm01 = 1,
}

/// Runtime operations a table supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "each flag is an independent capability"
)]
#[non_exhaustive]
pub struct Capabilities {
    /// Computing the slot of a key.
    pub index: bool,
    /// Reading the value of a key.
    pub lookup: bool,
    /// Writing the value of a key.
    pub insert: bool,
    /// Clearing the value of a key.
    pub delete: bool,
}

impl Algorithm {
    /// Every implemented algorithm.
    pub const ALL: [Self; 1] = [Self::Chm01];

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
            1 => Some(Self::Chm01),
            _ => None,
        }
    }

    /// Human-readable name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chm01 => "Chm01",
        }
    }

    /// Operations supported by tables of this algorithm.
    #[inline]
    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Chm01 => Capabilities {
                index: true,
                lookup: true,
                insert: true,
                delete: false,
            },
        }
    }

    /// Build a table for a validated key set.
    pub(crate) fn construct<'a>(
        self,
        keys: &KeySet,
        options: &CreateOptions,
        context: &Context,
        allocator: &'a dyn Allocator,
    ) -> Result<PerfectHashTable<'a>> {
        match self {
            Self::Chm01 => chm01::construct(keys, options, context, allocator),
        }
    }

    /// Rebuild a table from a validated header and its data region.
    pub(crate) fn load<'a>(
        self,
        header: &Header,
        data: &[u8],
        stats: Option<ConstructionStats>,
        allocator: &'a dyn Allocator,
    ) -> Result<PerfectHashTable<'a>> {
        match self {
            Self::Chm01 => chm01::load(header, data, stats, allocator),
        }
    }
}
