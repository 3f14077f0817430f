//! CHM perfect hashing.
//!
//! Every key is turned into an edge of a random bipartite graph by hashing it into two halves and
//! masking each half into one side of the graph. If the graph is acyclic, values can be assigned to
//! vertices so that for every key, the masked sum of the values at its two endpoints is the key's
//! position. The slot of a key is thus computed from two table reads:
//!
//! ```text
//! index(key) = mask_index(assigned[u] + assigned[v])
//! ```
//!
//! A random graph with `n` edges is acyclic with constant probability once each side has slightly
//! more than `n` vertices, so construction retries with fresh seeds, and grows the graph when a size
//! keeps failing.

mod graph;

use crate::algorithm::Algorithm;
use crate::allocator::{Allocator, Buffer};
use crate::context::{Attempt, Context, Solved, Solver};
use crate::error::{Error, Result};
use crate::format::Header;
use crate::hash::{HashFunctionId, Seeds};
use crate::keys::KeySet;
use crate::mask::MaskFunctionId;
use crate::table::PerfectHashTable;
use crate::{ConstructionStats, CreateOptions};
use byteorder::{ByteOrder, LittleEndian};
use graph::{Graph, Outcome};
use log::trace;

/// Vertices per side relative to the number of keys, for the first few sizes.
///
/// Modulus-masked graphs step through these factors and then keep doubling. Power-of-two graphs
/// start from the first factor, rounded up, and double on every resize.
const SIDE_FACTORS: [(u64, u64); 4] = [(209, 200), (5, 4), (3, 2), (2, 1)];

/// Sizes of a table and of the graph it was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Dimensions {
    /// Number of value slots.
    pub table_size: u32,
    /// Vertices on both sides of the graph together.
    pub number_of_vertices: u32,
}

impl Dimensions {
    /// Dimensions after `round` resizes.
    ///
    /// Returns `None` when the sizes no longer fit in `u32`. Every round is strictly larger than the
    /// previous one.
    #[must_use]
    pub fn for_round(number_of_keys: u32, mask_function: MaskFunctionId, round: u32) -> Option<Self> {
        let table_size = mask_function.round_size(number_of_keys)?;
        let keys = u64::from(number_of_keys);

        let mut side = 0_u64;
        for step in 0..=round {
            let target = if mask_function.is_modulus() {
                let (numerator, denominator) = SIDE_FACTORS[(step as usize).min(3)];
                let doublings = step.saturating_sub(3);
                if doublings >= 32 {
                    return None;
                }
                (keys * numerator).div_ceil(denominator) << doublings
            } else {
                let (numerator, denominator) = SIDE_FACTORS[0];
                if step >= 32 {
                    return None;
                }
                (keys * numerator).div_ceil(denominator).next_power_of_two() << step
            };
            side = target.max(side + 1);
            if side > u64::from(u32::MAX / 2) {
                return None;
            }
        }

        Some(Self {
            table_size,
            number_of_vertices: u32::try_from(side * 2).ok()?,
        })
    }

    /// Vertices on each side of the graph.
    #[inline]
    #[must_use]
    pub const fn side(&self) -> u32 {
        self.number_of_vertices / 2
    }

    /// Whether these dimensions can hold `number_of_keys` keys under `mask_function`.
    #[must_use]
    pub fn is_valid_for(&self, mask_function: MaskFunctionId, number_of_keys: u32) -> bool {
        number_of_keys != 0
            && self.table_size >= number_of_keys
            && self.number_of_vertices % 2 == 0
            && mask_function.accepts_size(self.table_size)
            && mask_function.accepts_size(self.side())
    }
}

/// Everything needed to compute slot indices, apart from the assigned values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct Parameters {
    /// Hash function splitting keys into halves.
    pub hash_function: HashFunctionId,
    /// Masking function for halves and indices.
    pub mask_function: MaskFunctionId,
    /// Seeds of the hash function.
    pub seeds: Seeds,
    /// Table and graph sizes.
    pub dimensions: Dimensions,
}

impl Parameters {
    /// Assemble parameters from their parts.
    #[inline]
    #[must_use]
    pub const fn new(
        hash_function: HashFunctionId,
        mask_function: MaskFunctionId,
        seeds: Seeds,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            hash_function,
            mask_function,
            seeds,
            dimensions,
        }
    }

    /// Mask hash halves into a left and a right vertex.
    #[inline]
    fn mask_halves(&self, first: u32, second: u32) -> (u32, u32) {
        let side = self.dimensions.side();
        (
            self.mask_function.mask_hash(first, side),
            side + self.mask_function.mask_hash(second, side),
        )
    }

    /// The two vertices of `key`'s edge.
    #[inline]
    #[must_use]
    pub fn vertices(&self, key: u32) -> (u32, u32) {
        let (first, second) = self.hash_function.hash(key, &self.seeds);
        self.mask_halves(first, second)
    }

    /// Slot index of `key`.
    ///
    /// `assigned` must hold one value per vertex. Keys outside the construction set get an
    /// arbitrary, but in-bounds, index.
    #[inline]
    #[must_use]
    pub fn index(&self, key: u32, assigned: &[u32]) -> u32 {
        let (u, v) = self.vertices(key);
        let sum = u64::from(assigned[u as usize]) + u64::from(assigned[v as usize]);
        self.mask_function.mask_index(sum, self.dimensions.table_size)
    }
}

/// Output of a successful attempt.
#[derive(Debug)]
#[non_exhaustive]
pub struct Solution<'a> {
    /// Parameters the attempt used.
    pub parameters: Parameters,
    /// Per-vertex values.
    pub assigned: Buffer<'a, u32>,
}

/// [`Solver`] for CHM graphs over a fixed key set.
pub struct Chm01<'k, 'a> {
    keys: &'k [u32],
    number_of_keys: u32,
    hash_function: HashFunctionId,
    mask_function: MaskFunctionId,
    allocator: &'a dyn Allocator,
}

impl<'k, 'a> Chm01<'k, 'a> {
    /// Prepare a search over `keys`, which must be distinct.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if there are no keys or too many for the initial graph.
    pub fn new(
        keys: &'k [u32],
        hash_function: HashFunctionId,
        mask_function: MaskFunctionId,
        allocator: &'a dyn Allocator,
    ) -> Result<Self> {
        let number_of_keys =
            u32::try_from(keys.len()).map_err(|_| Error::InvalidArgument("too many keys"))?;
        let solver = Self {
            keys,
            number_of_keys,
            hash_function,
            mask_function,
            allocator,
        };
        if number_of_keys == 0 {
            return Err(Error::InvalidArgument("empty key set"));
        }
        if solver.dimensions(0).is_none() {
            return Err(Error::InvalidArgument("too many keys for the masking function"));
        }
        Ok(solver)
    }

    fn dimensions(&self, round: u32) -> Option<Dimensions> {
        Dimensions::for_round(self.number_of_keys, self.mask_function, round)
    }
}

impl<'a> Solver for Chm01<'_, 'a> {
    type Solution = Solution<'a>;
    type Worker = Graph<'a>;

    fn new_worker(&self) -> Result<Graph<'a>> {
        let dimensions = self
            .dimensions(0)
            .ok_or(Error::InvalidArgument("too many keys for the masking function"))?;
        Graph::new(self.allocator, self.keys.len(), dimensions.table_size)
    }

    fn prepare(&self, graph: &mut Graph<'a>, round: u32) -> Result<()> {
        let dimensions = self
            .dimensions(round)
            .ok_or(Error::InvalidArgument("graph size overflow"))?;
        graph.prepare(dimensions.number_of_vertices)
    }

    fn has_round(&self, round: u32) -> bool {
        self.dimensions(round).is_some()
    }

    fn attempt(
        &self,
        graph: &mut Graph<'a>,
        attempt: &mut Attempt<'_>,
    ) -> Result<Option<Solution<'a>>> {
        let dimensions = self
            .dimensions(attempt.round())
            .ok_or(Error::InvalidArgument("graph size overflow"))?;
        let parameters = Parameters::new(
            self.hash_function,
            self.mask_function,
            Seeds::random(attempt.rng()),
            dimensions,
        );

        match graph.solve(self.keys, &parameters, &|| attempt.should_stop()) {
            Outcome::Solved => Ok(Some(Solution {
                parameters,
                assigned: Buffer::from_slice(self.allocator, graph.assigned())?,
            })),
            outcome => {
                trace!(
                    "attempt {} (worker {}, {} vertices): {outcome:?}",
                    attempt.number(),
                    attempt.worker(),
                    dimensions.number_of_vertices,
                );
                Ok(None)
            }
        }
    }
}

/// Run a single attempt with fixed parameters.
///
/// This reproduces the result of a construction from its recorded seeds. Returns the assigned
/// values, or `None` if these parameters do not yield a perfect hash for `keys`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the dimensions cannot hold the keys, and
/// [`Error::OutOfMemory`] if buffers cannot be allocated.
pub fn solve_with_seeds<'a>(
    keys: &[u32],
    parameters: &Parameters,
    allocator: &'a dyn Allocator,
) -> Result<Option<Buffer<'a, u32>>> {
    let number_of_keys =
        u32::try_from(keys.len()).map_err(|_| Error::InvalidArgument("too many keys"))?;
    if !parameters
        .dimensions
        .is_valid_for(parameters.mask_function, number_of_keys)
    {
        return Err(Error::InvalidArgument("dimensions cannot hold the keys"));
    }

    let mut graph = Graph::new(allocator, keys.len(), parameters.dimensions.table_size)?;
    graph.prepare(parameters.dimensions.number_of_vertices)?;
    match graph.solve(keys, parameters, &|| false) {
        Outcome::Solved => Ok(Some(Buffer::from_slice(allocator, graph.assigned())?)),
        _ => Ok(None),
    }
}

/// Build a table for a validated key set.
pub(crate) fn construct<'a>(
    keys: &KeySet,
    options: &CreateOptions,
    context: &Context,
    allocator: &'a dyn Allocator,
) -> Result<PerfectHashTable<'a>> {
    let solver = Chm01::new(
        keys.keys(),
        options.hash_function,
        options.mask_function,
        allocator,
    )?;
    let Solved { solution, stats } = context.solve(&solver)?;
    PerfectHashTable::from_construction(
        Algorithm::Chm01,
        solution.parameters,
        keys,
        solution.assigned,
        Some(stats),
    )
}

/// Rebuild a table from a validated header and its data region.
///
/// The data region holds the assigned values, one per vertex, followed by the values, one per slot,
/// all as little-endian `u32`.
pub(crate) fn load<'a>(
    header: &Header,
    data: &[u8],
    stats: Option<ConstructionStats>,
    allocator: &'a dyn Allocator,
) -> Result<PerfectHashTable<'a>> {
    let hash_function = HashFunctionId::from_id(header.hash_function_id)
        .ok_or(Error::UnsupportedVersion("unknown hash function"))?;
    let mask_function = MaskFunctionId::from_id(header.mask_function_id)
        .ok_or(Error::UnsupportedVersion("unknown masking function"))?;
    let dimensions = Dimensions {
        table_size: header.table_size,
        number_of_vertices: header.number_of_vertices,
    };
    if !dimensions.is_valid_for(mask_function, header.number_of_keys) {
        return Err(Error::CorruptFormat("inconsistent table dimensions"));
    }

    let vertices = dimensions.number_of_vertices as usize;
    let slots = dimensions.table_size as usize;
    if data.len() as u64 != 4 * (vertices as u64 + slots as u64) {
        return Err(Error::CorruptFormat("data region does not match table dimensions"));
    }
    let (assigned_bytes, value_bytes) = data.split_at(vertices * 4);

    let mut assigned = Buffer::zeroed(allocator, vertices)?;
    LittleEndian::read_u32_into(assigned_bytes, &mut assigned);
    let mut values = Buffer::zeroed(allocator, slots)?;
    LittleEndian::read_u32_into(value_bytes, &mut values);

    let parameters = Parameters::new(
        hash_function,
        mask_function,
        Seeds::from_raw_parts(header.seeds),
        dimensions,
    );
    Ok(PerfectHashTable::from_parts(
        Algorithm::Chm01,
        parameters,
        header.number_of_keys,
        assigned,
        values,
        stats,
    ))
}
