//! Per-worker graph used by construction attempts.
//!
//! Each key is an edge between a vertex on the left side and a vertex on the right side. The graph
//! is acyclic iff repeatedly removing degree-one vertices removes every edge; the removal order,
//! replayed backwards, then lets every key be assigned the slot equal to its position.
//!
//! Vertices don't store adjacency lists. Only the degree and the XOR of the incident edge ids are
//! tracked, which is enough to recover the sole remaining edge of a degree-one vertex.

use super::Parameters;
use crate::allocator::{Allocator, Buffer};
use crate::bitmap::BitMap;
use crate::error::Result;

/// Number of peeling steps between cancellation checks.
const CANCELLATION_INTERVAL: u32 = 4096;

/// Result of one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Every key got a distinct slot.
    Solved,
    /// Some key hashed to identical halves.
    HashCollision,
    /// The graph has a cycle.
    Cyclic,
    /// The attempt was abandoned.
    Cancelled,
    /// The assignment did not produce distinct slots.
    Unverified,
}

/// Scratch buffers of one worker, reused across attempts.
pub struct Graph<'a> {
    /// Left endpoint of each edge.
    left: Buffer<'a, u32>,
    /// Right endpoint of each edge.
    right: Buffer<'a, u32>,
    /// Edges in removal order.
    order: Buffer<'a, u32>,
    /// The degree-one vertex each edge in `order` was removed through.
    leaves: Buffer<'a, u32>,
    /// Remaining degree of each vertex.
    degree: Buffer<'a, u32>,
    /// XOR of the ids of the remaining edges of each vertex.
    incident: Buffer<'a, u32>,
    /// Pending degree-one vertices. A vertex is pushed at most once.
    stack: Buffer<'a, u32>,
    /// Per-vertex values whose sum, masked, is the slot index.
    assigned: Buffer<'a, u32>,
    /// Slots claimed during verification.
    seen: BitMap<'a>,
}

impl<'a> Graph<'a> {
    /// Allocate edge buffers. Vertex buffers stay empty until [`Graph::prepare`].
    pub(crate) fn new(
        allocator: &'a dyn Allocator,
        number_of_keys: usize,
        table_size: u32,
    ) -> Result<Self> {
        Ok(Self {
            left: Buffer::zeroed(allocator, number_of_keys)?,
            right: Buffer::zeroed(allocator, number_of_keys)?,
            order: Buffer::zeroed(allocator, number_of_keys)?,
            leaves: Buffer::zeroed(allocator, number_of_keys)?,
            degree: Buffer::zeroed(allocator, 0)?,
            incident: Buffer::zeroed(allocator, 0)?,
            stack: Buffer::zeroed(allocator, 0)?,
            assigned: Buffer::zeroed(allocator, 0)?,
            seen: BitMap::new_zeros(allocator, table_size as usize)?,
        })
    }

    /// Size the vertex buffers for `number_of_vertices` vertices.
    pub(crate) fn prepare(&mut self, number_of_vertices: u32) -> Result<()> {
        let vertices = number_of_vertices as usize;
        self.degree.resize(vertices)?;
        self.incident.resize(vertices)?;
        self.stack.resize(vertices)?;
        self.assigned.resize(vertices)?;
        Ok(())
    }

    /// Values computed by the last successful attempt.
    pub(crate) fn assigned(&self) -> &[u32] {
        &self.assigned
    }

    /// Run one attempt with the given parameters.
    ///
    /// `should_stop` is polled periodically while peeling.
    pub(crate) fn solve(
        &mut self,
        keys: &[u32],
        parameters: &Parameters,
        should_stop: &dyn Fn() -> bool,
    ) -> Outcome {
        debug_assert_eq!(
            self.degree.len(),
            parameters.dimensions.number_of_vertices as usize,
            "graph prepared for a different size",
        );
        self.degree.clear();
        self.incident.clear();
        self.assigned.clear();

        if !self.add_edges(keys, parameters) {
            return Outcome::HashCollision;
        }
        if let Err(outcome) = self.peel(should_stop) {
            return outcome;
        }
        self.assign(parameters);
        if self.verify(keys, parameters) {
            Outcome::Solved
        } else {
            Outcome::Unverified
        }
    }

    fn add_edges(&mut self, keys: &[u32], parameters: &Parameters) -> bool {
        for (edge, &key) in (0_u32..).zip(keys) {
            let (first, second) = parameters.hash_function.hash(key, &parameters.seeds);
            if first == second {
                return false;
            }
            let (u, v) = parameters.mask_halves(first, second);
            let e = edge as usize;
            self.left[e] = u;
            self.right[e] = v;
            for vertex in [u as usize, v as usize] {
                self.degree[vertex] += 1;
                self.incident[vertex] ^= edge;
            }
        }
        true
    }

    fn peel(&mut self, should_stop: &dyn Fn() -> bool) -> Result<(), Outcome> {
        let mut top = 0;
        for (vertex, &degree) in (0_u32..).zip(&*self.degree) {
            if degree == 1 {
                self.stack[top] = vertex;
                top += 1;
            }
        }

        let mut peeled = 0;
        let mut steps = 0_u32;
        while top > 0 {
            steps = steps.wrapping_add(1);
            if steps % CANCELLATION_INTERVAL == 0 && should_stop() {
                return Err(Outcome::Cancelled);
            }

            top -= 1;
            let leaf = self.stack[top];
            // The vertex may have lost its last edge through the other endpoint.
            if self.degree[leaf as usize] != 1 {
                continue;
            }
            let edge = self.incident[leaf as usize];
            let e = edge as usize;
            let other = self.left[e] ^ self.right[e] ^ leaf;

            self.order[peeled] = edge;
            self.leaves[peeled] = leaf;
            peeled += 1;

            self.degree[leaf as usize] = 0;
            self.incident[leaf as usize] = 0;
            self.degree[other as usize] -= 1;
            self.incident[other as usize] ^= edge;
            if self.degree[other as usize] == 1 {
                self.stack[top] = other;
                top += 1;
            }
        }

        if peeled == self.order.len() {
            Ok(())
        } else {
            Err(Outcome::Cyclic)
        }
    }

    fn assign(&mut self, parameters: &Parameters) {
        let table_size = parameters.dimensions.table_size;
        for (&edge, &leaf) in self.order.iter().zip(&*self.leaves).rev() {
            let e = edge as usize;
            let other = self.left[e] ^ self.right[e] ^ leaf;
            self.assigned[leaf as usize] = parameters.mask_function.assignment(
                edge,
                self.assigned[other as usize],
                table_size,
            );
        }
    }

    fn verify(&mut self, keys: &[u32], parameters: &Parameters) -> bool {
        self.seen.clear();
        keys.iter().all(|&key| {
            let index = parameters.index(key, &self.assigned);
            index < parameters.dimensions.table_size && !self.seen.test_and_set(index as usize)
        })
    }
}
