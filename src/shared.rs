// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Vapash.

// Vapash is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Vapash is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Vapash.  If not, see <http://www.gnu.org/licenses/>.

//! Algorithm constants, node types and epoch parameters.

use primal::is_prime;
use static_assertions::assert_eq_size;

use crate::keccak::{keccak256, H256};
use crate::Error;

// Word views below read the underlying bytes in place; they are only
// little-endian views on a little-endian host.
#[cfg(target_endian = "big")]
compile_error!("vapash is defined on a little-endian machine; big-endian hosts are not supported");

pub const DATASET_BYTES_INIT: u64 = 1 << 30;
pub const DATASET_BYTES_GROWTH: u64 = 1 << 23;
pub const CACHE_BYTES_INIT: u64 = 1 << 24;
pub const CACHE_BYTES_GROWTH: u64 = 1 << 17;

pub const VAPASH_EPOCH_LENGTH: u64 = 30000;
pub const VAPASH_CACHE_ROUNDS: usize = 3;
pub const VAPASH_MIX_BYTES: usize = 128;
pub const VAPASH_ACCESSES: usize = 64;
pub const VAPASH_DATASET_PARENTS: u32 = 256;

pub const NODE_DWORDS: usize = NODE_WORDS / 2;
pub const NODE_WORDS: usize = NODE_BYTES / 4;
pub const NODE_BYTES: usize = 64;

pub const FNV_PRIME: u32 = 0x01000193;

/// The epoch a block number belongs to.
pub fn epoch(block_number: u64) -> u64 {
    block_number / VAPASH_EPOCH_LENGTH
}

pub type NodeBytes = [u8; NODE_BYTES];
pub type NodeWords = [u32; NODE_WORDS];
pub type NodeDwords = [u64; NODE_DWORDS];

assert_eq_size!(Node, NodeBytes, NodeWords, NodeDwords);

/// A 512-bit light-cache item, addressable as bytes or as little-endian
/// 32/64-bit words.
#[repr(C)]
pub union Node {
    pub dwords: NodeDwords,
    pub words: NodeWords,
    pub bytes: NodeBytes,
}

impl Clone for Node {
    fn clone(&self) -> Self {
        unsafe { Node { bytes: self.bytes } }
    }
}

impl Copy for Node {}

impl Node {
    pub fn from_bytes(bytes: NodeBytes) -> Self {
        Node { bytes }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &NodeBytes {
        unsafe { &self.bytes }
    }

    #[inline(always)]
    pub fn as_bytes_mut(&mut self) -> &mut NodeBytes {
        unsafe { &mut self.bytes }
    }

    #[inline(always)]
    pub fn as_words(&self) -> &NodeWords {
        unsafe { &self.words }
    }

    #[inline(always)]
    pub fn as_words_mut(&mut self) -> &mut NodeWords {
        unsafe { &mut self.words }
    }

    #[inline(always)]
    pub fn as_dwords(&self) -> &NodeDwords {
        unsafe { &self.dwords }
    }

    #[inline(always)]
    pub fn as_dwords_mut(&mut self) -> &mut NodeDwords {
        unsafe { &mut self.dwords }
    }
}

pub type NodePairBytes = [u8; VAPASH_MIX_BYTES];
pub type NodePairWords = [u32; VAPASH_MIX_BYTES / 4];
pub type NodePairDwords = [u64; VAPASH_MIX_BYTES / 8];

assert_eq_size!(NodePair, NodePairBytes, NodePairWords, NodePairDwords, [Node; 2]);

/// A 1024-bit full-dataset item: two nodes stored contiguously, with the
/// same byte/word views as `Node`.
#[repr(C)]
pub union NodePair {
    pub dwords: NodePairDwords,
    pub words: NodePairWords,
    pub bytes: NodePairBytes,
    pub nodes: [Node; 2],
}

impl Clone for NodePair {
    fn clone(&self) -> Self {
        unsafe { NodePair { bytes: self.bytes } }
    }
}

impl Copy for NodePair {}

impl NodePair {
    pub fn from_nodes(first: Node, second: Node) -> Self {
        NodePair { nodes: [first, second] }
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &NodePairBytes {
        unsafe { &self.bytes }
    }

    #[inline(always)]
    pub fn as_words(&self) -> &NodePairWords {
        unsafe { &self.words }
    }

    #[inline(always)]
    pub fn as_words_mut(&mut self) -> &mut NodePairWords {
        unsafe { &mut self.words }
    }

    #[inline(always)]
    pub fn as_dwords(&self) -> &NodePairDwords {
        unsafe { &self.dwords }
    }

    #[inline(always)]
    pub fn as_dwords_mut(&mut self) -> &mut NodePairDwords {
        unsafe { &mut self.dwords }
    }

    #[inline(always)]
    pub fn as_nodes(&self) -> &[Node; 2] {
        unsafe { &self.nodes }
    }
}

/// The greatest prime less than or equal to `n`.
///
/// Descends over odd candidates, so the execution time depends on the
/// local prime gap below `n`.
pub fn largest_prime_le(mut n: u64) -> u64 {
    if n < 2 {
        return 0;
    }
    if n == 2 {
        return 2;
    }
    if n % 2 == 0 {
        n -= 1;
    }
    // Terminates: n stays odd and 3 is prime.
    while !is_prime(n) {
        n -= 2;
    }
    n
}

/// Number of 512-bit items in the light cache of the given epoch.
pub fn light_cache_num_items(epoch_number: u32) -> Result<u64, Error> {
    let bound = CACHE_BYTES_GROWTH
        .checked_mul(u64::from(epoch_number))
        .and_then(|g| CACHE_BYTES_INIT.checked_add(g))
        .ok_or(Error::InvalidEpoch(epoch_number))?;
    Ok(largest_prime_le(bound / NODE_BYTES as u64))
}

/// Number of 1024-bit items in the full dataset of the given epoch.
pub fn full_dataset_num_items(epoch_number: u32) -> Result<u64, Error> {
    let bound = DATASET_BYTES_GROWTH
        .checked_mul(u64::from(epoch_number))
        .and_then(|g| DATASET_BYTES_INIT.checked_add(g))
        .ok_or(Error::InvalidEpoch(epoch_number))?;
    Ok(largest_prime_le(bound / VAPASH_MIX_BYTES as u64))
}

/// The seed hash of the given epoch: Keccak-256 iterated `epoch_number`
/// times over 32 zero bytes.
pub fn epoch_seed(epoch_number: u32) -> H256 {
    let mut seed = [0u8; 32];
    for _ in 0..epoch_number {
        seed = keccak256(&seed);
    }
    seed
}
