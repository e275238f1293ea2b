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

//! Dataset-item derivation and the hashimoto hashing kernel.

use crate::cache::EpochContext;
use crate::keccak::{keccak256, keccak512, H256};
use crate::shared::{
    Node, NodePair, FNV_PRIME, NODE_BYTES, NODE_WORDS, VAPASH_ACCESSES, VAPASH_DATASET_PARENTS,
};

/// The two outputs of the hashing kernel: the final hash compared against
/// the boundary, and the FNV-compressed mix used for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Final hash; its first little-endian u64 word is compared against
    /// the boundary.
    pub value: H256,
    /// Compressed mix ("mix hash").
    pub mix_hash: H256,
}

#[inline]
fn fnv(u: u32, v: u32) -> u32 {
    u.wrapping_mul(FNV_PRIME) ^ v
}

#[inline]
fn fnv_node(mix: &mut Node, other: &Node) {
    for (m, o) in mix.as_words_mut().iter_mut().zip(other.as_words()) {
        *m = fnv(*m, *o);
    }
}

#[inline]
fn keccak512_node(node: &Node) -> Node {
    Node::from_bytes(keccak512(node.as_bytes()))
}

/// First u64 word of a hash, the one the boundary comparison is defined
/// on.
#[inline]
fn leading_word(hash: &H256) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(word)
}

/// Derives the 512-bit dataset item `index` from the light cache.
pub fn calculate_dataset_item_512(light_cache: &[Node], index: u64) -> Node {
    let num_items = light_cache.len() as u64;
    let init = index as u32;

    let mut mix = light_cache[(index % num_items) as usize];
    mix.as_words_mut()[0] ^= init;
    let mut mix = keccak512_node(&mix);

    for j in 0..VAPASH_DATASET_PARENTS {
        let t = fnv(init ^ j, mix.as_words()[j as usize % NODE_WORDS]);
        let parent = &light_cache[(u64::from(t) % num_items) as usize];
        fnv_node(&mut mix, parent);
    }

    keccak512_node(&mix)
}

/// Derives the 1024-bit dataset item `index`, i.e. the 512-bit items
/// `2 * index` and `2 * index + 1` computed in lockstep.
pub fn calculate_dataset_item_1024(light_cache: &[Node], index: u64) -> NodePair {
    let num_items = light_cache.len() as u64;

    let index0 = index * 2;
    let index1 = index * 2 + 1;
    let init0 = index0 as u32;
    let init1 = index1 as u32;

    let mut mix0 = light_cache[(index0 % num_items) as usize];
    mix0.as_words_mut()[0] ^= init0;
    let mut mix0 = keccak512_node(&mix0);

    let mut mix1 = light_cache[(index1 % num_items) as usize];
    mix1.as_words_mut()[0] ^= init1;
    let mut mix1 = keccak512_node(&mix1);

    for j in 0..VAPASH_DATASET_PARENTS {
        let t0 = fnv(init0 ^ j, mix0.as_words()[j as usize % NODE_WORDS]);
        fnv_node(&mut mix0, &light_cache[(u64::from(t0) % num_items) as usize]);

        let t1 = fnv(init1 ^ j, mix1.as_words()[j as usize % NODE_WORDS]);
        fnv_node(&mut mix1, &light_cache[(u64::from(t1) % num_items) as usize]);
    }

    NodePair::from_nodes(keccak512_node(&mix0), keccak512_node(&mix1))
}

/// The hashing kernel, parameterized by the dataset-item lookup.
fn hashimoto<F>(header_hash: &H256, nonce: u64, full_dataset_num_items: u64, lookup: F) -> ProofOfWork
where
    F: Fn(u64) -> NodePair,
{
    // Seed: Keccak-512 over header hash followed by the little-endian
    // nonce.
    let mut seed_data = [0u8; 40];
    seed_data[..32].copy_from_slice(header_hash);
    seed_data[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = Node::from_bytes(keccak512(&seed_data));
    let seed_init = seed.as_words()[0];

    let mut mix = NodePair::from_nodes(seed, seed);
    let mix_words = mix.as_words().len();

    for i in 0..VAPASH_ACCESSES as u32 {
        let target = fnv(i ^ seed_init, mix.as_words()[i as usize % mix_words]);
        let item = lookup(u64::from(target) % full_dataset_num_items);
        for (m, o) in mix.as_words_mut().iter_mut().zip(item.as_words()) {
            *m = fnv(*m, *o);
        }
    }

    // 4:1 FNV fold down to the 256-bit mix hash.
    let mut mix_hash = [0u8; 32];
    for (k, chunk) in mix.as_words().chunks_exact(4).enumerate() {
        let reduced = fnv(fnv(fnv(chunk[0], chunk[1]), chunk[2]), chunk[3]);
        mix_hash[k * 4..k * 4 + 4].copy_from_slice(&reduced.to_le_bytes());
    }

    let mut final_data = [0u8; NODE_BYTES + 32];
    final_data[..NODE_BYTES].copy_from_slice(seed.as_bytes());
    final_data[NODE_BYTES..].copy_from_slice(&mix_hash);

    ProofOfWork {
        value: keccak256(&final_data),
        mix_hash,
    }
}

/// Evaluates the proof of work with on-the-fly dataset-item derivation.
pub fn hash_light(context: &EpochContext, header_hash: &H256, nonce: u64) -> ProofOfWork {
    hashimoto(header_hash, nonce, context.full_dataset_num_items(), |i| {
        calculate_dataset_item_1024(context.light_cache(), i)
    })
}

/// Evaluates the proof of work through the memoized full dataset.
///
/// On a context without a full dataset this degrades to on-the-fly
/// derivation; the result is bit-identical either way.
pub fn hash(context: &EpochContext, header_hash: &H256, nonce: u64) -> ProofOfWork {
    match context.full_dataset() {
        Some(dataset) => hashimoto(header_hash, nonce, context.full_dataset_num_items(), |i| {
            dataset.lookup(context.light_cache(), i)
        }),
        None => hash_light(context, header_hash, nonce),
    }
}

/// Checks a (mix hash, nonce) pair against a boundary.
///
/// True iff the recomputed mix equals `mix_hash` byte-for-byte and the
/// final hash's first little-endian u64 word is strictly below the
/// boundary's. Any disagreement reads as an invalid seal.
pub fn verify(
    context: &EpochContext,
    header_hash: &H256,
    mix_hash: &H256,
    nonce: u64,
    boundary: &H256,
) -> bool {
    let pow = hash_light(context, header_hash, nonce);
    pow.mix_hash == *mix_hash && leading_word(&pow.value) < leading_word(boundary)
}

/// Recomputes the final hash from a claimed mix hash without any epoch
/// context. Cheap pre-verification: the result can be checked against the
/// boundary before the full dataset-backed verification is attempted.
pub fn quick_get_difficulty(header_hash: &H256, nonce: u64, mix_hash: &H256) -> H256 {
    let mut seed_data = [0u8; 40];
    seed_data[..32].copy_from_slice(header_hash);
    seed_data[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = keccak512(&seed_data);

    let mut final_data = [0u8; NODE_BYTES + 32];
    final_data[..NODE_BYTES].copy_from_slice(&seed);
    final_data[NODE_BYTES..].copy_from_slice(mix_hash);
    keccak256(&final_data)
}

/// Tries `iterations` nonces ascending from `start_nonce` with light
/// evaluation; returns the first one below the boundary.
pub fn search_light(
    context: &EpochContext,
    header_hash: &H256,
    boundary: &H256,
    start_nonce: u64,
    iterations: u64,
) -> Option<u64> {
    let target = leading_word(boundary);
    (0..iterations)
        .map(|i| start_nonce.wrapping_add(i))
        .find(|&nonce| leading_word(&hash_light(context, header_hash, nonce).value) < target)
}

/// Like [`search_light`] but evaluates through the memoized full dataset.
pub fn search(
    context: &EpochContext,
    header_hash: &H256,
    boundary: &H256,
    start_nonce: u64,
    iterations: u64,
) -> Option<u64> {
    let target = leading_word(boundary);
    (0..iterations)
        .map(|i| start_nonce.wrapping_add(i))
        .find(|&nonce| leading_word(&hash(context, header_hash, nonce).value) < target)
}
