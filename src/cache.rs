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

//! Epoch contexts: the light cache and the lazily materialized full
//! dataset.

use std::alloc;
use std::convert::TryFrom;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::compute::calculate_dataset_item_1024;
use crate::keccak::{keccak512, H256};
use crate::shared::{
    epoch_seed, full_dataset_num_items, light_cache_num_items, Node, NodePair, NODE_BYTES,
    VAPASH_CACHE_ROUNDS, VAPASH_MIX_BYTES,
};
use crate::Error;

const ITEM_DWORDS: usize = VAPASH_MIX_BYTES / 8;

/// Everything needed to evaluate the proof of work for one epoch.
///
/// The light cache is immutable after construction. The full dataset, if
/// present, is a lazily filled cache: slots are all-zero until their final
/// value is stored, and every slot is written at most with that one value.
pub struct EpochContext {
    epoch_number: u32,
    light_cache: Box<[Node]>,
    full_dataset_num_items: u64,
    full_dataset: Option<FullDataset>,
}

impl EpochContext {
    /// Builds the light cache for `epoch_number`; no full dataset.
    pub fn new(epoch_number: u32) -> Result<Self, Error> {
        let num_items = light_cache_num_items(epoch_number)?;
        let full_items = full_dataset_num_items(epoch_number)?;
        let seed = epoch_seed(epoch_number);
        Ok(EpochContext {
            epoch_number,
            light_cache: build_light_cache(num_items, &seed, epoch_number)?,
            full_dataset_num_items: full_items,
            full_dataset: None,
        })
    }

    /// Like [`EpochContext::new`], plus a zero-initialized full-dataset
    /// region whose items materialize on first access.
    pub fn new_with_full_dataset(epoch_number: u32) -> Result<Self, Error> {
        let mut context = Self::new(epoch_number)?;
        context.full_dataset = Some(FullDataset::new(
            context.full_dataset_num_items,
            epoch_number,
        )?);
        Ok(context)
    }

    pub fn epoch_number(&self) -> u32 {
        self.epoch_number
    }

    pub fn light_cache(&self) -> &[Node] {
        &self.light_cache
    }

    pub fn full_dataset_num_items(&self) -> u64 {
        self.full_dataset_num_items
    }

    pub fn has_full_dataset(&self) -> bool {
        self.full_dataset.is_some()
    }

    pub(crate) fn full_dataset(&self) -> Option<&FullDataset> {
        self.full_dataset.as_ref()
    }
}

fn build_light_cache(num_items: u64, seed: &H256, epoch_number: u32) -> Result<Box<[Node]>, Error> {
    let n = usize::try_from(num_items).map_err(|_| Error::InvalidEpoch(epoch_number))?;
    debug!(target: "vapash", "building light cache for epoch {}: {} items, {} MiB",
        epoch_number, n, n * NODE_BYTES >> 20);

    let mut cache = Vec::new();
    cache
        .try_reserve_exact(n)
        .map_err(|_| Error::OutOfMemory)?;

    let mut item = Node::from_bytes(keccak512(seed));
    cache.push(item);
    for _ in 1..n {
        item = keccak512_node(&item);
        cache.push(item);
    }

    // RandMemoHash reshuffling; indices may alias item i itself, in which
    // case its current (pre-write) value is what gets mixed.
    for _ in 0..VAPASH_CACHE_ROUNDS {
        for i in 0..n {
            let v = cache[i].as_words()[0] as usize % n;
            let w = (n + i - 1) % n;

            let mut xored = Node::from_bytes([0u8; NODE_BYTES]);
            for (x, (a, b)) in xored
                .as_dwords_mut()
                .iter_mut()
                .zip(cache[v].as_dwords().iter().zip(cache[w].as_dwords()))
            {
                *x = a ^ b;
            }
            cache[i] = keccak512_node(&xored);
        }
    }

    Ok(cache.into_boxed_slice())
}

#[inline]
fn keccak512_node(node: &Node) -> Node {
    Node::from_bytes(keccak512(node.as_bytes()))
}

/// Lazily materialized full dataset.
///
/// A slot whose first 64-bit word is zero is unmaterialized. Writers fill
/// words 1..16 with relaxed stores and publish by storing word 0 last with
/// release ordering; readers detect materialization with an acquire load
/// of word 0. Racing writers store identical bytes, so readers observe
/// either the zero state or the final value, never a mix.
pub(crate) struct FullDataset {
    words: Box<[AtomicU64]>,
}

impl FullDataset {
    fn new(num_items: u64, epoch_number: u32) -> Result<Self, Error> {
        let len = usize::try_from(num_items)
            .ok()
            .and_then(|n| n.checked_mul(ITEM_DWORDS))
            .ok_or(Error::InvalidEpoch(epoch_number))?;
        debug!(target: "vapash", "allocating full dataset for epoch {}: {} items, {} MiB",
            epoch_number, num_items, len * 8 >> 20);

        let layout =
            alloc::Layout::array::<AtomicU64>(len).map_err(|_| Error::OutOfMemory)?;
        // Zeroed memory is a valid AtomicU64 array and marks every item
        // unmaterialized; the zero pages stay untouched until first write.
        let words = unsafe {
            let ptr = alloc::alloc_zeroed(layout) as *mut AtomicU64;
            if ptr.is_null() {
                return Err(Error::OutOfMemory);
            }
            Box::from_raw(slice::from_raw_parts_mut(ptr, len))
        };
        Ok(FullDataset { words })
    }

    pub(crate) fn lookup(&self, light_cache: &[Node], index: u64) -> NodePair {
        let offset = index as usize * ITEM_DWORDS;
        let slot = &self.words[offset..offset + ITEM_DWORDS];

        let signal = slot[0].load(Ordering::Acquire);
        if signal != 0 {
            let mut item = NodePair { bytes: [0u8; VAPASH_MIX_BYTES] };
            {
                let dwords = item.as_dwords_mut();
                dwords[0] = signal;
                for k in 1..ITEM_DWORDS {
                    dwords[k] = slot[k].load(Ordering::Relaxed);
                }
            }
            return item;
        }

        let item = calculate_dataset_item_1024(light_cache, index);
        let dwords = item.as_dwords();
        for k in 1..ITEM_DWORDS {
            slot[k].store(dwords[k], Ordering::Relaxed);
        }
        slot[0].store(dwords[0], Ordering::Release);
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hex::FromHex;
    use std::sync::OnceLock;

    fn epoch0_full() -> &'static EpochContext {
        static CONTEXT: OnceLock<EpochContext> = OnceLock::new();
        CONTEXT.get_or_init(|| EpochContext::new_with_full_dataset(0).unwrap())
    }

    fn node_hex(node: &Node) -> Vec<u8> {
        node.as_bytes().to_vec()
    }

    #[test]
    fn light_cache_epoch_0_items() {
        let cache = epoch0_full().light_cache();
        assert_eq!(cache.len(), 262139);

        let expected: [(usize, &str); 4] = [
            (
                0,
                "5e493e76a1318e50815c6ce77950425532964ebbb8dcf94718991fa9a82eaf37\
                 658de68ca6fe078884e803da3a26a4aa56420a6867ebcd9ab0f29b08d1c48fed",
            ),
            (
                1,
                "47bcbf5825d4ba95ed8d9074291fa2242cd6aabab201fd923565086c6d19b93c\
                 6936bba8def3c8e40f891288f9926eb87318c30b22611653439801d2a596a78c",
            ),
            (
                42,
                "0456beabdfa2df615e3270e101f457d3daf4eb11bd7f4ca440abf99076e7c92a\
                 64877c6bce7750e3338e9a8201a68469788367d38bde65c33d2ed55bc1a5b954",
            ),
            (
                262138,
                "724f2f86c24c487809dc3897acbbd32d5d791e4536aa1520e65e93891a40dde5\
                 887899ffc556cbd174f426e32ae2ab711be859601c024d1514b29a27370b662e",
            ),
        ];
        for &(index, hex) in &expected {
            let bytes: Vec<u8> = hex.from_hex().unwrap();
            assert_eq!(node_hex(&cache[index]), bytes, "cache item {}", index);
        }
    }

    #[test]
    fn light_cache_builds_are_deterministic() {
        // Two independent builds, bypassing the shared registries, must
        // agree byte-for-byte.
        let first = EpochContext::new(0).unwrap();
        let second = EpochContext::new(0).unwrap();

        assert_eq!(first.light_cache().len(), second.light_cache().len());
        for (i, (a, b)) in first
            .light_cache()
            .iter()
            .zip(second.light_cache())
            .enumerate()
        {
            assert_eq!(a.as_bytes()[..], b.as_bytes()[..], "cache item {}", i);
        }
    }

    #[test]
    fn context_reports_parameters() {
        let context = epoch0_full();
        assert_eq!(context.epoch_number(), 0);
        assert_eq!(context.full_dataset_num_items(), 8388593);
        assert!(context.has_full_dataset());
    }

    #[test]
    fn full_dataset_materializes_on_access() {
        let context = epoch0_full();
        let dataset = context.full_dataset().unwrap();
        let direct = calculate_dataset_item_1024(context.light_cache(), 617);
        let first = dataset.lookup(context.light_cache(), 617);
        let second = dataset.lookup(context.light_cache(), 617);
        assert_eq!(first.as_bytes()[..], direct.as_bytes()[..]);
        assert_eq!(second.as_bytes()[..], direct.as_bytes()[..]);
    }

    #[test]
    fn full_dataset_concurrent_lookups_agree() {
        use std::thread;

        let context = epoch0_full();
        let indices: Vec<u64> = vec![1, 2, 3, 5, 8, 617, 1234];

        let mut handles = Vec::new();
        for _ in 0..4 {
            let indices = indices.clone();
            handles.push(thread::spawn(move || {
                indices
                    .iter()
                    .map(|&i| {
                        context
                            .full_dataset()
                            .unwrap()
                            .lookup(context.light_cache(), i)
                            .as_bytes()
                            .to_vec()
                    })
                    .collect::<Vec<_>>()
            }));
        }

        let reference: Vec<Vec<u8>> = indices
            .iter()
            .map(|&i| calculate_dataset_item_1024(context.light_cache(), i).as_bytes().to_vec())
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), reference);
        }
    }
}
