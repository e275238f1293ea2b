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

//! Vapash implementation
//! See https://github.com/vaporyco/wiki/wiki/Vapash
//!
//! A nonce seals a header when the final hash of the hashimoto kernel,
//! read as its first little-endian u64 word, falls strictly below the
//! boundary's first word. The kernel mixes 64 pseudo-random items of an
//! epoch-sized dataset; items are derived on the fly from a small light
//! cache ([`hash_light`]) or served from a lazily materialized in-memory
//! dataset ([`hash`]).

mod cache;
mod compute;
mod global;
mod keccak;
mod shared;

use std::fmt;

pub use cache::EpochContext;
pub use compute::{
    calculate_dataset_item_1024, calculate_dataset_item_512, hash, hash_light,
    quick_get_difficulty, search, search_light, verify, ProofOfWork,
};
pub use global::{get_global_epoch_context, get_global_epoch_context_full};
pub use keccak::{keccak256, keccak512, keccak_f1600, H256, H512};
pub use shared::{
    epoch, epoch_seed, full_dataset_num_items, largest_prime_le, light_cache_num_items, Node,
    NodePair, VAPASH_EPOCH_LENGTH,
};

/// Failures surfaced when building an epoch context; everything past
/// construction is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Allocating the light cache or the full-dataset region failed.
    OutOfMemory,
    /// The epoch's derived sizes overflow the addressable range.
    InvalidEpoch(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::OutOfMemory => write!(f, "PoW cache allocation failed"),
            Error::InvalidEpoch(epoch_number) => {
                write!(f, "epoch {} exceeds the addressable range", epoch_number)
            }
        }
    }
}

impl std::error::Error for Error {}
