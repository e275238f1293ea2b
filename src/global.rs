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

//! Process-wide, per-epoch context registry.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::cache::EpochContext;
use crate::Error;

// One slot per epoch. Creation runs under the slot's own mutex, so
// concurrent lookups of different epochs build in parallel while a given
// epoch is only ever built once.
type Slot = Arc<Mutex<Option<Arc<EpochContext>>>>;
type Registry = RwLock<HashMap<u32, Slot>>;

fn light_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn full_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn get_or_create<F>(
    registry: &Registry,
    epoch_number: u32,
    create: F,
) -> Result<Arc<EpochContext>, Error>
where
    F: FnOnce() -> Result<EpochContext, Error>,
{
    let existing = { registry.read().get(&epoch_number).cloned() };
    let slot = match existing {
        Some(slot) => slot,
        None => registry.write().entry(epoch_number).or_default().clone(),
    };

    let mut guard = slot.lock();
    if let Some(context) = guard.as_ref() {
        return Ok(context.clone());
    }

    debug!(target: "vapash", "creating shared context for epoch {}", epoch_number);
    let context = Arc::new(create()?);
    *guard = Some(context.clone());
    Ok(context)
}

/// Shared light context for the epoch; built on first use and retained
/// for the lifetime of the process.
pub fn get_global_epoch_context(epoch_number: u32) -> Result<Arc<EpochContext>, Error> {
    get_or_create(light_registry(), epoch_number, || {
        EpochContext::new(epoch_number)
    })
}

/// Shared context with a lazy full dataset; built on first use and
/// retained for the lifetime of the process.
pub fn get_global_epoch_context_full(epoch_number: u32) -> Result<Arc<EpochContext>, Error> {
    get_or_create(full_registry(), epoch_number, || {
        EpochContext::new_with_full_dataset(epoch_number)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn same_epoch_shares_one_context() {
        let a = get_global_epoch_context(0).unwrap();
        let b = get_global_epoch_context(0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.has_full_dataset());

        let full = get_global_epoch_context_full(0).unwrap();
        assert!(full.has_full_dataset());
        assert!(!Arc::ptr_eq(&a, &full));
    }

    #[test]
    fn concurrent_lookups_share_one_context() {
        let mut handles = Vec::new();
        for _ in 0..8 {
            handles.push(thread::spawn(|| get_global_epoch_context(0).unwrap()));
        }
        let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for context in &contexts[1..] {
            assert!(Arc::ptr_eq(&contexts[0], context));
        }
    }
}
