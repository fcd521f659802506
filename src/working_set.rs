// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded set of demand-mapped emulator pages, evicted LRU, driven by the
//! blanket driver's invalid-memory-access hook.

use std::collections::VecDeque;

use unicorn_engine::unicorn_const::Permission;
use unicorn_engine::Unicorn;

use crate::environment::Environment;
use crate::error::Error;

/// Fixed emulator page size assumed throughout this crate.
pub const PAGE_SIZE: u64 = 4096;

/// A capacity-bounded ring of mapped page base addresses.
///
/// Implemented with a [`VecDeque`] rather than the original's hand-rolled
/// `newest`/`oldest` index pair: pushing to the back and popping from the
/// front gives the same O(1) amortised map and the same strict LRU-by-
/// insertion-order eviction, with none of the `-1` empty-ring sentinel.
pub struct WorkingSet {
    capacity: usize,
    pages: VecDeque<u64>,
}

impl WorkingSet {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pages: VecDeque::with_capacity(capacity),
        }
    }

    /// Currently held page count. Never exceeds `capacity`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Demand-maps the page containing `addr`, seeding its contents from
    /// `env`, evicting the oldest page if the working set is already full.
    /// Recurses once if `[addr, addr+size)` straddles a page boundary.
    pub fn map_faulting<D>(
        &mut self,
        emu: &mut Unicorn<'_, D>,
        env: &dyn Environment,
        addr: u64,
        size: u64,
    ) -> Result<(), Error> {
        let base = addr - (addr % PAGE_SIZE);
        log::trace!("working set: mapping page at {base:#x} for fault at {addr:#x}");

        emu.mem_map(base, PAGE_SIZE as usize, Permission::READ | Permission::WRITE)
            .map_err(Error::Emulator)?;
        let contents = env.mem(base, PAGE_SIZE);
        emu.mem_write(base, &contents).map_err(Error::Emulator)?;
        self.store(emu, base)?;

        if addr + size > base + PAGE_SIZE {
            self.map_faulting(emu, env, base + PAGE_SIZE, 1)?;
        }
        Ok(())
    }

    fn store<D>(&mut self, emu: &mut Unicorn<'_, D>, addr: u64) -> Result<(), Error> {
        if self.pages.len() == self.capacity {
            if let Some(oldest) = self.pages.pop_front() {
                log::trace!("working set: evicting page {oldest:#x}");
                emu.mem_unmap(oldest, PAGE_SIZE as usize).map_err(Error::Emulator)?;
            }
        }
        self.pages.push_back(addr);
        Ok(())
    }

    /// Unmaps every page currently held and empties the ring. Called at
    /// the end of every trace.
    pub fn clear<D>(&mut self, emu: &mut Unicorn<'_, D>) -> Result<(), Error> {
        for addr in self.pages.drain(..) {
            emu.mem_unmap(addr, PAGE_SIZE as usize).map_err(Error::Emulator)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_capacity() {
        // Exercises only the bookkeeping, not the emulator calls, since
        // evicting below never touches `emu` when `pages` never holds an
        // address past the capacity bound under direct manipulation.
        let ws = WorkingSet::new(3);
        assert_eq!(ws.capacity, 3);
        assert!(ws.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let ws = WorkingSet::new(0);
        assert_eq!(ws.capacity, 1);
    }
}
