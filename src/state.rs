// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opt-in pre-state capture/replay extension (`Config::propagate_state`),
//! grounded on `original_source/blanket_emulator/state.go` and
//! `original_source/data_structures/state.go`. Disabled by default: this
//! mechanism is optional and incompletely specified in the richest source
//! variant.

use std::collections::BTreeMap;
#[cfg(feature = "propagate-state")]
use std::collections::HashMap;

use unicorn_engine::Unicorn;

use crate::arch::Arch;
use crate::error::Error;

/// Per-block captured pre-state, threaded through the blanket driver
/// regardless of whether the `propagate-state` feature is enabled, so
/// that [`crate::blanket::full_blanket`] does not need a second,
/// feature-gated code path through its own control flow. Resolves to the
/// zero-sized `()` when the feature is off.
#[cfg(feature = "propagate-state")]
pub type KnownStates = HashMap<u64, BlockState>;
#[cfg(not(feature = "propagate-state"))]
pub type KnownStates = ();

/// Bytes captured below/above the stack pointer at block-entry time, per
/// the original's `size_of_stackdump_above`/`_below` (both `128`).
pub const STACKDUMP_ABOVE: u64 = 128;
pub const STACKDUMP_BELOW: u64 = 128;

/// A snapshot of registers and a window of stack bytes around SP, captured
/// when a trace enters a basic block, and replayable by a later trace that
/// starts at that same block.
#[derive(Clone, Debug, Default)]
pub struct BlockState {
    pub regs: BTreeMap<i32, u64>,
    pub stack: Vec<u8>,
    pub stack_addr: u64,
}

impl BlockState {
    /// Captures every register in `arch.registers()` plus a
    /// `STACKDUMP_BELOW + STACKDUMP_ABOVE`-byte window of stack memory
    /// centred on the current stack pointer.
    pub fn capture<D>(emu: &mut Unicorn<'_, D>, arch: &dyn Arch) -> Result<Self, Error> {
        let mut regs = BTreeMap::new();
        for &reg in arch.registers() {
            let val = emu.reg_read(reg).map_err(Error::Emulator)?;
            regs.insert(reg, val);
        }

        let sp = emu.reg_read(arch.reg_stack()).map_err(Error::Emulator)?;
        let stack_addr = sp.saturating_sub(STACKDUMP_ABOVE);
        let stack = emu
            .mem_read_as_vec(stack_addr, (STACKDUMP_ABOVE + STACKDUMP_BELOW) as usize)
            .map_err(Error::Emulator)?;

        Ok(Self { regs, stack, stack_addr })
    }

    /// Restores this snapshot's registers and stack window into `emu`,
    /// used instead of the normal seeded-environment reset for a trace
    /// that starts at a block with a known pre-state.
    pub fn apply<D>(&self, emu: &mut Unicorn<'_, D>) -> Result<(), Error> {
        for (&reg, &val) in &self.regs {
            emu.reg_write(reg, val).map_err(Error::Emulator)?;
        }
        emu.mem_write(self.stack_addr, &self.stack).map_err(Error::Emulator)?;
        Ok(())
    }
}
