// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-ISA register list and role accessors.
//!
//! No other module in this crate may name an ISA register directly — every
//! access to "the instruction pointer", "the stack pointer" and so on goes
//! through an [`Arch`] implementation. This is what lets the blanket driver
//! stay architecture-agnostic even though, today, x86-64 is the only
//! implementation shipped.

pub mod x86_64;

use unicorn_engine::unicorn_const::{Arch as UcArch, Mode as UcMode};

/// Low-level description of one instruction set, as seen by the blanket
/// driver and the working set.
pub trait Arch {
    /// Every register id that must be zeroed on a trace's register reset.
    fn registers(&self) -> &'static [i32];

    /// Register id holding the instruction pointer.
    fn reg_ip(&self) -> i32;
    /// Register id holding the stack pointer.
    fn reg_stack(&self) -> i32;
    /// Register id used as the "outer frame" stack-base seed.
    fn reg_stack_base(&self) -> i32;
    /// Register id holding a function's return value.
    fn reg_ret(&self) -> i32;

    /// Recognises a return instruction in the next `window.len()` bytes
    /// (at most 16) starting at the instruction pointer.
    fn is_ret(&self, window: &[u8]) -> bool;

    /// The `unicorn_engine` architecture tag for this ISA.
    fn unicorn_arch(&self) -> UcArch;
    /// The `unicorn_engine` mode tag for this ISA.
    fn unicorn_mode(&self) -> UcMode;

    /// Argument registers, in calling-convention order, used to seed
    /// `env.reg(1..=n)` on a trace's register reset.
    fn arg_registers(&self) -> &'static [i32];
}
