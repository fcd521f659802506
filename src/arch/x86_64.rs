// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sole shipped [`Arch`] implementation: x86-64, System V calling
//! convention. Mirrors the "one file per CPU variant" layout of
//! `m68000::cpu_details::mc68000`.

use unicorn_engine::unicorn_const::{Arch as UcArch, Mode as UcMode};
use unicorn_engine::RegisterX86;

use super::Arch;

/// Every general-purpose, pointer and flags register the driver zeroes on
/// a trace's register reset. FPU/SIMD/segment register state is out of
/// scope: full architectural faithfulness is not a goal here.
const REGISTERS: &[i32] = &[
    RegisterX86::RAX as i32,
    RegisterX86::RBX as i32,
    RegisterX86::RCX as i32,
    RegisterX86::RDX as i32,
    RegisterX86::RSI as i32,
    RegisterX86::RDI as i32,
    RegisterX86::RBP as i32,
    RegisterX86::RSP as i32,
    RegisterX86::R8 as i32,
    RegisterX86::R9 as i32,
    RegisterX86::R10 as i32,
    RegisterX86::R11 as i32,
    RegisterX86::R12 as i32,
    RegisterX86::R13 as i32,
    RegisterX86::R14 as i32,
    RegisterX86::R15 as i32,
    RegisterX86::RIP as i32,
    RegisterX86::EFLAGS as i32,
];

/// Argument registers, in order, used to seed `env.reg(1..=n)`. Emulated
/// functions are entered mid-stream rather than called through a real
/// ABI, so this is not the System V calling convention: it is the
/// general-purpose register enumeration order the integration scenarios
/// rely on (a read back out of `rax` for `env.reg(1)`, a store targeting
/// `rbx` for `env.reg(2)`).
const ARG_REGISTERS: &[i32] = &[
    RegisterX86::RAX as i32,
    RegisterX86::RBX as i32,
    RegisterX86::RCX as i32,
    RegisterX86::RDX as i32,
    RegisterX86::RSI as i32,
    RegisterX86::RDI as i32,
];

/// x86-64 adapter, System V calling convention.
#[derive(Clone, Copy, Debug, Default)]
pub struct X86_64;

impl Arch for X86_64 {
    fn registers(&self) -> &'static [i32] {
        REGISTERS
    }

    fn reg_ip(&self) -> i32 {
        RegisterX86::RIP as i32
    }

    fn reg_stack(&self) -> i32 {
        RegisterX86::RSP as i32
    }

    fn reg_stack_base(&self) -> i32 {
        RegisterX86::RBP as i32
    }

    fn reg_ret(&self) -> i32 {
        RegisterX86::RAX as i32
    }

    /// Recognises `ret` (`C3`), `repz ret` (`F3 C3`) and `repnz ret`
    /// (`F2 C3`) at the start of `window`.
    fn is_ret(&self, window: &[u8]) -> bool {
        match window {
            [0xC3, ..] => true,
            [0xF2 | 0xF3, 0xC3, ..] => true,
            _ => false,
        }
    }

    fn unicorn_arch(&self) -> UcArch {
        UcArch::X86
    }

    fn unicorn_mode(&self) -> UcMode {
        UcMode::MODE_64
    }

    fn arg_registers(&self) -> &'static [i32] {
        ARG_REGISTERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_plain_ret() {
        assert!(X86_64.is_ret(&[0xC3, 0x90, 0x90]));
    }

    #[test]
    fn recognises_rep_prefixed_ret() {
        assert!(X86_64.is_ret(&[0xF2, 0xC3]));
        assert!(X86_64.is_ret(&[0xF3, 0xC3]));
    }

    #[test]
    fn rejects_non_ret() {
        assert!(!X86_64.is_ret(&[0x90, 0xC3]));
    }

    #[test]
    fn role_registers_are_distinct() {
        let arch = X86_64;
        let roles = [arch.reg_ip(), arch.reg_stack(), arch.reg_stack_base(), arch.reg_ret()];
        for (i, a) in roles.iter().enumerate() {
            for (j, b) in roles.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
