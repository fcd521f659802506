// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios driving the blanket over hand-assembled x86-64
//! function bodies instead of going through the loader/disassembler.
//! Every scenario uses `SeededEnv(0)` and base address `0x40000`.

use blanket_fp::arch::x86_64::X86_64;
use blanket_fp::basic_block::BasicBlock;
use blanket_fp::environment::{Environment, SeededEnv};
use blanket_fp::event::Event;
use blanket_fp::mapped_region::{MappedRegion, PageFlags};
use blanket_fp::range::Range;
use blanket_fp::{full_blanket, Config};

const BASE: u64 = 0x40000;

fn region(from: u64, bytes: &[u8]) -> MappedRegion {
    MappedRegion::new(Range::new(from, from + bytes.len() as u64), bytes.to_vec(), PageFlags::R | PageFlags::X)
}

fn u64_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    u64::from_le_bytes(buf)
}

/// Scenario 1: `mov rax,[rax]; ret` is one basic block with no transfer
/// targets. Expected events: `{ Read(env.reg(1)), Return(mem[env.reg(1)]) }`.
#[test]
fn scenario_1_single_read_and_return() {
    let code = [0x48, 0x8B, 0x00, 0xC3];
    let maps = vec![region(BASE, &code)];
    let blocks = vec![BasicBlock::new(BASE, BASE + code.len() as u64, vec![])];

    let env = SeededEnv::new(0);
    let outcome = full_blanket(X86_64, env, Config::reference(), &maps, &blocks).unwrap();

    assert!(outcome.is_complete());
    let a0 = env.reg(1);
    let expected_return = u64_le(&env.mem(a0, 8));

    assert!(outcome.events.iter().any(|e| *e == Event::Read { addr: a0 }), "missing Read(a0): {}", outcome.events.inspect());
    assert!(
        outcome.events.iter().any(|e| *e == Event::Return { value: expected_return }),
        "missing Return(mem[a0]): {}",
        outcome.events.inspect()
    );
}

/// Scenario 2: three chained loads, a store, a (default-silent) syscall,
/// then ret. Expected events: `{ Read(a0), Read(a1), Read(a2),
/// Write{b, a3}, Return(a3) }` — no `Syscall` event at the default config.
#[test]
fn scenario_2_chained_loads_store_and_syscall() {
    let code = [
        0x48, 0x8B, 0x00, // mov rax, [rax]
        0x48, 0x8B, 0x00, // mov rax, [rax]
        0x48, 0x8B, 0x00, // mov rax, [rax]
        0x48, 0x89, 0x03, // mov [rbx], rax
        0x0F, 0x05, // syscall
        0xC3, // ret
    ];
    let maps = vec![region(BASE, &code)];
    let blocks = vec![BasicBlock::new(BASE, BASE + code.len() as u64, vec![])];

    let env = SeededEnv::new(0);
    let outcome = full_blanket(X86_64, env, Config::reference(), &maps, &blocks).unwrap();
    assert!(outcome.is_complete());

    let a0 = env.reg(1);
    let a1 = u64_le(&env.mem(a0, 8));
    let a2 = u64_le(&env.mem(a1, 8));
    let a3 = u64_le(&env.mem(a2, 8));
    let b = env.reg(2);

    for expected in [
        Event::Read { addr: a0 },
        Event::Read { addr: a1 },
        Event::Read { addr: a2 },
        Event::Write { addr: b, value: a3 },
        Event::Return { value: a3 },
    ] {
        assert!(outcome.events.iter().any(|e| *e == expected), "missing {expected}: {}", outcome.events.inspect());
    }
    assert!(
        !outcome.events.iter().any(|e| matches!(e, Event::Syscall { .. })),
        "syscall event emitted despite default-off config: {}",
        outcome.events.inspect()
    );
}

/// Scenario 3: a three-block conditional tree, both arms ending in `ret`
/// with distinguishable return values. Expected events: `{ Return(99),
/// Return(101) }`.
#[test]
fn scenario_3_conditional_tree_cover() {
    // Block A: cmp eax,0 ; je +6  -> falls through to B, jumps to C.
    let block_a = [0x83, 0xF8, 0x00, 0x74, 0x06];
    // Block B (fallthrough arm): mov eax,99 ; ret
    let block_b = [0xB8, 0x63, 0x00, 0x00, 0x00, 0xC3];
    // Block C (taken arm): mov eax,101 ; ret
    let block_c = [0xB8, 0x65, 0x00, 0x00, 0x00, 0xC3];

    let a_from = BASE;
    let b_from = a_from + block_a.len() as u64;
    let c_from = b_from + block_b.len() as u64;
    let c_to = c_from + block_c.len() as u64;

    let mut code = Vec::new();
    code.extend_from_slice(&block_a);
    code.extend_from_slice(&block_b);
    code.extend_from_slice(&block_c);
    let maps = vec![region(BASE, &code)];

    let blocks = vec![
        BasicBlock::new(a_from, b_from, vec![c_from, b_from]),
        BasicBlock::new(b_from, c_from, vec![]),
        BasicBlock::new(c_from, c_to, vec![]),
    ];

    let env = SeededEnv::new(0);
    let outcome = full_blanket(X86_64, env, Config::reference(), &maps, &blocks).unwrap();

    assert!(outcome.is_complete(), "blanket incomplete: {}/{}", outcome.visited, outcome.total);
    assert!(outcome.events.iter().any(|e| *e == Event::Return { value: 99 }));
    assert!(outcome.events.iter().any(|e| *e == Event::Return { value: 101 }));
}

/// Scenario 4: static-address canonicalisation. Two runs of the same
/// function differing only by the load address of a read-only buffer must
/// fingerprint identically.
#[test]
fn scenario_4_static_address_canonicalisation_is_load_address_independent() {
    fn run_at(data_addr: u64) -> Vec<u8> {
        let mut code = vec![0x48, 0xA1]; // mov rax, [moffs64]
        code.extend_from_slice(&data_addr.to_le_bytes());
        code.push(0xC3); // ret

        let maps = vec![region(BASE, &code), region(data_addr, &[0xAB])];
        let blocks = vec![BasicBlock::new(BASE, BASE + code.len() as u64, vec![])];

        let outcome = full_blanket(X86_64, SeededEnv::new(0), Config::reference(), &maps, &blocks).unwrap();
        assert!(outcome.is_complete());
        outcome.fingerprint(32)
    }

    assert_eq!(run_at(0x50000), run_at(0x60000));
}

/// Scenario 5: permutation / duplicate invariance through the driver
/// itself — reading the same address three times in one trace collapses
/// to the same fingerprint as reading it once.
#[test]
fn scenario_5_duplicate_reads_do_not_change_the_fingerprint() {
    fn run(repeats: usize) -> Vec<u8> {
        let mut code = Vec::new();
        for _ in 0..repeats {
            code.extend_from_slice(&[0x48, 0x8B, 0x00]); // mov rax, [rax]
        }
        code.push(0xC3); // ret

        let maps = vec![region(BASE, &code)];
        let blocks = vec![BasicBlock::new(BASE, BASE + code.len() as u64, vec![])];
        let outcome = full_blanket(X86_64, SeededEnv::new(0), Config::reference(), &maps, &blocks).unwrap();
        assert!(outcome.is_complete());
        outcome.fingerprint(32)
    }

    assert_eq!(run(1), run(3));
}

/// Scenario 6: partial blanket. One basic block's start address is not
/// backed by any mapped region, so it can never be marked visited; the
/// blanket exhausts its trace budget on it and reports incompleteness
/// without failing the whole run.
#[test]
fn scenario_6_partial_blanket_reports_incomplete_but_still_fingerprints() {
    let code = [0xC3]; // ret
    let maps = vec![region(BASE, &code)];
    let blocks = vec![
        BasicBlock::new(BASE, BASE + code.len() as u64, vec![]),
        BasicBlock::new(0x90000, 0x90001, vec![]), // never mapped: unreachable
    ];

    let outcome = full_blanket(X86_64, SeededEnv::new(0), Config::reference(), &maps, &blocks).unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.visited, 1);
    assert_eq!(outcome.total, 2);
    assert!(!outcome.events.is_empty());
    assert_eq!(outcome.fingerprint(32).len(), 32);
}

/// Re-running the same inputs bit-for-bit reproduces the same
/// fingerprint.
#[test]
fn determinism_across_repeated_runs() {
    let code = [0x48, 0x8B, 0x00, 0xC3];
    let maps = vec![region(BASE, &code)];
    let blocks = vec![BasicBlock::new(BASE, BASE + code.len() as u64, vec![])];

    let run = || full_blanket(X86_64, SeededEnv::new(0), Config::reference(), &maps, &blocks).unwrap().fingerprint(32);

    assert_eq!(run(), run());
}
