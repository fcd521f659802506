// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The blanket driver: orchestrates `unicorn_engine` to walk every basic
//! block of a function exactly once across a bounded number of traces,
//! collecting the function's observable events.
//!
//! A fresh [`Unicorn`] handle is created for every single trace and
//! dropped at the end of it — the simplest way to guarantee a clean
//! memory map. The parts of the driver's state that must survive across
//! traces of one function (the trace controller, the accumulated event
//! set, the static-address canonicaliser, and — with `propagate-state` —
//! captured block pre-states) are threaded through by value from one
//! trace's [`HookData`] to the next's.

use unicorn_engine::unicorn_const::{uc_error, HookType, MemType, Permission};
use unicorn_engine::{InsnSysX86, Unicorn};

use crate::arch::Arch;
use crate::basic_block::BasicBlock;
use crate::config::Config;
use crate::environment::Environment;
use crate::error::Error;
use crate::event::{Event, EventSet};
use crate::mapped_region::MappedRegion;
use crate::range::Range;
#[cfg(feature = "propagate-state")]
use crate::state::BlockState;
use crate::state::KnownStates;
use crate::static_canon::StaticCanon;
use crate::trace::TraceController;
use crate::working_set::{WorkingSet, PAGE_SIZE};

/// Index into [`Environment::reg`] reserved for the stack-pointer seed.
/// Argument registers occupy `1..=n`; index 0 is otherwise unused, so it
/// is free to repurpose here.
const REG_STACK_SEED_INDEX: u64 = 0;

/// The outcome of a complete blanket run over one function.
pub struct BlanketOutcome {
    /// Every observable event collected across every trace.
    pub events: EventSet,
    /// Basic blocks actually visited.
    pub visited: usize,
    /// Basic blocks the function was known to have.
    pub total: usize,
}

impl BlanketOutcome {
    /// True iff every known basic block was visited across the run's traces.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.visited >= self.total
    }

    /// Compresses the collected events into a fixed-length fingerprint.
    /// The fingerprint is meaningful even when [`Self::is_complete`] is
    /// false — a partial blanket still emits a fingerprint from whatever
    /// was collected.
    #[must_use]
    pub fn fingerprint(&self, length: usize) -> Vec<u8> {
        self.events.fingerprint(length)
    }
}

/// Per-trace hook state, held inside the `unicorn_engine::Unicorn` user
/// data slot so that hook callbacks — which only ever receive `&mut
/// Unicorn<D>` — can reach it via [`Unicorn::get_data_mut`].
struct HookData<A, E> {
    arch: A,
    env: E,
    config: Config,
    /// Address ranges backed by real loaded bytes, for the static-address
    /// canonicalisation membership test.
    content_ranges: Vec<Range>,
    controller: TraceController,
    events: EventSet,
    static_canon: StaticCanon,
    working_set: WorkingSet,
    /// `env.reg(REG_STACK_SEED_INDEX)` before page alignment, captured at
    /// register-reset time; the lower bound of the ignored stack frame.
    initial_stack: u64,
    last_was_ret: bool,
    known_states: KnownStates,
}

/// Runs a full blanket over one function: at most `blocks.len()` traces,
/// each starting at the smallest-addressed unvisited block, until every
/// block has been visited or the trace budget is exhausted.
///
/// An exhausted trace budget with blocks still unvisited is *not*
/// returned as `Err` — the fingerprint is still meaningful from whatever
/// was collected, so the caller inspects [`BlanketOutcome::is_complete`]
/// instead. Only an emulator that cannot be constructed, a memory image
/// that cannot be mapped, or an unexpected emulator error code propagate
/// as `Err`.
pub fn full_blanket<A, E>(arch: A, env: E, config: Config, maps: &[MappedRegion], blocks: &[BasicBlock]) -> Result<BlanketOutcome, Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    let content_ranges: Vec<Range> = maps
        .iter()
        .filter(|region| !region.bytes.is_empty())
        .map(|region| Range::new(region.range.from, region.range.from + region.bytes.len() as u64))
        .collect();

    let total = blocks.len();
    let mut controller = TraceController::new(blocks);
    let mut events = EventSet::new();
    let mut static_canon = StaticCanon::new();
    let mut known_states: KnownStates = Default::default();

    let mut traces_run = 0usize;
    while let Some(start) = controller.first_unseen_block() {
        if traces_run >= total.max(1) {
            log::warn!("blanket: exhausted trace budget ({traces_run}/{total}) with blocks still unvisited");
            break;
        }
        traces_run += 1;

        let data = HookData {
            arch,
            env: env.clone(),
            config,
            content_ranges: content_ranges.clone(),
            controller,
            events,
            static_canon,
            working_set: WorkingSet::new(config.max_trace_pages),
            initial_stack: 0,
            last_was_ret: false,
            known_states,
        };

        let outcome = run_one_trace(data, maps, start)?;
        controller = outcome.0;
        events = outcome.1;
        static_canon = outcome.2;
        known_states = outcome.3;
    }

    let visited = controller.visited_count();
    if visited < total {
        log::warn!("blanket incomplete: {visited}/{total} basic blocks covered");
    }

    Ok(BlanketOutcome { events, visited, total })
}

type TraceCarry = (TraceController, EventSet, StaticCanon, KnownStates);

/// A single trace's lifecycle: fresh emulator, hooks, memory image,
/// registers, run, triage.
fn run_one_trace<A, E>(data: HookData<A, E>, maps: &[MappedRegion], start: u64) -> Result<TraceCarry, Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    let arch = data.arch;
    let env = data.env.clone();
    let config = data.config;

    let mut uc = Unicorn::new_with_data(arch.unicorn_arch(), arch.unicorn_mode(), data).map_err(Error::Emulator)?;

    install_hooks(&mut uc, config)?;
    reset_memory_image(&mut uc, maps)?;
    let initial_stack = reset_registers(&mut uc, arch, &env, start)?;
    uc.get_data_mut().initial_stack = initial_stack;
    uc.get_data_mut().last_was_ret = false;

    let run_result = uc.emu_start(start, u64::MAX, config.max_trace_time, config.max_trace_icount as usize);
    triage(&mut uc, arch, config, run_result)?;

    let mut working_set = std::mem::replace(&mut uc.get_data_mut().working_set, WorkingSet::new(1));
    working_set.clear(&mut uc)?;

    let data = uc.get_data_mut();
    Ok((
        std::mem::replace(&mut data.controller, TraceController::new(&[])),
        std::mem::take(&mut data.events),
        std::mem::take(&mut data.static_canon),
        std::mem::take(&mut data.known_states),
    ))
}

/// Installs the hook protocol.
fn install_hooks<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, config: Config) -> Result<(), Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    uc.add_block_hook(1, 0, block_hook::<A, E>).map_err(Error::Emulator)?;
    uc.add_code_hook(1, 0, insn_hook::<A, E>).map_err(Error::Emulator)?;
    uc.add_mem_hook(HookType::MEM_READ | HookType::MEM_WRITE, 1, 0, mem_valid_hook::<A, E>)
        .map_err(Error::Emulator)?;

    let invalid = HookType::MEM_READ_INVALID | HookType::MEM_WRITE_INVALID | HookType::MEM_FETCH_INVALID;
    uc.add_mem_hook(invalid, 1, 0, mem_invalid_hook::<A, E>).map_err(Error::Emulator)?;

    // Always intercept `syscall`/`sysenter`: registering this hook is what
    // keeps Unicorn from taking its default (kernel-less) path through the
    // instruction, which would otherwise divert the instruction pointer
    // via MSR_LSTAR and fault the trace. Whether the interception turns
    // into an `Event::Syscall` is `config.emit_syscall_events`'s job —
    // emission is configurable, interception is not.
    uc.add_insn_sys_hook(InsnSysX86::SYSCALL, 1, 0, syscall_hook::<A, E>).map_err(Error::Emulator)?;
    Ok(())
}

/// Maps every loaded region, writes its bytes, then downgrades to `R|X`.
/// Pages align down at the start and up at the end.
fn reset_memory_image<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, maps: &[MappedRegion]) -> Result<(), Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    for region in maps {
        let start = region.range.from & !(PAGE_SIZE - 1);
        let end = (region.range.to + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        let len = end.saturating_sub(start).max(PAGE_SIZE) as usize;

        uc.mem_map(start, len, Permission::WRITE).map_err(Error::Emulator)?;
        if !region.bytes.is_empty() {
            uc.mem_write(region.range.from, &region.bytes).map_err(Error::Emulator)?;
        }
        uc.mem_protect(start, len, Permission::READ | Permission::EXEC)
            .map_err(Error::Emulator)?;
    }
    Ok(())
}

/// Zeroes every register, seeds argument registers and the stack, and
/// returns the un-aligned stack seed (the lower bound of the ignored
/// stack-frame filter).
///
/// With `propagate-state` and a captured pre-state for `start`, this
/// restores that snapshot instead of reseeding from the environment
/// oracle.
fn reset_registers<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, arch: A, env: &E, start: u64) -> Result<u64, Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    #[cfg(feature = "propagate-state")]
    {
        if uc.get_data().config.propagate_state {
            if let Some(state) = uc.get_data().known_states.get(&start).cloned() {
                state.apply(uc)?;
                return uc.reg_read(arch.reg_stack()).map_err(Error::Emulator);
            }
        }
    }
    let _ = start;

    for &reg in arch.registers() {
        uc.reg_write(reg, 0).map_err(Error::Emulator)?;
    }

    for (i, &reg) in arch.arg_registers().iter().enumerate() {
        let value = env.reg((i + 1) as u64);
        uc.reg_write(reg, value).map_err(Error::Emulator)?;
    }

    let raw_stack = env.reg(REG_STACK_SEED_INDEX);
    let stack = raw_stack & !(PAGE_SIZE - 1);
    uc.reg_write(arch.reg_stack(), stack).map_err(Error::Emulator)?;
    let outer_frame_bytes = uc.get_data().config.outer_frame_bytes;
    uc.reg_write(arch.reg_stack_base(), stack + outer_frame_bytes).map_err(Error::Emulator)?;

    Ok(raw_stack)
}

/// Classifies the result of `emulator.start` into the error bands.
fn triage<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, arch: A, config: Config, result: Result<(), uc_error>) -> Result<(), Error>
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    match result {
        Ok(()) => Ok(()),
        Err(uc_error::READ_PROT) | Err(uc_error::WRITE_PROT) => Ok(()),
        Err(uc_error::INSN_INVALID) | Err(uc_error::FETCH_PROT) | Err(uc_error::FETCH_UNMAPPED) => {
            let last_was_ret = uc.get_data().last_was_ret;
            if config.ignore_post_return_invalid && last_was_ret {
                return Ok(());
            }
            let ip = uc.reg_read(arch.reg_ip()).unwrap_or(0);
            uc.get_data_mut().events.insert(Event::InvalidInstruction { ip });
            Ok(())
        }
        Err(other) => Err(Error::Emulator(other)),
    }
}

fn canonicalise(static_canon: &mut StaticCanon, content_ranges: &[Range], enabled: bool, addr: u64) -> u64 {
    if enabled && content_ranges.iter().any(|range| range.contains(addr)) {
        static_canon.resolve(addr)
    } else {
        addr
    }
}

/// Block-entry hook: marks the emulated block's actual extent visited.
fn block_hook<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, addr: u64, size: u32)
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    let (from, to) = if size == 0 {
        log::warn!("block entry hook fired with zero size at {addr:#x}");
        (addr, addr)
    } else {
        (addr, addr + u64::from(size) - 1)
    };
    uc.get_data_mut().controller.mark_visited(from, to);

    #[cfg(feature = "propagate-state")]
    {
        if uc.get_data().config.propagate_state {
            let arch = uc.get_data().arch;
            match BlockState::capture(uc, &arch) {
                Ok(state) => {
                    uc.get_data_mut().known_states.insert(addr, state);
                }
                Err(e) => log::debug!("failed to capture pre-state at {addr:#x}: {e}"),
            }
        }
    }
}

/// Per-instruction hook: recognises a return instruction in the 16-byte
/// window at `ip` and emits the `Return` event.
fn insn_hook<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, addr: u64, _size: u32)
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    let arch = uc.get_data().arch;

    let mut window = [0u8; 16];
    let is_ret = match uc.mem_read(addr, &mut window) {
        Ok(()) => arch.is_ret(&window),
        Err(_) => {
            let mut short = [0u8; 2];
            uc.mem_read(addr, &mut short).map(|()| arch.is_ret(&short)).unwrap_or(false)
        }
    };

    if is_ret {
        let value = uc.reg_read(arch.reg_ret()).unwrap_or(0);
        let data = uc.get_data_mut();
        data.events.insert(Event::Return { value });
        data.last_was_ret = true;
    } else {
        uc.get_data_mut().last_was_ret = false;
    }
}

/// Valid memory access hook: applies the stack-frame filter and
/// static-address canonicalisation, then emits `Read`/`Write`.
fn mem_valid_hook<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, mem_type: MemType, addr: u64, _size: usize, value: i64) -> bool
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    let arch = uc.get_data().arch;
    let config = uc.get_data().config;
    let initial_stack = uc.get_data().initial_stack;
    let current_sp = uc.reg_read(arch.reg_stack()).unwrap_or(initial_stack);

    let ignored_upper = initial_stack.saturating_add(config.ignore_below_initial);
    let ignored_lower = current_sp.saturating_sub(config.ignore_above_sp);
    if addr <= ignored_upper && addr >= ignored_lower {
        return true;
    }

    let data = uc.get_data_mut();
    let resolved_addr = canonicalise(&mut data.static_canon, &data.content_ranges, config.resolve_static_addresses, addr);

    if mem_type == MemType::WRITE {
        let value = value as u64;
        let resolved_value = canonicalise(&mut data.static_canon, &data.content_ranges, config.resolve_static_addresses, value);
        data.events.insert(Event::Write { addr: resolved_addr, value: resolved_value });
    } else {
        data.events.insert(Event::Read { addr: resolved_addr });
    }
    true
}

/// Invalid memory access hook: demand-maps unmapped faults via the
/// working set, and treats protection violations and fetch faults as a
/// soft end-of-trace.
fn mem_invalid_hook<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>, mem_type: MemType, addr: u64, size: usize, _value: i64) -> bool
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    match mem_type {
        MemType::READ_UNMAPPED | MemType::WRITE_UNMAPPED => {
            let env = uc.get_data().env.clone();
            let mut working_set = std::mem::replace(&mut uc.get_data_mut().working_set, WorkingSet::new(1));
            let result = working_set.map_faulting(uc, &env, addr, size as u64);
            uc.get_data_mut().working_set = working_set;
            match result {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("failed to map faulting page at {addr:#x}: {e}");
                    true
                }
            }
        }
        _ => false,
    }
}

/// Syscall instruction-class hook. Always installed (see `install_hooks`);
/// whether it actually records an [`Event::Syscall`] is gated by
/// `Config::emit_syscall_events`, disabled by default. The syscall number
/// is read from the return-value role register, matching every original
/// fixture's reuse of RAX for both.
fn syscall_hook<A, E>(uc: &mut Unicorn<'_, HookData<A, E>>)
where
    A: Arch + Copy + 'static,
    E: Environment + Clone + 'static,
{
    if !uc.get_data().config.emit_syscall_events {
        return;
    }
    let arch = uc.get_data().arch;
    let number = uc.reg_read(arch.reg_ret()).unwrap_or(0);
    uc.get_data_mut().events.insert(Event::Syscall { number });
}
