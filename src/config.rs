// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tuning constants for the blanket driver, gathered in one place because
//! every one of them is part of the on-the-wire fingerprint format:
//! changing any of them invalidates cross-version comparison of
//! fingerprints.

/// Per-trace and per-function budgets plus feature toggles for the blanket
/// driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Instructions a single trace may retire before it is cut short.
    pub max_trace_icount: u64,
    /// Wall-clock microseconds a single trace may run (`uc_emu_start`'s
    /// `timeout`).
    pub max_trace_time: u64,
    /// Demand-mapped pages the working set may hold at once beyond the
    /// static image.
    pub max_trace_pages: usize,
    /// Byte length of the emitted min-hash fingerprint.
    pub fingerprint_length: usize,
    /// Whether a `syscall`/`sysenter` instruction emits a
    /// [`crate::event::Event::Syscall`]; off by default.
    pub emit_syscall_events: bool,
    /// Whether an `INSN_INVALID`/fetch-unmapped error immediately following
    /// a detected `ret` is swallowed instead of turned into an
    /// [`crate::event::Event::InvalidInstruction`] (default enabled).
    pub ignore_post_return_invalid: bool,
    /// Whether accesses into the loaded binary image are canonicalised to
    /// counter-based surrogate addresses (default enabled).
    pub resolve_static_addresses: bool,
    /// Bytes of "outer frame" reserved below the initial stack pointer so
    /// that an epilogue reading below the apparent SP does not fault
    /// immediately: `50 * 8`.
    pub outer_frame_bytes: u64,
    /// Below-initial-stack bound of the ignored stack-frame filter:
    /// `50 * 8` = 400 bytes.
    pub ignore_below_initial: u64,
    /// Above-current-SP bound of the ignored stack-frame filter: 128 bytes.
    pub ignore_above_sp: u64,
    /// Opt-in extension: capture and replay per-block pre-state instead of
    /// reseeding from the environment oracle on every trace (default off).
    pub propagate_state: bool,
}

impl Config {
    /// Reference tuning constants, matching `hasher.go`'s `MakeBlanketEmulator`
    /// (`100`/`100`/`50`) and its accompanying salts' constants.
    #[must_use]
    pub const fn reference() -> Self {
        Self {
            max_trace_icount: 100,
            max_trace_time: 100,
            max_trace_pages: 50,
            fingerprint_length: 32,
            emit_syscall_events: false,
            ignore_post_return_invalid: true,
            resolve_static_addresses: true,
            outer_frame_bytes: 50 * 8,
            ignore_below_initial: 50 * 8,
            ignore_above_sp: 128,
            propagate_state: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference() {
        assert_eq!(Config::default(), Config::reference());
    }

    #[test]
    fn reference_constants_are_the_tuning_contract() {
        let cfg = Config::reference();
        assert_eq!(cfg.ignore_below_initial, 400);
        assert_eq!(cfg.outer_frame_bytes, 400);
        assert_eq!(cfg.ignore_above_sp, 128);
        assert_eq!(cfg.fingerprint_length, 32);
    }
}
