// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural, semantics-aware function fingerprinting for compiled
//! x86-64 ELF binaries, computed by driving `unicorn_engine` across every
//! basic block of a function and compressing the observed events into a
//! fixed-length min-hash fingerprint.

pub mod arch;
pub mod basic_block;
pub mod blanket;
pub mod config;
pub mod disassembler;
pub mod environment;
pub mod error;
pub mod event;
pub mod hash;
pub mod loader;
pub mod mapped_region;
pub mod range;
pub mod state;
pub mod static_canon;
pub mod symbol;
pub mod trace;
pub mod working_set;

pub use blanket::{full_blanket, BlanketOutcome};
pub use config::Config;
pub use error::{Error, Result};

use arch::x86_64::X86_64;
use environment::Environment;

/// Fingerprints every function symbol of one loaded ELF file, in the
/// shape the CLI needs: one `(name, outcome)` pair per function with a
/// non-empty basic-block set, skipping functions whose range falls
/// outside every mapped segment (logged, not fatal — a malformed symbol
/// in one function must not abort the run).
pub fn fingerprint_functions<E>(data: &[u8], env: E, config: Config) -> Result<Vec<(String, BlanketOutcome)>>
where
    E: Environment + Clone + 'static,
{
    let object = loader::load(data)?;
    let mut results = Vec::new();

    for func in &object.functions {
        let blocks = object
            .maps
            .iter()
            .find(|region| region.range.intersects_range(func.range))
            .map(|region| disassembler::discover_basic_blocks(region.range.from, &region.bytes, func.range))
            .unwrap_or_default();

        if blocks.is_empty() {
            log::warn!("skipping {}: no basic blocks discovered in mapped segments", func.name);
            continue;
        }

        match full_blanket(X86_64, env.clone(), config, &object.maps, &blocks) {
            Ok(outcome) => results.push((func.name.clone(), outcome)),
            Err(e) => log::error!("skipping {}: {e}", func.name),
        }
    }

    Ok(results)
}
