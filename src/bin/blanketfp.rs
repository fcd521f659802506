// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thin CLI: `hasher <file> [symbol_names...] [d]`. Loads an ELF,
//! fingerprints each `Func` symbol (optionally filtered by name), and
//! prints one `<padded_name> : hash <hex>` line per function.
//!
//! Argument parsing follows `m68000/src/bin/disassemble.rs`'s shape of a
//! small standalone binary around the library, but uses `clap::Parser`
//! for the parsing itself, matching `samply`'s CLI idiom.

use std::process::ExitCode;

use clap::Parser;

use blanket_fp::config::Config;
use blanket_fp::environment::SeededEnv;

/// Structural, semantics-aware function fingerprinting for ELF x86-64
/// binaries.
#[derive(Debug, Parser)]
#[command(name = "hasher", version, about)]
struct Opt {
    /// ELF file to fingerprint.
    file: String,

    /// Only fingerprint symbols with these names. Empty means every
    /// function symbol. A trailing literal `d` raises log verbosity
    /// instead of being treated as a symbol name.
    symbol_names: Vec<String>,
}

/// 20-character fixed-width padding, matching `hasher.go`'s
/// `pad_func_name`.
fn pad_func_name(name: &str) -> String {
    if name.len() > 20 {
        return name[..20].to_string();
    }
    format!("{name:<20}")
}

fn main() -> ExitCode {
    let mut opt = Opt::parse();

    let verbose = matches!(opt.symbol_names.last().map(String::as_str), Some("d"));
    if verbose {
        opt.symbol_names.pop();
    }

    env_logger::Builder::from_default_env()
        .filter_level(if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn })
        .init();

    let data = match std::fs::read(&opt.file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("failed to read {}: {e}", opt.file);
            return ExitCode::FAILURE;
        }
    };

    let config = Config::reference();
    let env = SeededEnv::new(0);

    let functions = match blanket_fp::fingerprint_functions(&data, env, config) {
        Ok(functions) => functions,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    for (name, outcome) in functions {
        if !opt.symbol_names.is_empty() && !opt.symbol_names.iter().any(|n| n == &name) {
            continue;
        }
        if !outcome.is_complete() {
            log::warn!("{name}: blanket incomplete ({}/{} blocks)", outcome.visited, outcome.total);
        }
        let hash = outcome.fingerprint(config.fingerprint_length);
        let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
        println!("{} : hash {hex}", pad_func_name(&name));
    }

    ExitCode::SUCCESS
}
