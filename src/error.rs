// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Crate-wide error type, one variant per error band of the blanket
//! driver's failure model.
//!
//! Band 1 (recoverable trace events) and band 2 (recoverable function
//! failures, i.e. [`Error::BlanketIncomplete`]) never reach a caller as an
//! `Err` from the blanket driver itself — they are logged and folded into
//! the returned fingerprint. Bands 3 and 4 are represented here and
//! propagate with `?`.

use unicorn_engine::unicorn_const::uc_error;

/// Errors that can escape the core: band 3 (unrecoverable per-function)
/// and band 4 (fatal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The loader could not parse the object file at all (band 4).
    #[error("failed to parse object file: {0}")]
    Object(#[from] object::Error),

    /// The emulator rejected a setup or execution call with an error code
    /// the driver did not expect to see outside trace triage (band 3).
    #[error("emulator error: {0:?}")]
    Emulator(uc_error),

    /// The blanket exhausted its trace budget with blocks still unvisited
    /// (band 2). Carries the counts so the CLI can report them; the
    /// fingerprint collected so far is still usable and is returned
    /// alongside this error by callers that choose to.
    #[error("blanket incomplete: {visited}/{total} basic blocks covered")]
    BlanketIncomplete { visited: usize, total: usize },

    /// Reading the input file failed (band 4).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A function symbol's address range did not fall inside any mapped
    /// segment produced by the loader (band 3).
    #[error("no mapped segment covers function range {from:#x}..{to:#x}")]
    UnmappedFunction { from: u64, to: u64 },
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
