// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The fixed 64-bit hash primitive and salt constants shared by the event
//! model and the environment oracle.
//!
//! The salts below are part of the on-the-wire fingerprint format: two
//! fingerprints are only comparable if both producer and consumer agree on
//! these exact values, on the hash primitive, and on the stack-frame /
//! static-address policies in [`crate::blanket`].

use twox_hash::XxHash64;
use std::hash::Hasher;

/// Salt for [`crate::event::Event::InvalidInstruction`].
pub const INVALID_SALT: u64 = 0xe629_c416_d620_7e3f;
/// Salt for [`crate::event::Event::Return`].
pub const RETURN_SALT: u64 = 0xaac5_349f_4979_5c84;
/// Salt for [`crate::event::Event::Syscall`].
pub const SYS_SALT: u64 = 0xc07a_abb5_2435_b174;
/// Salt for [`crate::event::Event::Read`].
pub const READ_SALT: u64 = 0xf792_1a7e_d5b6_e400;
/// Salt for [`crate::event::Event::Write`].
pub const WRITE_SALT: u64 = 0x4768_ff65_9301_e8b7;

/// Seed for the min-hash byte-ordering walk (see [`crate::event::EventSet::fingerprint`]).
pub const ORDER_SALT: u64 = 0x6e53_4691_6874_5d93;
/// Salt applied to the argmax event before taking its low byte.
pub const FINAL_SALT: u64 = 0x12ef_5c82_f292_60c5;
/// Salt for the deterministic environment's memory oracle.
pub const MEM_SALT: u64 = 0xa66a_ec15_0c63_e3fe;
/// Salt for the deterministic environment's register oracle.
pub const REG_SALT: u64 = 0x7a1a_190d_52c2_bc81;

/// The fast, non-cryptographic 64-bit hash used throughout this crate:
/// `h(seed, val)`. Backed by xxHash64, matching the reference
/// implementation's choice (`github.com/OneOfOne/xxhash`).
#[must_use]
pub fn hash(seed: u64, val: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write_u64(val);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(hash(READ_SALT, 0x1000), hash(READ_SALT, 0x1000));
    }

    #[test]
    fn sensitive_to_seed_and_value() {
        assert_ne!(hash(READ_SALT, 0x1000), hash(WRITE_SALT, 0x1000));
        assert_ne!(hash(READ_SALT, 0x1000), hash(READ_SALT, 0x1001));
    }
}
