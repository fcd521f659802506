// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A loaded segment of the binary image, owned by the loader and read-only
//! to the rest of the core.

use crate::range::Range;

bitflags::bitflags! {
    /// Page protection flags, one bit per `PF_X`/`PF_R`/`PF_W`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        const X = 0b001;
        const R = 0b010;
        const W = 0b100;
    }
}

/// A segment of the loaded binary image.
///
/// `bytes.len()` may be smaller than `range.length()` — the remainder is
/// implicit zero fill (e.g. for `.bss`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappedRegion {
    pub range: Range,
    pub bytes: Vec<u8>,
    pub flags: PageFlags,
}

impl MappedRegion {
    #[must_use]
    pub fn new(range: Range, bytes: Vec<u8>, flags: PageFlags) -> Self {
        Self { range, bytes, flags }
    }
}
