// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Symbol records extracted by the loader, keyed by their address [`Range`](crate::range::Range).

/// What an ELF symbol refers to. Only [`Kind::Func`] drives the top-level
/// blanket loop; the rest are carried in [`crate::loader::LoadedObject::symbols`]
/// for callers that need the full symbol table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Kind {
    Func,
    Data,
    File,
    ThreadLocal,
    Section,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: Kind,
}

impl Symbol {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self { name: name.into(), kind }
    }
}
