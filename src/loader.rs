// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ELF loading: turns the raw bytes of an x86-64 ELF file into the loaded
//! memory image ([`MappedRegion`]s) and symbol table ([`Symbol`]s) the
//! rest of the core operates on.
//!
//! Grounded on `original_source/loader/elf/elf.go`'s `GetSegments`/
//! `GetSymbols`, translated to `object`'s `Object`/`ObjectSegment`/
//! `ObjectSymbol` traits.

use std::collections::HashMap;

use object::{Object, ObjectSegment, ObjectSymbol, SegmentFlags, SymbolKind};

use crate::error::Error;
use crate::mapped_region::{MappedRegion, PageFlags};
use crate::range::Range;
use crate::symbol::{self, Symbol};

/// One loaded function: its address range plus its name.
pub struct FunctionSymbol {
    pub range: Range,
    pub name: String,
}

/// Everything the blanket driver needs from one ELF file: its loaded
/// segments, the functions defined in it, and the full symbol table
/// (every `STT_*` kind, not just functions) keyed by address range.
pub struct LoadedObject {
    pub maps: Vec<MappedRegion>,
    pub functions: Vec<FunctionSymbol>,
    pub symbols: HashMap<Range, Symbol>,
}

/// Parses `data` as an ELF file and extracts its `PT_LOAD` segments and
/// its symbol table. Segments with `Off == 0 && Filesz == 0` are skipped,
/// matching `GetSegments`'s handling of the zero program header
/// `elf.Progs` sometimes carries.
pub fn load(data: &[u8]) -> Result<LoadedObject, Error> {
    let file = object::File::parse(data).map_err(Error::Object)?;

    let maps = file
        .segments()
        .filter(|segment| segment.file_range() != (0, 0))
        .map(|segment| {
            let range = Range::new(segment.address(), segment.address() + segment.size());
            let bytes = segment.data().map(<[u8]>::to_vec).unwrap_or_default();
            let flags = elf_flags_to_page_flags(segment.flags());
            MappedRegion::new(range, bytes, flags)
        })
        .collect();

    let mut symbols = HashMap::new();
    for sym in file.symbols() {
        let Ok(name) = sym.name() else { continue };
        if name.is_empty() || sym.size() == 0 {
            continue;
        }
        let range = Range::new(sym.address(), sym.address() + sym.size());
        let kind = symbol_kind_to_kind(sym.kind());
        symbols.insert(range, Symbol::new(name, kind));
    }

    let functions = symbols
        .iter()
        .filter(|(_, sym)| sym.kind == symbol::Kind::Func)
        .map(|(range, sym)| FunctionSymbol { range: *range, name: sym.name.clone() })
        .collect();

    Ok(LoadedObject { maps, functions, symbols })
}

fn elf_flags_to_page_flags(flags: SegmentFlags) -> PageFlags {
    match flags {
        SegmentFlags::Elf { p_flags } => {
            let mut out = PageFlags::empty();
            if p_flags & 0x1 != 0 {
                out |= PageFlags::X;
            }
            if p_flags & 0x4 != 0 {
                out |= PageFlags::R;
            }
            if p_flags & 0x2 != 0 {
                out |= PageFlags::W;
            }
            out
        }
        _ => PageFlags::empty(),
    }
}

/// `STT_*` to [`symbol::Kind`] mapping, matching `elfSymbolTypeToSymbolType`
/// in `original_source/loader/elf/elf.go`.
fn symbol_kind_to_kind(kind: SymbolKind) -> symbol::Kind {
    match kind {
        SymbolKind::Text => symbol::Kind::Func,
        SymbolKind::Data => symbol::Kind::Data,
        SymbolKind::File => symbol::Kind::File,
        SymbolKind::Tls => symbol::Kind::ThreadLocal,
        SymbolKind::Section => symbol::Kind::Section,
        _ => symbol::Kind::Unknown,
    }
}
