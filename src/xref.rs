//! The cross-reference index (C5): object number -> location, either a byte
//! offset, a host object stream, or "free". `Xref::merge` implements the
//! `/Prev`-chain semantics — first definition wins, because the walk visits
//! the most recent xref section first and older sections are merged in
//! afterwards.

use std::collections::BTreeMap;

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// In-use object at `offset` in the document buffer.
    Normal { offset: u32, generation: u16 },
    /// In-use object embedded at `index` inside the object stream `container`.
    Compressed { container: u32, index: u16 },
    /// Free-listed object; never materialised.
    Free { generation: u16 },
    /// An entry the parser could not place in any of the above (stale
    /// generation, offset past EOF in lenient mode); treated like Free.
    UnusableFree,
}

/// How this xref section was produced, for `can_save_incrementally`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XrefType {
    #[default]
    Table,
    Stream,
}

#[derive(Debug, Clone, Default)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
    /// `/Size`: one past the highest object number.
    pub size: u32,
    pub xref_type: XrefType,
}

impl Xref {
    pub fn new(size: u32, xref_type: XrefType) -> Self {
        Xref {
            entries: BTreeMap::new(),
            size,
            xref_type,
        }
    }

    pub fn get(&self, object_number: u32) -> Option<&XrefEntry> {
        self.entries.get(&object_number)
    }

    pub fn insert(&mut self, object_number: u32, entry: XrefEntry) {
        self.entries.insert(object_number, entry);
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Merge an older (`/Prev`) xref section into this one. Per §4.5, the
    /// most recently defined xref wins for any given object number, so
    /// entries already present in `self` (the newer section) are kept.
    pub fn merge(&mut self, older: Xref) {
        for (object_number, entry) in older.entries {
            self.entries.entry(object_number).or_insert(entry);
        }
        self.size = self.size.max(older.size);
    }
}
