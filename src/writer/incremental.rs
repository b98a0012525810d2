//! Incremental update (C11): append only the objects that changed since
//! load, after the bytes the document was loaded from, chaining the new
//! xref section onto the old one via `/Prev`. ISO 32000-1 §7.5.6 permits
//! this as long as nothing before the append point is touched.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::dictionary::Dictionary;
use crate::error::Error;
use crate::object::Object;
use crate::xref::{Xref, XrefEntry, XrefType};
use crate::{Document, Result};

use super::{write_object, write_trailer_block, write_xref_stream, write_xref_table, SaveOptions};

/// A document loaded from a byte buffer, tracking the bytes it was loaded
/// from so every subsequent save can default to appending rather than
/// rewriting. Plain [`Document`] can do this too (via `source_bytes`) — this
/// wrapper exists for callers who want incremental saves to be the only way
/// in, with no accidental full rewrite from calling the wrong method.
pub struct IncrementalDocument {
    pub document: Document,
}

impl IncrementalDocument {
    /// Used by the reader: `source` is the exact bytes `document` was
    /// parsed from. Only fills in `document.source_bytes` if the reader
    /// hadn't already (it always has, in practice, but a document built any
    /// other way and wrapped here should not lose bytes it already knows).
    pub(crate) fn create_from(source: Vec<u8>, mut document: Document) -> Self {
        if document.source_bytes.is_none() {
            document.source_bytes = Some(source);
        }
        IncrementalDocument { document }
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<File> {
        let mut file = File::create(path)?;
        self.save_to(&mut file)?;
        Ok(file)
    }

    /// Always incremental; falls back to a full rewrite (with a warning on
    /// `self.document`) only when the document can't support it — see
    /// `Document::incremental_save_blocker`.
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.document.save_with_options(target, SaveOptions::builder().incremental(true).build())
    }
}

pub(super) fn write_incremental<W: Write>(document: &mut Document, target: &mut W, options: &SaveOptions) -> Result<()> {
    let source = document.source_bytes.clone().ok_or(Error::IncrementalSaveUnavailable)?;
    let changed = document.changed_object_ids();

    // Nothing changed since load: an incremental save of an untouched
    // document must return exactly the original bytes, not a spurious
    // empty revision (a new xref section + trailer with nothing in it).
    if changed.is_empty() {
        target.write_all(&source)?;
        document.mark_all_clean();
        return Ok(());
    }

    let mut out = source.clone();
    let prev_start = document.xref_start as u64;
    let encrypt_ref = document.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());
    let state = document.encryption_state.clone();

    let mut xref = Xref::new(0, document.reference_table.xref_type);
    for id in &changed {
        let object = document.get_object(*id)?.clone();
        let offset = out.len() as u32;
        let state_for_obj = if Some(*id) == encrypt_ref { None } else { state.as_ref() };
        write_object(id, &object, state_for_obj, &mut out)?;
        xref.insert(id.0, XrefEntry::Normal { offset, generation: id.1 });
    }

    document.max_id = document.max_id.max(changed.iter().map(|id| id.0).max().unwrap_or(0));
    xref.size = document.max_id + 1;

    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::integer(xref.size as i64));
    if let Ok(root) = document.trailer.get(b"Root") {
        trailer.set("Root", root.clone());
    }
    if let Ok(info) = document.trailer.get(b"Info") {
        trailer.set("Info", info.clone());
    }
    if let Ok(id) = document.trailer.get(b"ID") {
        trailer.set("ID", id.clone());
    }
    if let Ok(encrypt) = document.trailer.get(b"Encrypt") {
        trailer.set("Encrypt", encrypt.clone());
    }
    trailer.set("Prev", Object::integer(prev_start as i64));

    let use_stream = options.use_xref_streams.unwrap_or(document.reference_table.xref_type == XrefType::Stream);
    let xref_offset = if use_stream {
        write_xref_stream(&mut out, &mut xref, &mut trailer)?
    } else {
        let offset = out.len() as u64;
        write_xref_table(&mut out, &xref);
        write_trailer_block(&mut out, &trailer);
        offset
    };
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());

    target.write_all(&out)?;

    document.xref_start = xref_offset as usize;
    for (number, entry) in xref.entries {
        document.reference_table.entries.insert(number, entry);
    }
    document.reference_table.size = document.reference_table.size.max(xref.size);
    document.source_bytes = Some(out);
    document.mark_all_clean();
    Ok(())
}
