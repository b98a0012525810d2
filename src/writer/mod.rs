//! C11: turning an in-memory [`Document`] back into bytes. Two strategies —
//! a full rewrite (every object, fresh xref) and an incremental append (only
//! what changed, chained onto the original bytes via `/Prev`) — share the
//! per-object framing from `serializer` (C10) and, for a protected document,
//! run every object through `encryption::encrypt_object` (C7) first.

mod incremental;
mod object_streams;

pub use incremental::IncrementalDocument;
pub use object_streams::{ObjectStreamBuilder, ObjectStreamConfig};

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use rand::RngCore;

use crate::dictionary::Dictionary;
use crate::encryption::{self, EncryptionState};
use crate::object::{Object, ObjectId, Stream, StringFormat};
use crate::protection::PendingSecurityAction;
use crate::xref::{Xref, XrefEntry, XrefType};
use crate::{Document, Result};

/// Options for [`Document::save_with_options`], matching the crate's other
/// builder-style options structs (`ProtectionOptions`).
#[derive(Debug, Clone)]
pub struct SaveOptions {
    incremental: bool,
    use_xref_streams: Option<bool>,
    use_object_streams: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            incremental: false,
            use_xref_streams: None,
            use_object_streams: false,
        }
    }
}

impl SaveOptions {
    pub fn builder() -> SaveOptionsBuilder {
        SaveOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveOptionsBuilder {
    incremental: bool,
    use_xref_streams: Option<bool>,
    use_object_streams: bool,
}

impl SaveOptionsBuilder {
    /// Append after the original bytes instead of rewriting the whole file.
    /// Silently falls back to a full rewrite (with a warning recorded on the
    /// document) when the document can't support it — see
    /// `Document::incremental_save_blocker`.
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// `Some(true)`/`Some(false)` forces an xref stream or xref table;
    /// `None` (the default) keeps whatever form the document already used,
    /// or a table for a brand-new document.
    pub fn use_xref_streams(mut self, use_streams: bool) -> Self {
        self.use_xref_streams = Some(use_streams);
        self
    }

    /// Pack plain (non-stream) objects into `/ObjStm` containers on write.
    /// Implies an xref stream, since xref tables cannot express compressed
    /// entries.
    pub fn use_object_streams(mut self, use_streams: bool) -> Self {
        self.use_object_streams = use_streams;
        self
    }

    pub fn build(self) -> SaveOptions {
        SaveOptions {
            incremental: self.incremental,
            use_xref_streams: self.use_xref_streams,
            use_object_streams: self.use_object_streams,
        }
    }
}

/// A named file attached to the document (`/Names /EmbeddedFiles`, C12).
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub content: Vec<u8>,
}

impl Document {
    /// Save to a new file, choosing a full rewrite by default, and return
    /// the opened handle.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<File> {
        let mut file = File::create(path)?;
        self.save_to(&mut file)?;
        Ok(file)
    }

    /// Full rewrite with the writer's default choices.
    pub fn save_to<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.save_with_options(target, SaveOptions::default())
    }

    /// Save incrementally when possible, falling back to a full rewrite
    /// (with a warning) otherwise.
    pub fn save_incremental<W: Write>(&mut self, target: &mut W) -> Result<()> {
        self.save_with_options(target, SaveOptions::builder().incremental(true).build())
    }

    pub fn save_with_options<W: Write>(&mut self, target: &mut W, options: SaveOptions) -> Result<()> {
        let security_changed = self.apply_pending_security_action()?;
        let blocker = self.incremental_save_blocker();
        let use_incremental = options.incremental && !security_changed && blocker.is_none();

        if options.incremental && !use_incremental {
            let reason = if security_changed {
                "encryption was just added, removed, or changed"
            } else {
                blocker.unwrap_or("unknown")
            };
            self.add_warning(format!("falling back to a full save: {reason}"));
        }

        if use_incremental {
            incremental::write_incremental(self, target, &options)
        } else {
            self.write_full(target, &options)
        }
    }

    /// Re-encodes every stream with FlateDecode, decoding whatever filter
    /// (if any) it previously used. Image/video codecs the filter pipeline
    /// treats as pass-through (DCT, JBIG2, ...) are flate-wrapped as-is —
    /// harmless, if not always a size win.
    pub fn compress(&mut self) {
        for object in self.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if stream.dict.has_type(b"XRef") || stream.dict.has_type(b"ObjStm") {
                    continue;
                }
                if let Ok(decoded) = stream.get_decoded_data() {
                    let mut dict = stream.dict.clone();
                    dict.set("Filter", Object::name("FlateDecode"));
                    dict.remove(b"DecodeParms");
                    dict.remove(b"DP");
                    if let Ok(encoded) = crate::filters::encode(&dict, &decoded) {
                        stream.dict = dict;
                        stream.set_content(encoded);
                    }
                }
            }
        }
    }

    /// Strips every stream's filter, storing its fully-decoded payload
    /// in the clear. Useful for inspecting a document's contents; the
    /// resulting file is usually much larger.
    pub fn decompress(&mut self) {
        for object in self.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if stream.dict.has_type(b"XRef") || stream.dict.has_type(b"ObjStm") {
                    continue;
                }
                if let Ok(decoded) = stream.get_decoded_data() {
                    let decoded = decoded.to_vec();
                    stream.dict.remove(b"Filter");
                    stream.dict.remove(b"DecodeParms");
                    stream.dict.remove(b"DP");
                    stream.set_content(decoded);
                }
            }
        }
    }

    /// Every file embedded under `/Root /Names /EmbeddedFiles`.
    pub fn get_attachments(&self) -> Vec<Attachment> {
        let mut out = Vec::new();
        let Ok(tree_ref) = self
            .catalog()
            .and_then(|cat| cat.get(b"Names"))
            .and_then(Object::as_reference)
            .and_then(|id| self.get_dictionary(id))
            .and_then(|names| names.get(b"EmbeddedFiles"))
            .and_then(Object::as_reference)
        else {
            return out;
        };

        let mut seen = std::collections::HashSet::new();
        self.walk_embedded_files_tree(tree_ref, &mut seen, &mut out);
        out
    }

    fn walk_embedded_files_tree(
        &self, node_id: ObjectId, seen: &mut std::collections::HashSet<ObjectId>, out: &mut Vec<Attachment>,
    ) {
        if !seen.insert(node_id) {
            return;
        }
        let Ok(tree) = self.get_dictionary(node_id) else {
            return;
        };

        if let Ok(kids) = tree.get(b"Kids").and_then(Object::as_array) {
            for kid in kids.iter() {
                if let Ok(kid_ref) = kid.as_reference() {
                    self.walk_embedded_files_tree(kid_ref, seen, out);
                }
            }
        }

        let Ok(names) = tree.get(b"Names").and_then(Object::as_array) else {
            return;
        };
        let mut entries = names.iter();
        while let (Some(key), Some(value)) = (entries.next(), entries.next()) {
            let Ok(filespec_ref) = value.as_reference() else { continue };
            let Ok(filespec) = self.get_dictionary(filespec_ref) else { continue };
            let name = filespec
                .get(b"F")
                .and_then(Object::as_str)
                .ok()
                .or_else(|| key.as_str().ok())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();

            let Ok(ef) = filespec.get(b"EF").and_then(Object::as_dict) else { continue };
            let Ok(stream_ref) = ef.get(b"F").and_then(Object::as_reference) else { continue };
            let Ok(stream) = self.get_object(stream_ref).and_then(Object::as_stream) else { continue };
            let Ok(content) = stream.get_decoded_data() else { continue };
            out.push(Attachment {
                name,
                content: content.to_vec(),
            });
        }
    }

    /// Consumes `pending_security_action`, returning whether it changed the
    /// document's encryption (which forces a full rewrite regardless of
    /// what the caller asked for).
    fn apply_pending_security_action(&mut self) -> Result<bool> {
        match std::mem::take(&mut self.pending_security_action) {
            PendingSecurityAction::None => Ok(false),
            PendingSecurityAction::Remove => {
                self.trailer.remove(b"Encrypt");
                self.encryption_state = None;
                Ok(true)
            }
            PendingSecurityAction::Encrypt(opts) => {
                let (dict, file_key) = crate::protection::build_aes256_encrypt_dict(&opts);
                let encrypt_ref = self.add_object(dict);
                self.trailer.set("Encrypt", encrypt_ref);
                self.encryption_state = Some(EncryptionState::for_new_encryption(
                    file_key,
                    opts.permissions.to_raw(),
                    opts.encrypt_metadata,
                ));
                Ok(true)
            }
        }
    }

    fn ensure_id(&mut self) {
        if !self.trailer.has(b"ID") {
            let mut id = [0u8; 16];
            rand::rng().fill_bytes(&mut id);
            let value = Object::from(vec![
                Object::String(id.to_vec(), StringFormat::Hexadecimal),
                Object::String(id.to_vec(), StringFormat::Hexadecimal),
            ]);
            self.trailer.set("ID", value);
        }
    }

    fn build_trailer(&self, size: u32) -> Dictionary {
        let mut trailer = self.trailer.clone();
        trailer.set("Size", Object::integer(size as i64));
        trailer.remove(b"Prev");
        trailer.remove(b"XRefStm");
        trailer
    }

    fn write_full<W: Write>(&mut self, target: &mut W, options: &SaveOptions) -> Result<()> {
        self.ensure_id();

        let encrypt_ref = self.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());

        let mut packed_ids: IndexMap<ObjectId, (usize, u16)> = IndexMap::new();
        let mut container_streams: Vec<Stream> = Vec::new();
        if options.use_object_streams {
            let packable: std::collections::BTreeMap<ObjectId, Object> = self
                .objects
                .iter()
                .filter(|&(id, obj)| !matches!(obj, Object::Stream(_)) && Some(*id) != encrypt_ref)
                .map(|(id, obj)| (*id, obj.clone()))
                .collect();

            if !packable.is_empty() {
                let builder = ObjectStreamBuilder::new(ObjectStreamConfig::default());
                let (containers, placement) = builder.build_object_streams(&packable)?;
                container_streams = containers;
                packed_ids = placement.into_iter().collect();
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(format!("%PDF-{}\n", self.version).as_bytes());
        out.push(b'%');
        out.extend_from_slice(&self.binary_mark);
        out.push(b'\n');

        let mut xref = Xref::new(0, XrefType::Table);
        let state = self.encryption_state.clone();

        for (id, object) in self.objects.iter() {
            if packed_ids.contains_key(id) {
                continue;
            }
            let offset = out.len() as u32;
            let state_for_obj = if Some(*id) == encrypt_ref { None } else { state.as_ref() };
            write_object(id, object, state_for_obj, &mut out)?;
            xref.insert(id.0, XrefEntry::Normal { offset, generation: id.1 });
        }

        let mut next_id = self.max_id + 1;
        let mut container_ids = Vec::with_capacity(container_streams.len());
        for stream in container_streams {
            let id = (next_id, 0);
            next_id += 1;
            let offset = out.len() as u32;
            let object = Object::Stream(stream);
            write_object(&id, &object, state.as_ref(), &mut out)?;
            xref.insert(id.0, XrefEntry::Normal { offset, generation: 0 });
            self.objects.insert(id, object);
            container_ids.push(id.0);
        }
        for (id, (container_index, index)) in &packed_ids {
            xref.insert(id.0, XrefEntry::Compressed { container: container_ids[*container_index], index: *index });
        }

        self.max_id = self.max_id.max(next_id.saturating_sub(1));
        xref.size = xref.max_id() + 1;

        let mut trailer = self.build_trailer(xref.size);
        let use_stream =
            options.use_xref_streams.unwrap_or(self.reference_table.xref_type == XrefType::Stream) || !packed_ids.is_empty();
        xref.xref_type = if use_stream { XrefType::Stream } else { XrefType::Table };

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

        self.xref_start = xref_offset as usize;
        self.reference_table = xref;
        self.recovered_via_brute_force = false;
        self.source_bytes = Some(out);
        self.mark_all_clean();
        Ok(())
    }
}

pub(super) fn write_object(
    id: &ObjectId, object: &Object, state: Option<&EncryptionState>, out: &mut Vec<u8>,
) -> Result<()> {
    match state {
        Some(state) => {
            let mut clone = object.clone();
            encryption::encrypt_object(state, *id, &mut clone)?;
            crate::serializer::write_indirect_object(*id, &clone, out);
        }
        None => crate::serializer::write_indirect_object(*id, object, out),
    }
    Ok(())
}

/// Splits a sorted, deduplicated run of object numbers into `(start, count)`
/// contiguous subsections -- shared by `write_xref_table`'s `startObj count`
/// lines and `write_xref_stream`'s `/Index` array, neither of which may
/// claim to speak for an object number it has no entry for.
fn contiguous_runs(numbers: &[u32]) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < numbers.len() {
        let start = numbers[i];
        let mut count: u32 = 1;
        while i + count as usize < numbers.len() && numbers[i + count as usize] == start + count {
            count += 1;
        }
        runs.push((start, count));
        i += count as usize;
    }
    runs
}

/// The object numbers a section's `xref` actually carries an entry for,
/// sorted and always including `0` (the free-list head every xref table or
/// stream names explicitly, in-use or not).
fn object_numbers_for_index(xref: &Xref) -> Vec<u32> {
    let mut numbers: Vec<u32> = xref.entries.keys().copied().collect();
    if !numbers.contains(&0) {
        numbers.push(0);
        numbers.sort_unstable();
    }
    numbers
}

/// Emits one or more `startObj count` subsections covering only the object
/// numbers `xref` actually has entries for (a full rewrite's `xref` has one
/// entry per live object, so this is usually a single `0 size` run; an
/// incremental section only carries the handful of objects that changed,
/// and every other, untouched number must be left out of the table
/// entirely rather than written as free -- a free entry here would outrank
/// the real one from an earlier `/Prev` section per the merge rule in
/// `xref.rs`).
pub(super) fn write_xref_table(out: &mut Vec<u8>, xref: &Xref) {
    let numbers = object_numbers_for_index(xref);
    out.extend_from_slice(b"xref\n");
    for (start, count) in contiguous_runs(&numbers) {
        out.extend_from_slice(format!("{start} {count}\n").as_bytes());
        for num in start..start + count {
            match xref.get(num) {
                Some(XrefEntry::Normal { offset, generation }) => {
                    out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
                }
                _ if num == 0 => out.extend_from_slice(b"0000000000 65535 f \n"),
                _ => out.extend_from_slice(b"0000000000 00000 f \n"),
            }
        }
    }
}

pub(super) fn write_trailer_block(out: &mut Vec<u8>, trailer: &Dictionary) {
    out.extend_from_slice(b"trailer\n");
    crate::serializer::write_value(&Object::Dictionary(trailer.clone()), out);
    out.push(b'\n');
}

/// Emits the xref itself as an indirect `/Type /XRef` stream object (the
/// modern form; required whenever object streams are in play, since a
/// table cannot carry compressed entries) and returns the byte offset it
/// was written at.
pub(super) fn write_xref_stream(out: &mut Vec<u8>, xref: &mut Xref, trailer: &mut Dictionary) -> Result<u64> {
    let xref_id = xref.max_id() + 1;
    let offset = out.len() as u64;
    xref.insert(xref_id, XrefEntry::Normal { offset: offset as u32, generation: 0 });
    xref.size = xref.size.max(xref_id + 1);
    trailer.set("Size", Object::integer(xref.size as i64));

    // `/Index` lists contiguous runs of the object numbers this section
    // actually has entries for -- for a full rewrite that's one run
    // covering `0..size`, but an incremental section only ever carries the
    // handful of objects that changed, and must not claim to speak for
    // every other (untouched) number in between.
    let numbers = object_numbers_for_index(xref);
    let runs = contiguous_runs(&numbers);

    let mut index_pairs = Vec::with_capacity(runs.len() * 2);
    let mut body = Vec::with_capacity(numbers.len() * 7);
    for (start, count) in runs {
        index_pairs.push(Object::integer(start as i64));
        index_pairs.push(Object::integer(count as i64));
        for n in start..start + count {
            match xref.get(n) {
                Some(XrefEntry::Normal { offset, generation }) => {
                    body.push(1u8);
                    body.extend_from_slice(&offset.to_be_bytes());
                    body.extend_from_slice(&generation.to_be_bytes());
                }
                Some(XrefEntry::Compressed { container, index }) => {
                    body.push(2u8);
                    body.extend_from_slice(&container.to_be_bytes());
                    body.extend_from_slice(&index.to_be_bytes());
                }
                _ if n == 0 => {
                    body.push(0u8);
                    body.extend_from_slice(&0u32.to_be_bytes());
                    body.extend_from_slice(&65535u16.to_be_bytes());
                }
                _ => {
                    body.push(0u8);
                    body.extend_from_slice(&0u32.to_be_bytes());
                    body.extend_from_slice(&0u16.to_be_bytes());
                }
            }
        }
    }

    let mut dict = trailer.clone();
    dict.set("Type", Object::name("XRef"));
    dict.set("W", Object::from(vec![Object::integer(1), Object::integer(4), Object::integer(2)]));
    dict.set("Index", Object::from(index_pairs));
    dict.set("Filter", Object::name("FlateDecode"));
    let encoded = crate::filters::encode(&dict, &body)?;
    let stream = Object::Stream(Stream::new(dict, encoded));
    crate::serializer::write_indirect_object((xref_id, 0), &stream, out);

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn minimal_document() -> Document {
        let mut doc = Document::new();
        let pages_id = doc.add_object(dictionary! { "Type" => "Pages", "Kids" => Object::from(vec![]), "Count" => 0 });
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn full_save_produces_loadable_bytes() {
        let mut doc = minimal_document();
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();

        assert!(out.starts_with(b"%PDF-1.7"));
        let reloaded = Document::load_mem(&out).unwrap();
        assert_eq!(reloaded.version, "1.7");
        assert!(reloaded.catalog().is_ok());
    }

    #[test]
    fn full_save_with_object_streams_round_trips() {
        let mut doc = minimal_document();
        let mut out = Vec::new();
        let options = SaveOptions::builder().use_object_streams(true).build();
        doc.save_with_options(&mut out, options).unwrap();

        let reloaded = Document::load_mem(&out).unwrap();
        assert!(reloaded.catalog().is_ok());
    }

    #[test]
    fn incremental_save_appends_after_the_original_bytes() {
        let mut doc = minimal_document();
        let mut original = Vec::new();
        doc.save_to(&mut original).unwrap();

        let mut doc = Document::load_mem(&original).unwrap();
        let new_id = doc.add_object(Object::integer(7));
        doc.trailer.set("Extra", new_id);

        let mut appended = Vec::new();
        doc.save_incremental(&mut appended).unwrap();

        assert!(appended.len() > original.len());
        assert_eq!(&appended[..original.len()], &original[..]);

        let reloaded = Document::load_mem(&appended).unwrap();
        assert_eq!(reloaded.get_object(new_id).unwrap().as_i64().unwrap(), 7);
    }

    #[test]
    fn save_with_options_falls_back_to_full_when_incremental_is_blocked() {
        let mut doc = minimal_document();
        let options = SaveOptions::builder().incremental(true).build();
        let mut out = Vec::new();
        doc.save_with_options(&mut out, options).unwrap();

        assert!(!doc.warnings.is_empty());
        assert!(Document::load_mem(&out).unwrap().catalog().is_ok());
    }
}
