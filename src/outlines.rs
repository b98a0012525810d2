//! Bookmarks (the `/Outlines` tree): a thin consumer of the object model,
//! grounded the same way `destinations.rs` grounds named destinations — walk
//! a tree rooted at a catalog entry, collect leaf data, tolerate unresolved
//! refs. Not part of THE CORE's spec.md components, but a natural companion
//! of the object model already in place.

use crate::dictionary::Dictionary;
use crate::object::{Object, ObjectId};
use crate::{Document, Result};

/// One node of the bookmark tree: a title, the destination it points at (if
/// any — some outline entries only carry an `/A` action, which is out of
/// scope here), and its children in document order.
#[derive(Debug, Clone)]
pub struct Bookmark {
    pub title: String,
    pub dest: Option<Object>,
    pub children: Vec<Bookmark>,
}

impl Document {
    /// Walks `/Root/Outlines` into a tree of [`Bookmark`]s. Returns an empty
    /// vector when the document has no outline dictionary, matching the
    /// lenient "absent is empty" contract used elsewhere in the façade.
    pub fn get_bookmarks(&self) -> Vec<Bookmark> {
        let Ok(outlines_ref) = self.catalog().and_then(|cat| cat.get(b"Outlines")).and_then(Object::as_reference) else {
            return Vec::new();
        };
        let Ok(outlines) = self.get_dictionary(outlines_ref) else {
            return Vec::new();
        };
        let Ok(first) = outlines.get(b"First").and_then(Object::as_reference) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        self.walk_outline_siblings(first, &mut seen)
    }

    fn walk_outline_siblings(&self, mut node_id: ObjectId, seen: &mut std::collections::HashSet<ObjectId>) -> Vec<Bookmark> {
        let mut out = Vec::new();
        loop {
            if !seen.insert(node_id) {
                break;
            }
            let Ok(dict) = self.get_dictionary(node_id) else {
                break;
            };
            out.push(self.outline_node_to_bookmark(dict, seen));

            match dict.get(b"Next").and_then(Object::as_reference) {
                Ok(next) => node_id = next,
                Err(_) => break,
            }
        }
        out
    }

    fn outline_node_to_bookmark(&self, dict: &Dictionary, seen: &mut std::collections::HashSet<ObjectId>) -> Bookmark {
        let title = dict
            .get(b"Title")
            .and_then(Object::as_str)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        let dest = dict.get(b"Dest").cloned().ok();
        let children = match dict.get(b"First").and_then(Object::as_reference) {
            Ok(first_child) => self.walk_outline_siblings(first_child, seen),
            Err(_) => Vec::new(),
        };
        Bookmark { title, dest, children }
    }

    /// Creates an (initially empty) `/Outlines` dictionary and links it from
    /// the catalog, returning its id. A no-op (returns the existing ref) if
    /// one is already present.
    pub fn ensure_outlines(&mut self) -> Result<ObjectId> {
        if let Ok(existing) = self.catalog().and_then(|cat| cat.get(b"Outlines")).and_then(Object::as_reference) {
            return Ok(existing);
        }
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Outlines"));
        dict.set("Count", Object::integer(0));
        let outlines_ref = self.add_object(dict);

        let root = self.trailer.get(b"Root").and_then(Object::as_reference)?;
        self.get_object_mut(root)?.as_dict_mut()?.set("Outlines", outlines_ref);
        Ok(outlines_ref)
    }
}
