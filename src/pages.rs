//! C9: the page tree. A document's pages are not known until the `/Pages`
//! tree (rooted at the catalog) is walked once; after that, page access is
//! O(1) against the flat list built here. Mirrors the cycle-detection shape
//! already used by `reader::metadata::get_pages_tree_count`, but returns the
//! leaves themselves (in document order) rather than just a count.

use std::collections::{BTreeMap, HashSet};

use crate::dictionary::Dictionary;
use crate::object::{Object, ObjectId};
use crate::{Document, Result};

impl Document {
    /// Every leaf `/Page` reachable from the catalog's `/Pages`, in the
    /// order the tree lists them, numbered from 1. Nodes with an
    /// unresolvable ref or an unrecognised `/Type` are skipped (lenient);
    /// cycles are broken by a visited set and do not panic or loop forever.
    pub fn get_pages(&self) -> BTreeMap<u32, ObjectId> {
        let mut pages = BTreeMap::new();
        if let Ok(pages_ref) = self.catalog().and_then(|cat| cat.get(b"Pages")).and_then(Object::as_reference) {
            let mut seen = HashSet::new();
            let mut next_number = 1u32;
            self.walk_pages_tree(pages_ref, &mut seen, &mut next_number, &mut pages);
        }
        pages
    }

    /// The Nth page (1-indexed), if it exists.
    pub fn get_page(&self, number: u32) -> Option<ObjectId> {
        self.get_pages().get(&number).copied()
    }

    /// Page dictionaries inherit `/Resources`, `/MediaBox`, `/CropBox`, and
    /// `/Rotate` from ancestor `/Pages` nodes when the leaf itself does not
    /// declare them (ISO 32000-1 §7.7.3.4). Walks `/Parent` until the key is
    /// found or the tree root is reached.
    pub fn get_page_inherited(&self, page_id: ObjectId, key: &[u8]) -> Result<Object> {
        let mut current = page_id;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return Err(crate::Error::ReferenceCycle(current));
            }
            let dict = self.get_dictionary(current)?;
            if let Ok(value) = dict.get(key) {
                return Ok(value.clone());
            }
            match dict.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent) => current = parent,
                Err(_) => return Err(crate::Error::DictKey(key.to_vec())),
            }
        }
    }

    fn walk_pages_tree(
        &self, node_id: ObjectId, seen: &mut HashSet<ObjectId>, next_number: &mut u32, pages: &mut BTreeMap<u32, ObjectId>,
    ) {
        if !seen.insert(node_id) {
            return;
        }
        let Ok(dict) = self.get_dictionary(node_id) else {
            return;
        };

        match dict.get_type() {
            Ok(t) if t == b"Page" => {
                pages.insert(*next_number, node_id);
                *next_number += 1;
            }
            Ok(t) if t == b"Pages" => {
                let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) else {
                    return;
                };
                for kid in kids.iter() {
                    if let Ok(kid_ref) = kid.as_reference() {
                        self.walk_pages_tree(kid_ref, seen, next_number, pages);
                    }
                }
            }
            // Missing/unknown /Type: lenient, skip.
            _ => {}
        }
    }

    /// Forces a rebuild on next `get_pages()` call. `get_pages` already
    /// re-walks the tree on every call (the tree is small relative to the
    /// rest of the document and pages are rarely queried in a hot loop), so
    /// this exists only to document the contract: callers that add/remove
    /// pages do not need to invalidate a cache explicitly.
    pub fn pages_tree_is_live(&self) -> bool {
        true
    }

    /// Appends a new `/Page` as the last kid of `/Pages`, returning its id.
    /// `page_dict` should already carry whatever the caller wants beyond
    /// `/Type` and `/Parent`, which are set here.
    pub fn add_page(&mut self, mut page_dict: Dictionary) -> Result<ObjectId> {
        let pages_ref = self.catalog().and_then(|cat| cat.get(b"Pages")).and_then(Object::as_reference)?;
        page_dict.set("Type", Object::name("Page"));
        page_dict.set("Parent", pages_ref);
        let page_id = self.add_object(page_dict);

        let pages_dict = self.get_object_mut(pages_ref)?.as_dict_mut()?;
        let mut kids = pages_dict.get(b"Kids").and_then(Object::as_array).ok().cloned().unwrap_or_default();
        kids.push(page_id);
        let count = kids.len() as i64;
        pages_dict.set("Kids", kids);
        pages_dict.set("Count", count);
        Ok(page_id)
    }
}
