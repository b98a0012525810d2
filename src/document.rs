//! C8: the in-memory object registry — every indirect object the document
//! knows about, plus enough bookkeeping (the cross-reference table this
//! document was loaded from, and a running `max_id`) to answer "which
//! objects changed" when it comes time to save.

use std::collections::{BTreeMap, HashSet};

use log::warn;

use crate::dictionary::Dictionary;
use crate::encryption::EncryptionState;
use crate::error::Error;
use crate::object::{Object, ObjectId};
use crate::xref::Xref;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The four-byte binary marker comment on the line after `%PDF-X.Y`.
    pub binary_mark: Vec<u8>,
    /// Byte offset of the xref section this document was loaded from, or 0
    /// for a document built from scratch.
    pub xref_start: usize,
    pub version: String,
    /// Highest object number currently assigned.
    pub max_id: u32,
    pub trailer: Dictionary,
    /// The cross-reference index this document was loaded from. Kept
    /// around so the writer can tell, object by object, whether something
    /// changed since load (C8) and whether an incremental save is possible.
    pub reference_table: Xref,
    pub objects: BTreeMap<ObjectId, Object>,
    /// `None` for an unencrypted document, or once a protected one has been
    /// authenticated and had its payloads decrypted at load time.
    pub encryption_state: Option<EncryptionState>,
    /// Non-fatal recovery notes accumulated while loading in lenient mode.
    pub warnings: Vec<String>,
    /// Set once the xref chain could not be parsed at all and the loader
    /// fell back to scanning the whole buffer for `N G obj` headers (C5).
    /// A document in this state cannot be saved incrementally: there is no
    /// trustworthy `startxref` to anchor a `/Prev` chain to.
    pub recovered_via_brute_force: bool,
    /// Queued by `set_protection`/`remove_protection` (C12); consumed (and
    /// reset to `None`) the next time the document is saved. Mutating this
    /// never touches `/Encrypt` or any object in-memory on its own.
    pub(crate) pending_security_action: crate::protection::PendingSecurityAction,
    /// The exact bytes this document was loaded from, kept around so a
    /// later `save_with_options(incremental: true)` can append after them
    /// byte-for-byte. `None` for a document built with `Document::new`, or
    /// after any save that doesn't preserve a prefix (a full rewrite sets
    /// this to the bytes it just wrote, so a subsequent save can still be
    /// incremental).
    pub(crate) source_bytes: Option<Vec<u8>>,
}

impl Document {
    pub fn new() -> Self {
        let mut trailer = Dictionary::new();
        trailer.set("Size", Object::integer(1));
        Document {
            binary_mark: vec![0xE2, 0xE3, 0xCF, 0xD3],
            xref_start: 0,
            version: "1.7".to_string(),
            max_id: 0,
            trailer,
            reference_table: Xref::default(),
            objects: BTreeMap::new(),
            encryption_state: None,
            warnings: Vec::new(),
            recovered_via_brute_force: false,
            pending_security_action: crate::protection::PendingSecurityAction::None,
            source_bytes: None,
        }
    }

    pub(crate) fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Register a new object, assigning it the next free object number.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.max_id += 1;
        let id = (self.max_id, 0);
        self.objects.insert(id, object.into());
        id
    }

    /// Alias for `add_object`, matching the façade's `register` verb (C12) —
    /// convenient when building a document from scratch object by object.
    pub fn register(&mut self, object: impl Into<Object>) -> ObjectId {
        self.add_object(object)
    }

    /// Insert or replace the object at a caller-chosen id, bumping `max_id`
    /// if necessary. Used by the writer when rehydrating a document that
    /// was only partially loaded, and by callers constructing documents
    /// object-by-object.
    pub fn set_object(&mut self, id: ObjectId, object: impl Into<Object>) {
        self.max_id = self.max_id.max(id.0);
        self.objects.insert(id, object.into());
    }

    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(&id).ok_or(Error::MissingXrefEntry)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(&id).ok_or(Error::MissingXrefEntry)
    }

    pub fn get_dictionary(&self, id: ObjectId) -> Result<&Dictionary> {
        self.get_object(id).and_then(Object::as_dict)
    }

    /// Follow `value` one hop if it is a `Reference`, returning the
    /// resolved object alongside the id it was found at (itself, if `value`
    /// was not a reference).
    pub fn dereference<'a>(&'a self, value: &'a Object) -> Result<(Option<ObjectId>, &'a Object)> {
        match value {
            Object::Reference(id) => self.get_object(*id).map(|obj| (Some(*id), obj)),
            other => Ok((None, other)),
        }
    }

    /// Resolve `value` through a chain of references, detecting cycles.
    pub fn resolve<'a>(&'a self, mut value: &'a Object) -> Result<&'a Object> {
        let mut seen = HashSet::new();
        while let Object::Reference(id) = value {
            if !seen.insert(*id) {
                return Err(Error::ReferenceCycle(*id));
            }
            value = self.get_object(*id)?;
        }
        Ok(value)
    }

    pub fn catalog(&self) -> Result<&Dictionary> {
        let root = self.trailer.get(b"Root").and_then(Object::as_reference)?;
        self.get_dictionary(root)
    }

    /// True once a password has been presented and the file key computed,
    /// or the document was never encrypted to begin with.
    pub fn is_encrypted(&self) -> bool {
        self.trailer.has(b"Encrypt")
    }

    /// Attempt to derive the file key from `password` without mutating
    /// `self`; used both to validate a password up front and, internally,
    /// to probe the empty-password case during loading.
    pub fn authenticate_password(&self, password: &str) -> Result<()> {
        EncryptionState::decode(self, password).map(|_| ())
    }

    pub fn has_owner_access(&self) -> bool {
        self.encryption_state.as_ref().map(|s| s.is_owner).unwrap_or(true)
    }

    /// Every object number touched since load: objects new to this session
    /// plus any loaded object whose value has since been mutated. Ref
    /// boundaries stop the walk, per the dirty-flag contract on `Object`.
    pub(crate) fn changed_object_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(id, obj)| !self.reference_table.entries.contains_key(&id.0) || obj.is_dirty())
            .map(|(id, _)| *id)
            .collect()
    }

    /// An incremental save is only safe when the original xref was a table
    /// or stream this writer can append a new section after without
    /// rewriting earlier bytes — i.e. whenever the document was loaded from
    /// a byte buffer at all.
    pub fn can_save_incrementally(&self) -> bool {
        !self.recovered_via_brute_force && (self.xref_start > 0 || !self.reference_table.entries.is_empty())
    }

    /// Human-readable reason `can_save_incrementally` would be false, or
    /// `"ok"` when an incremental save is possible; used by tests and by
    /// `Document::save` to decide whether to fall back to a full rewrite.
    pub fn incremental_save_blocker(&self) -> Option<&'static str> {
        if self.recovered_via_brute_force {
            Some("brute-force-recovery")
        } else if self.is_linearized() {
            Some("linearized")
        } else if self.xref_start == 0 && self.reference_table.entries.is_empty() {
            Some("new-document")
        } else if self.source_bytes.is_none() {
            Some("no-source-bytes")
        } else {
            None
        }
    }

    /// Clears every object's dirty flag and folds the current object set
    /// into `reference_table`'s notion of "already on disk" — called after
    /// a successful save (C11) so the next one only picks up what changes
    /// from here.
    pub(crate) fn mark_all_clean(&mut self) {
        for object in self.objects.values_mut() {
            object.mark_clean();
        }
    }

    /// A linearised PDF's first indirect object is a dict carrying the
    /// linearization parameter keys; re-saving one incrementally would leave
    /// a stale hint dictionary pointing at offsets that no longer match, so
    /// the writer always does a full rewrite for these (C11).
    pub fn is_linearized(&self) -> bool {
        self.objects
            .values()
            .any(|obj| matches!(obj.as_dict(), Ok(dict) if dict.has(b"Linearized")))
    }
}
