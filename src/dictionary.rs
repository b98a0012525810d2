use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::object::Object;

/// A PDF dictionary: an insertion-ordered mapping from decoded Name bytes to
/// values. Ordering is preserved so a dict that was parsed a particular way
/// round-trips byte-for-byte when nothing inside it changed.
///
/// Keys are the *decoded* bytes of the name (after `#XX` escapes are resolved),
/// not `Object::Name` values — this mirrors how every consumer in this crate
/// looks dictionaries up, e.g. `dict.get(b"Type")`.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    map: IndexMap<Vec<u8>, Object>,
    dirty: bool,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Construct from an already-parsed sequence of pairs without marking the
    /// result dirty; used by the parser when materialising a freshly loaded
    /// object.
    pub(crate) fn from_parsed(pairs: Vec<(Vec<u8>, Object)>) -> Self {
        Dictionary {
            map: pairs.into_iter().collect(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.map.get(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.dirty = true;
        self.map.get_mut(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.dirty = true;
        self.map.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.dirty = true;
        self.map.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.dirty = true;
        self.map.iter_mut()
    }

    /// Like `iter_mut`, but does not flip the dirty flag. Used by the loader
    /// to decrypt string/stream payloads in place right after parsing, which
    /// is not a mutation as far as change-tracking (C8) is concerned.
    pub(crate) fn values_mut_untracked(&mut self) -> impl Iterator<Item = &mut Object> {
        self.map.values_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.map.keys()
    }

    /// Value of `/Type`, for matching against `b"Catalog"`, `b"Page"`, etc.
    pub fn get_type(&self) -> Result<&[u8]> {
        self.get(b"Type").and_then(|o| o.as_name())
    }

    pub fn has_type(&self, type_name: &[u8]) -> bool {
        matches!(self.get_type(), Ok(t) if t == type_name)
    }

    /// True iff this dict has been mutated since load or since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
        for value in self.map.values_mut() {
            value.mark_clean();
        }
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K, V> FromIterator<(K, V)> for Dictionary
where
    K: Into<Vec<u8>>,
    V: Into<Object>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}
