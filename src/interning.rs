//! Module-level LRU caches for the two values that recur constantly while
//! parsing a PDF: Names and indirect references. Both caches are process-wide
//! (the design notes call this out explicitly); callers who need per-document
//! isolation can bypass interning by constructing `Object::Name`/`Object::Reference`
//! directly instead of through [`intern_name`]/[`intern_ref`].

use std::sync::{Arc, Mutex, OnceLock};

use indexmap::IndexMap;

use crate::ObjectId;

const NAME_CACHE_CAPACITY: usize = 10_000;
const REF_CACHE_CAPACITY: usize = 20_000;

/// Names common enough to appear in almost every PDF; kept alive for the
/// whole process regardless of LRU pressure so the hot path never misses.
const PERMANENT_NAMES: &[&str] = &[
    "Type", "Subtype", "Pages", "Page", "Catalog", "Length", "Filter", "Kids", "Count", "Parent", "Root", "Size",
    "Prev", "Info", "ObjStm",
];

/// A small LRU keyed by value equality, backed by an insertion-ordered map so
/// the least-recently-used entry is always at the front.
struct LruCache<K, V> {
    capacity: usize,
    entries: IndexMap<K, V>,
}

impl<K, V> LruCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        LruCache {
            capacity,
            entries: IndexMap::new(),
        }
    }

    fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> V {
        if let Some(value) = self.entries.shift_remove(&key) {
            self.entries.insert(key, value.clone());
            return value;
        }
        let value = make();
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value.clone());
        value
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

fn name_cache() -> &'static Mutex<LruCache<Box<str>, Arc<str>>> {
    static CACHE: OnceLock<Mutex<LruCache<Box<str>, Arc<str>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(LruCache::new(NAME_CACHE_CAPACITY)))
}

fn permanent_names() -> &'static std::collections::HashMap<&'static str, Arc<str>> {
    static PERMANENT: OnceLock<std::collections::HashMap<&'static str, Arc<str>>> = OnceLock::new();
    PERMANENT.get_or_init(|| PERMANENT_NAMES.iter().map(|&name| (name, Arc::from(name))).collect())
}

fn ref_cache() -> &'static Mutex<LruCache<ObjectId, ObjectId>> {
    static CACHE: OnceLock<Mutex<LruCache<ObjectId, ObjectId>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(LruCache::new(REF_CACHE_CAPACITY)))
}

/// Intern a PDF name value. `Name.of("Foo") == Name.of("Foo")` holds because
/// both calls return clones of the same `Arc<str>` while it is cache-resident
/// (or the permanent pool, for the ~15 universally common names).
pub fn intern_name(name: &str) -> Arc<str> {
    if let Some(permanent) = permanent_names().get(name) {
        return Arc::clone(permanent);
    }
    name_cache()
        .lock()
        .expect("name cache mutex poisoned")
        .get_or_insert_with(Box::from(name), || Arc::from(name))
}

/// Intern an indirect reference. `ObjectId` is already `Copy`, so this exists
/// to satisfy the "same ref resolves through one cache" contract rather than
/// to save allocations; it is cheap to call on every reference the parser
/// produces.
pub fn intern_ref(id: ObjectId) -> ObjectId {
    ref_cache().lock().expect("ref cache mutex poisoned").get_or_insert_with(id, || id)
}

/// Drop all non-permanent cache entries. Mainly useful for tests that assert
/// on cache behaviour; the permanent pool survives.
pub fn clear_cache() {
    name_cache().lock().expect("name cache mutex poisoned").clear();
    ref_cache().lock().expect("ref cache mutex poisoned").clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_equal_by_value() {
        assert_eq!(intern_name("Foo"), intern_name("Foo"));
        assert!(Arc::ptr_eq(&intern_name("Foo"), &intern_name("Foo")));
    }

    #[test]
    fn permanent_names_survive_clear() {
        let before = intern_name("Type");
        clear_cache();
        let after = intern_name("Type");
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn refs_are_interned() {
        assert_eq!(intern_ref((3, 0)), intern_ref((3, 0)));
    }
}
