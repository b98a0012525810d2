use std::cell::RefCell;
use std::sync::Arc;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::interning::{intern_name, intern_ref};

/// `(object_number, generation)`, the two integers that name an indirect
/// object and locate it via the cross-reference table.
pub type ObjectId = (u32, u16);

/// How a literal PDF string was written in the source, so re-serialising an
/// unmodified string reproduces the original bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hexadecimal,
}

/// A mutable, ordered sequence of values with a dirty flag.
#[derive(Debug, Clone, Default)]
pub struct Array {
    items: Vec<Object>,
    dirty: bool,
}

impl Array {
    pub fn new() -> Self {
        Array::default()
    }

    pub(crate) fn from_parsed(items: Vec<Object>) -> Self {
        Array { items, dirty: false }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.items.iter()
    }

    pub fn push(&mut self, value: impl Into<Object>) {
        self.dirty = true;
        self.items.push(value.into());
    }

    pub fn set(&mut self, index: usize, value: impl Into<Object>) -> Result<()> {
        let slot = self.items.get_mut(index).ok_or(Error::WrongObjectType)?;
        *slot = value.into();
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Object {
        self.dirty = true;
        self.items.remove(index)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
        for item in &mut self.items {
            item.mark_clean();
        }
    }

    /// Like iterating `&mut self`, but does not flip the dirty flag; see
    /// `Dictionary::values_mut_untracked`.
    pub(crate) fn iter_mut_untracked(&mut self) -> std::slice::IterMut<'_, Object> {
        self.items.iter_mut()
    }
}

impl std::ops::Deref for Array {
    type Target = [Object];

    fn deref(&self) -> &[Object] {
        &self.items
    }
}

impl std::ops::Index<usize> for Array {
    type Output = Object;

    fn index(&self, index: usize) -> &Object {
        &self.items[index]
    }
}

impl FromIterator<Object> for Array {
    fn from_iter<T: IntoIterator<Item = Object>>(iter: T) -> Self {
        Array {
            items: iter.into_iter().collect(),
            dirty: true,
        }
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A Dict paired with a raw (still-encoded) byte payload. `/Length` is
/// recomputed by the serialiser on every save, so a stale value here is
/// harmless.
#[derive(Debug, Clone)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
    /// Absolute offset of the first content byte in the source buffer, set
    /// only for streams materialised by the loader (C6); `None` for streams
    /// created in memory.
    pub(crate) start_position: Option<usize>,
    dirty: bool,
    decoded_cache: RefCell<Option<Arc<[u8]>>>,
}

impl Stream {
    pub fn new(dict: Dictionary, content: Vec<u8>) -> Self {
        let mut dict = dict;
        dict.set("Length", Object::Number(content.len() as f64));
        Stream {
            dict,
            content,
            start_position: None,
            dirty: true,
            decoded_cache: RefCell::new(None),
        }
    }

    pub(crate) fn from_parsed(dict: Dictionary, content: Vec<u8>, start_position: usize) -> Self {
        Stream {
            dict,
            content,
            start_position: Some(start_position),
            dirty: false,
            decoded_cache: RefCell::new(None),
        }
    }

    /// Replace the raw payload, e.g. once a parser has resolved the stream
    /// body at a known offset and length (see `reader::object_loader`).
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
        self.dirty = true;
        *self.decoded_cache.borrow_mut() = None;
    }

    /// Like `set_content`, but does not flip the dirty flag; used to
    /// decrypt a stream's raw payload in place right after parsing.
    pub(crate) fn set_content_untracked(&mut self, content: Vec<u8>) {
        self.content = content;
        *self.decoded_cache.borrow_mut() = None;
    }

    /// Run the filter pipeline (C3) over the raw payload, caching the result.
    /// Streams whose sole filter is `/Crypt /Identity` or that carry an
    /// image/CCITT/JBIG2/JPX codec are returned unfiltered — those are
    /// pass-through per the filter pipeline contract.
    pub fn get_decoded_data(&self) -> Result<Arc<[u8]>> {
        if let Some(cached) = self.decoded_cache.borrow().as_ref() {
            return Ok(Arc::clone(cached));
        }
        let decoded: Arc<[u8]> = crate::filters::decode(&self.dict, &self.content, true)?.into();
        *self.decoded_cache.borrow_mut() = Some(Arc::clone(&decoded));
        Ok(decoded)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
        self.dict.mark_clean();
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// The eight-variant value universe plus the indirect reference. Every datum
/// reachable in a loaded PDF is one of these.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Boolean(bool),
    /// Integers and reals share one representation; the serialiser decides
    /// the textual form from the value.
    Number(f64),
    Name(Arc<str>),
    String(Vec<u8>, StringFormat),
    Array(Array),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn name<S: AsRef<str>>(name: S) -> Object {
        Object::Name(intern_name(name.as_ref()))
    }

    pub fn reference(id: ObjectId) -> Object {
        Object::Reference(intern_ref(id))
    }

    pub fn integer(value: i64) -> Object {
        Object::Number(value as f64)
    }

    pub fn string_literal<S: Into<Vec<u8>>>(bytes: S) -> Object {
        Object::String(bytes.into(), StringFormat::Literal)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Number(n) => Ok(*n),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        self.as_f64().map(|n| n as i64)
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(n) => Ok(n.as_bytes()),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        match self {
            Object::Name(n) => Ok(n),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(bytes, _) => Ok(bytes),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_array(&self) -> Result<&Array> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&s.dict),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&mut s.dict),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(Error::WrongObjectType),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Number(_) => "Number",
            Object::Name(_) => "Name",
            Object::String(..) => "String",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// True iff this value (or, for containers, anything nested inside it up
    /// to the next Ref boundary) has been mutated since load/save.
    pub fn is_dirty(&self) -> bool {
        match self {
            Object::Array(a) => a.is_dirty() || a.iter().any(Object::is_dirty),
            Object::Dictionary(d) => d.is_dirty() || d.iter().any(|(_, v)| v.is_dirty()),
            Object::Stream(s) => s.is_dirty() || s.dict.iter().any(|(_, v)| v.is_dirty()),
            _ => false,
        }
    }

    pub(crate) fn mark_clean(&mut self) {
        match self {
            Object::Array(a) => a.mark_clean(),
            Object::Dictionary(d) => d.mark_clean(),
            Object::Stream(s) => s.mark_clean(),
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

/// A bare `&str`/`String` converts to a `Name`, matching every call site in
/// this crate that writes `dict.set("Type", "Catalog")` — a dictionary
/// value that's a plain Rust string literal is a PDF name far more often
/// than it's a PDF string; callers who actually want a `String` object
/// reach for `Object::string_literal` explicitly.
impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::name(value)
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Object::name(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::integer(value)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Number(value)
    }
}

impl From<Vec<Object>> for Object {
    fn from(value: Vec<Object>) -> Self {
        Object::Array(Array::from_parsed(value))
    }
}

impl From<Array> for Object {
    fn from(value: Array) -> Self {
        Object::Array(value)
    }
}

impl From<Dictionary> for Object {
    fn from(value: Dictionary) -> Self {
        Object::Dictionary(value)
    }
}

impl From<Stream> for Object {
    fn from(value: Stream) -> Self {
        Object::Stream(value)
    }
}

impl From<ObjectId> for Object {
    fn from(value: ObjectId) -> Self {
        Object::reference(value)
    }
}
