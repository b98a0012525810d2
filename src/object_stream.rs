//! Compressed indirect objects (`/Type /ObjStm`, C6): a stream that packs
//! several indirect objects' values into one compressed payload, indexed by
//! a small header of `(object_number, offset)` pairs.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::object::{Object, ObjectId, Stream};
use crate::parser::{self, ParserInput};
use crate::Result;

pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    /// Unpack every object embedded in `stream`. `/N` gives the count, `/First`
    /// the byte offset (from the start of the decoded payload) where object
    /// data begins; before that is an `N G` header table, one pair per
    /// object — except the second number here is a *byte offset*, not a
    /// generation (embedded objects are always generation 0).
    pub fn new(stream: &mut Stream) -> Result<Self> {
        let n = stream.dict.get(b"N").and_then(Object::as_i64)?.max(0) as usize;
        let first = stream.dict.get(b"First").and_then(Object::as_i64)?.max(0) as usize;
        let extends = stream.dict.get(b"Extends").and_then(Object::as_reference).ok();
        let _ = extends; // chaining to a base stream is not implemented; rare in practice.

        let data = stream.get_decoded_data()?;
        let header_bytes = &data[..first.min(data.len())];
        let mut numbers = header_bytes
            .split(|b: &u8| b.is_ascii_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| std::str::from_utf8(tok).ok().and_then(|s| s.parse::<i64>().ok()));

        let mut entries = Vec::with_capacity(n);
        for _ in 0..n {
            let obj_num = numbers.next().flatten().ok_or(ParseError::InvalidXref)?;
            let offset = numbers.next().flatten().ok_or(ParseError::InvalidXref)?;
            entries.push((obj_num.max(0) as u32, offset.max(0) as usize));
        }

        let mut objects = BTreeMap::new();
        for (obj_num, rel_offset) in entries {
            let start = first + rel_offset;
            if start > data.len() {
                continue;
            }
            let slice = ParserInput::new_extra(&data[start..], "objstm body");
            if let Ok((_, value)) = parser::object(slice) {
                objects.insert((obj_num, 0), value);
            }
        }

        Ok(ObjectStream { objects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn unpacks_embedded_objects_at_their_declared_offsets() {
        let first_body = b"<</A 1>>";
        let second_body = b"42";
        let header = format!("5 0 7 {} ", first_body.len());
        let mut content = Vec::new();
        content.extend_from_slice(header.as_bytes());
        content.extend_from_slice(first_body);
        content.extend_from_slice(second_body);

        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("ObjStm"));
        dict.set("N", Object::integer(2));
        dict.set("First", Object::integer(header.len() as i64));
        let mut stream = Stream::new(dict, content);

        let unpacked = ObjectStream::new(&mut stream).unwrap();
        assert_eq!(unpacked.objects.len(), 2);
        assert_eq!(unpacked.objects[&(5, 0)].as_dict().unwrap().get(b"A").unwrap().as_i64().unwrap(), 1);
        assert_eq!(unpacked.objects[&(7, 0)].as_i64().unwrap(), 42);
    }
}
