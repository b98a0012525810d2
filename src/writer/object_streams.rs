//! Write-side packing of `/Type /ObjStm` containers — the mirror image of
//! `object_stream::ObjectStream::new`'s unpacking. `Document::save_with_options`
//! calls this when `SaveOptions::use_object_streams` is set, to fold plain
//! (non-stream) objects into a handful of compressed containers instead of
//! writing each as its own indirect object.

use std::collections::BTreeMap;

use crate::dictionary::Dictionary;
use crate::object::{Object, ObjectId, Stream};
use crate::Result;

/// Knobs for [`ObjectStreamBuilder`]; mirrors the crate's other builder-style
/// options structs, but is plain-struct rather than builder-constructed
/// since its one field has an obvious default.
#[derive(Debug, Clone, Copy)]
pub struct ObjectStreamConfig {
    /// Objects are chunked across containers so no single `/ObjStm` grows
    /// unreasonably large; 200 matches what most producers use in practice.
    pub max_objects_per_stream: usize,
}

impl Default for ObjectStreamConfig {
    fn default() -> Self {
        ObjectStreamConfig {
            max_objects_per_stream: 200,
        }
    }
}

pub struct ObjectStreamBuilder {
    config: ObjectStreamConfig,
}

impl ObjectStreamBuilder {
    pub fn new(config: ObjectStreamConfig) -> Self {
        ObjectStreamBuilder { config }
    }

    /// Packs `objects` into one or more FlateDecode-compressed `/ObjStm`
    /// streams, chunked to at most `max_objects_per_stream` entries each.
    ///
    /// Returns the built container streams (not yet assigned object
    /// numbers — the caller decides those once it knows how many other new
    /// objects a save is writing) alongside, for every packed id, which
    /// container (by index into the returned `Vec`) and slot within it
    /// holds that object.
    pub fn build_object_streams(
        &self, objects: &BTreeMap<ObjectId, Object>,
    ) -> Result<(Vec<Stream>, BTreeMap<ObjectId, (usize, u16)>)> {
        let chunk_size = self.config.max_objects_per_stream.max(1);
        let mut containers = Vec::new();
        let mut placement = BTreeMap::new();

        let entries: Vec<_> = objects.iter().collect();
        for chunk in entries.chunks(chunk_size) {
            let mut body = Vec::new();
            let mut header_numbers = Vec::with_capacity(chunk.len());
            for (id, object) in chunk {
                header_numbers.push((id.0, body.len()));
                crate::serializer::write_value(object, &mut body);
            }

            let mut header = Vec::new();
            for (num, offset) in &header_numbers {
                header.extend_from_slice(format!("{num} {offset} ").as_bytes());
            }
            let first = header.len();

            let mut content = header;
            content.extend_from_slice(&body);

            let mut dict = Dictionary::new();
            dict.set("Type", Object::name("ObjStm"));
            dict.set("N", Object::integer(chunk.len() as i64));
            dict.set("First", Object::integer(first as i64));
            dict.set("Filter", Object::name("FlateDecode"));
            let encoded = crate::filters::encode(&dict, &content)?;

            let container_index = containers.len();
            containers.push(Stream::new(dict, encoded));

            for (slot, (id, _)) in chunk.iter().enumerate() {
                placement.insert(**id, (container_index, slot as u16));
            }
        }

        Ok((containers, placement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    #[test]
    fn packs_every_object_and_records_its_slot() {
        let mut objects = BTreeMap::new();
        for n in 1..=5u32 {
            objects.insert((n, 0), Object::Dictionary(dictionary! { "N" => Object::integer(n as i64) }));
        }

        let builder = ObjectStreamBuilder::new(ObjectStreamConfig { max_objects_per_stream: 2 });
        let (containers, placement) = builder.build_object_streams(&objects).unwrap();

        assert_eq!(containers.len(), 3);
        assert_eq!(placement.len(), 5);
        for stream in &containers {
            assert!(stream.dict.has_type(b"ObjStm"));
        }
    }

    #[test]
    fn round_trips_through_the_read_side_unpacker() {
        let mut objects = BTreeMap::new();
        objects.insert((1, 0), Object::integer(42));
        objects.insert((2, 0), Object::string_literal("hello"));

        let builder = ObjectStreamBuilder::new(ObjectStreamConfig::default());
        let (mut containers, placement) = builder.build_object_streams(&objects).unwrap();
        assert_eq!(containers.len(), 1);

        let unpacked = crate::object_stream::ObjectStream::new(&mut containers[0]).unwrap();
        for (id, _) in &placement {
            assert_eq!(unpacked.objects.get(id).unwrap().type_name(), objects[id].type_name());
        }
    }
}
