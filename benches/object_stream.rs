use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};

use criterion::{criterion_group, criterion_main, Criterion};
use pdf_core::{Document, Object, ObjectStreamBuilder, ObjectStreamConfig};

fn bench_object_stream_compress(c: &mut Criterion) {
    // Create 100 simple dictionary objects
    let mut objects: BTreeMap<(u32, u16), Object> = BTreeMap::new();
    for i in 1..=100 {
        let dict = pdf_core::dictionary! {
            "Type" => "TestObj",
            "Value" => Object::integer(i as i64),
        };
        objects.insert((i, 0), Object::Dictionary(dict));
    }

    c.bench_function("object_stream_compress", |b| {
        b.iter(|| {
            let config = ObjectStreamConfig::default();
            let builder = ObjectStreamBuilder::new(config);
            let _ = builder.build_object_streams(&objects);
        })
    });
}

fn bench_object_stream_parse(c: &mut Criterion) {
    let mut buffer = Vec::new();
    File::open("assets/example.pdf").unwrap().read_to_end(&mut buffer).unwrap();

    // Benchmark parsing a PDF that may contain object streams
    c.bench_function("object_stream_parse", |b| {
        b.iter(|| {
            let _ = Document::load_from(Cursor::new(&buffer));
        })
    });
}

criterion_group!(benches, bench_object_stream_compress, bench_object_stream_parse);
criterion_main!(benches);
