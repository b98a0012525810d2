//! A PDF toolkit core: a lazy, cross-reference-driven object model parser, a
//! change-tracking writer, and the Standard security handler. Turns
//! arbitrary (including malformed) PDF byte streams into a mutable object
//! graph, tracks what changed, and serialises either a full rewrite or an
//! incremental update appended to the original bytes.
//!
//! Out of scope: drawing/content generation (text, shapes, images, fonts),
//! form-field manipulation, digital-signature computation, annotation APIs,
//! rendering to raster images.

pub mod destinations;
pub mod dictionary;
pub mod encryption;
pub mod error;
pub mod filters;
pub mod interning;
pub mod object;
pub mod object_stream;
pub mod outlines;
pub mod pages;
pub mod permissions;
mod parser;
pub mod protection;
pub mod reader;
pub mod serializer;
pub mod writer;
pub mod xref;

mod date;
mod document;

pub use date::PdfDate;
pub use dictionary::Dictionary;
pub use document::Document;
pub use error::{Error, Result};
pub use object::{Array, Object, ObjectId, Stream, StringFormat};
pub use permissions::Permissions;
pub use protection::{ProtectionOptions, SecurityInfo};
pub use reader::{LoadOptions, PdfMetadata};
pub use writer::{Attachment, IncrementalDocument, ObjectStreamBuilder, ObjectStreamConfig, SaveOptions};

/// Convenience constructor macro for `Dictionary`, mirroring the teacher's
/// own `dictionary!` macro: `dictionary!("Type" => "Catalog", "Pages" => (1, 0))`.
#[macro_export]
macro_rules! dictionary {
    () => {
        $crate::Dictionary::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut dict = $crate::Dictionary::new();
        $(dict.set($key, $value);)+
        dict
    }};
}
