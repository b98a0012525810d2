//! C10: canonical emission of every value type, plus indirect-object and
//! stream framing. Deliberately knows nothing about encryption — the writer
//! (C11) runs a value through `encryption::encrypt_object` on a disposable
//! clone before handing it to `write_indirect_object`, keeping this module a
//! pure function of `Object -> bytes` (see the security-handler-layering
//! design note: decryption/encryption belongs at the parser/serialiser
//! boundary, not inside either one).

use crate::dictionary::Dictionary;
use crate::object::{Object, ObjectId, StringFormat};

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn needs_name_escape(b: u8) -> bool {
    b == b'#' || is_whitespace(b) || is_delimiter(b) || !(33..=126).contains(&b)
}

/// Shortest decimal that round-trips: integral values go through `itoa`
/// (no fractional part, no allocation-heavy float formatting), everything
/// else through `f64`'s own shortest-round-trip `Display` impl (which never
/// emits scientific notation).
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        let mut buf = itoa::Buffer::new();
        return buf.format(n as i64).to_string();
    }
    format!("{n}")
}

/// `/Name` -> `escaped-bytes-without-the-leading-slash`; every byte outside
/// printable ASCII 33-126, every delimiter, and `#` itself are `#XX`-escaped.
pub fn escape_name(name: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len());
    for &b in name {
        if needs_name_escape(b) {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        } else {
            out.push(b);
        }
    }
    out
}

/// Literal string body (without the surrounding parens); only `( ) \` are
/// escaped, everything else — including raw newlines and high bytes —
/// passes through unchanged.
pub fn escape_literal_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if matches!(b, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out
}

/// Writes one value's canonical syntax, with no leading/trailing whitespace
/// beyond what the grammar requires between sibling tokens.
pub fn write_value(value: &Object, out: &mut Vec<u8>) {
    match value {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Number(n) => out.extend_from_slice(format_number(*n).as_bytes()),
        Object::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(&escape_name(name.as_bytes()));
        }
        Object::String(bytes, StringFormat::Literal) => {
            out.push(b'(');
            out.extend_from_slice(&escape_literal_string(bytes));
            out.push(b')');
        }
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            out.extend_from_slice(hex_string(bytes).as_bytes());
            out.push(b'>');
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dict(dict, out),
        Object::Stream(stream) => {
            // /Length always reflects the payload actually being written,
            // which already reflects any encryption the writer applied to
            // `stream.content` before calling this function.
            let mut dict = stream.dict.clone();
            dict.set("Length", Object::integer(stream.content.len() as i64));
            write_dict(&dict, out);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference(id) => {
            out.extend_from_slice(format!("{} {} R", id.0, id.1).as_bytes());
        }
    }
}

fn write_dict(dict: &Dictionary, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (i, (key, value)) in dict.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        out.push(b'/');
        out.extend_from_slice(&escape_name(key));
        out.push(b' ');
        write_value(value, out);
    }
    out.extend_from_slice(b">>");
}

/// `N G obj\n<value>\nendobj\n`.
pub fn write_indirect_object(id: ObjectId, value: &Object, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
    write_value(value, out);
    out.extend_from_slice(b"\nendobj\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;
    use crate::object::Array;

    #[test]
    fn formats_integral_numbers_without_fraction() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn formats_fractional_numbers() {
        assert_eq!(format_number(1.5), "1.5");
    }

    #[test]
    fn escapes_names_outside_printable_ascii() {
        assert_eq!(escape_name(b"A B"), b"A#20B");
        assert_eq!(escape_name(b"a#b"), b"a#23b");
    }

    #[test]
    fn escapes_only_parens_and_backslash_in_literal_strings() {
        assert_eq!(escape_literal_string(b"a(b)c\\d"), b"a\\(b\\)c\\\\d");
        assert_eq!(escape_literal_string(b"\n\t"), b"\n\t");
    }

    #[test]
    fn writes_hex_strings_uppercase() {
        let mut out = Vec::new();
        write_value(&Object::String(vec![0xAB, 0x0F], StringFormat::Hexadecimal), &mut out);
        assert_eq!(out, b"<AB0F>");
    }

    #[test]
    fn writes_dict_and_array() {
        let dict = dictionary!("Type" => "Catalog", "Kids" => Object::Array(Array::from_iter(vec![Object::reference((1, 0))])));
        let mut out = Vec::new();
        write_value(&Object::Dictionary(dict), &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<<"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("/Kids [1 0 R]"));
        assert!(text.ends_with(">>"));
    }

    #[test]
    fn writes_indirect_object_framing() {
        let mut out = Vec::new();
        write_indirect_object((3, 0), &Object::Boolean(true), &mut out);
        assert_eq!(out, b"3 0 obj\ntrue\nendobj\n");
    }
}
