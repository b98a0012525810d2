//! C5: cross-reference table/stream grammar and brute-force recovery.

use nom::bytes::complete::{tag, take, take_while1};
use nom::character::complete::digit1;
use nom::multi::many1;
use nom::sequence::tuple;
use nom::IResult;

use super::object::{is_whitespace, ws0};
use super::{parse_i64, ParserInput};
use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError, XrefError};
use crate::object::Object;
use crate::reader::Reader;
use crate::xref::{Xref, XrefEntry, XrefType};
use crate::Result;

/// Parse either an xref table or an xref stream at the start of `input`,
/// returning the merged index for this section plus its trailer dict.
pub fn xref_and_trailer(input: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let (after_ws, _) = ws0(input).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidXref)?;
    if after_ws.fragment().starts_with(b"xref") {
        xref_table(after_ws)
    } else {
        xref_stream(after_ws, reader)
    }
}

fn xref_table(input: ParserInput) -> Result<(Xref, Dictionary)> {
    let (input, _) =
        tag::<_, ParserInput, nom::error::Error<ParserInput>>(b"xref".as_slice())(input).map_err(|_| ParseError::InvalidXref)?;

    let mut xref = Xref::new(0, XrefType::Table);
    let mut input = input;
    loop {
        let (rest, _) = ws0(input).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidXref)?;
        if rest.fragment().starts_with(b"trailer") {
            input = rest;
            break;
        }
        let Ok((rest, (start, count))) = subsection_header(rest) else {
            break;
        };
        input = rest;
        for object_number in start..start + count {
            let (rest, entry) = xref_entry(input).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidXref)?;
            xref.insert(object_number, entry);
            input = rest;
        }
    }

    let (input, _) =
        tag::<_, ParserInput, nom::error::Error<ParserInput>>(b"trailer".as_slice())(input).map_err(|_| ParseError::InvalidXref)?;
    let (_, trailer_obj) = super::object(input).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidXref)?;
    let trailer = trailer_obj.as_dict().map_err(|_| ParseError::InvalidXref)?.clone();
    xref.size = trailer.get(b"Size").and_then(Object::as_i64).unwrap_or(0).max(0) as u32;
    Ok((xref, trailer))
}

fn subsection_header(input: ParserInput) -> IResult<ParserInput, (u32, u32)> {
    let (input, _) = ws0(input)?;
    let (input, (start, _, count)) = tuple((parse_i64, take_while1(is_whitespace), parse_i64))(input)?;
    Ok((input, (start.max(0) as u32, count.max(0) as u32)))
}

fn xref_entry(input: ParserInput) -> IResult<ParserInput, XrefEntry> {
    let (input, _) = ws0(input)?;
    let (input, offset_digits) = digit1(input)?;
    let (input, _) = take_while1(is_whitespace)(input)?;
    let (input, gen_digits) = digit1(input)?;
    let (input, _) = take_while1(is_whitespace)(input)?;
    let (input, kind) = take(1usize)(input)?;

    let offset: u32 = std::str::from_utf8(offset_digits.fragment()).unwrap_or("0").parse().unwrap_or(0);
    let generation: u16 = std::str::from_utf8(gen_digits.fragment()).unwrap_or("0").parse().unwrap_or(0);
    let entry = match kind.fragment().first() {
        Some(b'n') => XrefEntry::Normal { offset, generation },
        Some(b'f') => XrefEntry::Free { generation },
        _ => XrefEntry::UnusableFree,
    };
    Ok((input, entry))
}

fn xref_stream(input: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let (_, object) =
        super::indirect_object(input, 0, None, reader, &mut Default::default()).map_err(|_| Error::Xref(XrefError::MissingWidths))?;
    let stream = object.as_stream().map_err(|_| Error::Xref(XrefError::MissingWidths))?;
    let trailer = stream.dict.clone();

    let widths: Vec<usize> = trailer
        .get(b"W")
        .and_then(Object::as_array)
        .map_err(|_| Error::Xref(XrefError::MissingWidths))?
        .iter()
        .map(|o| o.as_i64().unwrap_or(0).max(0) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::Xref(XrefError::MissingWidths));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let entry_width = w1 + w2 + w3;
    if entry_width == 0 {
        return Err(Error::Xref(XrefError::MissingWidths));
    }

    let size = trailer.get(b"Size").and_then(Object::as_i64).unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = match trailer.get(b"Index").and_then(Object::as_array) {
        Ok(arr) => arr
            .chunks(2)
            .filter_map(|pair| {
                let first = pair.first()?.as_i64().ok()?.max(0) as u32;
                let count = pair.get(1)?.as_i64().ok()?.max(0) as u32;
                Some((first, count))
            })
            .collect(),
        Err(_) => vec![(0, size)],
    };

    let data = stream.get_decoded_data().map_err(|_| Error::Xref(XrefError::IndexMismatch))?;
    let mut xref = Xref::new(size, XrefType::Stream);
    let mut cursor = 0usize;
    for (first, count) in index {
        for i in 0..count {
            if cursor + entry_width > data.len() {
                break;
            }
            let object_number = first + i;
            let field_type = if w1 == 0 { 1 } else { read_be(&data[cursor..cursor + w1]) };
            let field2 = read_be(&data[cursor + w1..cursor + w1 + w2]);
            let field3 = read_be(&data[cursor + w1 + w2..cursor + entry_width]);
            cursor += entry_width;

            let entry = match field_type {
                0 => XrefEntry::Free {
                    generation: field3 as u16,
                },
                1 => XrefEntry::Normal {
                    offset: field2 as u32,
                    generation: field3 as u16,
                },
                2 => XrefEntry::Compressed {
                    container: field2 as u32,
                    index: field3 as u16,
                },
                _ => XrefEntry::UnusableFree,
            };
            xref.insert(object_number, entry);
        }
    }

    Ok((xref, trailer))
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Build a synthetic xref + minimal trailer by scanning the whole buffer for
/// `N G obj` occurrences. Invoked when the normal xref chain cannot be
/// parsed in lenient mode.
pub fn brute_force_recover(buffer: &[u8]) -> Result<(Xref, Dictionary)> {
    let mut xref = Xref::new(0, XrefType::Table);
    let mut root: Option<(u32, u16)> = None;

    for (obj_num, gen, header_end) in crate::parser::scanner::scan_indirect_object_headers(buffer) {
        // header_end points just past "obj"; the offset recorded in the
        // xref must point at the start of "N G obj".
        let header_start = find_header_start(buffer, header_end);
        xref.insert(obj_num, XrefEntry::Normal {
            offset: header_start as u32,
            generation: gen,
        });

        // Only bother classifying plain dictionaries (not streams) for
        // /Type /Catalog; this is enough to locate /Root.
        let slice = ParserInput::new_extra(&buffer[header_start..], "recovery");
        if let Ok((_, dict_obj)) = super::object(skip_header(slice)) {
            if let Ok(dict) = dict_obj.as_dict() {
                if dict.has_type(b"Catalog") {
                    root = Some((obj_num, gen));
                }
            }
        }
    }

    let root = root.ok_or(Error::Xref(XrefError::RecoveryFailed))?;
    xref.size = xref.max_id() + 1;

    let mut trailer = Dictionary::new();
    trailer.set("Root", Object::reference(root));
    trailer.set("Size", Object::integer(xref.size as i64));
    Ok((xref, trailer))
}

fn find_header_start(buffer: &[u8], header_end: usize) -> usize {
    // Walk back over "obj", whitespace, digits, whitespace, digits.
    let mut pos = header_end.saturating_sub(3); // "obj"
    while pos > 0 && buffer[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && buffer[pos - 1].is_ascii_digit() {
        pos -= 1;
    }
    while pos > 0 && buffer[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && buffer[pos - 1].is_ascii_digit() {
        pos -= 1;
    }
    pos
}

fn skip_header(input: ParserInput) -> ParserInput {
    let parsed: IResult<ParserInput, _> = many1(nom::branch::alt((digit1, take_while1(is_whitespace))))(input);
    let (rest, _) = match parsed {
        Ok(v) => v,
        Err(_) => return input,
    };
    let (rest, _) = match tag::<_, ParserInput, nom::error::Error<ParserInput>>(b"obj".as_slice())(rest) {
        Ok(v) => v,
        Err(_) => return input,
    };
    rest
}
