//! C4 (lexer/parser) and the file-level grammar that sits directly on top of
//! it: the header, the binary-content comment, `startxref`, whole indirect
//! objects (including stream bodies), and — in `xref` — the cross-reference
//! table/stream grammar (C5).

mod object;
pub(crate) mod scanner;
mod xref;

pub use object::{array, boolean, dict, name, null, number, object, reference, string, ws0};
pub use xref::{brute_force_recover, xref_and_trailer};

use std::collections::HashSet;

use nom::bytes::complete::{tag, take, take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{map_res, opt};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use nom_locate::LocatedSpan;

use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError};
use crate::object::{Object, ObjectId, Stream};
use crate::reader::Reader;
use crate::Result;

/// A byte span tagged with a short label identifying which grammar rule is
/// being parsed, purely for diagnostics.
pub type ParserInput<'a> = LocatedSpan<&'a [u8], &'static str>;

fn version_digits(input: ParserInput) -> IResult<ParserInput, String> {
    let (input, major) = digit1(input)?;
    let (input, _) = char('.')(input)?;
    let (input, minor) = digit1(input)?;
    let text = format!(
        "{}.{}",
        std::str::from_utf8(major.fragment()).unwrap_or("1"),
        std::str::from_utf8(minor.fragment()).unwrap_or("7")
    );
    Ok((input, text))
}

/// Scans the first 1 KiB for `%PDF-X.Y`. Garbage before the marker is
/// tolerated by the caller (it already trimmed to the first `%PDF-`
/// occurrence); an unparsable version defaults to `"1.7"` by the caller in
/// lenient mode.
pub fn header(input: ParserInput) -> Option<String> {
    let window_len = input.fragment().len().min(1024);
    let window = ParserInput::new_extra(&input.fragment()[..window_len], input.extra);
    let parsed = preceded(tag(b"%PDF-".as_slice()), version_digits)(window);
    parsed.ok().map(|(_, version)| version)
}

/// The four-byte "binary content" comment on the line after the header,
/// required so naive line-oriented tools treat the file as binary.
pub fn binary_mark(input: ParserInput) -> Option<Vec<u8>> {
    let parsed: IResult<ParserInput, ParserInput> = preceded(char('%'), take(4usize))(input);
    parsed.ok().map(|(_, mark)| mark.fragment().to_vec())
}

/// Parses the integer following a located `startxref` keyword.
pub fn xref_start(input: ParserInput) -> Option<i64> {
    let parser = tuple((tag(b"startxref".as_slice()), take_while(is_eol_or_space), digit1));
    let parsed: IResult<ParserInput, _> = parser(input);
    parsed
        .ok()
        .and_then(|(_, (_, _, digits))| std::str::from_utf8(digits.fragment()).ok()?.parse().ok())
}

fn is_eol_or_space(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn keyword<'a>(input: ParserInput<'a>, word: &'static str) -> IResult<ParserInput<'a>, ParserInput<'a>> {
    preceded(ws0_fn, tag(word.as_bytes()))(input)
}

fn ws0_fn(input: ParserInput) -> IResult<ParserInput, ()> {
    ws0(input)
}

/// Parse one complete indirect object — `N G obj ... endobj`, including a
/// stream body when present — starting at `offset` within `input`'s
/// underlying buffer. `reader` is consulted only when a stream's `/Length`
/// is itself an indirect reference (one level of synchronous lookahead, per
/// §4.6); pass `None` when parsing a standalone byte range (e.g. the raw
/// bytes of one already-located object).
pub fn indirect_object(
    input: ParserInput, offset: usize, expected_id: Option<ObjectId>, reader: &Reader, already_seen: &mut HashSet<ObjectId>,
) -> Result<(ObjectId, Object)> {
    let _ = already_seen;
    let bytes = *input.fragment();
    if offset > bytes.len() {
        return Err(Error::InvalidOffset(offset));
    }
    let tail = ParserInput::new_extra(&bytes[offset..], input.extra);

    let (tail, _) = ws0(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;
    let (tail, obj_num) = digit1(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;
    let (tail, _) =
        take_while1(is_eol_or_space)(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;
    let (tail, gen) = digit1(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;
    let (tail, _) = keyword(tail, "obj").map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;

    let obj_num: u32 = std::str::from_utf8(obj_num.fragment())
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::InvalidObject)?;
    let gen: u16 = std::str::from_utf8(gen.fragment())
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError::InvalidObject)?;
    let id = (obj_num, gen);
    if let Some(expected) = expected_id {
        if expected != id {
            log::warn!("xref pointed at object {expected:?} but found {id:?} on disk");
        }
    }

    let (tail, value) = object(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;

    let (tail, is_stream) = opt(|i| keyword(i, "stream"))(tail).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;

    if is_stream.is_none() {
        return Ok((id, value));
    }

    let Object::Dictionary(dict) = value else {
        return Err(ParseError::InvalidStream.into());
    };

    // Exactly one CR, one LF, or CRLF follows the `stream` keyword.
    let after_keyword_offset = bytes.len() - tail.fragment().len();
    let mut body_start = after_keyword_offset;
    match bytes.get(body_start) {
        Some(b'\r') => {
            body_start += 1;
            if bytes.get(body_start) == Some(&b'\n') {
                body_start += 1;
            }
        }
        Some(b'\n') => body_start += 1,
        _ => {}
    }

    let length = resolve_stream_length(&dict, reader);
    let (content_end, needs_endstream_skip) = match length {
        Some(len) if body_start + len <= bytes.len() => (body_start + len, true),
        _ => {
            let found = find_subsequence(&bytes[body_start..], b"endstream")
                .map(|pos| body_start + pos)
                .unwrap_or(bytes.len());
            log::warn!(
                "stream {id:?} has an unresolvable /Length; recovered length by scanning for endstream ({} bytes)",
                found.saturating_sub(body_start)
            );
            (found, false)
        }
    };
    let content_end = content_end.min(bytes.len());
    let content = bytes[body_start..content_end].to_vec();

    if needs_endstream_skip {
        let rest = &bytes[content_end..];
        let rest = strip_leading_eol(rest);
        if !rest.starts_with(b"endstream") {
            log::warn!("stream {id:?} did not end at endstream after reading declared /Length bytes");
        }
    }
    let stream = Stream::from_parsed(dict, content, body_start);

    Ok((id, Object::Stream(stream)))
}

fn resolve_stream_length(dict: &Dictionary, reader: &Reader) -> Option<usize> {
    match dict.get(b"Length") {
        Ok(Object::Number(n)) if *n >= 0.0 => Some(*n as usize),
        Ok(Object::Reference(length_ref)) => reader.peek_integer_object(*length_ref).map(|n| n.max(0) as usize),
        _ => None,
    }
}

fn strip_leading_eol(bytes: &[u8]) -> &[u8] {
    match bytes {
        [b'\r', b'\n', rest @ ..] => rest,
        [b'\r', rest @ ..] | [b'\n', rest @ ..] => rest,
        other => other,
    }
}

pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// A tiny wrapper so `map_res` error types line up without pulling in a
/// dedicated nom error type for the whole crate.
pub(crate) fn parse_i64(input: ParserInput) -> IResult<ParserInput, i64> {
    map_res(digit1, |span: ParserInput| {
        std::str::from_utf8(span.fragment()).unwrap_or("0").parse::<i64>()
    })(input)
}
