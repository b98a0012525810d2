//! C4: the lexer/low-level parser. Tokenises and parses the eight value
//! types plus indirect references, using `nom` over the `ParserInput` span
//! so callers can report a byte position on failure.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1, take_while_m_n};
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::IResult;

use super::ParserInput;
use crate::dictionary::Dictionary;
use crate::object::{Array, Object, StringFormat};

pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn fragment<'a>(input: ParserInput<'a>) -> &'a [u8] {
    input.fragment()
}

/// Whitespace and `%...` comments, zero or more.
pub fn ws0(mut input: ParserInput) -> IResult<ParserInput, ()> {
    loop {
        let (rest, _) = take_while(is_whitespace)(input)?;
        input = rest;
        if fragment(input).first() == Some(&b'%') {
            let (rest, _) = take_while(|b| b != b'\n' && b != b'\r')(input)?;
            input = rest;
        } else {
            return Ok((input, ()));
        }
    }
}

fn lexeme<'a, O>(
    mut inner: impl FnMut(ParserInput<'a>) -> IResult<ParserInput<'a>, O>,
) -> impl FnMut(ParserInput<'a>) -> IResult<ParserInput<'a>, O> {
    move |input| {
        let (input, _) = ws0(input)?;
        inner(input)
    }
}

pub fn null(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(value(Object::Null, tag(b"null".as_slice())))(input)
}

pub fn boolean(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(alt((
        value(Object::Boolean(true), tag(b"true".as_slice())),
        value(Object::Boolean(false), tag(b"false".as_slice())),
    )))(input)
}

pub fn number(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(map_res(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                recognize(pair(digit1, opt(pair(char('.'), take_while(|b: u8| b.is_ascii_digit()))))),
                recognize(pair(char('.'), digit1)),
            )),
        )),
        |span: ParserInput| {
            std::str::from_utf8(fragment(span))
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .map(Object::Number)
                .ok_or(crate::error::ParseError::InvalidNumber)
        },
    ))(input)
}

fn hex_escape(input: ParserInput) -> IResult<ParserInput, u8> {
    let (input, _) = char('#')(input)?;
    let (input, digits) = take_while_m_n(2, 2, |b: u8| b.is_ascii_hexdigit())(input)?;
    let value = u8::from_str_radix(std::str::from_utf8(fragment(digits)).unwrap(), 16).unwrap_or(b'?');
    Ok((input, value))
}

pub fn name(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input| {
        let (input, _) = char('/')(input)?;
        let (mut input, _) = take_while(|_| false)(input)?; // no-op, keeps types aligned
        let mut bytes = Vec::new();
        loop {
            let head = fragment(input).first().copied();
            match head {
                Some(b'#') => {
                    if let Ok((rest, byte)) = hex_escape(input) {
                        bytes.push(byte);
                        input = rest;
                        continue;
                    }
                    break;
                }
                Some(b) if is_regular(b) => {
                    bytes.push(b);
                    let (rest, _) = take_while_m_n(1, 1, |_| true)(input)?;
                    input = rest;
                }
                _ => break,
            }
        }
        Ok((input, Object::name(String::from_utf8_lossy(&bytes))))
    })(input)
}

fn literal_string(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input: ParserInput| {
        let (mut input, _) = char('(')(input)?;
        let mut depth = 1usize;
        let mut bytes = Vec::new();
        loop {
            let Some(&byte) = fragment(input).first() else {
                break;
            };
            let (rest, _) = take_while_m_n(1, 1, |_| true)(input)?;
            input = rest;
            match byte {
                b'(' => {
                    depth += 1;
                    if depth > crate::reader::MAX_BRACKET {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            input,
                            nom::error::ErrorKind::TooLarge,
                        )));
                    }
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\\' => {
                    let Some(&escaped) = fragment(input).first() else {
                        break;
                    };
                    let (rest, _) = take_while_m_n(1, 1, |_| true)(input)?;
                    input = rest;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0C),
                        b'(' => bytes.push(b'('),
                        b')' => bytes.push(b')'),
                        b'\\' => bytes.push(b'\\'),
                        b'\r' => {
                            // line continuation; also swallow a following \n (CRLF)
                            if fragment(input).first() == Some(&b'\n') {
                                let (rest, _) = take_while_m_n(1, 1, |_| true)(input)?;
                                input = rest;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut octal = vec![escaped];
                            for _ in 0..2 {
                                match fragment(input).first() {
                                    Some(&b @ b'0'..=b'7') => {
                                        octal.push(b);
                                        let (rest, _) = take_while_m_n(1, 1, |_| true)(input)?;
                                        input = rest;
                                    }
                                    _ => break,
                                }
                            }
                            let text = std::str::from_utf8(&octal).unwrap_or("0");
                            let value = u16::from_str_radix(text, 8).unwrap_or(0) as u8;
                            bytes.push(value);
                        }
                        other => bytes.push(other),
                    }
                }
                other => bytes.push(other),
            }
        }
        Ok((input, Object::String(bytes, StringFormat::Literal)))
    })(input)
}

fn hex_string(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input: ParserInput| {
        let (input, digits) = delimited(
            char('<'),
            take_while(|b: u8| b.is_ascii_hexdigit() || is_whitespace(b)),
            char('>'),
        )(input)?;
        let mut hex: Vec<u8> = fragment(digits).iter().copied().filter(|b| !is_whitespace(*b)).collect();
        if hex.len() % 2 == 1 {
            hex.push(b'0');
        }
        let bytes = hex
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap_or("0"), 16).unwrap_or(0))
            .collect();
        Ok((input, Object::String(bytes, StringFormat::Hexadecimal)))
    })(input)
}

pub fn string(input: ParserInput) -> IResult<ParserInput, Object> {
    alt((literal_string, hex_string))(input)
}

pub fn array(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input: ParserInput| {
        let (input, items) = delimited(char('['), many0(object), preceded(ws0, char(']')))(input)?;
        Ok((input, Object::Array(Array::from_parsed(items))))
    })(input)
}

fn dict_pair(input: ParserInput) -> IResult<ParserInput, (Vec<u8>, Object)> {
    let (input, key) = name(input)?;
    let (input, value) = object(input)?;
    Ok((input, (key.as_name().unwrap_or(b"").to_vec(), value)))
}

pub fn dict(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input: ParserInput| {
        let (input, pairs) = delimited(tag(b"<<".as_slice()), many0(dict_pair), preceded(ws0, tag(b">>".as_slice())))(
            input,
        )?;
        Ok((input, Object::Dictionary(Dictionary::from_parsed(pairs))))
    })(input)
}

/// `N G obj` vs a bare number followed by another number: only a trailing
/// `R` keyword disambiguates a reference from two adjacent numbers.
pub fn reference(input: ParserInput) -> IResult<ParserInput, Object> {
    lexeme(move |input: ParserInput| {
        let (input, num) = digit1(input)?;
        let (input, _) = take_while1(is_whitespace)(input)?;
        let (input, gen) = digit1(input)?;
        let (input, _) = take_while1(is_whitespace)(input)?;
        let (input, _) = char('R')(input)?;
        let object_number: u32 = std::str::from_utf8(fragment(num)).unwrap_or("0").parse().unwrap_or(0);
        let generation: u16 = std::str::from_utf8(fragment(gen)).unwrap_or("0").parse().unwrap_or(0);
        Ok((input, Object::reference((object_number, generation))))
    })(input)
}

/// Any single value: tries the keyword/bracket forms first, a reference
/// next (it needs two tokens of lookahead), then falls back to a bare
/// number.
pub fn object(input: ParserInput) -> IResult<ParserInput, Object> {
    alt((null, boolean, dict, array, name, string, reference, number))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(bytes: &[u8]) -> ParserInput<'_> {
        ParserInput::new_extra(bytes, "test")
    }

    #[test]
    fn parses_numbers() {
        let (_, obj) = number(span(b"-12.5")).unwrap();
        assert_eq!(obj.as_f64().unwrap(), -12.5);
    }

    #[test]
    fn parses_name_with_hex_escape() {
        let (_, obj) = name(span(b"/A#20B")).unwrap();
        assert_eq!(obj.as_name().unwrap(), b"A B");
    }

    #[test]
    fn parses_reference_not_two_numbers() {
        let (rest, obj) = reference(span(b"12 0 R trailing")).unwrap();
        assert_eq!(obj.as_reference().unwrap(), (12, 0));
        assert_eq!(fragment(rest), b" trailing");
    }

    #[test]
    fn parses_nested_array_and_dict() {
        let (_, obj) = object(span(b"<< /Kids [1 0 R 2 0 R] /Count 2 >>")).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get(b"Count").unwrap().as_i64().unwrap(), 2);
        assert_eq!(dict.get(b"Kids").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn literal_string_handles_escapes_and_nesting() {
        let (_, obj) = object(span(b"(A \\(nested\\) B\\n\\101)")).unwrap();
        assert_eq!(obj.as_str().unwrap(), b"A (nested) B\nA");
    }
}
