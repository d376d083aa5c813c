use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{eof, map_res, value};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;
use std::result;
use std::str::{self, FromStr};

use super::error::ErrorKind;
use super::types::{Index, ListEntry, Stat};

type ParseResult<T> = result::Result<T, ErrorKind>;

/// `+OK` or `-ERR`, followed by whitespace or the end of the line.
fn status_indicator(input: &str) -> IResult<&str, bool> {
    terminated(
        alt((value(true, tag("+OK")), value(false, tag("-ERR")))),
        alt((space1, eof)),
    )(input)
}

fn number<T: FromStr>(input: &str) -> IResult<&str, T> {
    map_res(digit1, |digits: &str| digits.parse::<T>())(input)
}

/// Two whitespace-separated numbers. Anything after the second one is ignored, as long as it is
/// separated from it by whitespace.
fn numeric_pair(input: &str) -> IResult<&str, (Index, u64)> {
    terminated(
        tuple((preceded(space0, number::<Index>), preceded(space1, number::<u64>))),
        alt((space1, eof)),
    )(input)
}

/// Classifies a status line, returning the text after `+OK`.
pub fn parse_status(line: &str) -> ParseResult<&str> {
    match status_indicator(line) {
        Ok((text, true)) => Ok(text),
        Ok((text, false)) => Err(ErrorKind::Rejected(text.to_string())),
        Err(_) => Err(ErrorKind::Format(line.to_string())),
    }
}

pub fn parse_stat(text: &str) -> ParseResult<Stat> {
    match numeric_pair(text) {
        Ok((_, (count, size))) => Ok(Stat { count, size }),
        Err(_) => Err(ErrorKind::Format(text.to_string())),
    }
}

pub fn parse_list_entry(text: &str) -> ParseResult<ListEntry> {
    match numeric_pair(text) {
        Ok((_, (index, size))) => Ok(ListEntry { index, size }),
        Err(_) => Err(ErrorKind::Format(text.to_string())),
    }
}

/// Parses the body of a `LIST` without argument into message sizes.
///
/// The n-th line must describe message n. The first line that does not is returned as the error,
/// and nothing else is kept.
pub fn parse_listing(lines: &[Vec<u8>]) -> ParseResult<Vec<u64>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line = str::from_utf8(line)
                .map_err(|_| ErrorKind::Format(String::from_utf8_lossy(line).into_owned()))?;
            let entry = parse_list_entry(line)?;
            if entry.index as usize != i + 1 {
                return Err(ErrorKind::Format(line.to_string()));
            }
            Ok(entry.size)
        })
        .collect()
}

/// Undoes byte-stuffing on a single line of a multi-line response.
pub fn unstuff(line: &[u8]) -> &[u8] {
    line.strip_prefix(b".").unwrap_or(line)
}
