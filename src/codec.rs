//! Text format of persisted feature records and of the feature index.
//!
//! A record is `percentage|users|groups|locales`, lists are comma separated
//! and locale entries are `name:percentage`, e.g.
//! `50|alice,bob|beta_testers|fr:20,all:0`.
//!
//! Separators are not escaped. Identities, group names and locale names must
//! not contain `|`, `,` or `:` (locale names) and must not be empty, or the
//! record will not read back as written.

use nom::{
    bytes::complete::take_till,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{opt, recognize},
    multi::separated_list0,
    sequence::{pair, preceded},
    IResult,
};

pub const FIELD_SEPARATOR: char = '|';
pub const LIST_SEPARATOR: char = ',';
pub const LOCALE_SEPARATOR: char = ':';

/// Borrowed view of a decoded record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record<'a> {
    pub percentage: i64,
    pub users: Vec<&'a str>,
    pub groups: Vec<&'a str>,
    pub locales: Vec<(&'a str, i64)>,
}

/// Splits on `sep` and drops trailing empty pieces, so `""` yields nothing
/// and `"a,,b,"` yields `["a", "", "b"]`.
pub fn split(i: &str, sep: char) -> Vec<&str> {
    let parsed: IResult<&str, Vec<&str>> =
        separated_list0(char(sep), take_till(|c: char| c == sep))(i);
    let mut parts = parsed.map(|(_, parts)| parts).unwrap_or_default();
    while parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn leading_integer(i: &str) -> IResult<&str, &str> {
    preceded(multispace0, recognize(pair(opt(one_of("+-")), digit1)))(i)
}

/// Reads a leading signed decimal, `0` when there is none. Out of range
/// values saturate.
pub fn parse_integer(i: &str) -> i64 {
    match leading_integer(i) {
        Ok((_, digits)) => digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
            i64::MIN
        } else {
            i64::MAX
        }),
        Err(_) => 0,
    }
}

fn parse_locale(entry: &str) -> (&str, i64) {
    let parts = split(entry, LOCALE_SEPARATOR);
    let name = parts.first().copied().unwrap_or("");
    let percentage = parts.get(1).map(|p| parse_integer(p)).unwrap_or(0);
    (name, percentage)
}

/// Decodes a stored record. Missing or short fields decode as empty.
pub fn decode(raw: &str) -> Record<'_> {
    let fields = split(raw, FIELD_SEPARATOR);
    let field = |n: usize| fields.get(n).copied().unwrap_or("");

    Record {
        percentage: parse_integer(field(0)),
        users: split(field(1), LIST_SEPARATOR),
        groups: split(field(2), LIST_SEPARATOR),
        locales: split(field(3), LIST_SEPARATOR)
            .into_iter()
            .filter(|entry| !entry.is_empty())
            .map(parse_locale)
            .collect(),
    }
}

pub fn encode<S: AsRef<str>>(
    percentage: i64,
    users: &[S],
    groups: &[S],
    locales: &[(S, i64)],
) -> String {
    let locales = locales
        .iter()
        .map(|(name, pct)| format!("{}{}{}", name.as_ref(), LOCALE_SEPARATOR, pct))
        .collect::<Vec<_>>();
    format!(
        "{percentage}{sep}{users}{sep}{groups}{sep}{locales}",
        sep = FIELD_SEPARATOR,
        users = join(users),
        groups = join(groups),
        locales = join(&locales),
    )
}

fn join<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| item.as_ref())
        .collect::<Vec<&str>>()
        .join(LIST_SEPARATOR.to_string().as_str())
}

pub fn decode_index(raw: &str) -> Vec<&str> {
    split(raw, LIST_SEPARATOR)
}

pub fn encode_index<S: AsRef<str>>(names: &[S]) -> String {
    join(names)
}
