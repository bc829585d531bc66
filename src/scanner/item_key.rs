//! Item key parser
//!
//! Grammar:
//!
//! ```text
//! key     := name [ '[' param { ',' param } ']' ]
//! name    := [0-9A-Za-z_.-]+
//! param   := ' '* ( quoted | array | unquoted ) ' '*
//! array   := '[' scalar { ',' scalar } ']'          (one level only)
//! quoted  := '"' { '\"' | any-but-'"' } '"'
//! unquoted:= { any-but-',' -and-']' }
//! ```
//!
//! Examples: `agent.ping`, `net.if.in[eth0,bytes]`,
//! `vfs.file.regexp["/var/log/app.log","err[0-9]",,"a\"b"]`,
//! `custom.key[a,[b,c]]`.

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, space0},
    combinator::{all_consuming, map, opt},
    multi::separated_list1,
    sequence::{delimited, terminated},
    IResult,
};

use super::parsers::quoted_string;

/// One item key parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyParam {
    Unquoted(String),
    /// Value with quotes removed and `\"` unescaped
    Quoted(String),
    Array(Vec<KeyParam>),
}

/// A parsed item key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub name: String,
    pub params: Vec<KeyParam>,
}

impl ItemKey {
    /// Parse a complete item key; `None` when the key is malformed
    pub fn parse(key: &str) -> Option<ItemKey> {
        all_consuming(item_key)(key).ok().map(|(_, key)| key)
    }

    /// Parameters with arrays flattened in place, quoted values unquoted
    pub fn flat_params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        flatten(&self.params, &mut out);
        out
    }

    /// N-th flattened parameter, 1-based as in `$1`
    pub fn param(&self, n: usize) -> Option<&str> {
        if n == 0 {
            return None;
        }
        self.flat_params().get(n - 1).copied()
    }
}

fn flatten<'a>(params: &'a [KeyParam], out: &mut Vec<&'a str>) {
    for param in params {
        match param {
            KeyParam::Unquoted(v) | KeyParam::Quoted(v) => out.push(v),
            KeyParam::Array(inner) => flatten(inner, out),
        }
    }
}

pub(crate) fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

/// Item key, possibly followed by more input
pub(crate) fn item_key(input: &str) -> IResult<&str, ItemKey> {
    let (input, name) = take_while1(is_key_char)(input)?;
    let (input, params) = opt(key_params)(input)?;
    Ok((
        input,
        ItemKey {
            name: name.to_string(),
            params: params.unwrap_or_default(),
        },
    ))
}

/// `[p1,p2,...]` only, used when the key name is already consumed
pub(crate) fn key_params(input: &str) -> IResult<&str, Vec<KeyParam>> {
    delimited(char('['), separated_list1(char(','), top_param), char(']'))(input)
}

fn top_param(input: &str) -> IResult<&str, KeyParam> {
    let (input, _) = space0(input)?;
    if input.starts_with('[') {
        terminated(map(array_param, KeyParam::Array), space0)(input)
    } else {
        scalar_param(input)
    }
}

fn array_param(input: &str) -> IResult<&str, Vec<KeyParam>> {
    delimited(char('['), separated_list1(char(','), array_element), char(']'))(input)
}

fn array_element(input: &str) -> IResult<&str, KeyParam> {
    let (input, _) = space0(input)?;
    if input.starts_with('[') {
        // Arrays do not nest.
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    scalar_param(input)
}

fn scalar_param(input: &str) -> IResult<&str, KeyParam> {
    if input.starts_with('"') {
        terminated(map(quoted_string, KeyParam::Quoted), space0)(input)
    } else {
        map(take_while(|c: char| c != ',' && c != ']'), |s: &str| {
            KeyParam::Unquoted(s.to_string())
        })(input)
    }
}
