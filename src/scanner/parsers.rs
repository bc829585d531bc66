//! nom parsers for the individual macro families
//!
//! Every parser works on the remaining input at the current scan position and
//! returns the classified token; the scanner derives the matched length from
//! what is left over.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, one_of, space0},
    combinator::{map, map_opt, opt, recognize},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use monitor_types::{FunctionId, FunctionName};

use super::item_key::{is_key_char, key_params};
use super::token::{
    FunctionalMacro, HostField, HostMacro, HostRef, InterfaceField, InterfaceMacro, ItemField,
    ItemMacro, MacroContext, MacroToken, UserMacro,
};
use super::types::MacroTypes;

// ============================================================================
// Shared pieces
// ============================================================================

fn fail<T>(input: &str) -> IResult<&str, T> {
    Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)))
}

fn is_macro_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '.'
}

/// Double-quoted string; only `\"` is an escape, other backslashes are kept.
/// The closing quote must be present.
pub(crate) fn quoted_string(input: &str) -> IResult<&str, String> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], out)),
            '\\' if rest[i + 1..].starts_with('"') => {
                out.push('"');
                chars.next();
            }
            other => out.push(other),
        }
    }
    fail(input)
}

fn position_digit(input: &str) -> IResult<&str, usize> {
    map(one_of("123456789"), |d| d as usize - '0' as usize)(input)
}

// ============================================================================
// Simple and numbered macros: {HOST.HOST}, {HOST.IP2}
// ============================================================================

fn builtin_token(name: &str, index: usize) -> Option<MacroToken> {
    let host = |field| Some(MacroToken::Host(HostMacro { field, index }));
    let interface = |field| Some(MacroToken::Interface(InterfaceMacro { field, index }));
    let item = |field| Some(MacroToken::Item(ItemMacro { field, index }));

    match name {
        "HOSTNAME" | "HOST.HOST" => host(HostField::Host),
        "HOST.NAME" => host(HostField::Name),
        "HOST.ID" => host(HostField::Id),
        "HOST.DESCRIPTION" => host(HostField::Description),
        "IPADDRESS" | "HOST.IP" => interface(InterfaceField::Ip),
        "HOST.DNS" => interface(InterfaceField::Dns),
        "HOST.CONN" => interface(InterfaceField::Conn),
        "HOST.PORT" => interface(InterfaceField::Port),
        "ITEM.LASTVALUE" => item(ItemField::LastValue),
        "ITEM.VALUE" => item(ItemField::Value),
        "TRIGGER.ID" => Some(MacroToken::TriggerId),
        _ => None,
    }
}

fn classify_simple(name: &str, types: &MacroTypes) -> Option<MacroToken> {
    if types.plain_group(name).is_some() || types.numbered_group(name).is_some() {
        return builtin_token(name, 0);
    }

    let digit = name.chars().last()?;
    if !('1'..='9').contains(&digit) {
        return None;
    }
    let base = &name[..name.len() - 1];
    types.numbered_group(base)?;
    builtin_token(base, digit as usize - '0' as usize)
}

pub(crate) fn simple_macro<'a>(
    input: &'a str,
    types: &MacroTypes,
) -> IResult<&'a str, MacroToken> {
    map_opt(
        delimited(char('{'), take_while1(is_macro_name_char), char('}')),
        |name| classify_simple(name, types),
    )(input)
}

// ============================================================================
// User macros: {$NAME}, {$NAME:context}, {$NAME:"context"}
// ============================================================================

fn unquoted_context(input: &str) -> IResult<&str, String> {
    map(take_while(|c: char| c != '}'), |s: &str| s.to_string())(input)
}

fn text_context(input: &str) -> IResult<&str, MacroContext> {
    let (input, _) = space0(input)?;
    if input.starts_with('"') {
        map(terminated(quoted_string, space0), MacroContext::Text)(input)
    } else {
        map(unquoted_context, MacroContext::Text)(input)
    }
}

fn regex_context(input: &str) -> IResult<&str, MacroContext> {
    let (input, _) = preceded(space0, tag("regex:"))(input)?;
    let (input, _) = space0(input)?;
    if input.starts_with('"') {
        map(terminated(quoted_string, space0), MacroContext::Regex)(input)
    } else {
        map(unquoted_context, MacroContext::Regex)(input)
    }
}

fn user_macro_with(input: &str, allow_regex: bool) -> IResult<&str, UserMacro> {
    let (input, name) = preceded(tag("{$"), take_while1(is_macro_name_char))(input)?;
    let (input, context) = if allow_regex {
        opt(preceded(char(':'), alt((regex_context, text_context))))(input)?
    } else {
        opt(preceded(char(':'), text_context))(input)?
    };
    let (input, _) = char('}')(input)?;
    Ok((
        input,
        UserMacro {
            name: name.to_string(),
            context,
        },
    ))
}

/// User macro as it appears in resolvable text; regex contexts are not
/// recognised here
pub(crate) fn user_macro(input: &str) -> IResult<&str, UserMacro> {
    user_macro_with(input, false)
}

/// User macro as written in a macro definition, where `regex:` is allowed
pub(crate) fn user_macro_definition(input: &str) -> IResult<&str, UserMacro> {
    user_macro_with(input, true)
}

// ============================================================================
// Functional macros: {host:key.func(param)}
// ============================================================================

fn positional_host(input: &str) -> IResult<&str, HostRef> {
    map(
        delimited(
            pair(char('{'), alt((tag("HOST.HOST"), tag("HOSTNAME")))),
            opt(position_digit),
            char('}'),
        ),
        |index| HostRef::Positional(index.unwrap_or(0)),
    )(input)
}

fn literal_host(input: &str) -> IResult<&str, HostRef> {
    map(
        take_while1(|c: char| {
            c.is_ascii_alphanumeric() || c == '.' || c == ' ' || c == '_' || c == '-'
        }),
        |s: &str| HostRef::Literal(s.to_string()),
    )(input)
}

/// Key and function name. For keys without parameters the function is the
/// segment after the last dot of `key.func`.
fn key_and_function(input: &str) -> IResult<&str, (String, FunctionName)> {
    let (after_name, name) = take_while1(is_key_char)(input)?;

    if after_name.starts_with('[') {
        let (rest, params) = recognize(key_params)(after_name)?;
        let (rest, func) =
            preceded(char('.'), take_while1(|c: char| c.is_ascii_lowercase()))(rest)?;
        return match func.parse::<FunctionName>() {
            Ok(function) => Ok((rest, (format!("{name}{params}"), function))),
            Err(_) => fail(input),
        };
    }

    match name.rfind('.') {
        Some(dot) if dot > 0 => match name[dot + 1..].parse::<FunctionName>() {
            Ok(function) => Ok((after_name, (name[..dot].to_string(), function))),
            Err(_) => fail(input),
        },
        _ => fail(input),
    }
}

fn function_parameter(input: &str) -> IResult<&str, &str> {
    recognize(opt(pair(digit1, opt(one_of("smhdw")))))(input)
}

pub(crate) fn functional_macro(input: &str) -> IResult<&str, FunctionalMacro> {
    let (input, _) = char('{')(input)?;
    let (input, host) = alt((positional_host, literal_host))(input)?;
    let (input, _) = char(':')(input)?;
    let (input, (key, function)) = key_and_function(input)?;
    let (input, parameter) = delimited(char('('), function_parameter, char(')'))(input)?;
    let (input, _) = char('}')(input)?;
    Ok((
        input,
        FunctionalMacro {
            host,
            key,
            function,
            parameter: parameter.to_string(),
        },
    ))
}

// ============================================================================
// References, function ids, LLD macros
// ============================================================================

pub(crate) fn reference(input: &str) -> IResult<&str, u8> {
    map(preceded(char('$'), position_digit), |d| d as u8)(input)
}

pub(crate) fn function_id(input: &str) -> IResult<&str, FunctionId> {
    map_opt(delimited(char('{'), digit1, char('}')), |digits: &str| {
        digits.parse::<u64>().ok().map(FunctionId)
    })(input)
}

pub(crate) fn lld_macro(input: &str) -> IResult<&str, String> {
    map(
        delimited(tag("{#"), take_while1(is_macro_name_char), char('}')),
        |name: &str| name.to_string(),
    )(input)
}

// ============================================================================
// Dispatch
// ============================================================================

/// Try every enabled family at the start of `input`.
///
/// Returns the matched byte length and the token.
pub(crate) fn next_token(input: &str, types: &MacroTypes) -> Option<(usize, MacroToken)> {
    let matched = |rest: &str| input.len() - rest.len();

    if input.starts_with('$') {
        if types.references {
            if let Ok((rest, n)) = reference(input) {
                return Some((matched(rest), MacroToken::Reference(n)));
            }
        }
        return None;
    }

    if !input.starts_with('{') {
        return None;
    }

    if types.usermacros {
        if let Ok((rest, m)) = user_macro(input) {
            return Some((matched(rest), MacroToken::User(m)));
        }
    }
    if types.has_simple_macros() {
        if let Ok((rest, token)) = simple_macro(input, types) {
            return Some((matched(rest), token));
        }
    }
    if types.functional {
        if let Ok((rest, m)) = functional_macro(input) {
            return Some((matched(rest), MacroToken::Functional(m)));
        }
    }
    if types.functionids {
        if let Ok((rest, id)) = function_id(input) {
            return Some((matched(rest), MacroToken::FunctionId(id)));
        }
    }
    if types.lldmacros {
        if let Ok((rest, name)) = lld_macro(input) {
            return Some((matched(rest), MacroToken::Lld(name)));
        }
    }
    None
}
