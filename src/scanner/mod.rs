//! Token scanner
//!
//! Walks a text left to right and classifies every macro occurrence allowed
//! by a [`MacroTypes`] descriptor. Disabled families and undeclared names are
//! left as plain text; scanning never fails.
//!
//! ```ignore
//! let types = MacroTypes::new().with_macros(&[MacroGroup::Host]);
//! let scan = scan("Host: {HOST.HOST}", &types);
//! assert_eq!(scan.occurrences()[0].start, 6);
//! ```

pub mod item_key;
mod parsers;
pub mod token;
pub mod types;

pub use item_key::{ItemKey, KeyParam};
pub use token::{
    FunctionalMacro, HostField, HostMacro, HostRef, InterfaceField, InterfaceMacro, ItemField,
    ItemMacro, MacroContext, MacroOccurrence, MacroScan, MacroToken, UserMacro,
};
pub use types::{MacroGroup, MacroTypes};

use nom::combinator::all_consuming;

/// Scan `text` for the macro families enabled in `types`
pub fn scan(text: &str, types: &MacroTypes) -> MacroScan {
    let mut occurrences = Vec::new();
    if types.is_empty() {
        return MacroScan::from_occurrences(occurrences);
    }

    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let Some(offset) = rest.find(['{', '$']) else {
            break;
        };
        pos += offset;
        let rest = &text[pos..];

        match parsers::next_token(rest, types) {
            Some((len, token)) => {
                occurrences.push(MacroOccurrence {
                    token,
                    text: rest[..len].to_string(),
                    start: pos,
                });
                pos += len;
            }
            // '{' and '$' are single byte
            None => pos += 1,
        }
    }

    MacroScan::from_occurrences(occurrences)
}

/// Parse a complete user macro, e.g. `{$PORT:"eth0"}`
pub fn parse_user_macro(text: &str) -> Option<UserMacro> {
    all_consuming(parsers::user_macro)(text)
        .ok()
        .map(|(_, m)| m)
}

/// Parse a user macro definition name; unlike [`parse_user_macro`] this
/// accepts `{$NAME:regex:"pattern"}`
pub fn parse_user_macro_definition(text: &str) -> Option<UserMacro> {
    all_consuming(parsers::user_macro_definition)(text)
        .ok()
        .map(|(_, m)| m)
}
