//! Macro tokens
//!
//! One variant per macro family. A token is an ephemeral parse result: it is
//! never persisted and only lives for the duration of a resolve call.

use std::collections::BTreeMap;
use std::ops::Range;

use monitor_types::{FunctionId, FunctionName};
use smallvec::SmallVec;

/// Host attribute addressed by a host macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostField {
    /// `{HOST.HOST}` and the deprecated `{HOSTNAME}`
    Host,
    /// `{HOST.NAME}`
    Name,
    /// `{HOST.ID}`
    Id,
    /// `{HOST.DESCRIPTION}`
    Description,
}

/// Interface attribute addressed by an interface macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceField {
    /// `{HOST.IP}` and the deprecated `{IPADDRESS}`
    Ip,
    /// `{HOST.DNS}`
    Dns,
    /// `{HOST.CONN}`
    Conn,
    /// `{HOST.PORT}`
    Port,
}

/// Item attribute addressed by an item macro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    LastValue,
    Value,
}

/// `{HOST.*}` macro. `index` is 0 for the unnumbered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostMacro {
    pub field: HostField,
    pub index: usize,
}

/// `{HOST.IP}`-style macro. `index` is 0 for the unnumbered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceMacro {
    pub field: InterfaceField,
    pub index: usize,
}

/// `{ITEM.*}` macro. `index` is 0 for the unnumbered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemMacro {
    pub field: ItemField,
    pub index: usize,
}

/// Context of a user macro
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MacroContext {
    /// `{$NAME:value}` or `{$NAME:"value"}`
    Text(String),
    /// `{$NAME:regex:"pattern"}`, only valid in macro definitions
    Regex(String),
}

/// `{$NAME}` / `{$NAME:context}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserMacro {
    /// Name without `{$` and `}`
    pub name: String,
    pub context: Option<MacroContext>,
}

impl UserMacro {
    /// Textual context, if any
    pub fn text_context(&self) -> Option<&str> {
        match &self.context {
            Some(MacroContext::Text(ctx)) => Some(ctx),
            _ => None,
        }
    }
}

/// Host field of a functional macro
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostRef {
    /// Literal technical host name
    Literal(String),
    /// `{HOST.HOST<n>}` / `{HOSTNAME<n>}`, 0 for the unnumbered form
    Positional(usize),
}

/// `{host:key.func(param)}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionalMacro {
    pub host: HostRef,
    pub key: String,
    pub function: FunctionName,
    /// Raw parameter, `""` or digits with an optional s/m/h/d/w suffix
    pub parameter: String,
}

/// A classified macro
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MacroToken {
    Host(HostMacro),
    Interface(InterfaceMacro),
    Item(ItemMacro),
    /// `{TRIGGER.ID}`
    TriggerId,
    User(UserMacro),
    /// `$1`..`$9`
    Reference(u8),
    FunctionId(FunctionId),
    /// `{#NAME}`; recognised so it stays intact, never resolved
    Lld(String),
    Functional(FunctionalMacro),
}

impl MacroToken {
    /// Positional index of numbered macros; 0 for everything else
    pub fn index(&self) -> usize {
        match self {
            MacroToken::Host(m) => m.index,
            MacroToken::Interface(m) => m.index,
            MacroToken::Item(m) => m.index,
            _ => 0,
        }
    }
}

/// A token found in a text, with its raw text and byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroOccurrence {
    pub token: MacroToken,
    pub text: String,
    pub start: usize,
}

impl MacroOccurrence {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Result of scanning one text: occurrences in offset order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroScan {
    occurrences: Vec<MacroOccurrence>,
}

impl MacroScan {
    pub(crate) fn from_occurrences(occurrences: Vec<MacroOccurrence>) -> Self {
        Self { occurrences }
    }

    pub fn occurrences(&self) -> &[MacroOccurrence] {
        &self.occurrences
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    /// Macro text → byte offsets where it occurs
    pub fn positions(&self) -> BTreeMap<&str, SmallVec<[usize; 4]>> {
        let mut positions: BTreeMap<&str, SmallVec<[usize; 4]>> = BTreeMap::new();
        for occurrence in &self.occurrences {
            positions
                .entry(occurrence.text.as_str())
                .or_default()
                .push(occurrence.start);
        }
        positions
    }

    /// Distinct macro texts with their token
    pub fn distinct(&self) -> BTreeMap<&str, &MacroToken> {
        self.occurrences
            .iter()
            .map(|o| (o.text.as_str(), &o.token))
            .collect()
    }
}
