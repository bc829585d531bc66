//! Monitor Types - Level 1 Foundation Types
//!
//! Pure data structures describing the monitoring configuration graph that
//! macro resolution reads from:
//!
//! ```text
//! Host ──┬── Interface (agent / SNMP / JMX / IPMI)
//!        └── Item ── Function ── Trigger
//!                 └─ Graph (ordered items)
//! ```
//!
//! ## Critical Rules
//!
//! 1. **NO BUSINESS LOGIC** - Only data structures and trivial accessors
//! 2. **NO WORKSPACE DEPENDENCIES** - The resolver depends on this crate, never the reverse
//! 3. **SERIALIZABLE** - Every type round-trips through serde (YAML snapshots, JSON output)
//!
//! Entities are read-only from the resolver's point of view. They are loaded
//! per request and dropped when the resolve call returns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// SENTINELS
// ============================================================================

/// Substituted whenever a macro cannot be resolved.
///
/// This is a stable contract: callers and tests compare against it.
pub const UNRESOLVED_MACRO_STRING: &str = "*UNKNOWN*";

/// Substituted for `{functionid}` placeholders that no longer point at a
/// readable function when a trigger expression is expanded.
pub const EXPRESSION_ERROR_STRING: &str = "*ERROR*";

/// Displayed instead of the value of a secret user macro.
pub const SECRET_MASK: &str = "******";

// ============================================================================
// IDENTIFIERS
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Host (or template) identifier
    HostId
);
entity_id!(
    /// Host interface identifier
    InterfaceId
);
entity_id!(
    /// Item identifier
    ItemId
);
entity_id!(
    /// Trigger function identifier, referenced as `{<functionid>}` in expressions
    FunctionId
);
entity_id!(
    /// Trigger identifier
    TriggerId
);
entity_id!(
    /// Graph identifier
    GraphId
);
entity_id!(
    /// Value map identifier
    ValueMapId
);

/// Returned by `FromStr` implementations when the text names no variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// HOSTS AND INTERFACES
// ============================================================================

/// A monitored host or a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    /// Technical name, used in functional macros and `{HOST.HOST}`
    pub host: String,
    /// Visible name, used by `{HOST.NAME}`
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Linked templates, walked when inheriting user macros
    #[serde(default)]
    pub templates: Vec<HostId>,
}

/// Interface kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Agent,
    Snmp,
    Ipmi,
    Jmx,
}

impl InterfaceType {
    /// All types, highest priority first
    pub const BY_PRIORITY: [InterfaceType; 4] = [
        InterfaceType::Agent,
        InterfaceType::Snmp,
        InterfaceType::Jmx,
        InterfaceType::Ipmi,
    ];

    /// Priority used when a macro does not name an interface type.
    ///
    /// Agent > SNMP > JMX > IPMI. Note that this order differs from the
    /// declaration order of the variants.
    pub fn priority(self) -> u8 {
        match self {
            InterfaceType::Agent => 4,
            InterfaceType::Snmp => 3,
            InterfaceType::Jmx => 2,
            InterfaceType::Ipmi => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InterfaceType::Agent => "agent",
            InterfaceType::Snmp => "snmp",
            InterfaceType::Ipmi => "ipmi",
            InterfaceType::Jmx => "jmx",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterfaceType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(InterfaceType::Agent),
            "snmp" => Ok(InterfaceType::Snmp),
            "ipmi" => Ok(InterfaceType::Ipmi),
            "jmx" => Ok(InterfaceType::Jmx),
            other => Err(UnknownVariant {
                kind: "interface type",
                value: other.to_string(),
            }),
        }
    }
}

/// A host interface.
///
/// At most one interface per (host, type) pair carries `main = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    pub host_id: HostId,
    #[serde(rename = "type")]
    pub kind: InterfaceType,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub dns: String,
    #[serde(default)]
    pub port: String,
    /// Selects which of ip/dns is the connection address
    #[serde(default = "default_true")]
    pub use_ip: bool,
    #[serde(default = "default_true")]
    pub main: bool,
}

impl Interface {
    /// Connection address: the ip when `use_ip` is set, the dns name otherwise
    pub fn connection(&self) -> &str {
        if self.use_ip {
            &self.ip
        } else {
            &self.dns
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// ITEMS, FUNCTIONS, TRIGGERS, GRAPHS
// ============================================================================

/// Item value type, governs formatting of `last` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Float,
    Unsigned,
    String,
    Text,
    Log,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Float | ValueType::Unsigned)
    }
}

/// A monitored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub host_id: HostId,
    #[serde(default)]
    pub interface_id: Option<InterfaceId>,
    #[serde(default)]
    pub name: String,
    /// Item key, unique per host, e.g. `net.if.in[eth0,bytes]`
    pub key: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub value_map_id: Option<ValueMapId>,
    #[serde(default)]
    pub last_value: Option<String>,
    /// Unix time of the last received value, 0 when none was ever received
    #[serde(default)]
    pub last_clock: i64,
}

impl Item {
    /// Whether the item has ever received a value
    pub fn has_value(&self) -> bool {
        self.last_clock > 0 && self.last_value.is_some()
    }
}

/// Trigger function name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionName {
    Last,
    Min,
    Max,
    Avg,
    Sum,
    Count,
}

impl FunctionName {
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionName::Last => "last",
            FunctionName::Min => "min",
            FunctionName::Max => "max",
            FunctionName::Avg => "avg",
            FunctionName::Sum => "sum",
            FunctionName::Count => "count",
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionName {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last" => Ok(FunctionName::Last),
            "min" => Ok(FunctionName::Min),
            "max" => Ok(FunctionName::Max),
            "avg" => Ok(FunctionName::Avg),
            "sum" => Ok(FunctionName::Sum),
            "count" => Ok(FunctionName::Count),
            other => Err(UnknownVariant {
                kind: "function",
                value: other.to_string(),
            }),
        }
    }
}

/// A function call inside a trigger expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub trigger_id: TriggerId,
    pub item_id: ItemId,
    pub function: FunctionName,
    #[serde(default)]
    pub parameter: String,
}

/// A trigger. `expression` references functions as `{<functionid>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub expression: String,
    /// Trigger name
    pub description: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub recovery_expression: Option<String>,
}

/// A graph; item order defines the positional hosts of `{HOST.HOST<n>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ItemId>,
}

// ============================================================================
// VALUE MAPS AND USER MACROS
// ============================================================================

/// One `value -> new value` mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMapping {
    pub value: String,
    pub new_value: String,
}

/// Value map applied when formatting item values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMap {
    pub id: ValueMapId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<ValueMapping>,
}

impl ValueMap {
    /// First mapping whose value matches exactly
    pub fn lookup(&self, value: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| m.value == value)
            .map(|m| m.new_value.as_str())
    }
}

/// A user macro definition as stored: `{$NAME}`, `{$NAME:context}` or
/// `{$NAME:regex:"pattern"}`, owned by a host/template or global when
/// `host_id` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMacroDef {
    #[serde(default)]
    pub host_id: Option<HostId>,
    #[serde(rename = "macro")]
    pub macro_name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub secret: bool,
}

impl UserMacroDef {
    /// Value as it may be displayed
    pub fn display_value(&self) -> &str {
        if self.secret {
            SECRET_MASK
        } else {
            &self.value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_priority_order() {
        let mut types = vec![
            InterfaceType::Ipmi,
            InterfaceType::Agent,
            InterfaceType::Jmx,
            InterfaceType::Snmp,
        ];
        types.sort_by_key(|t| std::cmp::Reverse(t.priority()));
        assert_eq!(types, InterfaceType::BY_PRIORITY.to_vec());
    }

    #[test]
    fn test_interface_connection() {
        let mut iface: Interface = serde_yaml::from_str(
            r#"
id: 1
host_id: 10
type: snmp
ip: 10.0.0.1
dns: router.local
port: "161"
"#,
        )
        .unwrap();
        assert!(iface.main);
        assert_eq!(iface.connection(), "10.0.0.1");

        iface.use_ip = false;
        assert_eq!(iface.connection(), "router.local");
    }

    #[test]
    fn test_item_has_value_requires_clock() {
        let item: Item = serde_yaml::from_str(
            r#"
id: 5
host_id: 10
key: agent.ping
value_type: unsigned
last_value: "1"
"#,
        )
        .unwrap();
        assert!(!item.has_value());
    }

    #[test]
    fn test_function_name_parse() {
        assert_eq!("avg".parse::<FunctionName>(), Ok(FunctionName::Avg));
        let err = "nodata".parse::<FunctionName>().unwrap_err();
        assert_eq!(err.to_string(), "unknown function 'nodata'");
    }

    #[test]
    fn test_secret_macro_is_masked() {
        let def = UserMacroDef {
            host_id: None,
            macro_name: "{$PASSWORD}".to_string(),
            value: "hunter2".to_string(),
            secret: true,
        };
        assert_eq!(def.display_value(), SECRET_MASK);
    }
}
