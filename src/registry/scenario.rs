//! Scenario definitions
//!
//! A scenario names the macro families live in one kind of user-authored
//! text, the handler that knows how to look those families up and, for
//! record-shaped inputs, the field holding the text.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ResolveError;
use crate::scanner::{MacroGroup, MacroTypes};

/// A family of macros a scenario may enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroFamily {
    /// `{HOSTNAME}`, `{HOST.HOST}`, `{HOST.NAME}`
    Host,
    /// `{HOST.ID}`
    HostId,
    /// `{HOST.DESCRIPTION}`
    HostDescription,
    /// `{HOST.IP}` and friends, from the main agent interface only
    AgentInterface,
    /// `{HOST.IP}` and friends, from the highest priority main interface
    InterfaceWithoutPort,
    /// `{HOST.HOST<n>}`, `{HOST.NAME<n>}`
    HostN,
    /// `{HOST.ID<n>}`
    HostIdN,
    /// `{HOST.IP<n>}` .. `{HOST.PORT<n>}`
    InterfaceN,
    /// `{ITEM.LASTVALUE<n>}`, `{ITEM.VALUE<n>}`
    ItemN,
    /// `{TRIGGER.ID}`
    TriggerId,
    /// `$1`..`$9`
    References,
    /// `{$NAME}`, `{$NAME:context}`
    User,
    /// `{12345}`
    FunctionIds,
    /// `{host:key.func(param)}`
    FunctionalItem,
    /// `{#NAME}`, recognised and kept verbatim
    Lld,
}

impl MacroFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            MacroFamily::Host => "host",
            MacroFamily::HostId => "host-id",
            MacroFamily::HostDescription => "host-description",
            MacroFamily::AgentInterface => "agent-interface",
            MacroFamily::InterfaceWithoutPort => "interface-without-port",
            MacroFamily::HostN => "host-n",
            MacroFamily::HostIdN => "host-id-n",
            MacroFamily::InterfaceN => "interface-n",
            MacroFamily::ItemN => "item-n",
            MacroFamily::TriggerId => "trigger-id",
            MacroFamily::References => "references",
            MacroFamily::User => "user",
            MacroFamily::FunctionIds => "function-ids",
            MacroFamily::FunctionalItem => "functional-item",
            MacroFamily::Lld => "lld",
        }
    }
}

impl fmt::Display for MacroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup strategy used to compute the values of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handler {
    /// Texts keyed by host id
    HostTexts,
    /// Texts keyed by trigger id; numbered macros follow the expression
    TriggerTexts,
    /// Texts keyed by graph id; positional hosts follow graph item order
    GraphTexts,
    /// Trigger expressions keyed by trigger id
    TriggerExpression,
    /// Item names keyed by item id
    ItemName,
    /// Item keys keyed by item id
    ItemKey,
}

impl Handler {
    pub fn as_str(self) -> &'static str {
        match self {
            Handler::HostTexts => "host-texts",
            Handler::TriggerTexts => "trigger-texts",
            Handler::GraphTexts => "graph-texts",
            Handler::TriggerExpression => "trigger-expression",
            Handler::ItemName => "item-name",
            Handler::ItemKey => "item-key",
        }
    }

    /// Whether this handler has the context to resolve `family`
    pub fn supports(self, family: MacroFamily) -> bool {
        use MacroFamily::*;

        match family {
            User | Lld => true,
            Host | HostId | HostDescription | AgentInterface | InterfaceWithoutPort => {
                matches!(self, Handler::HostTexts | Handler::ItemKey)
            }
            HostN | HostIdN | InterfaceN | ItemN | TriggerId => self == Handler::TriggerTexts,
            References => matches!(self, Handler::TriggerTexts | Handler::ItemName),
            FunctionIds => self == Handler::TriggerExpression,
            FunctionalItem => matches!(
                self,
                Handler::HostTexts | Handler::TriggerTexts | Handler::GraphTexts
            ),
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the host interface behind `{HOST.IP}`-style macros is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceMode {
    /// Main agent interface only
    AgentPrimary,
    /// Main interface of the highest priority type
    Priority,
}

/// One resolution scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Filled from the map key when loaded from YAML
    #[serde(default)]
    pub name: String,
    pub families: Vec<MacroFamily>,
    /// Field holding the text when resolving records
    #[serde(default)]
    pub source: Option<String>,
    pub handler: Handler,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, handler: Handler, families: &[MacroFamily]) -> Self {
        Self {
            name: name.into(),
            families: families.to_vec(),
            source: None,
            handler,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn has(&self, family: MacroFamily) -> bool {
        self.families.contains(&family)
    }

    /// Scanner descriptor for the enabled families
    pub fn macro_types(&self) -> MacroTypes {
        let mut types = MacroTypes::new();
        for family in &self.families {
            types = match family {
                MacroFamily::Host => types.with_macros(&[MacroGroup::Host]),
                MacroFamily::HostId => types.with_macros(&[MacroGroup::HostId]),
                MacroFamily::HostDescription => types.with_macros(&[MacroGroup::HostDescription]),
                MacroFamily::AgentInterface | MacroFamily::InterfaceWithoutPort => {
                    types.with_macros(&[MacroGroup::Interface])
                }
                MacroFamily::HostN => types.with_macros_n(&[MacroGroup::Host]),
                MacroFamily::HostIdN => types.with_macros_n(&[MacroGroup::HostId]),
                MacroFamily::InterfaceN => {
                    types.with_macros_n(&[MacroGroup::Interface, MacroGroup::InterfacePort])
                }
                MacroFamily::ItemN => types.with_macros_n(&[MacroGroup::Item]),
                MacroFamily::TriggerId => types.with_macros(&[MacroGroup::Trigger]),
                MacroFamily::References => types.with_references(),
                MacroFamily::User => types.with_usermacros(),
                MacroFamily::FunctionIds => types.with_functionids(),
                MacroFamily::FunctionalItem => types.with_functional(),
                MacroFamily::Lld => types.with_lldmacros(),
            };
        }
        types
    }

    pub fn interface_mode(&self) -> InterfaceMode {
        if self.has(MacroFamily::AgentInterface) {
            InterfaceMode::AgentPrimary
        } else {
            InterfaceMode::Priority
        }
    }

    /// Reject families the handler cannot resolve
    pub fn validate(&self) -> Result<(), ResolveError> {
        match self
            .families
            .iter()
            .find(|family| !self.handler.supports(**family))
        {
            Some(family) => Err(ResolveError::UnsupportedFamily {
                scenario: self.name.clone(),
                family: *family,
                handler: self.handler,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_types_for_trigger_names() {
        let scenario = ScenarioConfig::new(
            "trigger-name",
            Handler::TriggerTexts,
            &[
                MacroFamily::HostN,
                MacroFamily::InterfaceN,
                MacroFamily::References,
                MacroFamily::User,
            ],
        );
        let types = scenario.macro_types();

        assert_eq!(
            types.macros_n,
            vec![
                MacroGroup::Host,
                MacroGroup::Interface,
                MacroGroup::InterfacePort
            ]
        );
        assert!(types.macros.is_empty());
        assert!(types.references);
        assert!(types.usermacros);
        assert!(!types.functional);
    }

    #[test]
    fn test_interface_mode() {
        let agent = ScenarioConfig::new(
            "a",
            Handler::HostTexts,
            &[MacroFamily::AgentInterface],
        );
        assert_eq!(agent.interface_mode(), InterfaceMode::AgentPrimary);

        let priority = ScenarioConfig::new(
            "b",
            Handler::HostTexts,
            &[MacroFamily::InterfaceWithoutPort],
        );
        assert_eq!(priority.interface_mode(), InterfaceMode::Priority);
    }

    #[test]
    fn test_validate_rejects_unsupported_family() {
        let scenario = ScenarioConfig::new(
            "broken",
            Handler::ItemName,
            &[MacroFamily::User, MacroFamily::HostN],
        );
        let err = scenario.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Scenario 'broken' enables family 'host-n' which handler 'item-name' cannot resolve"
        );
    }

    #[test]
    fn test_yaml_shape() {
        let scenario: ScenarioConfig = serde_yaml::from_str(
            r#"
families: [host, interface-without-port, user]
source: url
handler: host-texts
"#,
        )
        .unwrap();
        assert_eq!(scenario.source.as_deref(), Some("url"));
        assert!(scenario.has(MacroFamily::InterfaceWithoutPort));
        assert!(scenario.validate().is_ok());
    }
}
