//! Built-in scenario table

use super::scenario::{Handler, MacroFamily, ScenarioConfig};

use MacroFamily::*;

/// Scenarios known without any configuration directory
pub fn builtin_scenarios() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig::new(
            "script-confirmation",
            Handler::HostTexts,
            &[Host, InterfaceWithoutPort, User],
        ),
        ScenarioConfig::new(
            "http-test-name",
            Handler::HostTexts,
            &[Host, InterfaceWithoutPort, User],
        ),
        ScenarioConfig::new(
            "host-interface-ip-dns",
            Handler::HostTexts,
            &[Host, AgentInterface, User],
        ),
        ScenarioConfig::new(
            "host-interface-ip-dns-agent-primary",
            Handler::HostTexts,
            &[Host, User],
        ),
        ScenarioConfig::new("host-interface-port", Handler::HostTexts, &[User]),
        ScenarioConfig::new("graph-name", Handler::GraphTexts, &[FunctionalItem])
            .with_source("name"),
        ScenarioConfig::new(
            "screen-element-url",
            Handler::HostTexts,
            &[Host, HostId, InterfaceWithoutPort, User],
        )
        .with_source("url"),
        ScenarioConfig::new("screen-element-url-user", Handler::HostTexts, &[User])
            .with_source("url"),
        ScenarioConfig::new(
            "trigger-name",
            Handler::TriggerTexts,
            &[HostN, InterfaceN, ItemN, References, User],
        )
        .with_source("description"),
        ScenarioConfig::new(
            "trigger-description",
            Handler::TriggerTexts,
            &[HostN, InterfaceN, ItemN, User],
        )
        .with_source("comments"),
        ScenarioConfig::new(
            "trigger-url",
            Handler::TriggerTexts,
            &[TriggerId, HostN, HostIdN, InterfaceN, User],
        )
        .with_source("url"),
        ScenarioConfig::new(
            "trigger-expression",
            Handler::TriggerExpression,
            &[FunctionIds, User, Lld],
        )
        .with_source("expression"),
        ScenarioConfig::new("item-name", Handler::ItemName, &[References, User])
            .with_source("name"),
        ScenarioConfig::new(
            "item-key",
            Handler::ItemKey,
            &[Host, InterfaceWithoutPort, User],
        )
        .with_source("key"),
        ScenarioConfig::new(
            "map-host-label",
            Handler::HostTexts,
            &[Host, HostDescription, InterfaceWithoutPort, FunctionalItem],
        )
        .with_source("label"),
        ScenarioConfig::new(
            "map-trigger-label",
            Handler::TriggerTexts,
            &[HostN, InterfaceN, FunctionalItem],
        )
        .with_source("label"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtins_are_valid_and_unique() {
        let scenarios = builtin_scenarios();
        let names: HashSet<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), scenarios.len());
        assert_eq!(scenarios.len(), 16);

        for scenario in &scenarios {
            assert!(scenario.validate().is_ok(), "{} is invalid", scenario.name);
        }
    }
}
