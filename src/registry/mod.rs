//! Scenario registry
//!
//! Maps scenario names to their [`ScenarioConfig`]. The built-in table can be
//! extended (or overridden) with YAML files, each holding a map of
//! `scenario name -> config`:
//!
//! ```yaml
//! proxy-address:
//!   families: [host, agent-interface, user]
//!   handler: host-texts
//! ```
//!
//! Adding a scenario never requires new handler code; a file naming a family
//! its handler cannot resolve is rejected.

mod builtin;
pub mod loader;
mod scenario;

pub use builtin::builtin_scenarios;
pub use loader::RegistryLoader;
pub use scenario::{Handler, InterfaceMode, MacroFamily, ScenarioConfig};

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::ResolveError;

/// Registry of resolution scenarios
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: HashMap<String, ScenarioConfig>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            scenarios: HashMap::new(),
        }
    }

    /// Registry holding the built-in scenarios
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for scenario in builtin_scenarios() {
            registry.scenarios.insert(scenario.name.clone(), scenario);
        }
        registry
    }

    /// Built-ins plus every scenario found under `dir` (recursive)
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        registry.extend_from_dir(dir)?;
        Ok(registry)
    }

    /// Add scenarios from YAML files under `dir`; later files override
    /// earlier entries with the same name
    pub fn extend_from_dir(&mut self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            warn!("Scenario directory does not exist: {:?}", dir);
            return Ok(());
        }

        let before = self.scenarios.len();
        self.load_dir_recursive(dir)?;

        info!(
            "Scenario registry has {} scenarios ({} before loading {:?})",
            self.scenarios.len(),
            before,
            dir
        );
        Ok(())
    }

    fn load_dir_recursive(&mut self, dir: &Path) -> Result<()> {
        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {:?}", dir))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Deterministic override order
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.load_dir_recursive(&path)?;
            } else if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                match self.load_file(&path) {
                    Ok(count) => debug!("Loaded {} scenarios from {:?}", count, path),
                    Err(e) => warn!("Failed to load scenarios from {:?}: {:#}", path, e),
                }
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let scenarios: HashMap<String, ScenarioConfig> = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        let mut count = 0;
        for (name, mut scenario) in scenarios {
            scenario.name = name;
            match self.register(scenario) {
                Ok(()) => count += 1,
                Err(e) => warn!("Skipping scenario in {:?}: {}", path, e),
            }
        }

        Ok(count)
    }

    /// Register a scenario, replacing any previous one with the same name
    pub fn register(&mut self, scenario: ScenarioConfig) -> std::result::Result<(), ResolveError> {
        scenario.validate()?;
        if self.scenarios.contains_key(&scenario.name) {
            debug!("Overriding scenario '{}'", scenario.name);
        }
        self.scenarios.insert(scenario.name.clone(), scenario);
        Ok(())
    }

    /// Get a scenario by name
    pub fn get(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.get(name)
    }

    /// Get a scenario, or the caller error for an unknown name
    pub fn require(&self, name: &str) -> std::result::Result<&ScenarioConfig, ResolveError> {
        self.get(name)
            .ok_or_else(|| ResolveError::UnknownScenario(name.to_string()))
    }

    /// Scenario names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scenarios.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ScenarioRegistry::builtin();
        let scenario = registry.get("screen-element-url").unwrap();
        assert_eq!(scenario.source.as_deref(), Some("url"));
        assert_eq!(scenario.handler, Handler::HostTexts);
        assert!(registry.get("nope").is_none());
        assert!(matches!(
            registry.require("nope"),
            Err(ResolveError::UnknownScenario(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_register_validates() {
        let mut registry = ScenarioRegistry::empty();
        let bad = ScenarioConfig::new("bad", Handler::GraphTexts, &[MacroFamily::Host]);
        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());

        let good = ScenarioConfig::new("good", Handler::GraphTexts, &[MacroFamily::User]);
        registry.register(good).unwrap();
        assert_eq!(registry.names(), vec!["good"]);
    }

    #[test]
    fn test_missing_dir_keeps_builtins() {
        let registry =
            ScenarioRegistry::load_from_dir(Path::new("/nonexistent/scenarios")).unwrap();
        assert_eq!(registry.len(), builtin_scenarios().len());
    }
}
