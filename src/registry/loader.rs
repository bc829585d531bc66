//! Registry loader
//!
//! Locates the scenario directory and builds a [`ScenarioRegistry`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use super::ScenarioRegistry;

/// Environment variable naming the scenario directory
pub const SCENARIO_DIR_ENV: &str = "MACRO_SCENARIO_DIR";

pub struct RegistryLoader {
    scenario_dir: Option<PathBuf>,
}

impl RegistryLoader {
    pub fn new(scenario_dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario_dir: Some(scenario_dir.into()),
        }
    }

    /// Loader that only knows the built-in scenarios
    pub fn builtin_only() -> Self {
        Self { scenario_dir: None }
    }

    /// Create loader from MACRO_SCENARIO_DIR, or fall back to "config/scenarios"
    /// when that directory exists relative to the working directory
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(SCENARIO_DIR_ENV) {
            return Self::new(dir);
        }

        if Path::new("config/scenarios").is_dir() {
            return Self::new("config/scenarios");
        }

        Self::builtin_only()
    }

    pub fn scenario_dir(&self) -> Option<&Path> {
        self.scenario_dir.as_deref()
    }

    /// Build the registry
    pub fn load(&self) -> Result<ScenarioRegistry> {
        match &self.scenario_dir {
            Some(dir) => ScenarioRegistry::load_from_dir(dir),
            None => {
                info!("No scenario directory configured, using built-in scenarios");
                Ok(ScenarioRegistry::builtin())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_only_loader() {
        let loader = RegistryLoader::builtin_only();
        assert!(loader.scenario_dir().is_none());
        let registry = loader.load().unwrap();
        assert!(registry.get("graph-name").is_some());
    }
}
