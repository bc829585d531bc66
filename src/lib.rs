//! Macro Resolver - batch macro expansion for monitoring configuration
//!
//! Expands `{HOST.HOST}`, `{HOST.IP}`, `{$USER_MACRO}`, `$1`,
//! `{host:key.func(param)}` and friends inside user-authored strings
//! (trigger names, graph names, map labels, item keys ...) against a
//! configuration graph of hosts, interfaces, items, triggers and graphs.
//!
//! ## Call chain
//! Scenario -> Scanner -> Fetcher (one query per entity kind) -> Value
//! resolver -> Rewriter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use macro_resolver::{InMemoryStore, MacroResolver, TextBatch, Texts};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryStore::from_yaml_file(Path::new("snapshot.yaml"))?);
//! let resolver = MacroResolver::from_store(store);
//!
//! let mut batch = TextBatch::new();
//! batch.insert(10084, Texts::from("Host: {HOST.HOST}, IP: {HOST.IP}"));
//! let resolved = resolver.resolve("host-interface-ip-dns", batch).await?;
//! println!("{:?}", resolved[&10084]);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Macro grammar and token scanning
pub mod expression;
pub mod scanner;
pub mod time_window;

// Scenario table
pub mod registry;

// Collaborator seams and their implementations
pub mod fetch;
pub mod store;

// Value formatting and rewriting
pub mod rewrite;
pub mod value;

// Resolve pipeline
pub mod resolver;

// Public re-exports
pub use error::{ResolveError, Result, StoreError};
pub use registry::{Handler, MacroFamily, RegistryLoader, ScenarioConfig, ScenarioRegistry};
pub use resolver::{MacroResolver, TextBatch, Texts};
pub use rewrite::Fragment;
pub use scanner::{scan, MacroScan, MacroToken, MacroTypes};
pub use store::{
    AllowAll, ConfigStore, HistoryStore, InMemoryStore, QueryKind, Snapshot, UserMacroResolver,
    Visibility,
};

#[cfg(feature = "database")]
pub use store::PgConfigStore;

pub use monitor_types::{EXPRESSION_ERROR_STRING, SECRET_MASK, UNRESOLVED_MACRO_STRING};
