//! Macro resolver
//!
//! Entry point of the crate. A resolve call runs strictly in order:
//!
//! ```text
//! scenario lookup -> scan every text -> collect ids across the batch
//!   -> hosts -> interfaces -> items / functions -> user macros -> rewrite
//! ```
//!
//! Each store is hit at most once per entity kind for the whole batch.
//! Interface addresses that contain macros themselves are expanded by one
//! nested resolve call with the `host-interface-ip-dns-agent-primary`
//! scenario; nesting never goes deeper than that.

mod context;
mod expression;
mod functional;
mod graph;
mod host_texts;
mod interfaces;
mod items;
mod trigger_texts;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use monitor_types::UNRESOLVED_MACRO_STRING;

use crate::error::{ResolveError, Result};
use crate::fetch::Fetcher;
use crate::registry::{Handler, ScenarioConfig, ScenarioRegistry};
use crate::rewrite::{fragments, rewrite, Fragment};
use crate::scanner::MacroToken;
use crate::store::{
    AllowAll, ConfigStore, HistoryStore, UserMacroRequest, UserMacroRequests, UserMacroResolver,
    Visibility,
};

use context::{Ctx, Depth, Partial, Scanned};

/// Scenario used to expand macros inside interface ip/dns fields
pub const INTERFACE_ADDRESS_SCENARIO: &str = "host-interface-ip-dns-agent-primary";

/// Scenario used to expand item keys before `$N` lookups in item names
pub const ITEM_KEY_SCENARIO: &str = "item-key";

/// The texts of one entity: a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Texts {
    One(String),
    Many(Vec<String>),
}

impl Texts {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Texts::One(text) => std::slice::from_ref(text),
            Texts::Many(texts) => texts,
        }
    }

    /// Same shape, every text passed through `f`
    pub fn map(&self, mut f: impl FnMut(usize, &str) -> String) -> Texts {
        match self {
            Texts::One(text) => Texts::One(f(0, text)),
            Texts::Many(texts) => Texts::Many(
                texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| f(i, text))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Texts {
    fn from(text: &str) -> Self {
        Texts::One(text.to_string())
    }
}

impl From<String> for Texts {
    fn from(text: String) -> Self {
        Texts::One(text)
    }
}

impl From<Vec<String>> for Texts {
    fn from(texts: Vec<String>) -> Self {
        Texts::Many(texts)
    }
}

/// Entity key (host, trigger, graph or item id, per scenario) -> texts
pub type TextBatch = BTreeMap<u64, Texts>;

/// Resolves macros in batches of texts
#[derive(Clone)]
pub struct MacroResolver {
    store: Arc<dyn ConfigStore>,
    history: Arc<dyn HistoryStore>,
    user_macros: Arc<dyn UserMacroResolver>,
    visibility: Arc<dyn Visibility>,
    registry: Arc<ScenarioRegistry>,
}

impl MacroResolver {
    /// Resolver over explicit collaborators, with every entity visible and
    /// the built-in scenarios
    pub fn new(
        store: Arc<dyn ConfigStore>,
        history: Arc<dyn HistoryStore>,
        user_macros: Arc<dyn UserMacroResolver>,
    ) -> Self {
        Self {
            store,
            history,
            user_macros,
            visibility: Arc::new(AllowAll),
            registry: Arc::new(ScenarioRegistry::builtin()),
        }
    }

    /// Resolver over one store implementing every collaborator
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ConfigStore + HistoryStore + UserMacroResolver + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_visibility(mut self, visibility: Arc<dyn Visibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_registry(mut self, registry: ScenarioRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub(crate) fn fetcher(&self) -> Fetcher<'_> {
        Fetcher::new(self.store.as_ref(), self.visibility.as_ref())
    }

    pub(crate) fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    /// Resolve every text of `data` with the named scenario.
    ///
    /// The output has the same keys and shape as the input. Unknown
    /// scenarios are an error; unresolvable macros are not.
    pub async fn resolve(&self, scenario: &str, data: TextBatch) -> Result<TextBatch> {
        self.resolve_at(scenario, data, Depth::Top).await
    }

    /// Like [`resolve`](Self::resolve), but returns literal and macro
    /// fragments for each text instead of flat strings
    pub async fn resolve_fragments(
        &self,
        scenario: &str,
        data: &TextBatch,
    ) -> Result<BTreeMap<u64, Vec<Vec<Fragment>>>> {
        let (scanned, values) = self.compute(scenario, data, Depth::Top).await?;
        let empty = HashMap::new();

        Ok(data
            .iter()
            .map(|(key, texts)| {
                let values = values.get(key).unwrap_or(&empty);
                let pieces = texts
                    .as_slice()
                    .iter()
                    .zip(scanned.scans(*key))
                    .map(|(text, scan)| fragments(text, scan, values))
                    .collect();
                (*key, pieces)
            })
            .collect())
    }

    /// Resolve the scenario's `source` field inside JSON records.
    ///
    /// Records without a string `source` field are returned unchanged.
    pub async fn resolve_records(
        &self,
        scenario: &str,
        mut records: BTreeMap<u64, serde_json::Value>,
    ) -> Result<BTreeMap<u64, serde_json::Value>> {
        let config = self.registry.require(scenario)?;
        let source = config
            .source
            .clone()
            .ok_or_else(|| ResolveError::MissingSource(scenario.to_string()))?;

        let batch: TextBatch = records
            .iter()
            .filter_map(|(key, record)| {
                record
                    .get(&source)
                    .and_then(|v| v.as_str())
                    .map(|text| (*key, Texts::from(text)))
            })
            .collect();

        for (key, texts) in self.resolve(scenario, batch).await? {
            if let (Some(record), Texts::One(text)) = (records.get_mut(&key), texts) {
                record[source.as_str()] = serde_json::Value::String(text);
            }
        }
        Ok(records)
    }

    async fn resolve_at(&self, scenario: &str, data: TextBatch, depth: Depth) -> Result<TextBatch> {
        let (scanned, values) = self.compute(scenario, &data, depth).await?;
        let empty = HashMap::new();

        Ok(data
            .into_iter()
            .map(|(key, texts)| {
                let values = values.get(&key).unwrap_or(&empty);
                let scans = scanned.scans(key);
                let resolved = texts.map(|i, text| match scans.get(i) {
                    Some(scan) => rewrite(text, scan, values),
                    None => text.to_string(),
                });
                (key, resolved)
            })
            .collect())
    }

    /// Nested resolve call; boxed to break the async recursion
    pub(crate) fn resolve_nested<'a>(
        &'a self,
        scenario: &'a str,
        data: TextBatch,
    ) -> BoxFuture<'a, Result<TextBatch>> {
        Box::pin(self.resolve_at(scenario, data, Depth::Nested))
    }

    async fn compute(
        &self,
        name: &str,
        data: &TextBatch,
        depth: Depth,
    ) -> Result<(Scanned, BTreeMap<u64, HashMap<String, String>>)> {
        let scenario: &ScenarioConfig = self.registry.require(name)?;
        let scanned = Scanned::new(data, &scenario.macro_types());
        if scanned.is_empty() {
            return Ok((scanned, BTreeMap::new()));
        }

        let ctx = Ctx {
            resolver: self,
            scenario,
            scanned: &scanned,
            depth,
        };

        let mut partial = match scenario.handler {
            Handler::HostTexts => host_texts::resolve(&ctx).await?,
            Handler::TriggerTexts => trigger_texts::resolve(&ctx).await?,
            Handler::GraphTexts => graph::resolve(&ctx).await?,
            Handler::TriggerExpression => expression::resolve(&ctx).await?,
            Handler::ItemName => items::resolve_names(&ctx).await?,
            Handler::ItemKey => items::resolve_keys(&ctx).await?,
        };

        self.apply_user_macros(&scanned, &mut partial).await?;
        fill_unresolved(&scanned, &mut partial);

        Ok((scanned, partial.values))
    }

    async fn apply_user_macros(&self, scanned: &Scanned, partial: &mut Partial) -> Result<()> {
        let mut requests = UserMacroRequests::new();
        for (key, text, token) in scanned.macros() {
            if let MacroToken::User(wanted) = token {
                requests
                    .entry(key)
                    .or_insert_with(|| UserMacroRequest {
                        host_ids: partial.user_hosts.get(&key).cloned().unwrap_or_default(),
                        macros: BTreeMap::new(),
                    })
                    .macros
                    .insert(text.to_string(), wanted.clone());
            }
        }
        if requests.is_empty() {
            return Ok(());
        }

        for (key, values) in self.user_macros.resolve_user_macros(&requests).await? {
            for (text, value) in values {
                partial.set(key, &text, value);
            }
        }
        Ok(())
    }
}

/// Every token without a value becomes the sentinel, except user macros
/// (kept literal) and LLD macros (never resolved)
fn fill_unresolved(scanned: &Scanned, partial: &mut Partial) {
    let mut misses: BTreeSet<(u64, &str)> = BTreeSet::new();
    for (key, text, token) in scanned.macros() {
        if matches!(token, MacroToken::User(_) | MacroToken::Lld(_)) {
            continue;
        }
        if !partial.has(key, text) {
            misses.insert((key, text));
        }
    }
    for (key, text) in misses {
        debug!("Macro {} unresolved for entity {}", text, key);
        partial.set(key, text, UNRESOLVED_MACRO_STRING.to_string());
    }
}
