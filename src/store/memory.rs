//! In-memory store
//!
//! Serves a [`Snapshot`] of the configuration graph. Used by the CLI, by tests
//! and by embedders that already hold their configuration in memory. Every
//! query is counted per [`QueryKind`] so batching can be observed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use monitor_types::{
    Function, FunctionId, FunctionName, Graph, GraphId, Host, HostId, Interface, Item, ItemId,
    Trigger, TriggerId, UserMacroDef, ValueMap, ValueMapId,
};

use super::{
    ConfigStore, HistoryStore, HostItem, UserMacroRequests, UserMacroResolver, UserMacroValues,
};
use crate::error::StoreError;
use crate::scanner::{parse_user_macro_definition, MacroContext, UserMacro};

/// One historical value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub item_id: ItemId,
    pub clock: i64,
    pub value: f64,
}

/// Serializable configuration graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub hosts: Vec<Host>,
    pub interfaces: Vec<Interface>,
    pub items: Vec<Item>,
    pub functions: Vec<Function>,
    pub triggers: Vec<Trigger>,
    pub graphs: Vec<Graph>,
    pub value_maps: Vec<ValueMap>,
    pub user_macros: Vec<UserMacroDef>,
    pub history: Vec<HistoryPoint>,
    /// Reference time for aggregate windows; wall clock when absent
    pub now: Option<i64>,
}

impl Snapshot {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse snapshot YAML")
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {:?}", path))
    }
}

/// Store operation, for query accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKind {
    Hosts,
    Interfaces,
    Items,
    ItemsByHostKey,
    Functions,
    Triggers,
    Graphs,
    ValueMaps,
    History,
    UserMacros,
}

/// Macro definitions of one owner for one macro name
#[derive(Debug, Default)]
struct MacroDefs {
    value: Option<String>,
    contexts: HashMap<String, String>,
    /// Sorted by pattern
    regex: Vec<(String, String)>,
}

impl MacroDefs {
    fn push(&mut self, parsed: UserMacro, value: String) {
        match parsed.context {
            None => self.value = Some(value),
            Some(MacroContext::Text(ctx)) => {
                self.contexts.insert(ctx, value);
            }
            Some(MacroContext::Regex(pattern)) => {
                let at = self
                    .regex
                    .binary_search_by(|(p, _)| p.as_str().cmp(&pattern))
                    .unwrap_or_else(|at| at);
                self.regex.insert(at, (pattern, value));
            }
        }
    }

    /// Context or regex match for `context`
    fn matching(&self, context: &str) -> Option<&str> {
        if let Some(value) = self.contexts.get(context) {
            return Some(value);
        }
        self.regex.iter().find_map(|(pattern, value)| match Regex::new(pattern) {
            Ok(re) if re.is_match(context) => Some(value.as_str()),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring invalid macro regex '{}': {}", pattern, e);
                None
            }
        })
    }
}

/// Lookup outcome while walking owners
#[derive(Debug, Default)]
struct Lookup {
    value: Option<String>,
    /// Base value kept as a fallback for context macros
    value_default: Option<String>,
}

impl Lookup {
    /// Apply one owner's definitions. Returns true when resolved.
    fn apply(&mut self, defs: &MacroDefs, context: Option<&str>) -> bool {
        if let Some(ctx) = context {
            if let Some(value) = defs.matching(ctx) {
                self.value = Some(value.to_string());
                return true;
            }
        }
        if let Some(base) = &defs.value {
            if context.is_none() {
                self.value = Some(base.clone());
                return true;
            }
            if self.value_default.is_none() {
                self.value_default = Some(base.clone());
            }
        }
        false
    }

    fn finish(self) -> Option<String> {
        self.value.or(self.value_default)
    }
}

/// [`ConfigStore`], [`HistoryStore`] and [`UserMacroResolver`] over a snapshot
#[derive(Debug)]
pub struct InMemoryStore {
    snapshot: Snapshot,
    /// Owner (None = global) -> macro name -> definitions
    macros: HashMap<Option<HostId>, HashMap<String, MacroDefs>>,
    queries: Mutex<BTreeMap<QueryKind, usize>>,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        let mut macros: HashMap<Option<HostId>, HashMap<String, MacroDefs>> = HashMap::new();
        for def in &snapshot.user_macros {
            let Some(parsed) = parse_user_macro_definition(&def.macro_name) else {
                debug!("Skipping unparsable user macro definition '{}'", def.macro_name);
                continue;
            };
            macros
                .entry(def.host_id)
                .or_default()
                .entry(parsed.name.clone())
                .or_default()
                .push(parsed, def.display_value().to_string());
        }

        Self {
            snapshot,
            macros,
            queries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(Self::new(Snapshot::from_yaml_str(content)?))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        Ok(Self::new(Snapshot::from_yaml_file(path)?))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Number of queries of one kind since creation or the last reset
    pub fn query_count(&self, kind: QueryKind) -> usize {
        self.lock_queries().get(&kind).copied().unwrap_or(0)
    }

    /// Total number of queries
    pub fn total_queries(&self) -> usize {
        self.lock_queries().values().sum()
    }

    pub fn reset_query_counts(&self) {
        self.lock_queries().clear();
    }

    fn lock_queries(&self) -> std::sync::MutexGuard<'_, BTreeMap<QueryKind, usize>> {
        self.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, kind: QueryKind) {
        *self.lock_queries().entry(kind).or_insert(0) += 1;
    }

    fn now(&self) -> i64 {
        self.snapshot
            .now
            .unwrap_or_else(|| chrono::Utc::now().timestamp())
    }

    fn templates_of(&self, host_id: HostId) -> &[HostId] {
        self.snapshot
            .hosts
            .iter()
            .find(|h| h.id == host_id)
            .map(|h| h.templates.as_slice())
            .unwrap_or(&[])
    }

    /// Walk hosts, then their templates level by level (ids ascending within
    /// a level), then global macros
    fn lookup_user_macro(&self, host_ids: &[HostId], wanted: &UserMacro) -> Option<String> {
        let context = wanted.text_context();
        let mut lookup = Lookup::default();

        let mut level: BTreeSet<HostId> = host_ids.iter().copied().collect();
        let mut seen: BTreeSet<HostId> = BTreeSet::new();
        while !level.is_empty() {
            for host_id in &level {
                let defs = self
                    .macros
                    .get(&Some(*host_id))
                    .and_then(|by_name| by_name.get(&wanted.name));
                if let Some(defs) = defs {
                    if lookup.apply(defs, context) {
                        return lookup.finish();
                    }
                }
            }
            seen.extend(level.iter().copied());
            level = level
                .iter()
                .flat_map(|host_id| self.templates_of(*host_id).iter().copied())
                .filter(|template_id| !seen.contains(template_id))
                .collect();
        }

        if let Some(defs) = self.macros.get(&None).and_then(|g| g.get(&wanted.name)) {
            lookup.apply(defs, context);
        }
        lookup.finish()
    }
}

fn by_id<T: Clone, K: Ord>(rows: &[T], ids: &BTreeSet<K>, key: impl Fn(&T) -> &K) -> Vec<T> {
    rows.iter()
        .filter(|row| ids.contains(key(row)))
        .cloned()
        .collect()
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn hosts(&self, ids: &BTreeSet<HostId>) -> Result<Vec<Host>, StoreError> {
        self.record(QueryKind::Hosts);
        Ok(by_id(&self.snapshot.hosts, ids, |h| &h.id))
    }

    async fn interfaces(&self, host_ids: &BTreeSet<HostId>) -> Result<Vec<Interface>, StoreError> {
        self.record(QueryKind::Interfaces);
        Ok(by_id(&self.snapshot.interfaces, host_ids, |i| &i.host_id))
    }

    async fn items(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<Item>, StoreError> {
        self.record(QueryKind::Items);
        Ok(by_id(&self.snapshot.items, ids, |i| &i.id))
    }

    async fn items_by_host_key(
        &self,
        keys: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Vec<HostItem>, StoreError> {
        self.record(QueryKind::ItemsByHostKey);
        let mut found = Vec::new();
        for host in &self.snapshot.hosts {
            let Some(wanted) = keys.get(&host.host) else {
                continue;
            };
            for item in &self.snapshot.items {
                if item.host_id == host.id && wanted.contains(&item.key) {
                    found.push(HostItem {
                        host: host.clone(),
                        item: item.clone(),
                    });
                }
            }
        }
        Ok(found)
    }

    async fn functions(&self, ids: &BTreeSet<FunctionId>) -> Result<Vec<Function>, StoreError> {
        self.record(QueryKind::Functions);
        Ok(by_id(&self.snapshot.functions, ids, |f| &f.id))
    }

    async fn triggers(&self, ids: &BTreeSet<TriggerId>) -> Result<Vec<Trigger>, StoreError> {
        self.record(QueryKind::Triggers);
        Ok(by_id(&self.snapshot.triggers, ids, |t| &t.id))
    }

    async fn graphs(&self, ids: &BTreeSet<GraphId>) -> Result<Vec<Graph>, StoreError> {
        self.record(QueryKind::Graphs);
        Ok(by_id(&self.snapshot.graphs, ids, |g| &g.id))
    }

    async fn value_maps(&self, ids: &BTreeSet<ValueMapId>) -> Result<Vec<ValueMap>, StoreError> {
        self.record(QueryKind::ValueMaps);
        Ok(by_id(&self.snapshot.value_maps, ids, |m| &m.id))
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn get_aggregate(
        &self,
        item: &Item,
        function: FunctionName,
        window: u64,
    ) -> Result<Option<f64>, StoreError> {
        self.record(QueryKind::History);

        let now = self.now();
        let from = now.saturating_sub(i64::try_from(window).unwrap_or(i64::MAX));
        let values: Vec<f64> = self
            .snapshot
            .history
            .iter()
            .filter(|p| p.item_id == item.id && p.clock >= from && p.clock <= now)
            .map(|p| p.value)
            .collect();

        if values.is_empty() {
            return Ok(None);
        }

        let aggregate = match function {
            FunctionName::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            FunctionName::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            FunctionName::Avg => values.iter().sum::<f64>() / values.len() as f64,
            FunctionName::Sum => values.iter().sum(),
            FunctionName::Count => values.len() as f64,
            FunctionName::Last => {
                let latest = self
                    .snapshot
                    .history
                    .iter()
                    .filter(|p| p.item_id == item.id && p.clock >= from && p.clock <= now)
                    .max_by_key(|p| p.clock)
                    .map(|p| p.value);
                return Ok(latest);
            }
        };
        Ok(Some(aggregate))
    }
}

#[async_trait]
impl UserMacroResolver for InMemoryStore {
    async fn resolve_user_macros(
        &self,
        requests: &UserMacroRequests,
    ) -> Result<UserMacroValues, StoreError> {
        self.record(QueryKind::UserMacros);

        let mut resolved = UserMacroValues::new();
        for (key, request) in requests {
            let values = resolved.entry(*key).or_default();
            for (text, wanted) in &request.macros {
                match self.lookup_user_macro(&request.host_ids, wanted) {
                    Some(value) => {
                        values.insert(text.clone(), value);
                    }
                    None => debug!("User macro {} is not defined for entity {}", text, key),
                }
            }
        }
        Ok(resolved)
    }
}
