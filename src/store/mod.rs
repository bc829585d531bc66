//! Collaborator seams
//!
//! The resolver never talks to a database directly. It is handed:
//!
//! - a [`ConfigStore`] for the configuration graph, queried in batches
//!   (one call per entity kind per resolve call),
//! - a [`HistoryStore`] for aggregates over past values,
//! - a [`UserMacroResolver`] that applies user macro inheritance,
//! - a [`Visibility`] predicate that hides hosts and items from the caller.
//!
//! [`InMemoryStore`] implements the first three over a YAML snapshot;
//! `PgConfigStore` (feature `database`) implements [`ConfigStore`] with sqlx.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::{InMemoryStore, QueryKind, Snapshot};
#[cfg(feature = "database")]
pub use postgres::PgConfigStore;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use monitor_types::{
    Function, FunctionId, FunctionName, Graph, GraphId, Host, HostId, Interface, Item, ItemId,
    Trigger, TriggerId, ValueMap, ValueMapId,
};

use crate::error::StoreError;
use crate::scanner::UserMacro;

/// An item found by `(technical host name, key)`
#[derive(Debug, Clone, PartialEq)]
pub struct HostItem {
    pub host: Host,
    pub item: Item,
}

/// Batched read access to the configuration graph.
///
/// Every method takes the full id set for the current resolve call. Ids that
/// do not exist are silently absent from the result.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn hosts(&self, ids: &BTreeSet<HostId>) -> Result<Vec<Host>, StoreError>;

    /// All interfaces of the given hosts; selection happens in the caller
    async fn interfaces(&self, host_ids: &BTreeSet<HostId>) -> Result<Vec<Interface>, StoreError>;

    async fn items(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<Item>, StoreError>;

    /// Items by technical host name and key: `host -> {key, ..}`
    async fn items_by_host_key(
        &self,
        keys: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Vec<HostItem>, StoreError>;

    async fn functions(&self, ids: &BTreeSet<FunctionId>) -> Result<Vec<Function>, StoreError>;

    async fn triggers(&self, ids: &BTreeSet<TriggerId>) -> Result<Vec<Trigger>, StoreError>;

    async fn graphs(&self, ids: &BTreeSet<GraphId>) -> Result<Vec<Graph>, StoreError>;

    async fn value_maps(&self, ids: &BTreeSet<ValueMapId>) -> Result<Vec<ValueMap>, StoreError>;
}

/// Historical values
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Aggregate of `item` over the last `window` seconds; `None` when there
    /// is no data in the window
    async fn get_aggregate(
        &self,
        item: &Item,
        function: FunctionName,
        window: u64,
    ) -> Result<Option<f64>, StoreError>;
}

/// User macros wanted for one entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserMacroRequest {
    /// Hosts whose macros (and templates' macros) apply, in priority order
    pub host_ids: Vec<HostId>,
    /// Raw macro text -> parsed macro
    pub macros: BTreeMap<String, UserMacro>,
}

/// Entity key -> request
pub type UserMacroRequests = BTreeMap<u64, UserMacroRequest>;

/// Entity key -> raw macro text -> value. Macros that could not be
/// resolved are absent.
pub type UserMacroValues = BTreeMap<u64, BTreeMap<String, String>>;

/// Resolves user macros through host, template and global definitions
#[async_trait]
pub trait UserMacroResolver: Send + Sync {
    async fn resolve_user_macros(
        &self,
        requests: &UserMacroRequests,
    ) -> Result<UserMacroValues, StoreError>;
}

/// Read permission predicate, consulted after every fetch
pub trait Visibility: Send + Sync {
    fn host_visible(&self, _host: &Host) -> bool {
        true
    }

    fn item_visible(&self, _item: &Item) -> bool {
        true
    }
}

/// Everything is visible
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Visibility for AllowAll {}
