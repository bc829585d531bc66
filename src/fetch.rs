//! Batch fetcher
//!
//! Wraps a [`ConfigStore`] so every entity kind is fetched with one call per
//! resolve call, empty id sets never reach the store, and hidden hosts and
//! items are dropped right after the fetch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use monitor_types::{
    Function, FunctionId, Graph, GraphId, Host, HostId, Interface, InterfaceId, Item, ItemId,
    Trigger, TriggerId, ValueMap, ValueMapId,
};

use crate::error::Result;
use crate::registry::InterfaceMode;
use crate::store::{ConfigStore, HostItem, Visibility};

/// Configuration store plus visibility predicate
pub struct Fetcher<'a> {
    store: &'a dyn ConfigStore,
    visibility: &'a dyn Visibility,
}

fn log_misses<K: Ord + std::fmt::Display, V>(
    kind: &str,
    wanted: &BTreeSet<K>,
    found: &BTreeMap<K, V>,
) {
    for id in wanted.iter().filter(|id| !found.contains_key(id)) {
        debug!("{} {} not found or not visible", kind, id);
    }
}

impl<'a> Fetcher<'a> {
    pub fn new(store: &'a dyn ConfigStore, visibility: &'a dyn Visibility) -> Self {
        Self { store, visibility }
    }

    pub async fn hosts(&self, ids: &BTreeSet<HostId>) -> Result<BTreeMap<HostId, Host>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<HostId, Host> = self
            .store
            .hosts(ids)
            .await?
            .into_iter()
            .filter(|h| self.visibility.host_visible(h))
            .map(|h| (h.id, h))
            .collect();
        log_misses("Host", ids, &found);
        Ok(found)
    }

    /// Interfaces per host, in store order.
    ///
    /// Takes hosts already returned by [`Fetcher::hosts`], so interfaces of
    /// hidden hosts are never read. Rows of any other host are dropped.
    pub async fn interfaces<'h>(
        &self,
        hosts: impl IntoIterator<Item = &'h Host>,
    ) -> Result<BTreeMap<HostId, Vec<Interface>>> {
        let host_ids: BTreeSet<HostId> = hosts.into_iter().map(|h| h.id).collect();
        if host_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let mut by_host: BTreeMap<HostId, Vec<Interface>> = BTreeMap::new();
        for interface in self.store.interfaces(&host_ids).await? {
            if host_ids.contains(&interface.host_id) {
                by_host.entry(interface.host_id).or_default().push(interface);
            }
        }
        Ok(by_host)
    }

    pub async fn items(&self, ids: &BTreeSet<ItemId>) -> Result<BTreeMap<ItemId, Item>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<ItemId, Item> = self
            .store
            .items(ids)
            .await?
            .into_iter()
            .filter(|i| self.visibility.item_visible(i))
            .map(|i| (i.id, i))
            .collect();
        log_misses("Item", ids, &found);
        Ok(found)
    }

    /// Items by `(technical host name, key)`; both host and item must be visible
    pub async fn items_by_host_key(
        &self,
        keys: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<BTreeMap<(String, String), HostItem>> {
        if keys.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<(String, String), HostItem> = self
            .store
            .items_by_host_key(keys)
            .await?
            .into_iter()
            .filter(|hi| {
                self.visibility.host_visible(&hi.host) && self.visibility.item_visible(&hi.item)
            })
            .map(|hi| ((hi.host.host.clone(), hi.item.key.clone()), hi))
            .collect();
        for (host, wanted) in keys {
            for key in wanted {
                if !found.contains_key(&(host.clone(), key.clone())) {
                    debug!("Item {}:{} not found or not visible", host, key);
                }
            }
        }
        Ok(found)
    }

    pub async fn functions(
        &self,
        ids: &BTreeSet<FunctionId>,
    ) -> Result<BTreeMap<FunctionId, Function>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<FunctionId, Function> = self
            .store
            .functions(ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();
        log_misses("Function", ids, &found);
        Ok(found)
    }

    pub async fn triggers(
        &self,
        ids: &BTreeSet<TriggerId>,
    ) -> Result<BTreeMap<TriggerId, Trigger>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<TriggerId, Trigger> = self
            .store
            .triggers(ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        log_misses("Trigger", ids, &found);
        Ok(found)
    }

    pub async fn graphs(&self, ids: &BTreeSet<GraphId>) -> Result<BTreeMap<GraphId, Graph>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let found: BTreeMap<GraphId, Graph> = self
            .store
            .graphs(ids)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        log_misses("Graph", ids, &found);
        Ok(found)
    }

    /// Value maps referenced by the given items
    pub async fn value_maps<'i>(
        &self,
        items: impl IntoIterator<Item = &'i Item>,
    ) -> Result<BTreeMap<ValueMapId, ValueMap>> {
        let ids: BTreeSet<ValueMapId> = items.into_iter().filter_map(|i| i.value_map_id).collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .store
            .value_maps(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect())
    }
}

/// Pick the interface backing `{HOST.IP}`-style macros for one host.
///
/// `own` is the interface of an item in item-scoped contexts; it wins
/// whenever it belongs to the candidates. Otherwise only main interfaces are
/// considered: the agent one in [`InterfaceMode::AgentPrimary`], the one with
/// the highest type priority in [`InterfaceMode::Priority`].
pub fn select_interface(
    interfaces: &[Interface],
    mode: InterfaceMode,
    own: Option<InterfaceId>,
) -> Option<&Interface> {
    if let Some(own) = own {
        if let Some(interface) = interfaces.iter().find(|i| i.id == own) {
            return Some(interface);
        }
    }

    let mut main = interfaces.iter().filter(|i| i.main);
    match mode {
        InterfaceMode::AgentPrimary => {
            main.find(|i| i.kind == monitor_types::InterfaceType::Agent)
        }
        InterfaceMode::Priority => main.max_by_key(|i| i.kind.priority()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::InterfaceType;

    fn interface(id: u64, kind: InterfaceType, ip: &str, main: bool) -> Interface {
        Interface {
            id: InterfaceId(id),
            host_id: HostId(1),
            kind,
            ip: ip.to_string(),
            dns: String::new(),
            port: String::new(),
            use_ip: true,
            main,
        }
    }

    #[test]
    fn test_priority_prefers_snmp_over_ipmi() {
        let interfaces = vec![
            interface(1, InterfaceType::Ipmi, "10.0.0.3", true),
            interface(2, InterfaceType::Snmp, "10.0.0.2", true),
        ];
        let selected = select_interface(&interfaces, InterfaceMode::Priority, None).unwrap();
        assert_eq!(selected.ip, "10.0.0.2");
    }

    #[test]
    fn test_priority_ignores_non_main() {
        let interfaces = vec![
            interface(1, InterfaceType::Agent, "10.0.0.9", false),
            interface(2, InterfaceType::Jmx, "10.0.0.4", true),
        ];
        let selected = select_interface(&interfaces, InterfaceMode::Priority, None).unwrap();
        assert_eq!(selected.ip, "10.0.0.4");
    }

    #[test]
    fn test_agent_primary_mode() {
        let interfaces = vec![interface(2, InterfaceType::Snmp, "10.0.0.2", true)];
        assert!(select_interface(&interfaces, InterfaceMode::AgentPrimary, None).is_none());

        let interfaces = vec![
            interface(1, InterfaceType::Snmp, "10.0.0.2", true),
            interface(2, InterfaceType::Agent, "10.0.0.1", true),
        ];
        let selected = select_interface(&interfaces, InterfaceMode::AgentPrimary, None).unwrap();
        assert_eq!(selected.ip, "10.0.0.1");
    }

    #[test]
    fn test_own_interface_wins() {
        let interfaces = vec![
            interface(1, InterfaceType::Agent, "10.0.0.1", true),
            interface(2, InterfaceType::Snmp, "10.0.0.2", false),
        ];
        let selected =
            select_interface(&interfaces, InterfaceMode::Priority, Some(InterfaceId(2))).unwrap();
        assert_eq!(selected.ip, "10.0.0.2");

        let selected =
            select_interface(&interfaces, InterfaceMode::Priority, Some(InterfaceId(99))).unwrap();
        assert_eq!(selected.ip, "10.0.0.1");
    }
}
