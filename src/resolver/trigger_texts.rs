//! Texts keyed by trigger id: names, descriptions, URLs, map trigger labels
//!
//! Numbered macros walk `trigger -> N-th function -> item -> host`. The
//! user macros of a trigger come from the hosts of all its functions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use monitor_types::{FunctionId, Host, HostId, Item, ItemId, TriggerId};

use super::context::{Ctx, Partial};
use super::functional::{resolve_functional, FunctionalRequest};
use super::interfaces::host_interfaces;
use crate::error::Result;
use crate::expression::PositionalFunctions;
use crate::fetch::select_interface;
use crate::registry::InterfaceMode;
use crate::scanner::{HostRef, ItemKey, MacroToken};
use crate::value::{host_value, interface_value, last_value, reference_value};

/// The chain `function -> item -> host` behind each function id
struct Chains {
    functions: BTreeMap<FunctionId, ItemId>,
    items: BTreeMap<ItemId, Item>,
    hosts: BTreeMap<HostId, Host>,
}

impl Chains {
    fn item(&self, function: FunctionId) -> Option<&Item> {
        self.functions
            .get(&function)
            .and_then(|item_id| self.items.get(item_id))
    }

    fn host(&self, function: FunctionId) -> Option<&Host> {
        self.item(function)
            .and_then(|item| self.hosts.get(&item.host_id))
    }
}

pub(crate) async fn resolve(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();

    for (key, text, token) in ctx.scanned.macros() {
        if matches!(token, MacroToken::TriggerId) {
            partial.set(key, text, key.to_string());
        }
    }

    // {TRIGGER.ID} and LLD macros need nothing from the store
    let needs_graph = ctx
        .scanned
        .any(|t| !matches!(t, MacroToken::TriggerId | MacroToken::Lld(_)));
    if !needs_graph {
        return Ok(partial);
    }

    let fetcher = ctx.fetcher();
    let trigger_ids: BTreeSet<TriggerId> =
        ctx.scanned.macros().map(|(key, _, _)| TriggerId(key)).collect();
    let triggers = fetcher.triggers(&trigger_ids).await?;
    let positions: BTreeMap<u64, PositionalFunctions> = triggers
        .iter()
        .map(|(id, trigger)| (id.get(), PositionalFunctions::parse(&trigger.expression)))
        .collect();

    let function_ids: BTreeSet<FunctionId> = positions
        .values()
        .flat_map(|p| p.ids().iter().copied())
        .collect();
    let functions = fetcher.functions(&function_ids).await?;
    let item_ids: BTreeSet<ItemId> = functions.values().map(|f| f.item_id).collect();
    let items = fetcher.items(&item_ids).await?;
    let host_ids: BTreeSet<HostId> = items.values().map(|i| i.host_id).collect();
    let hosts = fetcher.hosts(&host_ids).await?;

    let chains = Chains {
        functions: functions.values().map(|f| (f.id, f.item_id)).collect(),
        items,
        hosts,
    };

    let interfaces = if ctx.scanned.any(|t| matches!(t, MacroToken::Interface(_))) {
        host_interfaces(ctx, chains.hosts.values()).await?
    } else {
        BTreeMap::new()
    };
    let value_maps = if ctx.scanned.any(|t| matches!(t, MacroToken::Item(_))) {
        fetcher.value_maps(chains.items.values()).await?
    } else {
        BTreeMap::new()
    };

    for (key, position) in &positions {
        for id in position.ids() {
            if let Some(host) = chains.host(*id) {
                partial.add_user_host(*key, host.id);
            }
        }
    }

    // `$N` reads the key of the first function's item, parsed once per item
    let mut parsed_keys: HashMap<ItemId, Option<ItemKey>> = HashMap::new();
    let mut functional = Vec::new();

    for (key, text, token) in ctx.scanned.macros() {
        let Some(position) = positions.get(&key) else {
            continue;
        };
        match token {
            MacroToken::Host(m) => {
                if let Some(host) = position.at(m.index).and_then(|id| chains.host(id)) {
                    partial.set(key, text, host_value(m.field, host));
                }
            }
            MacroToken::Interface(m) => {
                let selected = position.at(m.index).and_then(|id| {
                    let item = chains.item(id)?;
                    let list = interfaces.get(&item.host_id)?;
                    select_interface(list, InterfaceMode::Priority, item.interface_id)
                });
                if let Some(interface) = selected {
                    partial.set(key, text, interface_value(m.field, interface));
                }
            }
            MacroToken::Item(m) => {
                if let Some(item) = position.at(m.index).and_then(|id| chains.item(id)) {
                    let map = item.value_map_id.and_then(|id| value_maps.get(&id));
                    partial.set(key, text, last_value(item, map));
                }
            }
            MacroToken::Reference(n) => {
                if let Some(item) = position.first().and_then(|id| chains.item(id)) {
                    let parsed = parsed_keys
                        .entry(item.id)
                        .or_insert_with(|| ItemKey::parse(&item.key));
                    if let Some(value) = reference_value(parsed.as_ref(), *n) {
                        partial.set(key, text, value);
                    }
                }
            }
            MacroToken::Functional(m) => {
                let host = match &m.host {
                    HostRef::Literal(name) => Some(name.clone()),
                    HostRef::Positional(index) => position
                        .at(*index)
                        .and_then(|id| chains.host(id))
                        .map(|h| h.host.clone()),
                };
                if let Some(host) = host {
                    functional.push(FunctionalRequest {
                        key,
                        text,
                        host,
                        functional: m,
                    });
                }
            }
            _ => {}
        }
    }

    resolve_functional(ctx, functional, &mut partial).await?;
    Ok(partial)
}
