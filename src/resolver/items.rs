//! Texts keyed by item id: item names and item keys
//!
//! Both resolve user macros through the item's own host. `$N` in a name
//! reads the N-th parameter of the item's key after the key's own macros
//! have been expanded.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use monitor_types::{HostId, Item, ItemId};

use super::context::{Ctx, Depth, Partial};
use super::interfaces::host_interfaces;
use super::{TextBatch, Texts, ITEM_KEY_SCENARIO};
use crate::error::Result;
use crate::fetch::select_interface;
use crate::registry::InterfaceMode;
use crate::scanner::{scan, ItemKey, MacroToken};
use crate::value::{host_value, interface_value, reference_value};

async fn fetch_items(ctx: &Ctx<'_>) -> Result<BTreeMap<ItemId, Item>> {
    let ids: BTreeSet<ItemId> = ctx
        .scanned
        .macros()
        .filter(|(_, _, token)| !matches!(token, MacroToken::Lld(_)))
        .map(|(key, _, _)| ItemId(key))
        .collect();
    ctx.fetcher().items(&ids).await
}

fn add_user_hosts(items: &BTreeMap<ItemId, Item>, partial: &mut Partial) {
    for (id, item) in items {
        partial.add_user_host(id.get(), item.host_id);
    }
}

/// Hosts of the items whose texts hold a token matching `pred`
fn item_hosts_where(
    ctx: &Ctx<'_>,
    items: &BTreeMap<ItemId, Item>,
    pred: impl Fn(&MacroToken) -> bool,
) -> BTreeSet<HostId> {
    ctx.scanned
        .macros()
        .filter(|(_, _, token)| pred(token))
        .filter_map(|(key, _, _)| items.get(&ItemId(key)).map(|i| i.host_id))
        .collect()
}

pub(crate) async fn resolve_names(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();
    let items = fetch_items(ctx).await?;
    add_user_hosts(&items, &mut partial);

    let with_references: BTreeSet<ItemId> = ctx
        .scanned
        .macros()
        .filter(|(_, _, token)| matches!(token, MacroToken::Reference(_)))
        .map(|(key, _, _)| ItemId(key))
        .filter(|id| items.contains_key(id))
        .collect();
    if with_references.is_empty() {
        return Ok(partial);
    }

    let keys = expanded_keys(ctx, &items, &with_references).await?;
    for (key, text, token) in ctx.scanned.macros() {
        let MacroToken::Reference(n) = token else {
            continue;
        };
        let Some(item_key) = keys.get(&ItemId(key)) else {
            continue;
        };
        // Out of range and unparsable keys give an empty string
        let value = reference_value(item_key.as_ref(), *n).unwrap_or_default();
        partial.set(key, text, value);
    }
    Ok(partial)
}

/// Keys of `ids`, with their own macros expanded when allowed, then parsed
async fn expanded_keys(
    ctx: &Ctx<'_>,
    items: &BTreeMap<ItemId, Item>,
    ids: &BTreeSet<ItemId>,
) -> Result<BTreeMap<ItemId, Option<ItemKey>>> {
    let mut raw: BTreeMap<ItemId, String> = ids
        .iter()
        .filter_map(|id| items.get(id).map(|item| (*id, item.key.clone())))
        .collect();

    let key_types = ctx
        .resolver
        .registry()
        .get(ITEM_KEY_SCENARIO)
        .map(|scenario| scenario.macro_types());
    if let (Depth::Top, Some(types)) = (ctx.depth, key_types) {
        let batch: TextBatch = raw
            .iter()
            .filter(|(_, key)| !scan(key, &types).is_empty())
            .map(|(id, key)| (id.get(), Texts::from(key.as_str())))
            .collect();
        if !batch.is_empty() {
            debug!("Expanding {} item keys before reference lookup", batch.len());
            let resolved = ctx.resolver.resolve_nested(ITEM_KEY_SCENARIO, batch).await?;
            for (id, texts) in resolved {
                if let (Some(slot), Texts::One(key)) = (raw.get_mut(&ItemId(id)), texts) {
                    *slot = key;
                }
            }
        }
    }

    Ok(raw
        .into_iter()
        .map(|(id, key)| (id, ItemKey::parse(&key)))
        .collect())
}

pub(crate) async fn resolve_keys(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();
    let items = fetch_items(ctx).await?;
    add_user_hosts(&items, &mut partial);

    let interface_host_ids =
        item_hosts_where(ctx, &items, |t| matches!(t, MacroToken::Interface(_)));
    let wanted = item_hosts_where(ctx, &items, |t| {
        matches!(t, MacroToken::Host(_) | MacroToken::Interface(_))
    });

    // Hidden hosts hide their interfaces too
    let hosts = ctx.fetcher().hosts(&wanted).await?;
    let interfaces = host_interfaces(
        ctx,
        hosts.values().filter(|h| interface_host_ids.contains(&h.id)),
    )
    .await?;

    for (key, text, token) in ctx.scanned.macros() {
        let Some(item) = items.get(&ItemId(key)) else {
            continue;
        };
        match token {
            MacroToken::Host(m) => {
                if let Some(host) = hosts.get(&item.host_id) {
                    partial.set(key, text, host_value(m.field, host));
                }
            }
            MacroToken::Interface(m) => {
                let selected = interfaces.get(&item.host_id).and_then(|list| {
                    select_interface(list, InterfaceMode::Priority, item.interface_id)
                });
                if let Some(interface) = selected {
                    partial.set(key, text, interface_value(m.field, interface));
                }
            }
            _ => {}
        }
    }
    Ok(partial)
}
