//! `{host:key.func(param)}` resolution
//!
//! Items are looked up by `(technical host name, key)` in one store call for
//! the batch. `last` formats the item's last value; the other functions ask
//! the history store for an aggregate over the parameter's time window.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use monitor_types::{FunctionName, ItemId};

use super::context::{Ctx, Partial};
use crate::error::Result;
use crate::scanner::FunctionalMacro;
use crate::time_window::parse_time_window;
use crate::value::{format_aggregate, last_value};

/// A functional macro whose host name is known
pub(crate) struct FunctionalRequest<'a> {
    pub key: u64,
    pub text: &'a str,
    pub host: String,
    pub functional: &'a FunctionalMacro,
}

pub(crate) async fn resolve_functional(
    ctx: &Ctx<'_>,
    requests: Vec<FunctionalRequest<'_>>,
    partial: &mut Partial,
) -> Result<()> {
    if requests.is_empty() {
        return Ok(());
    }

    let mut wanted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for request in &requests {
        wanted
            .entry(request.host.clone())
            .or_default()
            .insert(request.functional.key.clone());
    }

    let fetcher = ctx.fetcher();
    let found = fetcher.items_by_host_key(&wanted).await?;
    let value_maps = if requests
        .iter()
        .any(|r| r.functional.function == FunctionName::Last)
    {
        fetcher.value_maps(found.values().map(|hi| &hi.item)).await?
    } else {
        BTreeMap::new()
    };

    // Same aggregate requested by several texts is fetched once
    let mut aggregates: HashMap<(ItemId, FunctionName, u64), Option<f64>> = HashMap::new();

    for request in requests {
        let FunctionalRequest {
            key,
            text,
            host,
            functional,
        } = request;
        let Some(host_item) = found.get(&(host, functional.key.clone())) else {
            continue;
        };
        let item = &host_item.item;

        if functional.function == FunctionName::Last {
            let map = item.value_map_id.and_then(|id| value_maps.get(&id));
            partial.set(key, text, last_value(item, map));
            continue;
        }

        let Some(window) = parse_time_window(&functional.parameter) else {
            debug!("Invalid time window '{}' in {}", functional.parameter, text);
            continue;
        };
        let slot = (item.id, functional.function, window);
        let aggregate = match aggregates.get(&slot) {
            Some(cached) => *cached,
            None => {
                let value = ctx
                    .resolver
                    .history()
                    .get_aggregate(item, functional.function, window)
                    .await?;
                aggregates.insert(slot, value);
                value
            }
        };
        if let Some(value) = aggregate {
            partial.set(key, text, format_aggregate(item, functional.function, value));
        }
    }
    Ok(())
}
