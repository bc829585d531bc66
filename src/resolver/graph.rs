//! Graph names: functional macros whose positional host is the host of the
//! N-th graph item

use std::collections::BTreeSet;

use monitor_types::{GraphId, HostId, ItemId};

use super::context::{Ctx, Partial};
use super::functional::{resolve_functional, FunctionalRequest};
use crate::error::Result;
use crate::scanner::{HostRef, MacroToken};

pub(crate) async fn resolve(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();
    let needs_graph = ctx.scanned.any(|t| match t {
        MacroToken::User(_) => true,
        MacroToken::Functional(m) => matches!(m.host, HostRef::Positional(_)),
        _ => false,
    });
    if !needs_graph {
        let functional = literal_requests(ctx);
        resolve_functional(ctx, functional, &mut partial).await?;
        return Ok(partial);
    }

    let fetcher = ctx.fetcher();
    let graph_ids: BTreeSet<GraphId> = ctx
        .scanned
        .macros()
        .map(|(key, _, _)| GraphId(key))
        .collect();
    let graphs = fetcher.graphs(&graph_ids).await?;
    let item_ids: BTreeSet<ItemId> = graphs
        .values()
        .flat_map(|g| g.items.iter().copied())
        .collect();
    let items = fetcher.items(&item_ids).await?;
    let host_ids: BTreeSet<HostId> = items.values().map(|i| i.host_id).collect();
    let hosts = fetcher.hosts(&host_ids).await?;

    for (id, graph) in &graphs {
        for item in graph.items.iter().filter_map(|i| items.get(i)) {
            if hosts.contains_key(&item.host_id) {
                partial.add_user_host(id.get(), item.host_id);
            }
        }
    }

    let mut functional = Vec::new();
    for (key, text, token) in ctx.scanned.macros() {
        let MacroToken::Functional(m) = token else {
            continue;
        };
        let host = match &m.host {
            HostRef::Literal(name) => Some(name.clone()),
            HostRef::Positional(index) => graphs
                .get(&GraphId(key))
                .and_then(|g| g.items.get((*index).max(1) - 1))
                .and_then(|item_id| items.get(item_id))
                .and_then(|item| hosts.get(&item.host_id))
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

    resolve_functional(ctx, functional, &mut partial).await?;
    Ok(partial)
}

/// Functional macros naming their host literally need no graph fetch
fn literal_requests<'a>(ctx: &'a Ctx<'_>) -> Vec<FunctionalRequest<'a>> {
    ctx.scanned
        .macros()
        .filter_map(|(key, text, token)| match token {
            MacroToken::Functional(m) => match &m.host {
                HostRef::Literal(name) => Some(FunctionalRequest {
                    key,
                    text,
                    host: name.clone(),
                    functional: m,
                }),
                HostRef::Positional(_) => None,
            },
            _ => None,
        })
        .collect()
}
