//! Interface fetch with nested address expansion

use std::collections::BTreeMap;

use tracing::debug;

use monitor_types::{Host, HostId, Interface};

use super::context::{Ctx, Depth};
use super::{Texts, TextBatch, INTERFACE_ADDRESS_SCENARIO};
use crate::error::Result;
use crate::scanner::scan;

/// Interfaces of already fetched (so visible) `hosts`, with macros inside
/// ip/dns already expanded.
///
/// All hosts needing expansion go through a single nested resolve call
/// keyed by host id. Nested calls do not expand again.
pub(crate) async fn host_interfaces<'h>(
    ctx: &Ctx<'_>,
    hosts: impl IntoIterator<Item = &'h Host> + Send,
) -> Result<BTreeMap<HostId, Vec<Interface>>> {
    let mut interfaces = ctx.fetcher().interfaces(hosts).await?;
    if ctx.depth == Depth::Nested {
        return Ok(interfaces);
    }

    let Some(nested) = ctx.resolver.registry().get(INTERFACE_ADDRESS_SCENARIO) else {
        debug!(
            "Scenario {} not registered, interface addresses stay literal",
            INTERFACE_ADDRESS_SCENARIO
        );
        return Ok(interfaces);
    };
    let types = nested.macro_types();

    let mut batch = TextBatch::new();
    for (host_id, list) in &interfaces {
        let needs_expansion = list
            .iter()
            .any(|i| !scan(&i.ip, &types).is_empty() || !scan(&i.dns, &types).is_empty());
        if needs_expansion {
            let texts = list
                .iter()
                .flat_map(|i| [i.ip.clone(), i.dns.clone()])
                .collect();
            batch.insert(host_id.get(), Texts::Many(texts));
        }
    }
    if batch.is_empty() {
        return Ok(interfaces);
    }

    debug!("Expanding interface addresses of {} hosts", batch.len());
    let resolved = ctx
        .resolver
        .resolve_nested(INTERFACE_ADDRESS_SCENARIO, batch)
        .await?;

    for (host_id, texts) in resolved {
        let Some(list) = interfaces.get_mut(&HostId(host_id)) else {
            continue;
        };
        for (interface, pair) in list.iter_mut().zip(texts.as_slice().chunks(2)) {
            if let [ip, dns] = pair {
                interface.ip = ip.clone();
                interface.dns = dns.clone();
            }
        }
    }
    Ok(interfaces)
}
