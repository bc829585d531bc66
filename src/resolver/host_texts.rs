//! Texts keyed by host id: screen elements, map labels, interface addresses

use std::collections::BTreeSet;

use monitor_types::HostId;

use super::context::{Ctx, Partial};
use super::functional::{resolve_functional, FunctionalRequest};
use super::interfaces::host_interfaces;
use crate::error::Result;
use crate::fetch::select_interface;
use crate::scanner::{HostField, HostRef, MacroToken};
use crate::value::{host_value, interface_value};

pub(crate) async fn resolve(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();
    let mut host_ids = BTreeSet::new();
    let mut interface_host_ids = BTreeSet::new();

    for (key, text, token) in ctx.scanned.macros() {
        match token {
            // Known without a fetch
            MacroToken::Host(m) if m.field == HostField::Id => {
                if key != 0 {
                    partial.set(key, text, key.to_string());
                }
            }
            MacroToken::Host(_) => {
                host_ids.insert(HostId(key));
            }
            MacroToken::Interface(_) => {
                interface_host_ids.insert(HostId(key));
            }
            MacroToken::Functional(m) if matches!(m.host, HostRef::Positional(_)) => {
                host_ids.insert(HostId(key));
            }
            MacroToken::User(_) if key != 0 => partial.add_user_host(key, HostId(key)),
            _ => {}
        }
    }

    // Interfaces hang off visible hosts only
    let wanted: BTreeSet<HostId> = host_ids.union(&interface_host_ids).copied().collect();
    let hosts = ctx.fetcher().hosts(&wanted).await?;
    let interfaces = host_interfaces(
        ctx,
        hosts.values().filter(|h| interface_host_ids.contains(&h.id)),
    )
    .await?;
    let mode = ctx.scenario.interface_mode();

    let mut functional = Vec::new();
    for (key, text, token) in ctx.scanned.macros() {
        let host_id = HostId(key);
        match token {
            MacroToken::Host(m) if m.field != HostField::Id => {
                if let Some(host) = hosts.get(&host_id) {
                    partial.set(key, text, host_value(m.field, host));
                }
            }
            MacroToken::Interface(m) => {
                let selected = interfaces
                    .get(&host_id)
                    .and_then(|list| select_interface(list, mode, None));
                if let Some(interface) = selected {
                    partial.set(key, text, interface_value(m.field, interface));
                }
            }
            MacroToken::Functional(m) => {
                // Every position points at the entity's own host here
                let host = match &m.host {
                    HostRef::Literal(name) => Some(name.clone()),
                    HostRef::Positional(_) => hosts.get(&host_id).map(|h| h.host.clone()),
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
