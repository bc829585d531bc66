//! Trigger expressions: `{functionid}` becomes `{host:key.func(param)}`

use std::collections::BTreeSet;

use monitor_types::{Function, FunctionId, Host, HostId, Item, ItemId, EXPRESSION_ERROR_STRING};

use super::context::{Ctx, Partial};
use crate::error::Result;
use crate::scanner::MacroToken;

/// Readable form of one function call
pub(crate) fn expand_function(host: &Host, item: &Item, function: &Function) -> String {
    format!(
        "{{{}:{}.{}({})}}",
        host.host, item.key, function.function, function.parameter
    )
}

pub(crate) async fn resolve(ctx: &Ctx<'_>) -> Result<Partial> {
    let mut partial = Partial::default();

    let function_ids: BTreeSet<FunctionId> = ctx
        .scanned
        .macros()
        .filter_map(|(_, _, token)| match token {
            MacroToken::FunctionId(id) => Some(*id),
            _ => None,
        })
        .collect();

    let fetcher = ctx.fetcher();
    let functions = fetcher.functions(&function_ids).await?;
    let item_ids: BTreeSet<ItemId> = functions.values().map(|f| f.item_id).collect();
    let items = fetcher.items(&item_ids).await?;
    let host_ids: BTreeSet<HostId> = items.values().map(|i| i.host_id).collect();
    let hosts = fetcher.hosts(&host_ids).await?;

    for (key, text, token) in ctx.scanned.macros() {
        let MacroToken::FunctionId(id) = token else {
            continue;
        };
        let chain = functions.get(id).and_then(|function| {
            let item = items.get(&function.item_id)?;
            let host = hosts.get(&item.host_id)?;
            Some((function, item, host))
        });
        match chain {
            Some((function, item, host)) => {
                partial.add_user_host(key, host.id);
                partial.set(key, text, expand_function(host, item, function));
            }
            None => partial.set(key, text, EXPRESSION_ERROR_STRING.to_string()),
        }
    }
    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::{FunctionName, TriggerId, ValueType};

    #[test]
    fn test_expand_function() {
        let host = Host {
            id: HostId(1),
            host: "sh".to_string(),
            name: "sh".to_string(),
            description: String::new(),
            templates: vec![],
        };
        let item = Item {
            id: ItemId(2),
            host_id: HostId(1),
            interface_id: None,
            name: String::new(),
            key: "system.cpu.load[all,avg1]".to_string(),
            value_type: ValueType::Float,
            units: String::new(),
            value_map_id: None,
            last_value: None,
            last_clock: 0,
        };
        let function = Function {
            id: FunctionId(3),
            trigger_id: TriggerId(4),
            item_id: ItemId(2),
            function: FunctionName::Avg,
            parameter: "5m".to_string(),
        };
        assert_eq!(
            expand_function(&host, &item, &function),
            "{sh:system.cpu.load[all,avg1].avg(5m)}"
        );
    }
}
