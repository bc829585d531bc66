//! PostgreSQL configuration store
//!
//! Reads the classic monitoring schema (`hosts`, `interface`, `items`,
//! `functions`, `triggers`, `graphs`, `graphs_items`, `valuemap`,
//! `mappings`). Every trait method is a single `= ANY($1)` query.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::PgPool;

use monitor_types::{
    Function, FunctionId, Graph, GraphId, Host, HostId, Interface, InterfaceId, InterfaceType,
    Item, ItemId, Trigger, TriggerId, ValueMap, ValueMapId, ValueMapping, ValueType,
};

use super::{ConfigStore, HostItem};
use crate::error::StoreError;

// ============================================================================
// Row Structs
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct HostRow {
    hostid: i64,
    host: String,
    name: String,
    description: String,
    templateids: Vec<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct InterfaceRow {
    interfaceid: i64,
    hostid: i64,
    #[sqlx(rename = "type")]
    kind: i32,
    ip: String,
    dns: String,
    port: String,
    useip: i32,
    main: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    itemid: i64,
    hostid: i64,
    interfaceid: Option<i64>,
    name: String,
    key_: String,
    value_type: i32,
    units: String,
    valuemapid: Option<i64>,
    lastvalue: Option<String>,
    // int4 in the schema
    lastclock: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct HostItemRow {
    host_name: String,
    host_visible_name: String,
    host_description: String,
    #[sqlx(flatten)]
    item: ItemRow,
}

#[derive(Debug, sqlx::FromRow)]
struct FunctionRow {
    functionid: i64,
    triggerid: i64,
    itemid: i64,
    name: String,
    parameter: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TriggerRow {
    triggerid: i64,
    expression: String,
    description: String,
    comments: String,
    url: String,
    recovery_expression: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct GraphRow {
    graphid: i64,
    name: String,
    itemids: Vec<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct MappingRow {
    valuemapid: i64,
    valuemap_name: String,
    value: Option<String>,
    newvalue: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

fn id(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::InvalidRow(format!("negative id {raw}")))
}

fn bind_ids<T: Copy + Into<u64>>(ids: &BTreeSet<T>) -> Result<Vec<i64>, StoreError> {
    ids.iter()
        .map(|id| {
            let raw: u64 = (*id).into();
            i64::try_from(raw).map_err(|_| StoreError::InvalidRow(format!("id {raw} out of range")))
        })
        .collect()
}

fn interface_type(raw: i32) -> Result<InterfaceType, StoreError> {
    match raw {
        1 => Ok(InterfaceType::Agent),
        2 => Ok(InterfaceType::Snmp),
        3 => Ok(InterfaceType::Ipmi),
        4 => Ok(InterfaceType::Jmx),
        other => Err(StoreError::InvalidRow(format!("interface type {other}"))),
    }
}

fn value_type(raw: i32) -> Result<ValueType, StoreError> {
    match raw {
        0 => Ok(ValueType::Float),
        1 => Ok(ValueType::String),
        2 => Ok(ValueType::Log),
        3 => Ok(ValueType::Unsigned),
        4 => Ok(ValueType::Text),
        other => Err(StoreError::InvalidRow(format!("value type {other}"))),
    }
}

impl TryFrom<HostRow> for Host {
    type Error = StoreError;

    fn try_from(row: HostRow) -> Result<Self, Self::Error> {
        Ok(Host {
            id: HostId(id(row.hostid)?),
            host: row.host,
            name: row.name,
            description: row.description,
            templates: row
                .templateids
                .into_iter()
                .map(|t| id(t).map(HostId))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<InterfaceRow> for Interface {
    type Error = StoreError;

    fn try_from(row: InterfaceRow) -> Result<Self, Self::Error> {
        Ok(Interface {
            id: InterfaceId(id(row.interfaceid)?),
            host_id: HostId(id(row.hostid)?),
            kind: interface_type(row.kind)?,
            ip: row.ip,
            dns: row.dns,
            port: row.port,
            use_ip: row.useip == 1,
            main: row.main == 1,
        })
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            id: ItemId(id(row.itemid)?),
            host_id: HostId(id(row.hostid)?),
            // interfaceid 0 means "no interface" in older schemas
            interface_id: match row.interfaceid {
                Some(raw) if raw > 0 => Some(InterfaceId(id(raw)?)),
                _ => None,
            },
            name: row.name,
            key: row.key_,
            value_type: value_type(row.value_type)?,
            units: row.units,
            value_map_id: match row.valuemapid {
                Some(raw) if raw > 0 => Some(ValueMapId(id(raw)?)),
                _ => None,
            },
            last_value: row.lastvalue,
            last_clock: row.lastclock.map(i64::from).unwrap_or(0),
        })
    }
}

impl TryFrom<FunctionRow> for Function {
    type Error = StoreError;

    fn try_from(row: FunctionRow) -> Result<Self, Self::Error> {
        Ok(Function {
            id: FunctionId(id(row.functionid)?),
            trigger_id: TriggerId(id(row.triggerid)?),
            item_id: ItemId(id(row.itemid)?),
            function: row
                .name
                .parse()
                .map_err(|e| StoreError::InvalidRow(format!("function {}: {e}", row.functionid)))?,
            parameter: row.parameter,
        })
    }
}

impl TryFrom<TriggerRow> for Trigger {
    type Error = StoreError;

    fn try_from(row: TriggerRow) -> Result<Self, Self::Error> {
        Ok(Trigger {
            id: TriggerId(id(row.triggerid)?),
            expression: row.expression,
            description: row.description,
            comments: row.comments,
            url: row.url,
            recovery_expression: row.recovery_expression.filter(|e| !e.is_empty()),
        })
    }
}

// ============================================================================
// Store
// ============================================================================

/// [`ConfigStore`] backed by a Postgres pool
#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const ITEM_COLUMNS: &str = "i.itemid, i.hostid, i.interfaceid, i.name, i.key_, i.value_type, \
     i.units, i.valuemapid, i.lastvalue, i.lastclock";

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn hosts(&self, ids: &BTreeSet<HostId>) -> Result<Vec<Host>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, HostRow>(
            r#"
            SELECT h.hostid, h.host, h.name, COALESCE(h.description, '') AS description,
                   COALESCE(ARRAY(SELECT ht.templateid FROM hosts_templates ht
                                  WHERE ht.hostid = h.hostid ORDER BY ht.templateid),
                            '{}') AS templateids
            FROM hosts h
            WHERE h.hostid = ANY($1)
            "#,
        )
        .bind(bind_ids(ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Host::try_from).collect()
    }

    async fn interfaces(&self, host_ids: &BTreeSet<HostId>) -> Result<Vec<Interface>, StoreError> {
        if host_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, InterfaceRow>(
            r#"
            SELECT i.interfaceid, i.hostid, i.type, i.ip, i.dns, i.port, i.useip, i.main
            FROM interface i
            WHERE i.hostid = ANY($1)
            "#,
        )
        .bind(bind_ids(host_ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Interface::try_from).collect()
    }

    async fn items(&self, ids: &BTreeSet<ItemId>) -> Result<Vec<Item>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items i WHERE i.itemid = ANY($1)");
        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(bind_ids(ids)?)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Item::try_from).collect()
    }

    async fn items_by_host_key(
        &self,
        keys: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Vec<HostItem>, StoreError> {
        let (hosts, item_keys): (Vec<String>, Vec<String>) = keys
            .iter()
            .flat_map(|(host, keys)| keys.iter().map(move |key| (host.clone(), key.clone())))
            .unzip();
        if hosts.is_empty() {
            return Ok(Vec::new());
        }

        // Pairs are matched with UNNEST so a single round trip serves every host
        let sql = format!(
            r#"
            SELECT h.host AS host_name, h.name AS host_visible_name,
                   COALESCE(h.description, '') AS host_description, {ITEM_COLUMNS}
            FROM UNNEST($1::text[], $2::text[]) AS wanted(host, key_)
            JOIN hosts h ON h.host = wanted.host
            JOIN items i ON i.hostid = h.hostid AND i.key_ = wanted.key_
            "#
        );
        let rows = sqlx::query_as::<_, HostItemRow>(&sql)
            .bind(hosts)
            .bind(item_keys)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let item = Item::try_from(row.item)?;
                Ok(HostItem {
                    host: Host {
                        id: item.host_id,
                        host: row.host_name,
                        name: row.host_visible_name,
                        description: row.host_description,
                        templates: Vec::new(),
                    },
                    item,
                })
            })
            .collect()
    }

    async fn functions(&self, ids: &BTreeSet<FunctionId>) -> Result<Vec<Function>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, FunctionRow>(
            r#"
            SELECT f.functionid, f.triggerid, f.itemid, f.name, f.parameter
            FROM functions f
            WHERE f.functionid = ANY($1)
            "#,
        )
        .bind(bind_ids(ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Function::try_from).collect()
    }

    async fn triggers(&self, ids: &BTreeSet<TriggerId>) -> Result<Vec<Trigger>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT t.triggerid, t.expression, t.description, t.comments, t.url,
                   t.recovery_expression
            FROM triggers t
            WHERE t.triggerid = ANY($1)
            "#,
        )
        .bind(bind_ids(ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Trigger::try_from).collect()
    }

    async fn graphs(&self, ids: &BTreeSet<GraphId>) -> Result<Vec<Graph>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, GraphRow>(
            r#"
            SELECT g.graphid, g.name,
                   COALESCE(ARRAY(SELECT gi.itemid FROM graphs_items gi
                                  WHERE gi.graphid = g.graphid
                                  ORDER BY gi.sortorder, gi.gitemid),
                            '{}') AS itemids
            FROM graphs g
            WHERE g.graphid = ANY($1)
            "#,
        )
        .bind(bind_ids(ids)?)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Graph {
                    id: GraphId(id(row.graphid)?),
                    name: row.name,
                    items: row
                        .itemids
                        .into_iter()
                        .map(|i| id(i).map(ItemId))
                        .collect::<Result<_, StoreError>>()?,
                })
            })
            .collect()
    }

    async fn value_maps(&self, ids: &BTreeSet<ValueMapId>) -> Result<Vec<ValueMap>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT v.valuemapid, v.name AS valuemap_name, m.value, m.newvalue
            FROM valuemap v
            LEFT JOIN mappings m ON m.valuemapid = v.valuemapid
            WHERE v.valuemapid = ANY($1)
            ORDER BY v.valuemapid, m.mappingid
            "#,
        )
        .bind(bind_ids(ids)?)
        .fetch_all(&self.pool)
        .await?;

        let mut maps: BTreeMap<u64, ValueMap> = BTreeMap::new();
        for row in rows {
            let map_id = id(row.valuemapid)?;
            let map = maps.entry(map_id).or_insert_with(|| ValueMap {
                id: ValueMapId(map_id),
                name: row.valuemap_name.clone(),
                mappings: Vec::new(),
            });
            if let (Some(value), Some(new_value)) = (row.value, row.newvalue) {
                map.mappings.push(ValueMapping { value, new_value });
            }
        }
        Ok(maps.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_row(lastclock: Option<i32>) -> ItemRow {
        ItemRow {
            itemid: 100003,
            hostid: 10085,
            interfaceid: Some(0),
            name: "Traffic on $1".to_string(),
            key_: "net.if.in[eth0]".to_string(),
            value_type: 0,
            units: "B".to_string(),
            valuemapid: Some(1),
            lastvalue: Some("2048".to_string()),
            lastclock,
        }
    }

    #[test]
    fn test_item_row_conversion() {
        let item = Item::try_from(item_row(Some(1_700_000_000))).unwrap();
        assert_eq!(item.id, ItemId(100003));
        assert_eq!(item.interface_id, None);
        assert_eq!(item.value_map_id, Some(ValueMapId(1)));
        assert_eq!(item.value_type, ValueType::Float);
        assert_eq!(item.last_clock, 1_700_000_000);

        let never = Item::try_from(item_row(None)).unwrap();
        assert_eq!(never.last_clock, 0);
        assert!(!never.has_value());
    }

    #[test]
    fn test_negative_id_is_invalid_row() {
        let mut row = item_row(None);
        row.hostid = -1;
        assert!(matches!(Item::try_from(row), Err(StoreError::InvalidRow(_))));
    }
}
