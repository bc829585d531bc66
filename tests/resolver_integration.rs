//! Integration tests for MacroResolver
//!
//! All tests run against tests/fixtures/snapshot.yaml through the in-memory
//! store. Run with: cargo test --test resolver_integration

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use macro_resolver::{
    Fragment, InMemoryStore, MacroResolver, QueryKind, ResolveError, TextBatch, Texts,
    Visibility, UNRESOLVED_MACRO_STRING,
};
use monitor_types::{Host, HostId, Item, ItemId};

fn store() -> Arc<InMemoryStore> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/snapshot.yaml");
    Arc::new(InMemoryStore::from_yaml_file(&path).expect("fixture snapshot must load"))
}

fn resolver() -> MacroResolver {
    MacroResolver::from_store(store())
}

fn batch(entries: &[(u64, &str)]) -> TextBatch {
    entries
        .iter()
        .map(|(key, text)| (*key, Texts::from(*text)))
        .collect()
}

fn one(texts: &Texts) -> &str {
    match texts {
        Texts::One(text) => text,
        Texts::Many(_) => panic!("expected a single text, got {:?}", texts),
    }
}

async fn resolve_one(resolver: &MacroResolver, scenario: &str, key: u64, text: &str) -> String {
    let resolved = resolver
        .resolve(scenario, batch(&[(key, text)]))
        .await
        .expect("resolve should succeed");
    one(&resolved[&key]).to_string()
}

struct HideItems(BTreeSet<ItemId>);

impl Visibility for HideItems {
    fn item_visible(&self, item: &Item) -> bool {
        !self.0.contains(&item.id)
    }
}

struct HideHost(HostId);

impl Visibility for HideHost {
    fn host_visible(&self, host: &Host) -> bool {
        host.id != self.0
    }
}

// =============================================================================
// HOST-SCOPED SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_host_and_ip() {
    let resolver = resolver();
    let resolved = resolve_one(
        &resolver,
        "host-interface-ip-dns",
        10084,
        "Host: {HOST.HOST}, IP: {HOST.IP}",
    )
    .await;
    assert_eq!(resolved, "Host: sh, IP: 10.0.0.1");
}

#[tokio::test]
async fn test_host_id_and_name() {
    let resolver = resolver();
    let resolved = resolve_one(
        &resolver,
        "screen-element-url",
        10084,
        "http://x/{HOST.ID}/{HOST.NAME}",
    )
    .await;
    assert_eq!(resolved, "http://x/10084/Server Host");
}

#[tokio::test]
async fn test_snmp_beats_ipmi_in_priority_mode() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "script-confirmation", 10085, "{HOST.IP}").await,
        "10.0.0.2"
    );
    // Agent-primary mode never falls back to other interface types
    assert_eq!(
        resolve_one(&resolver, "host-interface-ip-dns", 10085, "{HOST.IP}").await,
        UNRESOLVED_MACRO_STRING
    );
}

#[tokio::test]
async fn test_host_without_interfaces() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "script-confirmation", 10087, "{HOST.NAME} {HOST.CONN}").await,
        "No Interfaces *UNKNOWN*"
    );
}

#[tokio::test]
async fn test_nested_host_macro_in_interface_dns() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "host-interface-ip-dns", 10084, "{HOST.DNS}").await,
        "sh.example.com"
    );
}

#[tokio::test]
async fn test_nested_user_macro_in_interface_ip() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "host-interface-ip-dns", 10086, "{HOST.IP} {HOST.CONN}").await,
        "10.0.0.9 web.local"
    );
}

#[tokio::test]
async fn test_map_host_label_functional() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "map-host-label",
            10084,
            "{HOST.DESCRIPTION}: {{HOST.HOST}:agent.ping.last(0)} / {db:net.if.in[eth0].avg(5m)}",
        )
        .await,
        "rack 4: Up (1) / 2 KB"
    );
}

#[tokio::test]
async fn test_unknown_scenario_is_an_error() {
    let resolver = resolver();
    let result = resolver.resolve("no-such-scenario", batch(&[(1, "x")])).await;
    assert!(matches!(
        result,
        Err(ResolveError::UnknownScenario(name)) if name == "no-such-scenario"
    ));
}

#[tokio::test]
async fn test_texts_without_macros_are_untouched() {
    let store = store();
    let resolver = MacroResolver::from_store(store.clone());
    let mut input = TextBatch::new();
    input.insert(
        10084,
        Texts::Many(vec!["plain".to_string(), "{UNKNOWN.MACRO}".to_string()]),
    );

    let resolved = resolver
        .resolve("host-interface-ip-dns", input.clone())
        .await
        .unwrap();
    assert_eq!(resolved, input);
    assert_eq!(store.total_queries(), 0);
}

// =============================================================================
// USER MACROS
// =============================================================================

#[tokio::test]
async fn test_user_macro_priority_and_inheritance() {
    let resolver = resolver();
    let text = r#"{$IF:"eth0"}|{$IF:"eth1"}|{$IF:"eth2"}|{$IF}|{$TPL_ONLY}|{$MISSING}|{$DB_PASSWORD}"#;
    assert_eq!(
        resolve_one(&resolver, "screen-element-url-user", 10084, text).await,
        "host-eth0|global-eth1|host-base|host-base|from-template|{$MISSING}|******"
    );
    assert_eq!(
        resolve_one(&resolver, "screen-element-url-user", 10085, r#"{$IF:"eth0"}"#).await,
        "global-base"
    );
}

// =============================================================================
// TRIGGER-SCOPED SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_references_from_first_function_key() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "trigger-name", 500, "Key $1/$2/$3 on {HOST.HOST}").await,
        "Key abc/def/*UNKNOWN* on sh"
    );
}

#[tokio::test]
async fn test_positional_trigger_macros() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "trigger-name",
            501,
            "{HOST.HOST1} via {HOST.IP1} / {HOST.NAME2} is {ITEM.VALUE2} ({HOST.HOST3})",
        )
        .await,
        "db via 10.0.0.2 / Server Host is Up (1) (*UNKNOWN*)"
    );
}

#[tokio::test]
async fn test_trigger_url() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "trigger-url",
            501,
            "http://{HOST.CONN2}/trigger/{TRIGGER.ID}?h={HOST.ID1}",
        )
        .await,
        "http://10.0.0.1/trigger/501?h=10085"
    );
}

#[tokio::test]
async fn test_trigger_user_macros_use_function_hosts() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "trigger-description", 501, "port {$DB_PORT}").await,
        "port 5432"
    );
    // Trigger 500 only touches host sh, which has no such macro
    assert_eq!(
        resolve_one(&resolver, "trigger-description", 500, "port {$DB_PORT}").await,
        "port {$DB_PORT}"
    );
}

#[tokio::test]
async fn test_map_trigger_label_functional_positional() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "map-trigger-label",
            501,
            "{{HOST.HOST1}:net.if.in[eth0].avg(5m)} on {HOST.HOST1}",
        )
        .await,
        "2 KB on db"
    );
}

#[tokio::test]
async fn test_hidden_items_resolve_to_sentinel() {
    let hidden = HideItems([ItemId(100004)].into_iter().collect());
    let resolver = resolver().with_visibility(Arc::new(hidden));

    assert_eq!(
        resolve_one(&resolver, "trigger-name", 502, "Secret {ITEM.LASTVALUE} on {HOST.HOST}").await,
        "Secret *UNKNOWN* on *UNKNOWN*"
    );
    assert_eq!(
        resolve_one(&resolver, "trigger-expression", 502, "{12348}=1").await,
        "*ERROR*=1"
    );
}

#[tokio::test]
async fn test_hidden_host_hides_its_interfaces() {
    let resolver = resolver().with_visibility(Arc::new(HideHost(HostId(10085))));

    assert_eq!(
        resolve_one(&resolver, "script-confirmation", 10085, "{HOST.NAME} {HOST.IP}").await,
        "*UNKNOWN* *UNKNOWN*"
    );
    assert_eq!(
        resolve_one(&resolver, "item-key", 100007, "k[{HOST.HOST},{HOST.IP}]").await,
        "k[*UNKNOWN*,*UNKNOWN*]"
    );
    assert_eq!(
        resolve_one(&resolver, "trigger-name", 501, "{HOST.IP1} / {HOST.HOST2}").await,
        "*UNKNOWN* / sh"
    );

    // Other hosts are unaffected
    assert_eq!(
        resolve_one(&resolver, "host-interface-ip-dns", 10084, "{HOST.IP}").await,
        "10.0.0.1"
    );
}

#[tokio::test]
async fn test_trigger_expression() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "trigger-expression", 501, "{12346}>100 or {12347}=0").await,
        "{db:net.if.in[eth0].avg(5m)}>100 or {sh:agent.ping.last()}=0"
    );
    assert_eq!(
        resolve_one(&resolver, "trigger-expression", 500, "{12345}>{#THRESHOLD} or {99999}>1")
            .await,
        "{sh:test.key[abc,def].last()}>{#THRESHOLD} or *ERROR*>1"
    );
}

// =============================================================================
// GRAPHS
// =============================================================================

#[tokio::test]
async fn test_graph_positional_host() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "graph-name",
            700,
            "Traffic {{HOST.HOST2}:net.if.in[eth0].last(0)}",
        )
        .await,
        "Traffic 2 KB"
    );
}

#[tokio::test]
async fn test_ghost_functional_macro_is_unknown() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(
            &resolver,
            "graph-name",
            701,
            "Ping {{HOST.HOST}:agent.ping.last(0)} / {ghost:bogus.key.last(0)}",
        )
        .await,
        "Ping Up (1) / *UNKNOWN*"
    );
}

// =============================================================================
// FUNCTIONAL MACROS
// =============================================================================

#[tokio::test]
async fn test_history_aggregates_and_windows() {
    let resolver = resolver();
    let text = [
        "{{HOST.HOST}:net.if.in[eth0].min(5m)}",
        "{{HOST.HOST}:net.if.in[eth0].max(1h)}",
        "{{HOST.HOST}:net.if.in[eth0].sum(300s)}",
        "{{HOST.HOST}:net.if.in[eth0].count(600)}",
        "{{HOST.HOST}:net.if.in[eth0].count(1d)}",
        "{{HOST.HOST}:net.if.in[eth0].avg(2w)}",
    ]
    .join(" | ");

    assert_eq!(
        resolve_one(&resolver, "map-host-label", 10085, &text).await,
        "1 KB | 976.56 KB | 4 KB | 2 | 3 | 326.85 KB"
    );
}

#[tokio::test]
async fn test_aggregate_without_data_and_shared_windows() {
    let store = store();
    let resolver = MacroResolver::from_store(store.clone());
    let input = batch(&[
        (10084, "{db:net.if.in[eth0].min(10)}"),
        (
            10085,
            "{{HOST.HOST}:net.if.in[eth0].max(50s)} {db:net.if.in[eth0].max(50)}",
        ),
    ]);

    let resolved = resolver.resolve("map-host-label", input).await.unwrap();
    assert_eq!(one(&resolved[&10084]), UNRESOLVED_MACRO_STRING);
    assert_eq!(one(&resolved[&10085]), "3 KB 3 KB");

    // max over 50 seconds is fetched once for both spellings
    assert_eq!(store.query_count(QueryKind::ItemsByHostKey), 1);
    assert_eq!(store.query_count(QueryKind::History), 2);
}

// =============================================================================
// ITEMS
// =============================================================================

#[tokio::test]
async fn test_item_name_references_use_expanded_key() {
    let resolver = resolver();
    let input = batch(&[
        (100005, "CPU load on $1 ($2, $4)"),
        (100003, "Traffic on $1"),
        (100007, "Port {$DB_PORT}"),
    ]);
    let resolved = resolver.resolve("item-name", input).await.unwrap();

    assert_eq!(one(&resolved[&100005]), "CPU load on sh (avg1, )");
    assert_eq!(one(&resolved[&100003]), "Traffic on eth0");
    assert_eq!(one(&resolved[&100007]), "Port 5432");
}

#[tokio::test]
async fn test_item_key() {
    let resolver = resolver();
    assert_eq!(
        resolve_one(&resolver, "item-key", 100007, "db.ping[{HOST.IP},{$DB_PORT}]").await,
        "db.ping[10.0.0.2,5432]"
    );
}

// =============================================================================
// BATCHING
// =============================================================================

#[tokio::test]
async fn test_batch_equals_single() {
    let resolver = resolver();
    let texts = [
        (500u64, "Key $1/$2 on {HOST.HOST}"),
        (501u64, "{HOST.HOST1} / {HOST.NAME2} is {ITEM.VALUE2}"),
    ];

    let batched = resolver.resolve("trigger-name", batch(&texts)).await.unwrap();
    for (key, text) in texts {
        let single = resolve_one(&resolver, "trigger-name", key, text).await;
        assert_eq!(one(&batched[&key]), single);
    }
}

#[tokio::test]
async fn test_one_query_per_entity_kind() {
    let store = store();
    let resolver = MacroResolver::from_store(store.clone());
    let input = batch(&[
        (500, "{HOST.NAME} {ITEM.VALUE} {$IF}"),
        (501, "{HOST.NAME1} {HOST.NAME2} {ITEM.VALUE2}"),
    ]);

    let resolved = resolver.resolve("trigger-description", input).await.unwrap();
    assert_eq!(one(&resolved[&500]), "Server Host 1.5 host-base");
    assert_eq!(one(&resolved[&501]), "Database Server Host Up (1)");

    for kind in [
        QueryKind::Triggers,
        QueryKind::Functions,
        QueryKind::Items,
        QueryKind::Hosts,
        QueryKind::ValueMaps,
        QueryKind::UserMacros,
    ] {
        assert_eq!(store.query_count(kind), 1, "{:?}", kind);
    }
    assert_eq!(store.query_count(QueryKind::Interfaces), 0);
    assert_eq!(store.total_queries(), 6);
}

#[tokio::test]
async fn test_many_texts_keep_shape() {
    let resolver = resolver();
    let mut input = TextBatch::new();
    input.insert(
        10084,
        Texts::Many(vec!["{HOST.HOST}".to_string(), "{HOST.NAME}".to_string()]),
    );
    let resolved = resolver.resolve("script-confirmation", input).await.unwrap();
    assert_eq!(
        resolved[&10084],
        Texts::Many(vec!["sh".to_string(), "Server Host".to_string()])
    );
}

// =============================================================================
// FRAGMENTS AND RECORDS
// =============================================================================

#[tokio::test]
async fn test_fragments() {
    let resolver = resolver();
    let input = batch(&[(10084, "up {HOST.HOST} {$MISSING}")]);
    let fragments = resolver
        .resolve_fragments("script-confirmation", &input)
        .await
        .unwrap();

    assert_eq!(
        fragments[&10084],
        vec![vec![
            Fragment::Text {
                text: "up ".to_string()
            },
            Fragment::Macro {
                source: "{HOST.HOST}".to_string(),
                value: "sh".to_string()
            },
            Fragment::Text {
                text: " {$MISSING}".to_string()
            },
        ]]
    );
}

#[tokio::test]
async fn test_resolve_records() {
    let resolver = resolver();
    let mut records = BTreeMap::new();
    records.insert(
        501,
        json!({"comments": "Port {$DB_PORT} on {HOST.NAME1}", "priority": 4}),
    );
    records.insert(500, json!({"priority": 1}));

    let resolved = resolver
        .resolve_records("trigger-description", records)
        .await
        .unwrap();
    assert_eq!(
        resolved[&501],
        json!({"comments": "Port 5432 on Database", "priority": 4})
    );
    assert_eq!(resolved[&500], json!({"priority": 1}));
}

#[tokio::test]
async fn test_resolve_records_needs_source() {
    let resolver = resolver();
    let result = resolver
        .resolve_records("script-confirmation", BTreeMap::new())
        .await;
    assert!(matches!(result, Err(ResolveError::MissingSource(_))));
}
