//! Value resolver
//!
//! Maps a token plus the entity it points at to replacement text. Everything
//! here is pure; fetching happens before, rewriting after.

pub mod format;

pub use format::{convert_units, format_aggregate, format_history_value, format_number};

use monitor_types::{Host, Interface, Item, ValueMap, UNRESOLVED_MACRO_STRING};

use crate::scanner::{HostField, InterfaceField, ItemKey};

/// `{HOST.HOST}`, `{HOST.NAME}`, `{HOST.ID}`, `{HOST.DESCRIPTION}`
pub fn host_value(field: HostField, host: &Host) -> String {
    match field {
        HostField::Host => host.host.clone(),
        HostField::Name => host.name.clone(),
        HostField::Id => host.id.to_string(),
        HostField::Description => host.description.clone(),
    }
}

/// `{HOST.IP}`, `{HOST.DNS}`, `{HOST.CONN}`, `{HOST.PORT}`
pub fn interface_value(field: InterfaceField, interface: &Interface) -> String {
    match field {
        InterfaceField::Ip => interface.ip.clone(),
        InterfaceField::Dns => interface.dns.clone(),
        InterfaceField::Conn => interface.connection().to_string(),
        InterfaceField::Port => interface.port.clone(),
    }
}

/// Formatted last value for `{ITEM.LASTVALUE}`, `{ITEM.VALUE}` and
/// `last()`; the sentinel until the item has received a value
pub fn last_value(item: &Item, value_map: Option<&ValueMap>) -> String {
    match &item.last_value {
        Some(value) if item.has_value() => format_history_value(item, value, value_map),
        _ => UNRESOLVED_MACRO_STRING.to_string(),
    }
}

/// `$N` against an item key; `None` when the key does not parse or has
/// fewer parameters
pub fn reference_value(key: Option<&ItemKey>, n: u8) -> Option<String> {
    key?.param(usize::from(n)).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::{HostId, InterfaceId, InterfaceType, ItemId, ValueType};

    fn host() -> Host {
        Host {
            id: HostId(10084),
            host: "sh".to_string(),
            name: "Server Host".to_string(),
            description: "rack 4".to_string(),
            templates: vec![],
        }
    }

    #[test]
    fn test_host_fields() {
        let host = host();
        assert_eq!(host_value(HostField::Host, &host), "sh");
        assert_eq!(host_value(HostField::Name, &host), "Server Host");
        assert_eq!(host_value(HostField::Id, &host), "10084");
        assert_eq!(host_value(HostField::Description, &host), "rack 4");
    }

    #[test]
    fn test_interface_conn_follows_use_ip() {
        let mut interface = Interface {
            id: InterfaceId(1),
            host_id: HostId(10084),
            kind: InterfaceType::Agent,
            ip: "10.0.0.1".to_string(),
            dns: "sh.local".to_string(),
            port: "10050".to_string(),
            use_ip: true,
            main: true,
        };
        assert_eq!(interface_value(InterfaceField::Conn, &interface), "10.0.0.1");
        interface.use_ip = false;
        assert_eq!(interface_value(InterfaceField::Conn, &interface), "sh.local");
        assert_eq!(interface_value(InterfaceField::Port, &interface), "10050");
    }

    #[test]
    fn test_last_value_needs_clock() {
        let mut item = Item {
            id: ItemId(1),
            host_id: HostId(10084),
            interface_id: None,
            name: String::new(),
            key: "agent.ping".to_string(),
            value_type: ValueType::Unsigned,
            units: String::new(),
            value_map_id: None,
            last_value: Some("1".to_string()),
            last_clock: 0,
        };
        assert_eq!(last_value(&item, None), UNRESOLVED_MACRO_STRING);
        item.last_clock = 1_700_000_000;
        assert_eq!(last_value(&item, None), "1");
    }

    #[test]
    fn test_reference_value() {
        let key = ItemKey::parse("test.key[abc,def]");
        assert_eq!(reference_value(key.as_ref(), 1).as_deref(), Some("abc"));
        assert_eq!(reference_value(key.as_ref(), 2).as_deref(), Some("def"));
        assert_eq!(reference_value(key.as_ref(), 3), None);
        assert_eq!(reference_value(None, 1), None);
    }
}
