//! Value formatting
//!
//! Turns raw item values into display strings: value maps first, then unit
//! conversion (`K`/`M`/`G`.. prefixes, `s`, `uptime`, `unixtime`).

use chrono::{DateTime, Utc};

use monitor_types::{FunctionName, Item, ValueMap, ValueType};

const PREFIXES: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// Units that never receive a prefix
const NO_PREFIX_UNITS: [&str; 4] = ["%", "ms", "rpm", "RPM"];

/// Decimals kept for values without a prefix
const DECIMALS_UNSUFFIXED: i32 = 4;
/// Decimals kept once a prefix is applied
const DECIMALS_SUFFIXED: i32 = 2;

const SEC_PER_MIN: u64 = 60;
const SEC_PER_HOUR: u64 = 3_600;
const SEC_PER_DAY: u64 = 86_400;
const SEC_PER_MONTH: u64 = 30 * SEC_PER_DAY;
const SEC_PER_YEAR: u64 = 365 * SEC_PER_DAY;

/// Round to `decimals` places and drop trailing zeros
pub fn format_number(value: f64, decimals: i32) -> String {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        return "0".to_string();
    }

    let text = format!("{:.*}", decimals.max(0) as usize, rounded);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Numeric value with units, e.g. `6442450944` `B` -> `6 GB`
pub fn convert_units(value: f64, units: &str) -> String {
    match units {
        "unixtime" => return format_unixtime(value),
        "uptime" => return format_uptime(value),
        "s" => return format_age(value),
        _ => {}
    }

    // "!" disables prefixes for any unit
    let (units, no_prefix) = match units.strip_prefix('!') {
        Some(stripped) => (stripped, true),
        None => (units, NO_PREFIX_UNITS.contains(&units)),
    };

    if units.is_empty() || no_prefix || value.abs() < 1.0 {
        return with_units(format_number(value, DECIMALS_UNSUFFIXED), units);
    }

    let base: f64 = if units == "B" || units == "Bps" {
        1024.0
    } else {
        1000.0
    };

    let mut scaled = value;
    let mut prefix = "";
    for (power, candidate) in PREFIXES.iter().enumerate() {
        let decimals = if power == 0 {
            DECIMALS_UNSUFFIXED
        } else {
            DECIMALS_SUFFIXED
        };
        let factor = 10f64.powi(decimals);
        scaled = (value / base.powi(power as i32) * factor).round() / factor;
        prefix = candidate;
        if scaled.abs() < base {
            break;
        }
    }

    let decimals = if prefix.is_empty() {
        DECIMALS_UNSUFFIXED
    } else {
        DECIMALS_SUFFIXED
    };
    with_units(format_number(scaled, decimals), &format!("{prefix}{units}"))
}

fn with_units(value: String, units: &str) -> String {
    if units.is_empty() {
        value
    } else {
        format!("{value} {units}")
    }
}

/// `YYYY-MM-DD HH:MM:SS`, UTC
fn format_unixtime(value: f64) -> String {
    match DateTime::<Utc>::from_timestamp(value.trunc() as i64, 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format_number(value, DECIMALS_UNSUFFIXED),
    }
}

/// `N days, HH:MM:SS`
fn format_uptime(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let total = value.abs().round() as u64;

    let days = total / SEC_PER_DAY;
    let rest = total % SEC_PER_DAY;
    let clock = format!(
        "{:02}:{:02}:{:02}",
        rest / SEC_PER_HOUR,
        rest % SEC_PER_HOUR / SEC_PER_MIN,
        rest % SEC_PER_MIN
    );

    match days {
        0 => format!("{sign}{clock}"),
        1 => format!("{sign}1 day, {clock}"),
        n => format!("{sign}{n} days, {clock}"),
    }
}

/// Up to three adjacent significant units: `1y 2M 3d`, `2d 4h 5m`, `3m 12s`
fn format_age(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let mut rest = abs.trunc() as u64;

    let mut parts: Vec<String> = Vec::new();
    let mut start: Option<usize> = None;
    for (level, (size, unit)) in [
        (SEC_PER_YEAR, "y"),
        (SEC_PER_MONTH, "M"),
        (SEC_PER_DAY, "d"),
        (SEC_PER_HOUR, "h"),
        (SEC_PER_MIN, "m"),
        (1, "s"),
    ]
    .into_iter()
    .enumerate()
    {
        if start.is_some_and(|s| level - s >= 3) {
            break;
        }
        let count = rest / size;
        rest %= size;
        if count > 0 {
            start.get_or_insert(level);
            parts.push(format!("{count}{unit}"));
        }
    }

    // Sub-second remainder only matters for short periods
    if start.map_or(true, |s| s >= 4) {
        let millis = (abs.fract() * 1000.0).round();
        if millis > 0.0 {
            parts.push(format!("{}ms", format_number(millis, DECIMALS_SUFFIXED)));
        }
    }

    if parts.is_empty() {
        "0".to_string()
    } else {
        format!("{sign}{}", parts.join(" "))
    }
}

/// Last value of an item as displayed: value map, then units
pub fn format_history_value(item: &Item, value: &str, value_map: Option<&ValueMap>) -> String {
    if let Some(mapped) = value_map.and_then(|map| map.lookup(value)) {
        return format!("{mapped} ({value})");
    }

    if !item.value_type.is_numeric() {
        return value.to_string();
    }

    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => convert_units(number, &item.units),
        _ => value.to_string(),
    }
}

/// Aggregate over history; `count` is a plain number without units
pub fn format_aggregate(item: &Item, function: FunctionName, value: f64) -> String {
    match function {
        FunctionName::Count => format_number(value, 0),
        _ if item.value_type == ValueType::Unsigned && item.units.is_empty() => {
            format_number(value, DECIMALS_UNSUFFIXED)
        }
        _ => convert_units(value, &item.units),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_types::{HostId, ItemId, ValueMapId, ValueMapping};

    fn item(value_type: ValueType, units: &str) -> Item {
        Item {
            id: ItemId(1),
            host_id: HostId(1),
            interface_id: None,
            name: String::new(),
            key: "k".to_string(),
            value_type,
            units: units.to_string(),
            value_map_id: None,
            last_value: None,
            last_clock: 0,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0, 4), "1");
        assert_eq!(format_number(1.23456, 4), "1.2346");
        assert_eq!(format_number(2.50, 2), "2.5");
        assert_eq!(format_number(-0.00001, 4), "0");
        assert_eq!(format_number(1234.0, 0), "1234");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(convert_units(6442450944.0, "B"), "6 GB");
        assert_eq!(convert_units(1536.0, "Bps"), "1.5 KBps");
        assert_eq!(convert_units(2500.0, "bps"), "2.5 Kbps");
        assert_eq!(convert_units(999.0, "bps"), "999 bps");
        assert_eq!(convert_units(0.5, "V"), "0.5 V");
        assert_eq!(convert_units(-2000.0, "W"), "-2 KW");
    }

    #[test]
    fn test_units_without_prefix() {
        assert_eq!(convert_units(5000.0, "%"), "5000 %");
        assert_eq!(convert_units(3500.0, "rpm"), "3500 rpm");
        assert_eq!(convert_units(3500.0, "!B"), "3500 B");
        assert_eq!(convert_units(1.123456, ""), "1.1235");
    }

    #[test]
    fn test_time_units() {
        assert_eq!(convert_units(0.0, "unixtime"), "1970-01-01 00:00:00");
        assert_eq!(convert_units(90061.0, "uptime"), "1 day, 01:01:01");
        assert_eq!(convert_units(3723.0, "uptime"), "01:02:03");
        assert_eq!(convert_units(93784.0, "s"), "1d 2h 3m");
        assert_eq!(convert_units(192.0, "s"), "3m 12s");
        assert_eq!(convert_units(1.5, "s"), "1s 500ms");
        assert_eq!(convert_units(0.0, "s"), "0");
    }

    #[test]
    fn test_history_value_with_value_map() {
        let map = ValueMap {
            id: ValueMapId(1),
            name: "Service state".to_string(),
            mappings: vec![ValueMapping {
                value: "1".to_string(),
                new_value: "Up".to_string(),
            }],
        };
        let item = item(ValueType::Unsigned, "");
        assert_eq!(format_history_value(&item, "1", Some(&map)), "Up (1)");
        assert_eq!(format_history_value(&item, "0", Some(&map)), "0");
    }

    #[test]
    fn test_history_value_by_type() {
        assert_eq!(
            format_history_value(&item(ValueType::Float, "B"), "2048", None),
            "2 KB"
        );
        assert_eq!(
            format_history_value(&item(ValueType::Text, "B"), "2048", None),
            "2048"
        );
        assert_eq!(
            format_history_value(&item(ValueType::Float, ""), "n/a", None),
            "n/a"
        );
    }

    #[test]
    fn test_aggregate_formatting() {
        let float = item(ValueType::Float, "B");
        assert_eq!(format_aggregate(&float, FunctionName::Avg, 1024.0), "1 KB");
        assert_eq!(format_aggregate(&float, FunctionName::Count, 17.0), "17");
        assert_eq!(
            format_aggregate(&item(ValueType::Unsigned, ""), FunctionName::Avg, 2.5),
            "2.5"
        );
    }
}
