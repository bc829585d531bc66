//! Per-call state shared by the handlers

use std::collections::{BTreeMap, HashMap};

use monitor_types::HostId;

use super::{MacroResolver, TextBatch};
use crate::fetch::Fetcher;
use crate::registry::ScenarioConfig;
use crate::scanner::{scan, MacroScan, MacroToken, MacroTypes};

/// Whether nested resolve calls are still allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Depth {
    Top,
    Nested,
}

/// Scans of a whole batch plus the distinct macros of each entity
pub(crate) struct Scanned {
    scans: BTreeMap<u64, Vec<MacroScan>>,
    distinct: BTreeMap<u64, BTreeMap<String, MacroToken>>,
}

impl Scanned {
    pub fn new(batch: &TextBatch, types: &MacroTypes) -> Self {
        let mut scans = BTreeMap::new();
        let mut distinct: BTreeMap<u64, BTreeMap<String, MacroToken>> = BTreeMap::new();

        for (key, texts) in batch {
            let per_text: Vec<MacroScan> = texts
                .as_slice()
                .iter()
                .map(|text| scan(text, types))
                .collect();
            for occurrence in per_text.iter().flat_map(|s| s.occurrences()) {
                distinct
                    .entry(*key)
                    .or_default()
                    .entry(occurrence.text.clone())
                    .or_insert_with(|| occurrence.token.clone());
            }
            scans.insert(*key, per_text);
        }

        Self { scans, distinct }
    }

    pub fn scans(&self, key: u64) -> &[MacroScan] {
        self.scans.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.distinct.is_empty()
    }

    /// Every distinct `(key, macro text, token)` of the batch
    pub fn macros(&self) -> impl Iterator<Item = (u64, &str, &MacroToken)> {
        self.distinct.iter().flat_map(|(key, macros)| {
            macros
                .iter()
                .map(move |(text, token)| (*key, text.as_str(), token))
        })
    }

    pub fn any(&self, mut pred: impl FnMut(&MacroToken) -> bool) -> bool {
        self.macros().any(|(_, _, token)| pred(token))
    }
}

/// What a handler produced: values so far, plus the hosts whose user
/// macros apply to each entity
#[derive(Debug, Default)]
pub(crate) struct Partial {
    pub values: BTreeMap<u64, HashMap<String, String>>,
    pub user_hosts: BTreeMap<u64, Vec<HostId>>,
}

impl Partial {
    pub fn set(&mut self, key: u64, text: &str, value: String) {
        self.values
            .entry(key)
            .or_default()
            .insert(text.to_string(), value);
    }

    pub fn has(&self, key: u64, text: &str) -> bool {
        self.values
            .get(&key)
            .is_some_and(|values| values.contains_key(text))
    }

    /// Record `host` for user macro lookups of `key`, keeping first-seen order
    pub fn add_user_host(&mut self, key: u64, host: HostId) {
        let hosts = self.user_hosts.entry(key).or_default();
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
}

pub(crate) struct Ctx<'a> {
    pub resolver: &'a MacroResolver,
    pub scenario: &'a ScenarioConfig,
    pub scanned: &'a Scanned,
    pub depth: Depth,
}

impl Ctx<'_> {
    pub fn fetcher(&self) -> Fetcher<'_> {
        self.resolver.fetcher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Texts;
    use crate::scanner::MacroGroup;

    #[test]
    fn test_scanned_distinct_across_texts() {
        let mut batch = TextBatch::new();
        batch.insert(
            1,
            Texts::Many(vec![
                "{HOST.HOST} {HOST.HOST}".to_string(),
                "{HOST.NAME}".to_string(),
            ]),
        );
        batch.insert(2, Texts::One("plain".to_string()));

        let types = MacroTypes::new().with_macros(&[MacroGroup::Host]);
        let scanned = Scanned::new(&batch, &types);

        assert_eq!(scanned.scans(1).len(), 2);
        assert_eq!(scanned.scans(2).len(), 1);
        assert!(scanned.scans(3).is_empty());
        let texts: Vec<&str> = scanned.macros().map(|(_, text, _)| text).collect();
        assert_eq!(texts, vec!["{HOST.HOST}", "{HOST.NAME}"]);
    }

    #[test]
    fn test_partial_user_hosts_keep_order() {
        let mut partial = Partial::default();
        partial.add_user_host(7, HostId(3));
        partial.add_user_host(7, HostId(1));
        partial.add_user_host(7, HostId(3));
        assert_eq!(partial.user_hosts[&7], vec![HostId(3), HostId(1)]);

        partial.set(7, "{HOST.HOST}", "sh".to_string());
        assert!(partial.has(7, "{HOST.HOST}"));
        assert!(!partial.has(8, "{HOST.HOST}"));
    }
}
