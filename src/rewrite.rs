//! Rewriter
//!
//! Replacements are collected as `(span, text)` edits in offset order and
//! applied in a single forward pass into a fresh buffer. Occurrences without
//! a computed value stay literal.

use std::collections::HashMap;
use std::ops::Range;

use crate::scanner::MacroScan;

/// One replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Apply non-overlapping edits sorted by start offset
pub fn apply_edits(text: &str, edits: &[Edit]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for edit in edits {
        // Overlaps cannot come out of a scan; skip rather than corrupt
        if edit.span.start < cursor || edit.span.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..edit.span.start]);
        out.push_str(&edit.replacement);
        cursor = edit.span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Edits for every occurrence whose macro text has a value
pub fn edits(scan: &MacroScan, values: &HashMap<String, String>) -> Vec<Edit> {
    scan.occurrences()
        .iter()
        .filter_map(|o| {
            values.get(&o.text).map(|value| Edit {
                span: o.span(),
                replacement: value.clone(),
            })
        })
        .collect()
}

/// Replace macros in `text` using `macro text -> value`
pub fn rewrite(text: &str, scan: &MacroScan, values: &HashMap<String, String>) -> String {
    apply_edits(text, &edits(scan, values))
}

/// Piece of a rewritten text, for renderers that style resolved macros
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fragment {
    Text { text: String },
    Macro { source: String, value: String },
}

/// Split `text` into literal and resolved-macro fragments
pub fn fragments(text: &str, scan: &MacroScan, values: &HashMap<String, String>) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for occurrence in scan.occurrences() {
        let Some(value) = values.get(&occurrence.text) else {
            continue;
        };
        if occurrence.start > cursor {
            out.push(Fragment::Text {
                text: text[cursor..occurrence.start].to_string(),
            });
        }
        out.push(Fragment::Macro {
            source: occurrence.text.clone(),
            value: value.clone(),
        });
        cursor = occurrence.end();
    }
    if cursor < text.len() {
        out.push(Fragment::Text {
            text: text[cursor..].to_string(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{scan, MacroGroup, MacroTypes};

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_rewrite_forward_pass() {
        let text = "Host: {HOST.HOST}, IP: {HOST.IP} ({HOST.HOST})";
        let types = MacroTypes::new().with_macros(&[MacroGroup::Host, MacroGroup::Interface]);
        let scan = scan(text, &types);
        let values = values(&[("{HOST.HOST}", "sh"), ("{HOST.IP}", "10.0.0.1")]);
        assert_eq!(rewrite(text, &scan, &values), "Host: sh, IP: 10.0.0.1 (sh)");
    }

    #[test]
    fn test_missing_values_stay_literal() {
        let text = "{$A} and {$B}";
        let scan = scan(text, &MacroTypes::new().with_usermacros());
        let values = values(&[("{$B}", "b")]);
        assert_eq!(rewrite(text, &scan, &values), "{$A} and b");
    }

    #[test]
    fn test_replacement_containing_macro_text_is_not_rescanned() {
        let text = "{$A}{$B}";
        let scan = scan(text, &MacroTypes::new().with_usermacros());
        let values = values(&[("{$A}", "{$B}"), ("{$B}", "x")]);
        assert_eq!(rewrite(text, &scan, &values), "{$B}x");
    }

    #[test]
    fn test_apply_edits_skips_overlaps() {
        let edits = vec![
            Edit {
                span: 0..3,
                replacement: "X".to_string(),
            },
            Edit {
                span: 2..4,
                replacement: "Y".to_string(),
            },
        ];
        assert_eq!(apply_edits("abcdef", &edits), "Xdef");
    }

    #[test]
    fn test_fragments() {
        let text = "up {HOST.HOST}!";
        let scan = scan(text, &MacroTypes::new().with_macros(&[MacroGroup::Host]));
        let values = values(&[("{HOST.HOST}", "sh")]);
        assert_eq!(
            fragments(text, &scan, &values),
            vec![
                Fragment::Text {
                    text: "up ".to_string()
                },
                Fragment::Macro {
                    source: "{HOST.HOST}".to_string(),
                    value: "sh".to_string()
                },
                Fragment::Text {
                    text: "!".to_string()
                },
            ]
        );
    }
}
