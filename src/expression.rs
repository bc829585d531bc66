//! Trigger expression helpers
//!
//! Numbered macros in trigger texts address functions by their position in
//! the expression: `{HOST.HOST2}` is the host of the second `{functionid}`.

use monitor_types::FunctionId;

use crate::scanner::{scan, MacroToken, MacroTypes};

/// Function ids of a trigger expression in order of appearance.
///
/// Duplicates are kept; `{1}>0 or {1}<5` has two positions that both point
/// at function 1.
pub fn function_ids(expression: &str) -> Vec<FunctionId> {
    // User macros are enabled so `{$X}` can never be mistaken for anything
    let types = MacroTypes::new().with_functionids().with_usermacros();
    scan(expression, &types)
        .occurrences()
        .iter()
        .filter_map(|o| match o.token {
            MacroToken::FunctionId(id) => Some(id),
            _ => None,
        })
        .collect()
}

/// Positional view over the functions of one trigger expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionalFunctions {
    ids: Vec<FunctionId>,
}

impl PositionalFunctions {
    pub fn parse(expression: &str) -> Self {
        Self {
            ids: function_ids(expression),
        }
    }

    /// Function at a macro index. Index 0 (no digit) aliases position 1.
    pub fn at(&self, index: usize) -> Option<FunctionId> {
        let position = index.max(1);
        self.ids.get(position - 1).copied()
    }

    pub fn first(&self) -> Option<FunctionId> {
        self.at(1)
    }

    pub fn ids(&self) -> &[FunctionId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_ids_in_order() {
        let ids = function_ids("{12}>0 and {7}<{$LIMIT:\"x\"} or {12}=1");
        assert_eq!(ids, vec![FunctionId(12), FunctionId(7), FunctionId(12)]);
    }

    #[test]
    fn test_positional_lookup() {
        let functions = PositionalFunctions::parse("{10}>0 or {20}>0");
        assert_eq!(functions.at(0), Some(FunctionId(10)));
        assert_eq!(functions.at(1), Some(FunctionId(10)));
        assert_eq!(functions.at(2), Some(FunctionId(20)));
        assert_eq!(functions.at(3), None);
        assert_eq!(functions.len(), 2);
    }

    #[test]
    fn test_expression_without_functions() {
        let functions = PositionalFunctions::parse("1=1");
        assert!(functions.is_empty());
        assert_eq!(functions.first(), None);
    }
}
