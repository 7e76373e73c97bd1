//! Column schema types, lazy column-group bookkeeping, and numeric scans.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::traits::Annotation;

/// Semantic type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnClass {
    /// Continuous values usable for color maps and scatter axes.
    Numeric,
    /// Free-form text.
    String,
    /// Discrete labels from a small vocabulary.
    Categorical,
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub class: ColumnClass,
}

impl Column {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: ColumnClass::Numeric,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: ColumnClass::String,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: ColumnClass::Categorical,
        }
    }
}

struct ColumnPathState {
    available: BTreeSet<String>,
    loaded: Vec<String>,
}

/// Per-table bookkeeping of lazily loadable column groups.
///
/// `available` lists the discoverable groups; `loaded` records the
/// materialized ones in load order.
pub struct ColumnPathRegistry {
    state: RwLock<ColumnPathState>,
}

impl ColumnPathRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ColumnPathState {
                available: BTreeSet::new(),
                loaded: Vec::new(),
            }),
        }
    }

    /// Replaces the set of discoverable column groups.
    pub fn set_available(&self, paths: BTreeSet<String>) {
        self.state.write().available = paths;
    }

    /// Discoverable column groups.
    pub fn available(&self) -> Vec<String> {
        self.state.read().available.iter().cloned().collect()
    }

    /// Materialized column groups, in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.state.read().loaded.clone()
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.state.read().loaded.iter().any(|p| p == path)
    }

    /// Claims `path` for loading. Returns false if it was already claimed,
    /// making repeated requests for the same group no-ops.
    pub fn mark_loaded(&self, path: &str) -> bool {
        let mut state = self.state.write();
        if state.loaded.iter().any(|p| p == path) {
            return false;
        }
        state.loaded.push(path.to_string());
        true
    }
}

impl Default for ColumnPathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scans `annotations` for the minimum and maximum of a numeric column.
///
/// Missing and NaN values are skipped; returns None if no value is loaded.
pub fn column_min_max<A: Annotation>(column: &str, annotations: &[Arc<A>]) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut seen = false;

    for annotation in annotations {
        if let Some(value) = annotation.number(column) {
            if value.is_nan() {
                continue;
            }
            seen = true;
            min = min.min(value);
            max = max.max(value);
        }
    }

    seen.then_some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_loaded_is_idempotent() {
        let registry = ColumnPathRegistry::new();
        assert!(registry.mark_loaded("morphology"));
        assert!(!registry.mark_loaded("morphology"));
        assert_eq!(registry.loaded(), vec!["morphology".to_string()]);
    }

    #[test]
    fn test_loaded_preserves_load_order() {
        let registry = ColumnPathRegistry::new();
        registry.mark_loaded("zzz");
        registry.mark_loaded("aaa");
        assert_eq!(registry.loaded(), vec!["zzz".to_string(), "aaa".to_string()]);
    }

    #[test]
    fn test_available_is_sorted_set() {
        let registry = ColumnPathRegistry::new();
        registry.set_available(
            ["beta", "alpha", "beta"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(
            registry.available(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }
}
