// Typed comparison tree
//
// phase → metric → detail → comparison key → LeafStats
//
// Children are kept in first-seen order. Rows arrive sorted by their
// ordinal-prefixed phase label, so after the prefix is stripped the
// insertion order is still the execution order of the phases.

use crate::comparison::ComparisonCase;
use crate::metric_catalog::metric_info;
use crate::model::{PhaseStatRow, StatKind};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// String-keyed map preserving insertion order
///
/// Entries live in a `Vec` for ordered iteration; `index` maps each key to
/// its position so lookups stay O(1) for wide metric and detail levels.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        let idx = *self.index.get(key)?;
        Some(&mut self.entries[idx].1)
    }

    fn push_entry(&mut self, key: String, value: T) -> usize {
        let idx = self.entries.len();
        self.index.insert(key.clone(), idx);
        self.entries.push((key, value));
        idx
    }

    /// Child under `key`, created with `default` on first access
    pub fn get_or_insert_with<F>(&mut self, key: &str, default: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => self.push_entry(key.to_string(), default()),
        };
        &mut self.entries[idx].1
    }

    /// Insert or replace, keeping the original position of an existing key
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => {
                self.push_entry(key, value);
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Root of a comparison
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct ComparisonNode {
    /// `None` for a single-run view
    pub comparison_case: Option<ComparisonCase>,

    /// Distinct comparison keys in first-seen order
    pub comparison_details: Vec<String>,

    /// Run attributes shared by every compared run
    pub common_info: OrderedMap<String>,

    /// phase → metrics
    pub data: OrderedMap<PhaseNode>,
}

impl ComparisonNode {
    /// Leaf for a full path, if present
    pub fn leaf(&self, phase: &str, metric: &str, detail: &str, key: &str) -> Option<&LeafStats> {
        self.detail(phase, metric, detail)?.data.get(key)
    }

    /// Detail node for a path, if present
    pub fn detail(&self, phase: &str, metric: &str, detail: &str) -> Option<&DetailNode> {
        self.data.get(phase)?.metrics.get(metric)?.data.get(detail)
    }

    /// Visit every leaf with its path
    pub fn for_each_leaf<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str, &str, &str, &LeafStats),
    {
        for (phase, phase_node) in self.data.iter() {
            for (metric, metric_node) in phase_node.metrics.iter() {
                for (detail, detail_node) in metric_node.data.iter() {
                    for (key, leaf) in detail_node.data.iter() {
                        f(phase, metric, detail, key, leaf);
                    }
                }
            }
        }
    }
}

/// Metrics recorded in one phase
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
#[serde(transparent)]
pub struct PhaseNode {
    pub metrics: OrderedMap<MetricNode>,
}

/// One metric with its display metadata
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricNode {
    pub clean_name: String,
    pub source: String,
    pub explanation: String,
    #[serde(rename = "type")]
    pub kind: StatKind,
    pub unit: String,
    /// detail name → detail
    pub data: OrderedMap<DetailNode>,
}

impl MetricNode {
    /// Node for the metric of `row`; kind and unit come from the first row seen
    pub fn from_row(row: &PhaseStatRow) -> Self {
        let info = metric_info(&row.metric);
        Self {
            clean_name: info.clean_name,
            source: info.source,
            explanation: info.explanation,
            kind: row.kind,
            unit: row.unit.clone(),
            data: OrderedMap::new(),
        }
    }
}

/// One detail of a metric, split by comparison key
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DetailNode {
    pub name: String,
    /// Welch test between the two comparison keys, when there are exactly two
    pub p_value: Option<f64>,
    pub is_significant: Option<bool>,
    /// comparison key → leaf
    pub data: OrderedMap<LeafStats>,
}

impl DetailNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            p_value: None,
            is_significant: None,
            data: OrderedMap::new(),
        }
    }
}

/// Values and statistics of one comparison key
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct LeafStats {
    /// One value per contributing run, in canonical row order
    pub values: Vec<f64>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub ci: Option<f64>,
    pub max_mean: Option<f64>,
    pub min_mean: Option<f64>,
    /// Running max of the rows' `max_value`
    pub max: Option<f64>,
    /// Running min of the rows' `min_value`
    pub min: Option<f64>,
    pub p_value: Option<f64>,
    pub is_significant: Option<bool>,
}

impl LeafStats {
    /// Append a row value and fold its max/min; absent bounds are ignored
    pub fn push(&mut self, value: f64, max_value: Option<f64>, min_value: Option<f64>) {
        self.values.push(value);
        self.max = match (self.max, max_value) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.min = match (self.min, min_value) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}
