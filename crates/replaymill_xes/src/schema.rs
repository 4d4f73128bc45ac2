//! Global schema unification.
//!
//! Column sets vary per event and per file, and cell types are only known
//! after parsing. The builder observes every record across all sources, then
//! reconciles once into a fixed, data-derived schema: the union of all
//! observed columns in canonical order, each with a promoted column type.

use std::collections::HashMap;

use crate::record::EventRecord;
use crate::value::AttrValue;

/// Canonical leading columns for the persisted event table. Observed columns
/// outside this list follow in first-encountered order.
pub const PREFERRED_COLUMNS: &[&str] = &[
    "event_id",
    "ts",
    "activity",
    "match_id",
    "player_id",
    "map_type",
    "civilization",
    "civilization_category",
    "elo",
    "case_id",
    "strategy",
    "win",
    "amount",
    "@@index",
    "@@case_index",
];

/// Promoted storage type of one output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int64,
    Float64,
    Utf8,
    Timestamp,
}

fn kind_of(value: &AttrValue) -> Option<ColumnKind> {
    match value {
        AttrValue::Str(_) => Some(ColumnKind::Utf8),
        AttrValue::Int(_) => Some(ColumnKind::Int64),
        AttrValue::Float(_) => Some(ColumnKind::Float64),
        AttrValue::Timestamp(_) => Some(ColumnKind::Timestamp),
        AttrValue::Missing => None,
    }
}

/// Widening promotion: ints widen to floats, everything else degrades to
/// strings. Missing cells never influence a column's type.
fn merge_kinds(current: Option<ColumnKind>, observed: Option<ColumnKind>) -> Option<ColumnKind> {
    use ColumnKind::*;
    match (current, observed) {
        (None, k) => k,
        (k, None) => k,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(Int64), Some(Float64)) | (Some(Float64), Some(Int64)) => Some(Float64),
        _ => Some(Utf8),
    }
}

/// Accumulates column observations across all rows of a run.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    kinds: Vec<Option<ColumnKind>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &EventRecord) {
        for (key, value) in record.iter() {
            let idx = match self.index.get(key) {
                Some(idx) => *idx,
                None => {
                    let idx = self.columns.len();
                    self.columns.push(key.to_string());
                    self.index.insert(key.to_string(), idx);
                    self.kinds.push(None);
                    idx
                }
            };
            self.kinds[idx] = merge_kinds(self.kinds[idx], kind_of(value));
        }
    }

    /// Resolve the final column order and types. Runs once, after every
    /// source file has been read.
    pub fn unify(self) -> UnifiedSchema {
        let mut columns = Vec::with_capacity(self.columns.len());

        for preferred in PREFERRED_COLUMNS {
            if let Some(&idx) = self.index.get(*preferred) {
                columns.push((
                    self.columns[idx].clone(),
                    self.kinds[idx].unwrap_or(ColumnKind::Utf8),
                ));
            }
        }
        for (idx, name) in self.columns.iter().enumerate() {
            if !PREFERRED_COLUMNS.contains(&name.as_str()) {
                columns.push((name.clone(), self.kinds[idx].unwrap_or(ColumnKind::Utf8)));
            }
        }

        UnifiedSchema { columns }
    }
}

/// The reconciled output schema: every observed column, canonically ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedSchema {
    columns: Vec<(String, ColumnKind)>,
}

impl UnifiedSchema {
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
