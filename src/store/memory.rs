//! In-process data store. Executes query plans over hash-map relations with
//! the same semantics the SQL backend pushes down: AND-combined predicates,
//! multi-key ordering with joined-column resolution, exact pre-window counts.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::descriptor::ColumnRef;
use crate::error::Error;
use crate::plan::{Predicate, QueryPlan, SortKey};
use crate::store::{DataStore, Page, RangeKind, Record};
use crate::value::FieldValue;

#[derive(Default)]
struct State {
    relations: HashMap<String, Vec<Record>>,
    sequences: HashMap<(Uuid, String), u64>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(record: &Record, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::TextLike { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|col| {
                    record
                        .field(col)
                        .and_then(|v| v.as_str().map(|s| s.to_lowercase().contains(&needle)))
                        .unwrap_or(false)
                })
            }
            Predicate::AnyOf { column, values } => record
                .field(column)
                .and_then(|v| v.as_str().map(|s| values.iter().any(|x| x == s)))
                .unwrap_or(false),
            Predicate::NumberEq { column, value } => record
                .field(column)
                .and_then(|v| v.as_number())
                .map(|n| n == *value)
                .unwrap_or(false),
            Predicate::NumberBetween { column, min, max } => record
                .field(column)
                .and_then(|v| v.as_number())
                .map(|n| *min <= n && n <= *max)
                .unwrap_or(false),
            Predicate::DateEq { column, value } => record
                .field(column)
                .and_then(|v| v.as_timestamp())
                .map(|t| t == *value)
                .unwrap_or(false),
            Predicate::DateBetween { column, min, max } => record
                .field(column)
                .and_then(|v| v.as_timestamp())
                .map(|t| *min <= t && t <= *max)
                .unwrap_or(false),
        }
    }

    fn sort_value(state: &State, record: &Record, key: &SortKey) -> Option<FieldValue> {
        match key.column {
            ColumnRef::Base(column) => record.field(column),
            ColumnRef::Joined {
                relation,
                fk,
                column,
            } => {
                let target = record.field(fk)?.as_uuid()?;
                state
                    .relations
                    .get(relation)?
                    .iter()
                    .find(|r| r.id == target)?
                    .field(column)
            }
        }
    }

    fn compare(a: &Option<FieldValue>, b: &Option<FieldValue>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
        }
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, plan: &QueryPlan) -> Result<Page<Record>, Error> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<Record> = state
            .relations
            .get(plan.relation)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.org == plan.org)
                    .filter(|r| plan.predicates.iter().all(|p| Self::matches(r, p)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            for key in &plan.order {
                let va = Self::sort_value(&state, a, key);
                let vb = Self::sort_value(&state, b, key);
                let ord = Self::compare(&va, &vb);
                let ord = if key.ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let total = rows.len() as u64;
        let rows = rows
            .into_iter()
            .skip(plan.offset as usize)
            .take(plan.limit as usize)
            .collect();
        Ok(Page { rows, total })
    }

    async fn fetch(
        &self,
        relation: &'static str,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Record>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .get(relation)
            .and_then(|rows| rows.iter().find(|r| r.id == id && r.org == org))
            .cloned())
    }

    async fn first(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
        _kind: RangeKind,
        ascending: bool,
    ) -> Result<Option<FieldValue>, Error> {
        let state = self.state.lock().unwrap();
        let mut best: Option<FieldValue> = None;
        if let Some(rows) = state.relations.get(relation) {
            for value in rows
                .iter()
                .filter(|r| r.org == org)
                .filter_map(|r| r.field(column))
            {
                best = match best.take() {
                    None => Some(value),
                    Some(current) => {
                        let keep_new = match current.compare(&value) {
                            Some(Ordering::Greater) => ascending,
                            Some(Ordering::Less) => !ascending,
                            _ => false,
                        };
                        Some(if keep_new { value } else { current })
                    }
                };
            }
        }
        Ok(best)
    }

    async fn distinct(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
    ) -> Result<Vec<String>, Error> {
        let state = self.state.lock().unwrap();
        let mut values: Vec<String> = state
            .relations
            .get(relation)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.org == org)
                    .filter_map(|r| r.field(column))
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        values.sort();
        values.dedup();
        Ok(values)
    }

    async fn insert(&self, record: Record) -> Result<Record, Error> {
        let mut state = self.state.lock().unwrap();
        let rows = state.relations.entry(record.relation.clone()).or_default();
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: Record) -> Result<Record, Error> {
        let mut state = self.state.lock().unwrap();
        let rows = state
            .relations
            .get_mut(record.relation.as_str())
            .ok_or(Error::NotFound)?;
        let slot = rows
            .iter_mut()
            .find(|r| r.id == record.id && r.org == record.org)
            .ok_or(Error::NotFound)?;
        // created_at is immutable once written.
        let mut record = record;
        record.created_at = slot.created_at;
        *slot = record.clone();
        Ok(record)
    }

    async fn update_field_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
        column: &str,
        value: FieldValue,
    ) -> Result<Vec<Record>, Error> {
        let mut state = self.state.lock().unwrap();
        let mut updated = Vec::new();
        if let Some(rows) = state.relations.get_mut(relation) {
            for row in rows
                .iter_mut()
                .filter(|r| r.org == org && ids.contains(&r.id))
            {
                row.fields.insert(column.to_string(), value.clone());
                if let serde_json::Value::Object(map) = &mut row.data {
                    map.insert(column.to_string(), value.to_json());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Record>, Error> {
        let mut state = self.state.lock().unwrap();
        let mut deleted = Vec::new();
        if let Some(rows) = state.relations.get_mut(relation) {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows.drain(..) {
                if row.org == org && ids.contains(&row.id) {
                    deleted.push(row);
                } else {
                    kept.push(row);
                }
            }
            *rows = kept;
        }
        Ok(deleted)
    }

    async fn next_sequence(&self, org: Uuid, key: &str) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap();
        let counter = state
            .sequences
            .entry((org, key.to_string()))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
