pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::Error;
use crate::plan::QueryPlan;
use crate::value::FieldValue;

/// Store-level row. `data` is the full entity payload; `fields` is the
/// projection of filterable/sortable columns that predicates run against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub relation: String,
    pub org: Uuid,
    pub data: serde_json::Value,
    pub fields: BTreeMap<String, FieldValue>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn from_entity<E: Entity>(entity: &E) -> Self {
        let meta = entity.meta();
        Self {
            id: meta.id,
            relation: E::RELATION.to_string(),
            org: meta.org,
            data: serde_json::to_value(entity).expect("Failed to serialize entity"),
            fields: entity.field_index(),
            created_at: meta.created_at,
        }
    }

    pub fn to_entity<E: Entity>(self) -> Result<E, Error> {
        if self.relation != E::RELATION {
            return Err(Error::Deserialize(format!(
                "record belongs to `{}`, not `{}`",
                self.relation,
                E::RELATION
            )));
        }
        let mut entity = serde_json::from_value::<E>(self.data)
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        let meta = entity.meta_mut();
        meta.id = self.id;
        meta.org = self.org;
        meta.created_at = self.created_at;
        Ok(entity)
    }

    /// Column lookup used by predicate evaluation and sorting. `id` and
    /// `created_at` live on the record itself, everything else in `fields`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Uuid(self.id)),
            "created_at" => Some(FieldValue::Timestamp(self.created_at)),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// One page of results plus the exact count of all rows matching the plan's
/// filters before windowing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
}

impl Page<Record> {
    pub fn into_entities<E: Entity>(self) -> Result<Page<E>, Error> {
        let total = self.total;
        let rows = self
            .rows
            .into_iter()
            .map(|r| r.to_entity())
            .collect::<Result<Vec<E>, Error>>()?;
        Ok(Page { rows, total })
    }
}

/// Cast hint for bounds probes against typed backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Number,
    Date,
}

/// -----------------------------
/// Data store contract
/// -----------------------------
///
/// An opaque relational backend: scoped filter/sort/window reads with exact
/// pre-window counts, scoped writes returning the affected rows, and
/// organization-scoped sequences. Every operation takes the organization
/// explicitly; nothing here can cross a tenant boundary.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /* ---------------- READS ---------------- */
    async fn select(&self, plan: &QueryPlan) -> Result<Page<Record>, Error>;

    async fn fetch(
        &self,
        relation: &'static str,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Record>, Error>;

    /// Single-row probe: the smallest (`ascending`) or largest value of
    /// `column` within the organization, or `None` on an empty relation.
    async fn first(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
        kind: RangeKind,
        ascending: bool,
    ) -> Result<Option<FieldValue>, Error>;

    /// Distinct string values of `column` within the organization (facets).
    async fn distinct(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
    ) -> Result<Vec<String>, Error>;

    /* ---------------- WRITES ---------------- */
    async fn insert(&self, record: Record) -> Result<Record, Error>;

    /// Full-record replace, matched on id AND org.
    async fn update(&self, record: Record) -> Result<Record, Error>;

    /// Set one column on every row of `ids` that belongs to `org`; returns
    /// the updated rows. Rows outside the organization are not matched.
    async fn update_field_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
        column: &str,
        value: FieldValue,
    ) -> Result<Vec<Record>, Error>;

    /// Delete every row of `ids` that belongs to `org`; returns the deleted
    /// rows.
    async fn delete_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Record>, Error>;

    /* ---------------- SEQUENCES ---------------- */
    async fn next_sequence(&self, org: Uuid, key: &str) -> Result<u64, Error>;
}
