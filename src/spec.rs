//! List-query parameters: raw untrusted input, validation into a normalized
//! spec, and the canonical cache-key serialization.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::descriptor::{EntityDescriptor, FilterKind};
use crate::error::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Raw filter value as it arrives from a UI: untyped apart from its shape.
#[derive(Debug, Clone)]
pub enum RawFilter {
    Text(String),
    Values(Vec<String>),
    Numbers(Vec<f64>),
    Dates(Vec<DateTime<Utc>>),
}

#[derive(Debug, Clone)]
pub struct SortParam {
    pub id: String,
    pub desc: bool,
}

/// Untrusted list-query input. Validate against an entity descriptor to get a
/// `ListSpec`.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub org: Uuid,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<SortParam>,
    pub filters: BTreeMap<String, RawFilter>,
}

impl ListParams {
    pub fn new(org: Uuid) -> Self {
        Self {
            org,
            page: None,
            per_page: None,
            sort: None,
            filters: BTreeMap::new(),
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn sort(mut self, id: impl Into<String>, desc: bool) -> Self {
        self.sort = Some(SortParam {
            id: id.into(),
            desc,
        });
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: RawFilter) -> Self {
        self.filters.insert(name.into(), value);
        self
    }

    /// Normalize into a `ListSpec`, or fail with a `Validation` error naming
    /// the offending field.
    ///
    /// An unknown sort column falls back to the default order here — this is
    /// the UI-layer fallback. The builder itself (`plan::build`) stays strict
    /// and raises `UnsupportedSort` instead.
    pub fn validate(self, descriptor: &EntityDescriptor) -> Result<ListSpec, Error> {
        let page = match self.page {
            None => DEFAULT_PAGE,
            Some(p) if p >= 1 => p,
            Some(_) => return Err(Error::validation("page", "must be a positive integer")),
        };
        let per_page = match self.per_page {
            None => DEFAULT_PER_PAGE,
            Some(p) if p >= 1 => p,
            Some(_) => return Err(Error::validation("per_page", "must be a positive integer")),
        };

        let sort = match self.sort {
            Some(s) if descriptor.sort(&s.id).is_some() => Sort {
                field: s.id,
                descending: s.desc,
            },
            _ => Sort::default_order(),
        };

        let mut filters = BTreeMap::new();
        for (name, raw) in self.filters {
            let column = descriptor
                .filter(&name)
                .ok_or_else(|| Error::validation(&name, "unknown filter column"))?;
            if let Some(filter) = normalize_filter(&name, column.kind, raw)? {
                filters.insert(name, filter);
            }
        }

        Ok(ListSpec {
            org: self.org,
            page,
            per_page,
            sort,
            filters,
        })
    }
}

fn normalize_filter(
    name: &str,
    kind: FilterKind,
    raw: RawFilter,
) -> Result<Option<Filter>, Error> {
    match (kind, raw) {
        (FilterKind::Text { .. }, RawFilter::Text(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(Filter::Text(s)))
            }
        }
        (FilterKind::MultiSelect { allowed }, RawFilter::Values(mut values)) => {
            if let Some(allowed) = allowed {
                values.retain(|v| allowed.contains(&v.as_str()));
            }
            values.sort();
            values.dedup();
            if values.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Filter::AnyOf(values)))
            }
        }
        (FilterKind::NumberRange, RawFilter::Numbers(ns)) => {
            if ns.iter().any(|n| n.is_nan()) {
                return Err(Error::validation(name, "range bound is not a number"));
            }
            match ns.as_slice() {
                [] => Ok(None),
                [v] => Ok(Some(Filter::NumberEq(*v))),
                [min, max] => {
                    if min > max {
                        Err(Error::validation(name, "range min exceeds max"))
                    } else {
                        Ok(Some(Filter::NumberRange {
                            min: *min,
                            max: *max,
                        }))
                    }
                }
                _ => Err(Error::validation(name, "range takes one or two values")),
            }
        }
        (FilterKind::DateRange, RawFilter::Dates(ds)) => match ds.as_slice() {
            [] => Ok(None),
            [v] => Ok(Some(Filter::DateEq(*v))),
            [min, max] => {
                if min > max {
                    Err(Error::validation(name, "range min exceeds max"))
                } else {
                    Ok(Some(Filter::DateRange {
                        min: *min,
                        max: *max,
                    }))
                }
            }
            _ => Err(Error::validation(name, "range takes one or two values")),
        },
        _ => Err(Error::validation(name, "value shape does not match filter kind")),
    }
}

/// Normalized, validated filter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Filter {
    Text(String),
    /// Sorted, deduplicated membership list.
    AnyOf(Vec<String>),
    NumberEq(f64),
    NumberRange { min: f64, max: f64 },
    DateEq(DateTime<Utc>),
    DateRange {
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    /// `created_at desc`; the builder adds the `id desc` tie-break.
    pub fn default_order() -> Self {
        Sort {
            field: "created_at".to_string(),
            descending: true,
        }
    }
}

/// Normalized description of a list query, independent of any entity.
///
/// The filter map is ordered by column name and multi-select values are
/// sorted, so serializing a spec always yields the same bytes for the same
/// logical query.
#[derive(Debug, Clone, Serialize)]
pub struct ListSpec {
    pub org: Uuid,
    pub page: u32,
    pub per_page: u32,
    pub sort: Sort,
    pub filters: BTreeMap<String, Filter>,
}

impl ListSpec {
    pub fn new(org: Uuid) -> Self {
        Self {
            org,
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: Sort::default_order(),
            filters: BTreeMap::new(),
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = Sort {
            field: field.into(),
            descending,
        };
        self
    }

    pub fn filter(mut self, name: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(name.into(), filter);
        self
    }

    /// Cache key: relation prefix plus a blake3 hash of the canonical
    /// serialization.
    pub fn cache_key(&self, relation: &str) -> String {
        let canonical =
            serde_json::to_vec(self).expect("Failed to serialize list spec");
        format!("{}:{}", relation, blake3::hash(&canonical).to_hex())
    }
}
