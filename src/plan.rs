//! Pure query builder: a validated `ListSpec` plus an entity descriptor
//! yields a deterministic `QueryPlan` for the data store.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::descriptor::{ColumnRef, EntityDescriptor, FilterKind};
use crate::error::Error;
use crate::spec::{Filter, ListSpec};

/// Storage-facing plan. Predicates are AND-combined; the organization
/// predicate is part of the plan itself and never optional.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub relation: &'static str,
    pub org: Uuid,
    pub predicates: Vec<Predicate>,
    pub order: Vec<SortKey>,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match, ORed across `columns`.
    TextLike {
        columns: &'static [&'static str],
        needle: String,
    },
    AnyOf {
        column: &'static str,
        values: Vec<String>,
    },
    NumberEq {
        column: &'static str,
        value: f64,
    },
    /// Inclusive [min, max].
    NumberBetween {
        column: &'static str,
        min: f64,
        max: f64,
    },
    DateEq {
        column: &'static str,
        value: DateTime<Utc>,
    },
    DateBetween {
        column: &'static str,
        min: DateTime<Utc>,
        max: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: ColumnRef,
    pub ascending: bool,
}

/// Translate a spec into a plan.
///
/// Filters are appended in the descriptor's declared order, so two specs with
/// the same filter set produce identical plans regardless of how the caller
/// assembled them. An unknown sort field is an `UnsupportedSort` error; the
/// decision to fall back to the default order belongs to the caller.
pub fn build(spec: &ListSpec, descriptor: &EntityDescriptor) -> Result<QueryPlan, Error> {
    let sort = descriptor
        .sort(&spec.sort.field)
        .ok_or_else(|| Error::UnsupportedSort(spec.sort.field.clone()))?;

    let mut order = vec![SortKey {
        column: sort.target,
        ascending: !spec.sort.descending,
    }];
    // Tie-break on the unique id column keeps page windows stable when
    // primary sort values collide.
    if spec.sort.field != "id" {
        order.push(SortKey {
            column: ColumnRef::Base("id"),
            ascending: false,
        });
    }

    let mut predicates = Vec::new();
    for column in descriptor.filters {
        let Some(filter) = spec.filters.get(column.name) else {
            continue;
        };
        predicates.push(predicate_for(column.name, column.kind, filter)?);
    }

    Ok(QueryPlan {
        relation: descriptor.relation,
        org: spec.org,
        predicates,
        order,
        offset: (spec.page as u64 - 1) * spec.per_page as u64,
        limit: spec.per_page as u64,
    })
}

fn predicate_for(
    name: &'static str,
    kind: FilterKind,
    filter: &Filter,
) -> Result<Predicate, Error> {
    match (kind, filter) {
        (FilterKind::Text { columns }, Filter::Text(needle)) => Ok(Predicate::TextLike {
            columns,
            needle: needle.clone(),
        }),
        (FilterKind::MultiSelect { .. }, Filter::AnyOf(values)) => Ok(Predicate::AnyOf {
            column: name,
            values: values.clone(),
        }),
        (FilterKind::NumberRange, Filter::NumberEq(value)) => Ok(Predicate::NumberEq {
            column: name,
            value: *value,
        }),
        (FilterKind::NumberRange, Filter::NumberRange { min, max }) => {
            Ok(Predicate::NumberBetween {
                column: name,
                min: *min,
                max: *max,
            })
        }
        (FilterKind::DateRange, Filter::DateEq(value)) => Ok(Predicate::DateEq {
            column: name,
            value: *value,
        }),
        (FilterKind::DateRange, Filter::DateRange { min, max }) => Ok(Predicate::DateBetween {
            column: name,
            min: *min,
            max: *max,
        }),
        _ => Err(Error::validation(
            name,
            "filter does not match the declared predicate kind",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::catalog::Order;
    use crate::entity::Entity;
    use crate::spec::ListSpec;

    fn org() -> Uuid {
        Uuid::now_v7()
    }

    #[test]
    fn org_scope_is_always_part_of_the_plan() {
        let org = org();
        let plan = build(&ListSpec::new(org), Order::DESCRIPTOR).unwrap();
        assert_eq!(plan.org, org);
        assert_eq!(plan.relation, "orders");
    }

    #[test]
    fn identical_specs_build_identical_plans() {
        let spec = ListSpec::new(org())
            .filter("total", Filter::NumberRange { min: 5.0, max: 9.0 })
            .filter("fulfillment_status", Filter::AnyOf(vec!["pending".into()]))
            .sort("total", false)
            .page(3)
            .per_page(25);
        let a = build(&spec, Order::DESCRIPTOR).unwrap();
        let b = build(&spec, Order::DESCRIPTOR).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn predicates_follow_descriptor_declaration_order() {
        // Insertion order here is reversed relative to the descriptor.
        let spec = ListSpec::new(org())
            .filter("total", Filter::NumberEq(9.0))
            .filter("fulfillment_status", Filter::AnyOf(vec!["pending".into()]));
        let plan = build(&spec, Order::DESCRIPTOR).unwrap();
        let columns: Vec<&str> = plan
            .predicates
            .iter()
            .map(|p| match p {
                Predicate::AnyOf { column, .. }
                | Predicate::NumberEq { column, .. }
                | Predicate::NumberBetween { column, .. }
                | Predicate::DateEq { column, .. }
                | Predicate::DateBetween { column, .. } => *column,
                Predicate::TextLike { columns, .. } => columns[0],
            })
            .collect();
        assert_eq!(columns, vec!["fulfillment_status", "total"]);
    }

    #[test]
    fn unknown_sort_is_an_error_not_a_fallback() {
        let spec = ListSpec::new(org()).sort("velocity", true);
        match build(&spec, Order::DESCRIPTOR) {
            Err(Error::UnsupportedSort(field)) => assert_eq!(field, "velocity"),
            other => panic!("expected UnsupportedSort, got {:?}", other),
        }
    }

    #[test]
    fn explicit_sort_keeps_id_tie_break() {
        let spec = ListSpec::new(org()).sort("total", false);
        let plan = build(&spec, Order::DESCRIPTOR).unwrap();
        assert_eq!(plan.order.len(), 2);
        assert_eq!(plan.order[0].column, ColumnRef::Base("total"));
        assert!(plan.order[0].ascending);
        assert_eq!(plan.order[1].column, ColumnRef::Base("id"));
        assert!(!plan.order[1].ascending);
    }

    #[test]
    fn sorting_by_id_has_no_redundant_tie_break() {
        let spec = ListSpec::new(org()).sort("id", true);
        let plan = build(&spec, Order::DESCRIPTOR).unwrap();
        assert_eq!(plan.order.len(), 1);
    }

    #[test]
    fn joined_sort_resolves_through_the_join_graph() {
        let spec = ListSpec::new(org()).sort("product", false);
        let plan = build(&spec, Order::DESCRIPTOR).unwrap();
        assert_eq!(
            plan.order[0].column,
            ColumnRef::Joined {
                relation: "products",
                fk: "product_id",
                column: "name",
            }
        );
    }

    #[test]
    fn window_is_zero_based_offset_limit() {
        let spec = ListSpec::new(org()).page(3).per_page(25);
        let plan = build(&spec, Order::DESCRIPTOR).unwrap();
        assert_eq!(plan.offset, 50);
        assert_eq!(plan.limit, 25);
    }
}
