//! Static entity descriptors consumed by the query builder.
//!
//! A descriptor declares, per entity, the base relation, the filterable
//! columns with their predicate kind, and the sortable columns — including
//! sorts that order by a joined relation's column, which carry their own join
//! coordinates. One declarative table per entity replaces per-entity query
//! code.

/// Predicate kind of a filterable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Case-insensitive substring match over one or more columns. A search
    /// box that matches several columns ORs them inside the one predicate.
    Text { columns: &'static [&'static str] },
    /// Membership in a value list. `allowed` closes the set (unknown values
    /// are dropped at validation); `None` leaves it open (facet values such
    /// as cities or categories).
    MultiSelect { allowed: Option<&'static [&'static str]> },
    /// Closed numeric range; a single value is an equality predicate.
    NumberRange,
    /// Closed date range; a single value is an equality predicate.
    DateRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterColumn {
    pub name: &'static str,
    pub kind: FilterKind,
}

/// Column a sort resolves to: a base-relation column, or a column reached
/// through a declared join (e.g. ordering orders by `product.name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef {
    Base(&'static str),
    Joined {
        relation: &'static str,
        fk: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    /// Identifier the caller sorts by ("total", "product", ...).
    pub id: &'static str,
    pub target: ColumnRef,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub relation: &'static str,
    /// Declared filter order is the predicate application order.
    pub filters: &'static [FilterColumn],
    pub sortable: &'static [SortColumn],
}

impl EntityDescriptor {
    pub fn filter(&self, name: &str) -> Option<&'static FilterColumn> {
        self.filters.iter().find(|c| c.name == name)
    }

    pub fn sort(&self, id: &str) -> Option<&'static SortColumn> {
        self.sortable.iter().find(|c| c.id == id)
    }
}
