//! Global min/max bounds per numeric or date column, used to parameterize
//! range-filter UI and sanity-check inbound range filters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{EntityDescriptor, FilterKind};
use crate::error::Error;
use crate::store::{DataStore, RangeKind};
use crate::value::FieldValue;

/// Both `None` when the relation has no rows for the organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min: Option<FieldValue>,
    pub max: Option<FieldValue>,
}

/// Maps a declared range column to its probe cast; any other column kind is a
/// validation error.
pub fn range_kind(descriptor: &EntityDescriptor, column: &str) -> Result<RangeKind, Error> {
    match descriptor.filter(column).map(|c| c.kind) {
        Some(FilterKind::NumberRange) => Ok(RangeKind::Number),
        Some(FilterKind::DateRange) => Ok(RangeKind::Date),
        _ => Err(Error::validation(column, "not a range-filterable column")),
    }
}

/// Two single-row probes: ascending limit 1 and descending limit 1.
pub async fn resolve(
    store: &dyn DataStore,
    relation: &'static str,
    org: Uuid,
    column: &str,
    kind: RangeKind,
) -> Result<Bounds, Error> {
    let min = store.first(relation, org, column, kind, true).await?;
    let max = store.first(relation, org, column, kind, false).await?;
    Ok(Bounds { min, max })
}

impl Bounds {
    pub fn min_number(&self) -> Option<f64> {
        self.min.as_ref().and_then(FieldValue::as_number)
    }

    pub fn max_number(&self) -> Option<f64> {
        self.max.as_ref().and_then(FieldValue::as_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::catalog::ORDERS;

    #[test]
    fn range_kind_rejects_non_range_columns() {
        assert_eq!(range_kind(&ORDERS, "total").unwrap(), RangeKind::Number);
        assert_eq!(range_kind(&ORDERS, "created_at").unwrap(), RangeKind::Date);
        assert!(range_kind(&ORDERS, "fulfillment_status").is_err());
        assert!(range_kind(&ORDERS, "nope").is_err());
    }
}
