use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::EntityDescriptor;
use crate::entity::Meta;
use crate::value::FieldValue;

/// A queryable domain entity backed by one relation.
pub trait Entity:
    Serialize + for<'de> Deserialize<'de> + Sized + Send + Sync + 'static
{
    /// Base relation name; doubles as the cache tag.
    const RELATION: &'static str;

    /// Human-facing type name used in activity-log text ("Order", "Product").
    const DISPLAY: &'static str;

    /// Filterable/sortable column declaration consumed by the query builder.
    const DESCRIPTOR: &'static EntityDescriptor;

    fn meta(&self) -> &Meta;

    fn meta_mut(&mut self) -> &mut Meta;

    /// Projection of the columns the descriptor filters or sorts on. This is
    /// what the store indexes and evaluates predicates against.
    fn field_index(&self) -> BTreeMap<String, FieldValue>;

    /// Short identifier for audit descriptions: an order number, a product
    /// name, a customer name.
    fn label(&self) -> String;
}

pub trait EntityMeta {
    fn id(&self) -> uuid::Uuid;
    fn org(&self) -> uuid::Uuid;
    fn created_at(&self) -> chrono::DateTime<chrono::Utc>;
}

impl<T: Entity> EntityMeta for T {
    fn id(&self) -> uuid::Uuid {
        self.meta().id()
    }

    fn org(&self) -> uuid::Uuid {
        self.meta().org()
    }

    fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.meta().created_at()
    }
}
