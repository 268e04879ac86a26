//! The SmartStock entity catalog: customers, products, orders, restock
//! notifications, and activity logs, each with its static descriptor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{ColumnRef, EntityDescriptor, FilterColumn, FilterKind, SortColumn};
use crate::entity::{Entity, Meta};
use crate::value::{FieldValue, ToFieldValue};

/* ---------------- status enums ---------------- */

pub const PRODUCT_STATUSES: &[&str] = &["active", "draft", "archived"];
pub const FULFILLMENT_STATUSES: &[&str] = &["pending", "fulfilled", "cancelled"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Draft => "draft",
            ProductStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::Fulfilled => "fulfilled",
            FulfillmentStatus::Cancelled => "cancelled",
        }
    }
}

/* ---------------- customers ---------------- */

pub static CUSTOMERS: EntityDescriptor = EntityDescriptor {
    relation: "customers",
    filters: &[
        FilterColumn {
            name: "created_at",
            kind: FilterKind::DateRange,
        },
        FilterColumn {
            name: "name",
            kind: FilterKind::Text { columns: &["name"] },
        },
        FilterColumn {
            name: "city",
            kind: FilterKind::MultiSelect { allowed: None },
        },
    ],
    sortable: &[
        SortColumn { id: "id", target: ColumnRef::Base("id") },
        SortColumn { id: "created_at", target: ColumnRef::Base("created_at") },
        SortColumn { id: "name", target: ColumnRef::Base("name") },
        SortColumn { id: "email", target: ColumnRef::Base("email") },
        SortColumn { id: "city", target: ColumnRef::Base("city") },
        SortColumn { id: "country", target: ColumnRef::Base("country") },
    ],
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip)]
    pub meta: Meta,
    pub name: String,
    pub email: String,
    pub city: String,
    pub country: String,
}

impl Customer {
    pub fn new(org: Uuid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            meta: Meta::new_in_org(org),
            name: name.into(),
            email: email.into(),
            city: String::new(),
            country: String::new(),
        }
    }
}

impl Entity for Customer {
    const RELATION: &'static str = "customers";
    const DISPLAY: &'static str = "Customer";
    const DESCRIPTOR: &'static EntityDescriptor = &CUSTOMERS;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn field_index(&self) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), self.name.to_field_value()),
            ("email".to_string(), self.email.to_field_value()),
            ("city".to_string(), self.city.to_field_value()),
            ("country".to_string(), self.country.to_field_value()),
        ])
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/* ---------------- products ---------------- */

pub static PRODUCTS: EntityDescriptor = EntityDescriptor {
    relation: "products",
    filters: &[
        FilterColumn {
            name: "created_at",
            kind: FilterKind::DateRange,
        },
        FilterColumn {
            name: "name",
            kind: FilterKind::Text { columns: &["name"] },
        },
        FilterColumn {
            name: "category",
            kind: FilterKind::MultiSelect { allowed: None },
        },
        FilterColumn {
            name: "status",
            kind: FilterKind::MultiSelect {
                allowed: Some(PRODUCT_STATUSES),
            },
        },
        FilterColumn {
            name: "price",
            kind: FilterKind::NumberRange,
        },
        FilterColumn {
            name: "inventory_quantity",
            kind: FilterKind::NumberRange,
        },
    ],
    sortable: &[
        SortColumn { id: "id", target: ColumnRef::Base("id") },
        SortColumn { id: "created_at", target: ColumnRef::Base("created_at") },
        SortColumn { id: "name", target: ColumnRef::Base("name") },
        SortColumn { id: "category", target: ColumnRef::Base("category") },
        SortColumn { id: "status", target: ColumnRef::Base("status") },
        SortColumn { id: "price", target: ColumnRef::Base("price") },
        SortColumn {
            id: "inventory_quantity",
            target: ColumnRef::Base("inventory_quantity"),
        },
        SortColumn {
            id: "customer",
            target: ColumnRef::Joined {
                relation: "customers",
                fk: "customer_id",
                column: "name",
            },
        },
    ],
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip)]
    pub meta: Meta,
    pub name: String,
    pub category: String,
    /// Unit price, non-negative.
    pub price: f64,
    pub inventory_quantity: u32,
    /// Restock notifications fire when inventory drops below this. Always ≥ 1.
    pub restock_threshold: u32,
    pub status: ProductStatus,
    pub customer_id: Uuid,
}

impl Product {
    pub fn new(org: Uuid, name: impl Into<String>, price: f64, customer_id: Uuid) -> Self {
        Self {
            meta: Meta::new_in_org(org),
            name: name.into(),
            category: String::new(),
            price,
            inventory_quantity: 0,
            restock_threshold: 1,
            status: ProductStatus::Draft,
            customer_id,
        }
    }
}

impl Entity for Product {
    const RELATION: &'static str = "products";
    const DISPLAY: &'static str = "Product";
    const DESCRIPTOR: &'static EntityDescriptor = &PRODUCTS;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn field_index(&self) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("name".to_string(), self.name.to_field_value()),
            ("category".to_string(), self.category.to_field_value()),
            ("price".to_string(), self.price.to_field_value()),
            (
                "inventory_quantity".to_string(),
                self.inventory_quantity.to_field_value(),
            ),
            ("status".to_string(), self.status.as_str().to_field_value()),
            ("customer_id".to_string(), self.customer_id.to_field_value()),
        ])
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/* ---------------- orders ---------------- */

pub static ORDERS: EntityDescriptor = EntityDescriptor {
    relation: "orders",
    filters: &[
        FilterColumn {
            name: "created_at",
            kind: FilterKind::DateRange,
        },
        FilterColumn {
            name: "order_number",
            kind: FilterKind::NumberRange,
        },
        FilterColumn {
            name: "fulfillment_status",
            kind: FilterKind::MultiSelect {
                allowed: Some(FULFILLMENT_STATUSES),
            },
        },
        FilterColumn {
            name: "total",
            kind: FilterKind::NumberRange,
        },
        FilterColumn {
            name: "quantity",
            kind: FilterKind::NumberRange,
        },
    ],
    sortable: &[
        SortColumn { id: "id", target: ColumnRef::Base("id") },
        SortColumn { id: "created_at", target: ColumnRef::Base("created_at") },
        SortColumn { id: "order_number", target: ColumnRef::Base("order_number") },
        SortColumn { id: "total", target: ColumnRef::Base("total") },
        SortColumn { id: "quantity", target: ColumnRef::Base("quantity") },
        SortColumn {
            id: "fulfillment_status",
            target: ColumnRef::Base("fulfillment_status"),
        },
        SortColumn {
            id: "product",
            target: ColumnRef::Joined {
                relation: "products",
                fk: "product_id",
                column: "name",
            },
        },
    ],
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub meta: Meta,
    /// Organization-scoped sequential number, assigned at creation.
    pub order_number: u64,
    pub product_id: Uuid,
    pub quantity: u32,
    /// Price × quantity as computed at creation time; never re-derived.
    pub total: f64,
    pub fulfillment_status: FulfillmentStatus,
    pub notes: String,
}

impl Order {
    pub fn new(org: Uuid, product_id: Uuid, quantity: u32, total: f64) -> Self {
        Self {
            meta: Meta::new_in_org(org),
            order_number: 0,
            product_id,
            quantity,
            total,
            fulfillment_status: FulfillmentStatus::Pending,
            notes: String::new(),
        }
    }
}

impl Entity for Order {
    const RELATION: &'static str = "orders";
    const DISPLAY: &'static str = "Order";
    const DESCRIPTOR: &'static EntityDescriptor = &ORDERS;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn field_index(&self) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("order_number".to_string(), self.order_number.to_field_value()),
            ("product_id".to_string(), self.product_id.to_field_value()),
            ("quantity".to_string(), self.quantity.to_field_value()),
            ("total".to_string(), self.total.to_field_value()),
            (
                "fulfillment_status".to_string(),
                self.fulfillment_status.as_str().to_field_value(),
            ),
        ])
    }

    fn label(&self) -> String {
        self.order_number.to_string()
    }
}

/* ---------------- restock notifications ---------------- */

pub static RESTOCK_NOTIFICATIONS: EntityDescriptor = EntityDescriptor {
    relation: "product_restock_notifications",
    filters: &[FilterColumn {
        name: "created_at",
        kind: FilterKind::DateRange,
    }],
    sortable: &[
        SortColumn { id: "id", target: ColumnRef::Base("id") },
        SortColumn { id: "created_at", target: ColumnRef::Base("created_at") },
        SortColumn {
            id: "product",
            target: ColumnRef::Joined {
                relation: "products",
                fk: "product_id",
                column: "name",
            },
        },
    ],
};

/// Created outside this engine when inventory crosses a product's restock
/// threshold; this core only lists them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockNotification {
    #[serde(skip)]
    pub meta: Meta,
    pub product_id: Uuid,
}

impl RestockNotification {
    pub fn new(org: Uuid, product_id: Uuid) -> Self {
        Self {
            meta: Meta::new_in_org(org),
            product_id,
        }
    }
}

impl Entity for RestockNotification {
    const RELATION: &'static str = "product_restock_notifications";
    const DISPLAY: &'static str = "Restock Notification";
    const DESCRIPTOR: &'static EntityDescriptor = &RESTOCK_NOTIFICATIONS;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn field_index(&self) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([("product_id".to_string(), self.product_id.to_field_value())])
    }

    fn label(&self) -> String {
        self.meta.id.to_string()
    }
}

/* ---------------- activity logs ---------------- */

pub static ACTIVITY_LOGS: EntityDescriptor = EntityDescriptor {
    relation: "activity_logs",
    filters: &[
        FilterColumn {
            name: "created_at",
            kind: FilterKind::DateRange,
        },
        // Free-text search box matching either the action label or the
        // description.
        FilterColumn {
            name: "q",
            kind: FilterKind::Text {
                columns: &["action", "description"],
            },
        },
    ],
    sortable: &[
        SortColumn { id: "id", target: ColumnRef::Base("id") },
        SortColumn { id: "created_at", target: ColumnRef::Base("created_at") },
        SortColumn { id: "action", target: ColumnRef::Base("action") },
    ],
};

/// Append-only audit record; one per logical mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(skip)]
    pub meta: Meta,
    pub user_id: Uuid,
    pub action: String,
    pub description: String,
}

impl ActivityLog {
    pub fn new(
        org: Uuid,
        user_id: Uuid,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            meta: Meta::new_in_org(org),
            user_id,
            action: action.into(),
            description: description.into(),
        }
    }
}

impl Entity for ActivityLog {
    const RELATION: &'static str = "activity_logs";
    const DISPLAY: &'static str = "Activity";
    const DESCRIPTOR: &'static EntityDescriptor = &ACTIVITY_LOGS;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    fn field_index(&self) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([
            ("user_id".to_string(), self.user_id.to_field_value()),
            ("action".to_string(), self.action.to_field_value()),
            ("description".to_string(), self.description.to_field_value()),
        ])
    }

    fn label(&self) -> String {
        self.action.clone()
    }
}
