//! The engine facade: every read goes validate → build → cache → store, and
//! every write goes store → tag invalidation → audit append, in that order.
//!
//! Cloning an `Engine` is cheap; all clones share the same store, cache, and
//! audit sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use tracing::debug;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::bounds::{self, Bounds};
use crate::cache::ListCache;
use crate::descriptor::FilterKind;
use crate::entity::catalog::{ActivityLog, FulfillmentStatus, Order};
use crate::entity::Entity;
use crate::error::Error;
use crate::plan;
use crate::spec::{ListParams, ListSpec};
use crate::store::{DataStore, Page, Record};
use crate::value::ToFieldValue;

/// List results may be served up to this much after the underlying write.
pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(1);
/// Bounds and facets drift slowly; tag invalidation handles the rest.
pub const DEFAULT_BOUNDS_TTL: Duration = Duration::from_secs(3600);

struct Inner {
    store: Arc<dyn DataStore>,
    cache: Arc<dyn ListCache>,
    audit: Arc<dyn AuditSink>,
    list_ttl: Duration,
    bounds_ttl: Duration,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DataStore>,
        cache: Arc<dyn ListCache>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_ttls(store, cache, audit, DEFAULT_LIST_TTL, DEFAULT_BOUNDS_TTL)
    }

    pub fn with_ttls(
        store: Arc<dyn DataStore>,
        cache: Arc<dyn ListCache>,
        audit: Arc<dyn AuditSink>,
        list_ttl: Duration,
        bounds_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                audit,
                list_ttl,
                bounds_ttl,
            }),
        }
    }

    /* ---------------- READS ---------------- */

    /// Validate raw parameters against the entity's descriptor, then run the
    /// list query. Unknown sorts fall back to the default order here.
    pub async fn list<E: Entity>(&self, params: ListParams) -> Result<Page<E>, Error> {
        let spec = params.validate(E::DESCRIPTOR)?;
        self.list_spec::<E>(&spec).await
    }

    /// Run an already-normalized spec. Unlike `list`, a sort column the
    /// descriptor does not declare is an `UnsupportedSort` error.
    pub async fn list_spec<E: Entity>(&self, spec: &ListSpec) -> Result<Page<E>, Error> {
        let key = spec.cache_key(E::RELATION);
        if let Some(cached) = self.inner.cache.get(&key).await {
            let page: Page<Record> = serde_json::from_value(cached)
                .map_err(|e| Error::Deserialize(e.to_string()))?;
            return page.into_entities();
        }

        let query = plan::build(spec, E::DESCRIPTOR)?;
        let started = Instant::now();
        let page = self.inner.store.select(&query).await?;
        histogram!("smartstock_list_duration_seconds", "relation" => E::RELATION)
            .record(started.elapsed().as_secs_f64());
        debug!(
            relation = E::RELATION,
            total = page.total,
            rows = page.rows.len(),
            "list query executed"
        );

        let value =
            serde_json::to_value(&page).expect("Failed to serialize result page");
        self.inner
            .cache
            .put(&key, value, self.inner.list_ttl, &[E::RELATION])
            .await;
        page.into_entities()
    }

    /// Single row by id within the organization. A row that exists under a
    /// different organization is indistinguishable from one that does not
    /// exist.
    pub async fn get<E: Entity>(&self, org: Uuid, id: Uuid) -> Result<E, Error> {
        let record = self
            .inner
            .store
            .fetch(E::RELATION, org, id)
            .await?
            .ok_or(Error::NotFound)?;
        record.to_entity()
    }

    /// Min/max of a range-filterable column within the organization, cached
    /// on the hour scale and invalidated with the entity's tag.
    pub async fn bounds<E: Entity>(&self, org: Uuid, column: &str) -> Result<Bounds, Error> {
        let kind = bounds::range_kind(E::DESCRIPTOR, column)?;
        let key = format!("{}:bounds:{}:{}", E::RELATION, column, org);
        if let Some(cached) = self.inner.cache.get(&key).await {
            return serde_json::from_value(cached)
                .map_err(|e| Error::Deserialize(e.to_string()));
        }

        let bounds =
            bounds::resolve(self.inner.store.as_ref(), E::RELATION, org, column, kind).await?;
        let value = serde_json::to_value(&bounds).expect("Failed to serialize bounds");
        self.inner
            .cache
            .put(&key, value, self.inner.bounds_ttl, &[E::RELATION])
            .await;
        Ok(bounds)
    }

    /// Distinct values of an open multi-select column (e.g. customer cities),
    /// for populating facet option lists.
    pub async fn facet<E: Entity>(&self, org: Uuid, column: &str) -> Result<Vec<String>, Error> {
        match E::DESCRIPTOR.filter(column).map(|c| c.kind) {
            Some(FilterKind::MultiSelect { .. }) => {}
            _ => return Err(Error::validation(column, "not a multi-select column")),
        }
        let key = format!("{}:facet:{}:{}", E::RELATION, column, org);
        if let Some(cached) = self.inner.cache.get(&key).await {
            return serde_json::from_value(cached)
                .map_err(|e| Error::Deserialize(e.to_string()));
        }

        let values = self.inner.store.distinct(E::RELATION, org, column).await?;
        let value = serde_json::to_value(&values).expect("Failed to serialize facet");
        self.inner
            .cache
            .put(&key, value, self.inner.bounds_ttl, &[E::RELATION])
            .await;
        Ok(values)
    }

    /* ---------------- WRITES ---------------- */

    /// Insert an entity and log the creation. The entity's own organization
    /// must match `org`; a mismatch is a scope violation, not a not-found.
    pub async fn create<E: Entity>(&self, org: Uuid, entity: &E, actor: Uuid) -> Result<E, Error> {
        if entity.meta().org != org {
            return Err(Error::ScopeViolation);
        }
        let record = self.inner.store.insert(Record::from_entity(entity)).await?;
        self.inner.cache.invalidate(E::RELATION).await;
        self.audit(
            org,
            actor,
            format!("{}: Create", E::DISPLAY),
            format!("{} \"{}\" has been created.", E::DISPLAY, entity.label()),
        )
        .await?;
        record.to_entity()
    }

    /// Create an order, assigning the next organization-scoped order number.
    /// The caller supplies `total` as computed at order time; it is stored
    /// verbatim and never re-derived from the product's current price.
    pub async fn create_order(
        &self,
        org: Uuid,
        mut order: Order,
        actor: Uuid,
    ) -> Result<Order, Error> {
        if order.meta.org != org {
            return Err(Error::ScopeViolation);
        }
        order.order_number = self.inner.store.next_sequence(org, "order_number").await?;
        self.create(org, &order, actor).await
    }

    /// Full-record update matched on id and organization.
    pub async fn update<E: Entity>(&self, org: Uuid, entity: &E, actor: Uuid) -> Result<E, Error> {
        if entity.meta().org != org {
            return Err(Error::ScopeViolation);
        }
        let record = self.inner.store.update(Record::from_entity(entity)).await?;
        self.inner.cache.invalidate(E::RELATION).await;
        self.audit(
            org,
            actor,
            format!("{}: Update", E::DISPLAY),
            format!("{} \"{}\" has been updated.", E::DISPLAY, entity.label()),
        )
        .await?;
        record.to_entity()
    }

    /// Bulk delete within the organization; ids outside it are silently not
    /// matched. Returns the deleted entities. Deleting nothing logs nothing.
    pub async fn delete_many<E: Entity>(
        &self,
        org: Uuid,
        ids: &[Uuid],
        actor: Uuid,
    ) -> Result<Vec<E>, Error> {
        let records = self.inner.store.delete_many(E::RELATION, org, ids).await?;
        let entities = records
            .into_iter()
            .map(Record::to_entity)
            .collect::<Result<Vec<E>, Error>>()?;
        if entities.is_empty() {
            return Ok(entities);
        }

        self.inner.cache.invalidate(E::RELATION).await;
        let labels: Vec<String> = entities.iter().map(Entity::label).collect();
        self.audit(
            org,
            actor,
            format!("{}s: Delete", E::DISPLAY),
            format!(
                "{}s deleted. List of {}s: {}",
                E::DISPLAY,
                E::DISPLAY.to_lowercase(),
                labels.join(", ")
            ),
        )
        .await?;
        Ok(entities)
    }

    /// Set the fulfillment status on a batch of orders. One audit entry
    /// covers the whole batch; an empty match logs nothing.
    pub async fn set_order_fulfillment(
        &self,
        org: Uuid,
        ids: &[Uuid],
        status: FulfillmentStatus,
        actor: Uuid,
    ) -> Result<Vec<Order>, Error> {
        let records = self
            .inner
            .store
            .update_field_many(
                Order::RELATION,
                org,
                ids,
                "fulfillment_status",
                status.as_str().to_field_value(),
            )
            .await?;
        let orders = records
            .into_iter()
            .map(Record::to_entity)
            .collect::<Result<Vec<Order>, Error>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        self.inner.cache.invalidate(Order::RELATION).await;
        let numbers: Vec<String> = orders.iter().map(|o| o.order_number.to_string()).collect();
        self.audit(
            org,
            actor,
            format!(
                "Orders: Update Fulfillment Status To {}",
                status.as_str().to_uppercase()
            ),
            format!(
                "Order fulfillment status updated to {} for {} orders. List of orders: {}",
                status.as_str(),
                orders.len(),
                numbers.join(", ")
            ),
        )
        .await?;
        Ok(orders)
    }

    /// One entry per logical mutation, appended after the entity write and
    /// its invalidation. The activities tag is invalidated too, so the trail
    /// shows up on the next list. A failed append surfaces as `AuditWrite`;
    /// the entity write is already durable at that point.
    async fn audit(
        &self,
        org: Uuid,
        actor: Uuid,
        action: String,
        description: String,
    ) -> Result<(), Error> {
        let entry = ActivityLog::new(org, actor, action, description);
        self.inner
            .audit
            .append(entry)
            .await
            .map_err(|e| Error::AuditWrite(e.to_string()))?;
        self.inner.cache.invalidate(ActivityLog::RELATION).await;
        Ok(())
    }
}
