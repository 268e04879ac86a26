//! SmartStock list-query engine.
//!
//! Server-side core for filterable, sortable, paginated entity lists over an
//! opaque data store. A static [`descriptor::EntityDescriptor`] per entity
//! declares what can be filtered and sorted; untrusted
//! [`spec::ListParams`] are validated into a normalized [`spec::ListSpec`],
//! compiled by [`plan::build`] into a backend-agnostic [`plan::QueryPlan`],
//! and executed through the [`store::DataStore`] contract behind a
//! tag-invalidated TTL cache.
//!
//! All reads and writes are scoped to an organization. Mutations go through
//! the [`engine::Engine`] facade, which invalidates the entity's cache tag
//! and appends one activity-log entry per logical mutation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use smartstock::audit::StoreAuditSink;
//! use smartstock::cache::MemoryCache;
//! use smartstock::engine::Engine;
//! use smartstock::entity::catalog::Order;
//! use smartstock::spec::{ListParams, RawFilter};
//! use smartstock::store::memory::MemoryStore;
//! use uuid::Uuid;
//!
//! # async fn demo() -> Result<(), smartstock::error::Error> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = Engine::new(
//!     store.clone(),
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(StoreAuditSink::new(store)),
//! );
//!
//! let org = Uuid::now_v7();
//! let page = engine
//!     .list::<Order>(
//!         ListParams::new(org)
//!             .per_page(20)
//!             .sort("total", true)
//!             .filter("total", RawFilter::Numbers(vec![20.0, 100.0])),
//!     )
//!     .await?;
//! println!("{} of {} orders", page.rows.len(), page.total);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod bounds;
pub mod cache;
pub mod descriptor;
pub mod engine;
pub mod entity;
pub mod error;
pub mod plan;
pub mod search;
pub mod spec;
pub mod store;
pub mod value;

pub use crate::engine::Engine;
pub use crate::entity::{Entity, Meta};
pub use crate::error::Error;
pub use crate::spec::{ListParams, ListSpec};
pub use crate::store::Page;
pub use crate::value::FieldValue;
