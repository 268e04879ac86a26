//! Append-only activity-log sink. The engine writes exactly one entry per
//! logical mutation; a failed append after a successful entity write is
//! surfaced as `Error::AuditWrite`, never swallowed.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::entity::catalog::ActivityLog;
use crate::error::Error;
use crate::store::{DataStore, Record};

#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn append(&self, entry: ActivityLog) -> Result<(), Error>;
}

/// Writes activity records through the data store into the `activity_logs`
/// relation, where the activities list view reads them back.
pub struct StoreAuditSink {
    store: Arc<dyn DataStore>,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn append(&self, entry: ActivityLog) -> Result<(), Error> {
        self.store.insert(Record::from_entity(&entry)).await?;
        Ok(())
    }
}

/// Collects entries in memory; for tests and embedders without a store-backed
/// trail.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<ActivityLog>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityLog> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: ActivityLog) -> Result<(), Error> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}
