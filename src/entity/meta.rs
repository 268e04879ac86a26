use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and scope shared by every entity: id, owning organization, and
/// creation time. Every query and write is scoped by `org`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Meta {
    pub id: Uuid,
    pub org: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            org: Uuid::nil(),
            created_at: chrono::Utc::now(),
        }
    }
}

impl Meta {
    pub fn new_in_org(org: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            org,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn org(&self) -> Uuid {
        self.org
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}
