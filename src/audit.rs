use async_trait::async_trait;
use chrono::Utc;
use nanoid::nanoid;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};

use crate::{entities::audit_log, errors::ApiError};

pub struct AuditEntry {
    pub action: String,
    pub message: String,
    pub performed_by: String,
    pub target_entity: String,
    pub target: String,
}

/// Write side of the audit trail. Task handlers depend on this seam so the
/// audit storage stays swappable and the module graph stays acyclic.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<audit_log::Model, ApiError>;
}

pub struct DbAuditSink {
    db: DatabaseConnection,
}

impl DbAuditSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<audit_log::Model, ApiError> {
        let row = audit_log::ActiveModel {
            id: Set(nanoid!()),
            action: Set(entry.action),
            message: Set(entry.message),
            performed_by: Set(entry.performed_by),
            target_entity: Set(entry.target_entity),
            target: Set(entry.target),
            timestamp: Set(Utc::now().fixed_offset()),
        };

        Ok(row.insert(&self.db).await?)
    }
}
