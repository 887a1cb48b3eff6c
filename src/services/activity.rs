//! Best-effort activity logging.
//!
//! Every mutating operation records who did what to which entity. Writes
//! happen off the request path and failures are logged, so an audit-table
//! outage cannot fail user traffic.

use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::activity_log;

#[derive(Clone)]
pub struct ActivityLogger {
    db: Arc<DbPool>,
}

impl ActivityLogger {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Record an action detached from the request. `detail` carries
    /// action-specific context as JSON.
    pub fn record(
        &self,
        actor: &AuthUser,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        detail: Option<serde_json::Value>,
    ) {
        let db = Arc::clone(&self.db);
        let entry = activity_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(Some(actor.id)),
            actor_role: Set(Some(actor.role.to_string())),
            action: Set(action.to_string()),
            entity_type: Set(Some(entity_type.to_string())),
            entity_id: Set(entity_id),
            detail: Set(detail),
            created_at: Set(chrono::Utc::now()),
        };
        let action = action.to_string();

        tokio::spawn(async move {
            if let Err(e) = entry.insert(&*db).await {
                error!(action, error = %e, "activity log write failed");
            }
        });
    }
}
