// src/audit.rs - Audit trail for inventory mutations

use sqlx::SqlitePool;
use uuid::Uuid;
use chrono::Utc;
use actix_web::HttpRequest;

pub const WEAPON_ENTITY: &str = "weapon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }
}

/// Write one row to audit_logs.
pub async fn log_activity(
    pool: &SqlitePool,
    user_id: Option<&str>,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<&str>,
    description: Option<&str>,
    request: Option<&HttpRequest>,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    let ip_address = request.and_then(|req| {
        req.connection_info()
            .realip_remote_addr()
            .map(|s| s.to_string())
    });

    let user_agent = request.and_then(|req| {
        req.headers()
            .get("User-Agent")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    sqlx::query(
        r#"INSERT INTO audit_logs
           (id, user_id, action, entity_type, entity_id, description, ip_address, user_agent, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
    )
    .bind(&id)
    .bind(user_id)
    .bind(action.as_str())
    .bind(entity_type)
    .bind(entity_id)
    .bind(description)
    .bind(&ip_address)
    .bind(&user_agent)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit a weapon mutation. A failed write is logged, never surfaced to the caller.
pub async fn audit_weapon(
    pool: &SqlitePool,
    user_id: &str,
    action: AuditAction,
    weapon_id: i64,
    description: &str,
    request: &HttpRequest,
) {
    if let Err(e) = log_activity(
        pool,
        Some(user_id),
        action,
        WEAPON_ENTITY,
        Some(&weapon_id.to_string()),
        Some(description),
        Some(request),
    ).await {
        log::error!("Failed to write audit log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tests::test_pool;

    #[actix_rt::test]
    async fn test_log_activity_without_request() {
        let pool = test_pool().await;

        log_activity(&pool, Some("u-1"), AuditAction::Delete, WEAPON_ENTITY, Some("7"), Some("Deleted AC-7"), None)
            .await
            .unwrap();

        let (action, entity_id, ip): (String, String, Option<String>) = sqlx::query_as(
            "SELECT action, entity_id, ip_address FROM audit_logs"
        )
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(action, "delete");
        assert_eq!(entity_id, "7");
        assert_eq!(ip, None);
    }
}
