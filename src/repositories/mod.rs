// src/repositories/mod.rs
//! Record store for the weapons inventory.

use async_trait::async_trait;
use sqlx::SqlitePool;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::{NewWeapon, Weapon, WeaponChanges};

const WEAPON_COLUMNS: &str =
    "id, serial_number, weapon_type, status, company, platoon, assignee";

/// Persistence contract the handlers and the statistics endpoint rely on.
#[async_trait]
pub trait WeaponStore: Send + Sync {
    /// Every record, ordered by id
    async fn fetch_all(&self) -> ApiResult<Vec<Weapon>>;

    async fn get(&self, id: i64) -> ApiResult<Option<Weapon>>;

    /// Fails with `Conflict` when the serial number is already registered
    async fn insert(&self, weapon: NewWeapon) -> ApiResult<Weapon>;

    async fn update(&self, id: i64, changes: WeaponChanges) -> ApiResult<Weapon>;

    async fn delete(&self, id: i64) -> ApiResult<()>;

    /// Case-insensitive substring match on any text column
    async fn search(&self, filter: &str) -> ApiResult<Vec<Weapon>>;
}

pub struct SqliteWeaponStore {
    pool: SqlitePool,
}

impl SqliteWeaponStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards so the filter is matched literally.
fn like_pattern(filter: &str) -> String {
    let escaped = filter
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl WeaponStore for SqliteWeaponStore {
    async fn fetch_all(&self) -> ApiResult<Vec<Weapon>> {
        let query = format!("SELECT {} FROM weapons ORDER BY id", WEAPON_COLUMNS);
        let weapons = sqlx::query_as::<_, Weapon>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(weapons)
    }

    async fn get(&self, id: i64) -> ApiResult<Option<Weapon>> {
        let query = format!("SELECT {} FROM weapons WHERE id = ?", WEAPON_COLUMNS);
        let weapon = sqlx::query_as::<_, Weapon>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(weapon)
    }

    async fn insert(&self, weapon: NewWeapon) -> ApiResult<Weapon> {
        let result = sqlx::query(
            r#"INSERT INTO weapons (serial_number, weapon_type, status, company, platoon, assignee)
               VALUES (?, ?, ?, ?, ?, ?)"#
        )
            .bind(&weapon.serial_number)
            .bind(&weapon.weapon_type)
            .bind(&weapon.status)
            .bind(&weapon.company)
            .bind(&weapon.platoon)
            .bind(&weapon.assignee)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::serial_number_taken(&weapon.serial_number)
                } else {
                    ApiError::from(e)
                }
            })?;

        Ok(Weapon {
            id: result.last_insert_rowid(),
            serial_number: weapon.serial_number,
            weapon_type: weapon.weapon_type,
            status: weapon.status,
            company: weapon.company,
            platoon: weapon.platoon,
            assignee: weapon.assignee,
        })
    }

    async fn update(&self, id: i64, changes: WeaponChanges) -> ApiResult<Weapon> {
        let result = sqlx::query(
            r#"UPDATE weapons
               SET serial_number = ?, weapon_type = ?, status = COALESCE(?, status),
                   company = ?, platoon = ?, assignee = ?
               WHERE id = ?"#
        )
            .bind(&changes.serial_number)
            .bind(&changes.weapon_type)
            .bind(&changes.status)
            .bind(&changes.company)
            .bind(&changes.platoon)
            .bind(&changes.assignee)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::serial_number_taken(&changes.serial_number)
                } else {
                    ApiError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::weapon_not_found(id));
        }

        self.get(id).await?.ok_or_else(|| ApiError::weapon_not_found(id))
    }

    async fn delete(&self, id: i64) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM weapons WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::weapon_not_found(id));
        }

        Ok(())
    }

    async fn search(&self, filter: &str) -> ApiResult<Vec<Weapon>> {
        let searchable = ["serial_number", "weapon_type", "status", "company", "platoon", "assignee"];
        let conditions: Vec<String> = searchable
            .iter()
            .map(|column| format!("LOWER({}) LIKE ? ESCAPE '\\'", column))
            .collect();
        let query = format!(
            "SELECT {} FROM weapons WHERE {} ORDER BY id",
            WEAPON_COLUMNS,
            conditions.join(" OR ")
        );

        let pattern = like_pattern(filter);
        let mut search_query = sqlx::query_as::<_, Weapon>(&query);
        for _ in &searchable {
            search_query = search_query.bind(&pattern);
        }

        let weapons = search_query.fetch_all(&self.pool).await?;
        Ok(weapons)
    }
}
