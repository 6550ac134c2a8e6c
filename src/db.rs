// src/db.rs - Database migrations and setup
use sqlx::SqlitePool;
use anyhow::Result;
use crate::models::DEFAULT_WEAPON_TYPE;

const LEGACY_INVENTORY_TABLE: &str = "fusiles";
const LEGACY_INVENTORY_BACKUP: &str = "fusiles_migrated";
const LEGACY_USERS_BACKUP: &str = "legacy_users";

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    set_aside_legacy_users(pool).await?;

    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE CHECK(length(username) >= 3 AND length(username) <= 50),
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'visitor' CHECK(
                role IN ('admin', 'visitor')
            ),
            is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
            last_login DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until DATETIME
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Create weapons table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weapons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            serial_number TEXT NOT NULL UNIQUE CHECK(length(serial_number) > 0),
            weapon_type TEXT,
            status TEXT NOT NULL,
            company TEXT,
            platoon TEXT,
            assignee TEXT
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Create audit_logs table; rows outlive the users they mention
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            action TEXT NOT NULL CHECK(
                action IN ('create', 'update', 'delete')
            ),
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            description TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME NOT NULL
        )
        "#,
    )
        .execute(pool)
        .await?;

    backfill_weapon_type(pool, "weapons", "weapon_type").await?;
    import_legacy_inventory(pool).await?;

    create_indexes(pool).await?;

    log::info!("Database migrations completed successfully");
    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let index_queries = [
        // Users indexes
        "CREATE INDEX IF NOT EXISTS idx_users_username ON users (username)",
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users (role)",

        // Weapons indexes
        "CREATE INDEX IF NOT EXISTS idx_weapons_status ON weapons (status)",
        "CREATE INDEX IF NOT EXISTS idx_weapons_company ON weapons (company)",
        "CREATE INDEX IF NOT EXISTS idx_weapons_weapon_type ON weapons (weapon_type COLLATE NOCASE)",

        // Audit logs indexes
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_user_id ON audit_logs (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_entity ON audit_logs (entity_type, entity_id)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs (created_at DESC)",
    ];

    for query in index_queries.iter() {
        sqlx::query(query).execute(pool).await?;
    }

    Ok(())
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?"
    )
        .bind(table)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?"
    )
        .bind(table)
        .bind(column)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Records from before the weapon type column existed are all rifles: add
/// the column when missing, then give every untyped record the default type.
/// `table` and `column` are internal constants, never user input.
async fn backfill_weapon_type(pool: &SqlitePool, table: &str, column: &str) -> Result<()> {
    if !column_exists(pool, table, column).await? {
        log::warn!("{} table has no {} column, adding it", table, column);
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} TEXT", table, column))
            .execute(pool)
            .await?;
    }

    let result = sqlx::query(&format!("UPDATE {} SET {} = ? WHERE {} IS NULL", table, column, column))
        .bind(DEFAULT_WEAPON_TYPE)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        log::info!("Backfilled weapon type on {} {} records", result.rows_affected(), table);
    }
    Ok(())
}

/// The old deployment kept users with plaintext passwords in a `users` table
/// of a different shape. Rename it out of the way so the current schema can
/// be created; default accounts are then seeded afresh.
async fn set_aside_legacy_users(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "users").await? || column_exists(pool, "users", "password_hash").await? {
        return Ok(());
    }

    log::warn!("Found legacy users table, renaming it to {}", LEGACY_USERS_BACKUP);
    sqlx::query(&format!("ALTER TABLE users RENAME TO {}", LEGACY_USERS_BACKUP))
        .execute(pool)
        .await?;
    Ok(())
}

/// Copy records from the old `fusiles` table into `weapons`, keeping their
/// ids, then rename the old table so the import runs once.
async fn import_legacy_inventory(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, LEGACY_INVENTORY_TABLE).await? {
        return Ok(());
    }

    backfill_weapon_type(pool, LEGACY_INVENTORY_TABLE, "tipo_arma").await?;

    let mut tx = pool.begin().await?;

    let (legacy_count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", LEGACY_INVENTORY_TABLE))
        .fetch_one(&mut *tx)
        .await?;

    // OR IGNORE skips rows whose id or serial number is already taken
    let imported = sqlx::query(&format!(
        r#"INSERT OR IGNORE INTO weapons (id, serial_number, weapon_type, status, company, platoon, assignee)
           SELECT id, numero_serie, tipo_arma, estado, compania, peloton, asignado
           FROM {} ORDER BY id"#,
        LEGACY_INVENTORY_TABLE
    ))
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query(&format!(
        "ALTER TABLE {} RENAME TO {}",
        LEGACY_INVENTORY_TABLE, LEGACY_INVENTORY_BACKUP
    ))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("Imported {} of {} legacy inventory records", imported, legacy_count);
    if (imported as i64) < legacy_count {
        log::warn!(
            "{} legacy records were skipped (duplicate id or serial number), see table {}",
            legacy_count - imported as i64,
            LEGACY_INVENTORY_BACKUP
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tests::test_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn empty_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'weapons', 'audit_logs')"
        )
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[actix_rt::test]
    async fn test_untyped_weapons_get_default_type_on_startup() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO weapons (serial_number, weapon_type, status) VALUES ('NT-1', NULL, 'baja'), ('MT-1', 'Mortero T/C', 'baja')")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();

        let types: Vec<Option<String>> = sqlx::query_scalar("SELECT weapon_type FROM weapons ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(types, vec![
            Some(DEFAULT_WEAPON_TYPE.to_string()),
            Some("Mortero T/C".to_string()),
        ]);
    }

    #[actix_rt::test]
    async fn test_legacy_inventory_is_imported_once() {
        let pool = empty_pool().await;
        sqlx::query(
            "CREATE TABLE fusiles (id INTEGER PRIMARY KEY AUTOINCREMENT, numero_serie TEXT UNIQUE NOT NULL, \
             tipo_arma TEXT, estado TEXT NOT NULL, compania TEXT, peloton TEXT, asignado TEXT)"
        )
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO fusiles (id, numero_serie, tipo_arma, estado, compania, peloton, asignado) VALUES \
             (3, 'AC-3', NULL, 'a. operaciones', 'A', '1', 'Cabo Rojas'), \
             (7, 'M6-7', 'M60E3', 'baja', 'B', '', '')"
        )
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT UNIQUE NOT NULL, password TEXT NOT NULL, role TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: Vec<(i64, String, Option<String>, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, serial_number, weapon_type, status, company, assignee FROM weapons ORDER BY id"
        )
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![
            (3, "AC-3".to_string(), Some(DEFAULT_WEAPON_TYPE.to_string()), "a. operaciones".to_string(),
             Some("A".to_string()), Some("Cabo Rojas".to_string())),
            (7, "M6-7".to_string(), Some("M60E3".to_string()), "baja".to_string(),
             Some("B".to_string()), Some(String::new())),
        ]);

        assert!(!table_exists(&pool, LEGACY_INVENTORY_TABLE).await.unwrap());
        assert!(table_exists(&pool, LEGACY_INVENTORY_BACKUP).await.unwrap());
        assert!(table_exists(&pool, LEGACY_USERS_BACKUP).await.unwrap());
        assert!(column_exists(&pool, "users", "password_hash").await.unwrap());
    }

    #[actix_rt::test]
    async fn test_legacy_inventory_without_type_column() {
        let pool = empty_pool().await;
        sqlx::query(
            "CREATE TABLE fusiles (id INTEGER PRIMARY KEY AUTOINCREMENT, numero_serie TEXT UNIQUE NOT NULL, \
             estado TEXT NOT NULL, compania TEXT, peloton TEXT, asignado TEXT)"
        )
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO fusiles (numero_serie, estado) VALUES ('OLD-1', 'baja')")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();

        let (weapon_type,): (Option<String>,) =
            sqlx::query_as("SELECT weapon_type FROM weapons WHERE serial_number = 'OLD-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(weapon_type.as_deref(), Some(DEFAULT_WEAPON_TYPE));
    }
}
