// src/main.rs - Arsenal weapons inventory service
use actix_web::{
    middleware::{Logger, DefaultHeaders},
    web, App, HttpServer,
};
use actix_web_httpauth::middleware::HttpAuthentication;
use actix_web::http::header;
use actix_cors::Cors;
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod auth;
mod audit;
mod auth_handlers;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod monitoring;
pub mod repositories;
mod statistics;
mod weapon_handlers;

use config::{generate_secret, load_config, Config};
use auth::{jwt_middleware, validate_password_strength, AuthService, User, UserRole};
use auth_handlers::{change_password, get_profile, login};
use monitoring::{Metrics, RequestLogger, start_maintenance_tasks};
use repositories::{SqliteWeaponStore, WeaponStore};

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub weapon_store: Arc<dyn WeaponStore>,
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;

    if config.is_production() {
        config.validate_production()?;
    }
    config.print_startup_info();

    let pool = create_database_pool(&config.database).await?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let auth_service = Arc::new(AuthService::new(&config.auth));

    seed_default_users(&pool, &auth_service).await?;

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
        weapon_store: Arc::new(SqliteWeaponStore::new(pool.clone())),
    });

    start_maintenance_tasks(pool.clone());

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics_arc = Arc::new(Metrics::new());
    let metrics = web::Data::new(metrics_arc.clone());
    let security_config = config.security.clone();
    let is_production = config.is_production();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&security_config.allowed_origins, is_production);
        let auth_middleware = HttpAuthentication::bearer(jwt_middleware);
        let security_headers = setup_security_headers(&security_config);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(metrics.clone())

            // Health check and metrics (no auth)
            .service(
                web::scope("/health")
                    .route("", web::get().to(monitoring::health_check))
                    .route("/ready", web::get().to(monitoring::readiness_check))
                    .route("/live", web::get().to(monitoring::liveness_check))
                    .route("/metrics", web::get().to(monitoring::metrics_endpoint))
            )

            // Auth endpoints (no authentication required)
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(login))
            )

            // Protected API endpoints
            .service(
                web::scope("/api/v1")
                    .wrap(auth_middleware)
                    .service(
                        web::scope("/auth")
                            .route("/profile", web::get().to(get_profile))
                            .route("/change-password", web::post().to(change_password))
                    )
                    .configure(weapon_handlers::configure_routes)
            )
    });

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

pub fn setup_cors(allowed_origins: &[String], is_production: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
        .expose_headers(vec![header::CONTENT_LENGTH])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") && !is_production {
        log::warn!("Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty() && o.as_str() != "*") {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    let console = config.logging.console_enabled.then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

async fn create_database_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&db_config.url)
        .with_context(|| format!("Invalid database URL: {}", db_config.url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to {}", db_config.url))?;

    Ok(pool)
}

fn setup_security_headers(config: &config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add((
            "Strict-Transport-Security",
            "max-age=31536000; includeSubDomains"
        ));
    }

    headers
}

fn generate_password() -> String {
    loop {
        let candidate = generate_secret(16);
        if validate_password_strength(&candidate).is_ok() {
            return candidate;
        }
    }
}

/// On an empty users table, create the `admin` and `visitante` accounts.
async fn seed_default_users(pool: &SqlitePool, auth_service: &AuthService) -> anyhow::Result<()> {
    let (user_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if user_count > 0 {
        return Ok(());
    }

    let defaults = [
        ("admin", UserRole::Admin, "ARSENAL_ADMIN_PASSWORD"),
        ("visitante", UserRole::Visitor, "ARSENAL_VISITOR_PASSWORD"),
    ];

    for (username, role, password_var) in defaults {
        let (password, generated) = match env::var(password_var) {
            Ok(password) => (password, false),
            Err(_) => (generate_password(), true),
        };

        User::create(pool, username, &password, role, auth_service)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create default user {}: {}", username, e))?;

        if generated {
            log::warn!("Default {} user created:", role.display_name().to_lowercase());
            log::warn!("  Username: {}", username);
            log::warn!("  Password: {} (generated - CHANGE IMMEDIATELY!)", password);
        } else {
            log::info!("Default user {} created from {}", username, password_var);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::fast_auth_service;
    use crate::repositories::tests::test_pool;

    #[test]
    fn test_generated_password_is_strong() {
        for _ in 0..20 {
            let password = generate_password();
            assert_eq!(password.len(), 16);
            assert!(validate_password_strength(&password).is_ok());
        }
    }

    #[actix_rt::test]
    async fn test_seed_default_users_runs_once() {
        let pool = test_pool().await;
        let auth_service = fast_auth_service();

        seed_default_users(&pool, &auth_service).await.unwrap();
        seed_default_users(&pool, &auth_service).await.unwrap();

        let users: Vec<(String, String)> = sqlx::query_as("SELECT username, role FROM users ORDER BY username")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(users, vec![
            ("admin".to_string(), "admin".to_string()),
            ("visitante".to_string(), "visitor".to_string()),
        ]);
    }
}
