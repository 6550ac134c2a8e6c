// src/weapon_handlers.rs
//! Inventory endpoints: CRUD, search and the statistics report.

use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use log::{error, info};

use crate::AppState;
use crate::audit::{audit_weapon, AuditAction};
use crate::auth_handlers::{check_weapon_permission, WeaponAction};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::{
    CreateWeaponRequest, UpdateWeaponRequest, WeaponList, WeaponSearchQuery, WeaponView,
};
use crate::statistics::compute_statistics;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/weapons")
            .route("", web::get().to(list_weapons))
            .route("", web::post().to(create_weapon))
            .route("/search", web::get().to(search_weapons))
            .route("/statistics", web::get().to(get_statistics))
            .route("/{id}", web::put().to(update_weapon))
            .route("/{id}", web::delete().to(delete_weapon))
    );
}

pub async fn list_weapons(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    check_weapon_permission(&http_request, WeaponAction::List)?;

    let weapons = app_state.weapon_store.fetch_all().await?;
    Ok(HttpResponse::Ok().json(WeaponList::from(weapons)))
}

pub async fn search_weapons(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<WeaponSearchQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    check_weapon_permission(&http_request, WeaponAction::Search)?;

    let filter = query.filtro.as_deref().unwrap_or("");
    let weapons = app_state.weapon_store.search(filter).await?;
    Ok(HttpResponse::Ok().json(WeaponList::from(weapons)))
}

pub async fn create_weapon(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<CreateWeaponRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = check_weapon_permission(&http_request, WeaponAction::Create)?;

    let new_weapon = request.into_inner().into_new_weapon()?;
    let weapon = app_state.weapon_store.insert(new_weapon).await?;

    audit_weapon(
        &app_state.db_pool,
        &claims.sub,
        AuditAction::Create,
        weapon.id,
        &format!("Registered weapon '{}'", weapon.serial_number),
        &http_request,
    ).await;

    info!("Weapon {} ({}) created by {}", weapon.id, weapon.serial_number, claims.username);

    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        WeaponView::from(weapon),
        "Weapon created successfully".to_string(),
    )))
}

pub async fn update_weapon(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<i64>,
    request: web::Json<UpdateWeaponRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let weapon_id = path.into_inner();
    let claims = check_weapon_permission(&http_request, WeaponAction::Edit)?;

    let changes = request.into_inner().into_changes()?;
    let weapon = app_state.weapon_store.update(weapon_id, changes).await?;

    audit_weapon(
        &app_state.db_pool,
        &claims.sub,
        AuditAction::Update,
        weapon.id,
        &format!("Updated weapon '{}'", weapon.serial_number),
        &http_request,
    ).await;

    info!("Weapon {} updated by {}", weapon.id, claims.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        WeaponView::from(weapon),
        "Weapon updated successfully".to_string(),
    )))
}

pub async fn delete_weapon(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<i64>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let weapon_id = path.into_inner();
    let claims = check_weapon_permission(&http_request, WeaponAction::Delete)?;

    app_state.weapon_store.delete(weapon_id).await?;

    audit_weapon(
        &app_state.db_pool,
        &claims.sub,
        AuditAction::Delete,
        weapon_id,
        &format!("Deleted weapon {}", weapon_id),
        &http_request,
    ).await;

    info!("Weapon {} deleted by {}", weapon_id, claims.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Weapon deleted successfully".to_string(),
    )))
}

/// Statistics over the whole inventory. Served without the response
/// envelope so existing dashboards can read the keys directly.
#[tracing::instrument(skip_all)]
pub async fn get_statistics(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    check_weapon_permission(&http_request, WeaponAction::ViewStatistics)?;

    let weapons = app_state.weapon_store.fetch_all().await.map_err(|e| {
        error!("Failed to load inventory for statistics: {}", e);
        ApiError::data_unavailable(e)
    })?;

    let report = compute_statistics(&weapons);
    Ok(HttpResponse::Ok().json(report))
}
