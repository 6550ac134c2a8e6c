// src/auth_handlers.rs - Authentication route handlers and weapon permissions

use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;
use std::sync::Arc;
use chrono::Duration;
use serde::Serialize;

use crate::handlers::ApiResponse;
use crate::auth::{
    AuthService, User, LoginRequest, ChangePasswordRequest,
    LoginResponse, UserInfo, UserRole, Claims, get_current_user, check_roles
};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

// ======== AUTH HANDLERS ========

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let auth_config = &app_state.config.auth;

    let mut user = User::find_by_username(&app_state.db_pool, &request.username).await
        .map_err(|_| {
            log::warn!("Login attempt for unknown user {}", request.username);
            ApiError::AuthError("Invalid username or password".to_string())
        })?;

    if !user.is_active {
        return Err(ApiError::AuthError("Account is disabled".to_string()));
    }

    if user.is_locked() {
        log::warn!("Login attempt for locked account {}", user.username);
        return Err(ApiError::AuthError("Account is temporarily locked. Try again later.".to_string()));
    }

    if !auth_service.verify_password(&request.password, &user.password_hash)? {
        user.increment_failed_attempts(&app_state.db_pool).await?;
        log::warn!(
            "Failed login for {} ({} of {})",
            user.username, user.failed_login_attempts, auth_config.max_login_attempts
        );

        if user.failed_login_attempts >= auth_config.max_login_attempts {
            user.lock_for_duration(
                &app_state.db_pool,
                Duration::minutes(auth_config.lockout_duration_minutes),
            ).await?;
            return Err(ApiError::AuthError(format!(
                "Account locked due to too many failed attempts. Try again in {} minutes.",
                auth_config.lockout_duration_minutes
            )));
        }

        return Err(ApiError::AuthError("Invalid username or password".to_string()));
    }

    user.reset_failed_attempts(&app_state.db_pool).await?;
    user.update_last_login(&app_state.db_pool).await?;

    let token = auth_service.generate_token(&user)?;

    let response = LoginResponse {
        token,
        expires_in: auth_service.token_lifetime_seconds(),
        user: user.clone().into(),
    };

    log::info!("User {} logged in as {}", user.username, user.get_role());

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        response,
        "Login successful".to_string(),
    )))
}

pub async fn get_profile(
    app_state: web::Data<Arc<AppState>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let claims = get_current_user(&http_request)?;
    let user = User::find_by_id(&app_state.db_pool, &claims.sub).await?;

    #[derive(Serialize)]
    struct ProfileResponse {
        #[serde(flatten)]
        user: UserInfo,
        role_name: &'static str,
        permissions: Vec<&'static str>,
    }

    let role = user.get_role();
    let permissions = WeaponAction::ALL
        .iter()
        .filter(|action| action.permitted_roles().contains(&role))
        .map(|action| action.as_str())
        .collect();

    let response = ProfileResponse {
        role_name: role.display_name(),
        user: user.into(),
        permissions,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub async fn change_password(
    app_state: web::Data<Arc<AppState>>,
    auth_service: web::Data<Arc<AuthService>>,
    request: web::Json<ChangePasswordRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let claims = get_current_user(&http_request)?;

    let user = User::find_by_id(&app_state.db_pool, &claims.sub).await?;

    user.change_password(
        &app_state.db_pool,
        &request.current_password,
        &request.new_password,
        &auth_service
    ).await?;

    log::info!("User {} changed password", user.username);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Password changed successfully".to_string(),
    )))
}

// ======== WEAPON PERMISSIONS ========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponAction {
    List,
    Search,
    Create,
    Edit,
    Delete,
    ViewStatistics,
}

impl WeaponAction {
    pub const ALL: [WeaponAction; 6] = [
        WeaponAction::List,
        WeaponAction::Search,
        WeaponAction::Create,
        WeaponAction::Edit,
        WeaponAction::Delete,
        WeaponAction::ViewStatistics,
    ];

    /// Roles allowed to perform the action.
    pub fn permitted_roles(&self) -> &'static [UserRole] {
        match self {
            WeaponAction::Search | WeaponAction::ViewStatistics =>
                &[UserRole::Admin, UserRole::Visitor],
            WeaponAction::List
            | WeaponAction::Create
            | WeaponAction::Edit
            | WeaponAction::Delete => &[UserRole::Admin],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeaponAction::List => "list_weapons",
            WeaponAction::Search => "search_weapons",
            WeaponAction::Create => "create_weapon",
            WeaponAction::Edit => "edit_weapon",
            WeaponAction::Delete => "delete_weapon",
            WeaponAction::ViewStatistics => "view_statistics",
        }
    }
}

pub fn check_weapon_permission(
    http_request: &HttpRequest,
    action: WeaponAction,
) -> ApiResult<Claims> {
    let claims = get_current_user(http_request)?;
    check_roles(&claims, action.permitted_roles()).map_err(|err| {
        log::warn!(
            "User {} ({}) denied {}",
            claims.username, claims.role, action.as_str()
        );
        err
    })?;
    Ok(claims)
}
