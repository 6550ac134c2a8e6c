// src/models.rs
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::error::{ApiError, ApiResult};

pub const DEFAULT_WEAPON_TYPE: &str = "Fusil ACE 23";
pub const DEFAULT_STATUS: &str = "a. operaciones";

// ==================== WEAPON ====================

/// One inventory record. Field names on the wire follow the legacy API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Weapon {
    pub id: i64,
    #[serde(rename = "numero_serie")]
    pub serial_number: String,
    #[serde(rename = "tipo_arma")]
    pub weapon_type: Option<String>,
    #[serde(rename = "estado")]
    pub status: String,
    #[serde(rename = "compania")]
    pub company: Option<String>,
    #[serde(rename = "peloton")]
    pub platoon: Option<String>,
    #[serde(rename = "asignado")]
    pub assignee: Option<String>,
}

/// List/search row: absent values are rendered as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponView {
    pub id: i64,
    pub numero_serie: String,
    pub tipo_arma: String,
    pub estado: String,
    pub compania: String,
    pub peloton: String,
    pub asignado: String,
}

impl From<Weapon> for WeaponView {
    fn from(weapon: Weapon) -> Self {
        Self {
            id: weapon.id,
            numero_serie: weapon.serial_number,
            tipo_arma: weapon.weapon_type.unwrap_or_default(),
            estado: weapon.status,
            compania: weapon.company.unwrap_or_default(),
            peloton: weapon.platoon.unwrap_or_default(),
            asignado: weapon.assignee.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeaponList {
    pub fusiles: Vec<WeaponView>,
}

impl From<Vec<Weapon>> for WeaponList {
    fn from(weapons: Vec<Weapon>) -> Self {
        Self {
            fusiles: weapons.into_iter().map(WeaponView::from).collect(),
        }
    }
}

// ==================== STORE INPUTS ====================

/// A record ready for insertion, defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeapon {
    pub serial_number: String,
    pub weapon_type: Option<String>,
    pub status: String,
    pub company: Option<String>,
    pub platoon: Option<String>,
    pub assignee: Option<String>,
}

/// Replacement values for an existing record. `None` clears a nullable
/// column; a `None` status keeps the stored one since the column is NOT NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponChanges {
    pub serial_number: String,
    pub weapon_type: Option<String>,
    pub status: Option<String>,
    pub company: Option<String>,
    pub platoon: Option<String>,
    pub assignee: Option<String>,
}

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, Validate, Clone, Default)]
pub struct CreateWeaponRequest {
    #[serde(rename = "numero_serie")]
    #[validate(length(max = 100, message = "Serial number cannot exceed 100 characters"))]
    pub serial_number: Option<String>,

    #[serde(rename = "tipo_arma")]
    #[validate(length(max = 255, message = "Weapon type cannot exceed 255 characters"))]
    pub weapon_type: Option<String>,

    #[serde(rename = "estado")]
    #[validate(length(min = 1, max = 100, message = "Status must be between 1 and 100 characters"))]
    pub status: Option<String>,

    #[serde(rename = "compania")]
    #[validate(length(max = 100, message = "Company cannot exceed 100 characters"))]
    pub company: Option<String>,

    #[serde(rename = "peloton")]
    #[validate(length(max = 100, message = "Platoon cannot exceed 100 characters"))]
    pub platoon: Option<String>,

    #[serde(rename = "asignado")]
    #[validate(length(max = 255, message = "Assignee cannot exceed 255 characters"))]
    pub assignee: Option<String>,
}

impl CreateWeaponRequest {
    pub fn into_new_weapon(self) -> ApiResult<NewWeapon> {
        self.validate()?;
        let serial_number = require_serial_number(self.serial_number)?;

        Ok(NewWeapon {
            serial_number,
            weapon_type: Some(self.weapon_type.unwrap_or_else(|| DEFAULT_WEAPON_TYPE.to_string())),
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            company: Some(self.company.unwrap_or_default()),
            platoon: Some(self.platoon.unwrap_or_default()),
            assignee: Some(self.assignee.unwrap_or_default()),
        })
    }
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
pub struct UpdateWeaponRequest {
    #[serde(rename = "numero_serie")]
    #[validate(length(max = 100, message = "Serial number cannot exceed 100 characters"))]
    pub serial_number: Option<String>,

    #[serde(rename = "tipo_arma")]
    #[validate(length(max = 255, message = "Weapon type cannot exceed 255 characters"))]
    pub weapon_type: Option<String>,

    #[serde(rename = "estado")]
    #[validate(length(min = 1, max = 100, message = "Status must be between 1 and 100 characters"))]
    pub status: Option<String>,

    #[serde(rename = "compania")]
    #[validate(length(max = 100, message = "Company cannot exceed 100 characters"))]
    pub company: Option<String>,

    #[serde(rename = "peloton")]
    #[validate(length(max = 100, message = "Platoon cannot exceed 100 characters"))]
    pub platoon: Option<String>,

    #[serde(rename = "asignado")]
    #[validate(length(max = 255, message = "Assignee cannot exceed 255 characters"))]
    pub assignee: Option<String>,
}

impl UpdateWeaponRequest {
    pub fn into_changes(self) -> ApiResult<WeaponChanges> {
        self.validate()?;
        let serial_number = require_serial_number(self.serial_number)?;

        Ok(WeaponChanges {
            serial_number,
            weapon_type: self.weapon_type,
            status: self.status,
            company: self.company,
            platoon: self.platoon,
            assignee: self.assignee,
        })
    }
}

/// Serial numbers are stored exactly as entered; blank ones are rejected.
fn require_serial_number(serial_number: Option<String>) -> ApiResult<String> {
    match serial_number {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::serial_number_required()),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct WeaponSearchQuery {
    pub filtro: Option<String>,
}
