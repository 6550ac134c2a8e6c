// src/statistics.rs
//! Inventory statistics: grouping by status, company and weapon type, plus
//! the fixed weapon-category taxonomy used by the reporting dashboard.
//!
//! Everything here is a pure function of the record snapshot. The report is
//! rebuilt on every request, nothing is cached.

use std::collections::BTreeMap;
use serde::Serialize;
use crate::models::Weapon;

// ==================== CLASSIFICATION ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineGunModel {
    M60E3,
    M60E4,
    M60Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrenadeLauncherModel {
    Mk1,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MortarModel {
    TC,
    LA,
}

/// Top-level reporting bucket a weapon type falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponCategory {
    Rifle,
    MachineGun(MachineGunModel),
    Remington,
    PrietoBeretta,
    Storm,
    GrenadeLauncher(GrenadeLauncherModel),
    /// A mortar whose model could not be told from the type string still
    /// belongs to the mortar bucket.
    Mortar(Option<MortarModel>),
}

/// Classify a free-text weapon type.
///
/// Predicates are tested in a fixed order against the lower-cased string and
/// the first match wins, so "Fusil M60E3" is a rifle. The order matches the
/// categorisation existing reports were produced with; changing it changes
/// historical numbers.
pub fn classify(weapon_type: &str) -> Option<WeaponCategory> {
    let lowered = weapon_type.to_lowercase();
    let has = |needle: &str| lowered.contains(needle);

    if has("fusil") || has("galil") {
        Some(WeaponCategory::Rifle)
    } else if has("m60e3") {
        Some(WeaponCategory::MachineGun(MachineGunModel::M60E3))
    } else if has("m60e4") {
        Some(WeaponCategory::MachineGun(MachineGunModel::M60E4))
    } else if has("m60 standar") || has("m60 standard") {
        Some(WeaponCategory::MachineGun(MachineGunModel::M60Standard))
    } else if has("remington") {
        Some(WeaponCategory::Remington)
    } else if has("prieto beretta") || has("beretta") {
        Some(WeaponCategory::PrietoBeretta)
    } else if has("storm") {
        Some(WeaponCategory::Storm)
    } else if has("mgl") {
        if has("mk1") {
            Some(WeaponCategory::GrenadeLauncher(GrenadeLauncherModel::Mk1))
        } else {
            Some(WeaponCategory::GrenadeLauncher(GrenadeLauncherModel::Generic))
        }
    } else if has("mortero") {
        // inventory entries also write "Mortero TC" / "Mortero LA"
        if has("t/c") || has("tc") {
            Some(WeaponCategory::Mortar(Some(MortarModel::TC)))
        } else if has("l/a") || has("la") {
            Some(WeaponCategory::Mortar(Some(MortarModel::LA)))
        } else {
            Some(WeaponCategory::Mortar(None))
        }
    } else {
        None
    }
}

// ==================== REPORT TYPES ====================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeBreakdown {
    pub total: u64,
    #[serde(rename = "estados")]
    pub by_status: BTreeMap<String, u64>,
    #[serde(rename = "companias")]
    pub by_company: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MachineGunCounts {
    #[serde(rename = "M60E3")]
    pub m60e3: u64,
    #[serde(rename = "M60E4")]
    pub m60e4: u64,
    #[serde(rename = "M60 Standar")]
    pub m60_standard: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GrenadeLauncherCounts {
    #[serde(rename = "MK1")]
    pub mk1: u64,
    #[serde(rename = "MGL")]
    pub generic: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MortarCounts {
    #[serde(rename = "T/C")]
    pub tc: u64,
    #[serde(rename = "L/A")]
    pub la: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    #[serde(rename = "fusiles")]
    pub rifles: u64,
    #[serde(rename = "ametralladoras")]
    pub machine_guns: MachineGunCounts,
    pub remington: u64,
    pub prieto_beretta: u64,
    pub storm: u64,
    #[serde(rename = "mgl")]
    pub grenade_launchers: GrenadeLauncherCounts,
    #[serde(rename = "mortero")]
    pub mortars: MortarCounts,
}

impl CategoryCounts {
    pub fn record(&mut self, category: WeaponCategory) {
        match category {
            WeaponCategory::Rifle => self.rifles += 1,
            WeaponCategory::MachineGun(model) => {
                match model {
                    MachineGunModel::M60E3 => self.machine_guns.m60e3 += 1,
                    MachineGunModel::M60E4 => self.machine_guns.m60e4 += 1,
                    MachineGunModel::M60Standard => self.machine_guns.m60_standard += 1,
                }
                self.machine_guns.total += 1;
            }
            WeaponCategory::Remington => self.remington += 1,
            WeaponCategory::PrietoBeretta => self.prieto_beretta += 1,
            WeaponCategory::Storm => self.storm += 1,
            WeaponCategory::GrenadeLauncher(model) => {
                match model {
                    GrenadeLauncherModel::Mk1 => self.grenade_launchers.mk1 += 1,
                    GrenadeLauncherModel::Generic => self.grenade_launchers.generic += 1,
                }
                self.grenade_launchers.total += 1;
            }
            WeaponCategory::Mortar(model) => {
                match model {
                    Some(MortarModel::TC) => self.mortars.tc += 1,
                    Some(MortarModel::LA) => self.mortars.la += 1,
                    None => {}
                }
                self.mortars.total += 1;
            }
        }
    }

    /// Records counted in any bucket.
    pub fn categorized(&self) -> u64 {
        self.rifles
            + self.machine_guns.total
            + self.remington
            + self.prieto_beretta
            + self.storm
            + self.grenade_launchers.total
            + self.mortars.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub total: u64,
    #[serde(rename = "por_estado")]
    pub by_status: BTreeMap<String, u64>,
    #[serde(rename = "por_compania")]
    pub by_company: BTreeMap<String, u64>,
    #[serde(rename = "por_tipo_arma")]
    pub by_type: BTreeMap<String, TypeBreakdown>,
    #[serde(rename = "categorias")]
    pub categories: CategoryCounts,
}

// ==================== AGGREGATION ====================

// Missing and empty values share the "" key so they stay visible in the report.
fn group_key(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

pub fn compute_statistics(records: &[Weapon]) -> StatisticsReport {
    let mut report = StatisticsReport {
        total: records.len() as u64,
        ..StatisticsReport::default()
    };

    for weapon in records {
        let status = weapon.status.clone();
        let company = group_key(weapon.company.as_deref());
        let weapon_type = group_key(weapon.weapon_type.as_deref());

        *report.by_status.entry(status.clone()).or_insert(0) += 1;
        *report.by_company.entry(company.clone()).or_insert(0) += 1;

        let breakdown = report.by_type.entry(weapon_type.clone()).or_default();
        breakdown.total += 1;
        *breakdown.by_status.entry(status).or_insert(0) += 1;
        *breakdown.by_company.entry(company).or_insert(0) += 1;

        if let Some(category) = classify(&weapon_type) {
            report.categories.record(category);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weapon(id: i64, weapon_type: Option<&str>, status: &str, company: Option<&str>) -> Weapon {
        Weapon {
            id,
            serial_number: format!("SN-{:04}", id),
            weapon_type: weapon_type.map(str::to_string),
            status: status.to_string(),
            company: company.map(str::to_string),
            platoon: None,
            assignee: None,
        }
    }

    fn mixed_inventory() -> Vec<Weapon> {
        vec![
            weapon(1, Some("Fusil ACE 23"), "a. operaciones", Some("A")),
            weapon(2, Some("Fusil Galil"), "mantenimiento", Some("B")),
            weapon(3, Some("M60E3"), "baja", Some("B")),
            weapon(4, Some("M60E4"), "a. operaciones", None),
            weapon(5, Some("Ametralladora M60 Standard"), "a. operaciones", Some("")),
            weapon(6, Some("Remington 870"), "a. operaciones", Some("C")),
            weapon(7, Some("Pistola Prieto Beretta"), "a. operaciones", Some("C")),
            weapon(8, Some("Storm"), "baja", Some("A")),
            weapon(9, Some("MGL MK1"), "a. operaciones", Some("A")),
            weapon(10, Some("MGL"), "a. operaciones", Some("A")),
            weapon(11, Some("Mortero L/A"), "a. operaciones", Some("B")),
            weapon(12, Some("Mortero 81mm"), "a. operaciones", Some("B")),
            weapon(13, Some("Lanzacohetes"), "a. operaciones", Some("B")),
            weapon(14, None, "baja", None),
        ]
    }

    #[test]
    fn test_reference_scenario() {
        let records = vec![
            weapon(1, Some("Fusil ACE 23"), "a. operaciones", Some("A")),
            weapon(2, Some("M60E3"), "baja", Some("B")),
            weapon(3, Some("Mortero T/C"), "a. operaciones", Some("A")),
        ];

        let report = compute_statistics(&records);

        assert_eq!(report.total, 3);
        assert_eq!(report.by_status.get("a. operaciones"), Some(&2));
        assert_eq!(report.by_status.get("baja"), Some(&1));
        assert_eq!(report.by_company.get("A"), Some(&2));
        assert_eq!(report.by_company.get("B"), Some(&1));
        assert_eq!(report.categories.rifles, 1);
        assert_eq!(report.categories.machine_guns.m60e3, 1);
        assert_eq!(report.categories.machine_guns.total, 1);
        assert_eq!(report.categories.mortars.tc, 1);
        assert_eq!(report.categories.mortars.total, 1);

        let rifle = &report.by_type["Fusil ACE 23"];
        assert_eq!(rifle.total, 1);
        assert_eq!(rifle.by_status.get("a. operaciones"), Some(&1));
        assert_eq!(rifle.by_company.get("A"), Some(&1));
    }

    #[test]
    fn test_empty_input() {
        let report = compute_statistics(&[]);
        assert_eq!(report.total, 0);
        assert!(report.by_status.is_empty());
        assert!(report.by_company.is_empty());
        assert!(report.by_type.is_empty());
        assert_eq!(report.categories, CategoryCounts::default());
        assert_eq!(report.categories.categorized(), 0);
    }

    #[test]
    fn test_missing_type_is_counted_but_not_categorized() {
        let report = compute_statistics(&[weapon(1, None, "baja", Some("A"))]);
        assert_eq!(report.total, 1);
        assert_eq!(report.by_status.get("baja"), Some(&1));
        assert_eq!(report.by_company.get("A"), Some(&1));
        assert_eq!(report.by_type[""].total, 1);
        assert_eq!(report.categories.categorized(), 0);
    }

    #[test]
    fn test_missing_and_empty_company_share_a_key() {
        let report = compute_statistics(&[
            weapon(1, Some("Fusil"), "baja", None),
            weapon(2, Some("Fusil"), "baja", Some("")),
        ]);
        assert_eq!(report.by_company.len(), 1);
        assert_eq!(report.by_company.get(""), Some(&2));
    }

    #[test]
    fn test_groupings_sum_to_total() {
        let report = compute_statistics(&mixed_inventory());
        assert_eq!(report.total, 14);
        assert_eq!(report.by_status.values().sum::<u64>(), report.total);
        assert_eq!(report.by_company.values().sum::<u64>(), report.total);
        assert_eq!(report.by_type.values().map(|t| t.total).sum::<u64>(), report.total);
        for breakdown in report.by_type.values() {
            assert_eq!(breakdown.by_status.values().sum::<u64>(), breakdown.total);
            assert_eq!(breakdown.by_company.values().sum::<u64>(), breakdown.total);
        }
    }

    #[test]
    fn test_each_record_lands_in_at_most_one_bucket() {
        let records = mixed_inventory();
        let expected = records
            .iter()
            .filter(|w| classify(w.weapon_type.as_deref().unwrap_or_default()).is_some())
            .count() as u64;

        let report = compute_statistics(&records);
        // "Lanzacohetes" and the untyped record fall through
        assert_eq!(expected, 12);
        assert_eq!(report.categories.categorized(), expected);
    }

    #[test]
    fn test_mixed_inventory_buckets() {
        let c = compute_statistics(&mixed_inventory()).categories;
        assert_eq!(c.rifles, 2);
        assert_eq!(c.machine_guns, MachineGunCounts { m60e3: 1, m60e4: 1, m60_standard: 1, total: 3 });
        assert_eq!(c.remington, 1);
        assert_eq!(c.prieto_beretta, 1);
        assert_eq!(c.storm, 1);
        assert_eq!(c.grenade_launchers, GrenadeLauncherCounts { mk1: 1, generic: 1, total: 2 });
        assert_eq!(c.mortars, MortarCounts { tc: 0, la: 1, total: 2 });
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(classify("FUSIL ACE 23"), classify("fusil ace 23"));
        assert_eq!(classify("MORTERO T/C"), Some(WeaponCategory::Mortar(Some(MortarModel::TC))));
        assert_eq!(classify("mgl mk1"), classify("MGL MK1"));
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(classify("Fusil con lanzador M60E3"), Some(WeaponCategory::Rifle));
        assert_eq!(
            classify("M60E3 Remington"),
            Some(WeaponCategory::MachineGun(MachineGunModel::M60E3))
        );
        assert_eq!(classify("Storm MGL"), Some(WeaponCategory::Storm));
        assert_eq!(classify("Beretta"), Some(WeaponCategory::PrietoBeretta));
        assert_eq!(
            classify("M60 Standar"),
            Some(WeaponCategory::MachineGun(MachineGunModel::M60Standard))
        );
    }

    #[test]
    fn test_mortar_without_model_still_claims_record() {
        assert_eq!(classify("Mortero 81mm"), Some(WeaponCategory::Mortar(None)));
        assert_eq!(classify("Mortero TC"), Some(WeaponCategory::Mortar(Some(MortarModel::TC))));

        let report = compute_statistics(&[weapon(1, Some("Mortero 81mm"), "baja", None)]);
        assert_eq!(report.categories.mortars, MortarCounts { tc: 0, la: 0, total: 1 });
    }

    #[test]
    fn test_unmatched_and_empty_types() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("Lanzacohetes"), None);
        assert_eq!(classify("M60"), None);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let records = mixed_inventory();
        assert_eq!(compute_statistics(&records), compute_statistics(&records));
    }

    #[test]
    fn test_report_wire_format() {
        let report = compute_statistics(&[weapon(1, Some("M60 Standard"), "baja", Some("B"))]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"], 1);
        assert_eq!(json["por_estado"]["baja"], 1);
        assert_eq!(json["por_compania"]["B"], 1);
        assert_eq!(json["por_tipo_arma"]["M60 Standard"]["total"], 1);
        assert_eq!(json["por_tipo_arma"]["M60 Standard"]["estados"]["baja"], 1);
        assert_eq!(json["por_tipo_arma"]["M60 Standard"]["companias"]["B"], 1);
        assert_eq!(json["categorias"]["ametralladoras"]["M60 Standar"], 1);
        assert_eq!(json["categorias"]["ametralladoras"]["total"], 1);
        assert_eq!(json["categorias"]["fusiles"], 0);
        assert_eq!(json["categorias"]["mgl"]["MK1"], 0);
        assert_eq!(json["categorias"]["mortero"]["T/C"], 0);
        assert_eq!(json["categorias"]["prieto_beretta"], 0);
    }
}
