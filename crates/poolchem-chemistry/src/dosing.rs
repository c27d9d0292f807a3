//! Dosing calculators
//!
//! Every calculator returns how much of one product moves a parameter from
//! its current value to the target for a pool of the given size. Additive
//! products cannot lower a parameter, so a current value at or above the
//! target yields a zero dose with an explanatory note.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::carbonate::{CarbonateSystem, BORON_MOLAR_MASS, CACO3_EQ_MG};
use crate::chemicals::{ChemicalType, Purpose};
use crate::error::{self, ChemistryError, Result};
use crate::units::{
    gallons_to_litres, ppm_to_grams, FL_OZ_PER_CUP, FL_OZ_PER_GALLON, GRAMS_PER_LB, GRAMS_PER_OZ,
    ML_PER_FL_OZ,
};

const HCL_MOLAR_MASS: f64 = 36.461;
const SODIUM_BISULFATE_MOLAR_MASS: f64 = 120.06;
const DRY_ACID_PURITY: f64 = 0.932;
const SODA_ASH_MOLAR_MASS: f64 = 105.99;
const BORAX_MOLAR_MASS: f64 = 381.37;
const BAKING_SODA_MOLAR_MASS: f64 = 84.007;
const CACO3_MOLAR_MASS: f64 = 100.09;
const CALCIUM_CHLORIDE_DIHYDRATE_MOLAR_MASS: f64 = 147.01;
const BORIC_ACID_MOLAR_MASS: f64 = 61.83;

/// pH differences smaller than this need no adjustment
const PH_TOLERANCE: f64 = 0.005;
/// Below this a base barely moves alkalinity at the target pH
const MIN_BASE_YIELD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoseUnit {
    #[serde(rename = "fl oz")]
    FlOz,
    #[serde(rename = "oz")]
    Oz,
    #[serde(rename = "lbs")]
    Lbs,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::FlOz => "fl oz",
            DoseUnit::Oz => "oz",
            DoseUnit::Lbs => "lbs",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeUnit {
    #[serde(rename = "cups")]
    Cups,
    #[serde(rename = "gal")]
    Gallons,
}

impl VolumeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeUnit::Cups => "cups",
            VolumeUnit::Gallons => "gal",
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount of one product to add
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingResult {
    pub chemical: ChemicalType,
    pub amount: f64,
    pub unit: DoseUnit,
    /// Same dose in a kitchen measure, liquids only
    pub amount_volume: Option<f64>,
    pub volume_unit: Option<VolumeUnit>,
    pub notes: Option<String>,
}

impl DosingResult {
    fn none(chemical: ChemicalType, unit: DoseUnit, note: impl Into<String>) -> Self {
        Self {
            chemical,
            amount: 0.0,
            unit,
            amount_volume: None,
            volume_unit: None,
            notes: Some(note.into()),
        }
    }

    fn liquid(chemical: ChemicalType, fl_oz: f64, notes: Option<String>) -> Self {
        let (volume, unit) = if fl_oz >= FL_OZ_PER_GALLON {
            (fl_oz / FL_OZ_PER_GALLON, VolumeUnit::Gallons)
        } else {
            (fl_oz / FL_OZ_PER_CUP, VolumeUnit::Cups)
        };
        Self {
            chemical,
            amount: round(fl_oz, 1),
            unit: DoseUnit::FlOz,
            amount_volume: Some(round(volume, 2)),
            volume_unit: Some(unit),
            notes,
        }
    }

    fn solid(chemical: ChemicalType, grams: f64, unit: DoseUnit, notes: Option<String>) -> Self {
        let amount = match unit {
            DoseUnit::Lbs => grams / GRAMS_PER_LB,
            _ => grams / GRAMS_PER_OZ,
        };
        Self {
            chemical,
            amount: round(amount, 1),
            unit,
            amount_volume: None,
            volume_unit: None,
            notes,
        }
    }

    pub fn is_needed(&self) -> bool {
        self.amount > 0.0
    }
}

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn require(chemical: ChemicalType, purpose: Purpose) -> Result<()> {
    if chemical.purpose() == purpose {
        Ok(())
    } else {
        Err(ChemistryError::WrongChemical { chemical, purpose })
    }
}

/// Inputs for a pH adjustment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhDose {
    pub current_ph: f64,
    pub target_ph: f64,
    pub pool_gallons: f64,
    pub total_alkalinity: f64,
    pub temperature_f: f64,
    pub cyanuric_acid: f64,
    pub borates: f64,
    /// Product used when pH is above target
    pub acid: ChemicalType,
    /// Product used when pH is below target
    pub base: ChemicalType,
}

/// Acid to lower pH, or base to raise it, to reach `target_ph`
pub fn calculate_ph_dose(dose: &PhDose) -> Result<DosingResult> {
    require(dose.acid, Purpose::LowerPh)?;
    require(dose.base, Purpose::RaisePh)?;
    error::ph(dose.current_ph)?;
    error::ph(dose.target_ph)?;
    let litres = gallons_to_litres(error::positive("pool volume", dose.pool_gallons)?);
    error::positive("total alkalinity", dose.total_alkalinity)?;
    error::finite("temperature", dose.temperature_f)?;
    error::non_negative("cyanuric acid", dose.cyanuric_acid)?;
    error::non_negative("borates", dose.borates)?;

    if (dose.current_ph - dose.target_ph).abs() < PH_TOLERANCE {
        let unit = if dose.acid.is_liquid() {
            DoseUnit::FlOz
        } else {
            DoseUnit::Oz
        };
        return Ok(DosingResult::none(dose.acid, unit, "pH is already at target"));
    }

    let system = CarbonateSystem::from_sample(
        dose.current_ph,
        dose.total_alkalinity,
        dose.cyanuric_acid,
        dose.borates,
        dose.temperature_f,
    )?;
    let start = system.alkalinity(dose.current_ph);
    let end = system.alkalinity(dose.target_ph);

    if dose.current_ph > dose.target_ph {
        let moles = (start - end) * litres;
        let note = Some(format!(
            "Will also lower TA by about {:.0} ppm",
            (start - end) * CACO3_EQ_MG
        ));
        return Ok(match dose.acid.hcl_solution() {
            Some((percent, density)) => {
                let solution_grams = moles * HCL_MOLAR_MASS / (percent / 100.0);
                DosingResult::liquid(dose.acid, solution_grams / density / ML_PER_FL_OZ, note)
            }
            None => {
                let grams = moles * SODIUM_BISULFATE_MOLAR_MASS / DRY_ACID_PURITY;
                DosingResult::solid(dose.acid, grams, DoseUnit::Oz, note)
            }
        });
    }

    // Raising: the base adds both alkalinity and buffer, so solve for the
    // amount whose additions land exactly on the target pH.
    let missing = end - start;
    match dose.base {
        ChemicalType::Borax => {
            let per_mole = base_yield(dose, 2.0 - 4.0 * system.borate_fraction(dose.target_ph))?;
            let molar = missing / per_mole;
            let note = format!(
                "Will also raise borates by about {:.0} ppm",
                4.0 * molar * BORON_MOLAR_MASS * 1000.0
            );
            Ok(DosingResult::solid(
                dose.base,
                molar * litres * BORAX_MOLAR_MASS,
                DoseUnit::Oz,
                Some(note),
            ))
        }
        _ => {
            let per_mole = base_yield(dose, 2.0 - system.carbonate_factor(dose.target_ph))?;
            let molar = missing / per_mole;
            let note = format!(
                "Will also raise TA by about {:.0} ppm",
                2.0 * molar * CACO3_EQ_MG
            );
            Ok(DosingResult::solid(
                dose.base,
                molar * litres * SODA_ASH_MOLAR_MASS,
                DoseUnit::Oz,
                Some(note),
            ))
        }
    }
}

/// Net alkalinity one mole of base leaves behind at the target pH
///
/// Near the base's own pKa the buffer it adds absorbs all of it.
fn base_yield(dose: &PhDose, per_mole: f64) -> Result<f64> {
    if per_mole > MIN_BASE_YIELD {
        Ok(per_mole)
    } else {
        Err(ChemistryError::UnreachablePh {
            chemical: dose.base,
            target_ph: dose.target_ph,
        })
    }
}

/// Validated ppm increase, or `None` when nothing needs adding
fn increase(current: f64, target: f64, gallons: f64) -> Result<(Option<f64>, f64)> {
    error::non_negative("current value", current)?;
    error::non_negative("target value", target)?;
    let litres = gallons_to_litres(error::positive("pool volume", gallons)?);
    let delta = target - current;
    Ok(((delta > 0.0).then_some(delta), litres))
}

pub fn calculate_chlorine_dose(
    current_fc: f64,
    target_fc: f64,
    pool_gallons: f64,
    chemical: ChemicalType,
) -> Result<DosingResult> {
    require(chemical, Purpose::RaiseChlorine)?;
    let unit = if chemical.is_liquid() {
        DoseUnit::FlOz
    } else {
        DoseUnit::Oz
    };
    let (delta, litres) = increase(current_fc, target_fc, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            chemical,
            unit,
            "FC is at or above target; let it deplete naturally",
        ));
    };
    let strength = chemical
        .available_chlorine()
        .ok_or(ChemistryError::WrongChemical {
            chemical,
            purpose: Purpose::RaiseChlorine,
        })?;

    let grams = ppm_to_grams(delta, litres);
    let note = chemical
        .chlorine_side_effect()
        .map(|(per_ppm, parameter)| format!("Also adds about {:.1} ppm {}", delta * per_ppm, parameter));

    Ok(if chemical.is_liquid() {
        DosingResult::liquid(chemical, grams / (strength / 100.0) / ML_PER_FL_OZ, note)
    } else {
        DosingResult::solid(chemical, grams / (strength / 100.0), DoseUnit::Oz, note)
    })
}

/// Baking soda to raise total alkalinity
pub fn calculate_alkalinity_dose(
    current_ta: f64,
    target_ta: f64,
    pool_gallons: f64,
) -> Result<DosingResult> {
    let (delta, litres) = increase(current_ta, target_ta, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            ChemicalType::BakingSoda,
            DoseUnit::Oz,
            "TA is at or above target; lower it with acid and aeration",
        ));
    };
    let grams = ppm_to_grams(delta, litres) / (CACO3_EQ_MG / 1000.0) * BAKING_SODA_MOLAR_MASS;
    Ok(DosingResult::solid(
        ChemicalType::BakingSoda,
        grams,
        DoseUnit::Oz,
        None,
    ))
}

/// Calcium chloride dihydrate to raise calcium hardness
pub fn calculate_calcium_dose(
    current_ch: f64,
    target_ch: f64,
    pool_gallons: f64,
) -> Result<DosingResult> {
    let (delta, litres) = increase(current_ch, target_ch, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            ChemicalType::CalciumChloride,
            DoseUnit::Oz,
            "CH is at or above target; only dilution lowers it",
        ));
    };
    let grams =
        ppm_to_grams(delta, litres) / CACO3_MOLAR_MASS * CALCIUM_CHLORIDE_DIHYDRATE_MOLAR_MASS;
    Ok(DosingResult::solid(
        ChemicalType::CalciumChloride,
        grams,
        DoseUnit::Oz,
        None,
    ))
}

/// Stabilizer (cyanuric acid) to raise CYA
pub fn calculate_cya_dose(
    current_cya: f64,
    target_cya: f64,
    pool_gallons: f64,
) -> Result<DosingResult> {
    let (delta, litres) = increase(current_cya, target_cya, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            ChemicalType::Stabilizer,
            DoseUnit::Oz,
            "CYA is at or above target; only dilution lowers it",
        ));
    };
    Ok(DosingResult::solid(
        ChemicalType::Stabilizer,
        ppm_to_grams(delta, litres),
        DoseUnit::Oz,
        Some("Dissolves slowly; keep the pump running".to_string()),
    ))
}

/// Pool salt (NaCl) to raise salinity
pub fn calculate_salt_dose(
    current_salt: f64,
    target_salt: f64,
    pool_gallons: f64,
) -> Result<DosingResult> {
    let (delta, litres) = increase(current_salt, target_salt, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            ChemicalType::Salt,
            DoseUnit::Lbs,
            "Salt is at or above target; only dilution lowers it",
        ));
    };
    Ok(DosingResult::solid(
        ChemicalType::Salt,
        ppm_to_grams(delta, litres),
        DoseUnit::Lbs,
        None,
    ))
}

/// Boric acid to raise borates (ppm as boron)
pub fn calculate_borate_dose(
    current_borates: f64,
    target_borates: f64,
    pool_gallons: f64,
) -> Result<DosingResult> {
    let (delta, litres) = increase(current_borates, target_borates, pool_gallons)?;
    let Some(delta) = delta else {
        return Ok(DosingResult::none(
            ChemicalType::BoricAcid,
            DoseUnit::Lbs,
            "Borates are at or above target; only dilution lowers them",
        ));
    };
    let grams = ppm_to_grams(delta, litres) / BORON_MOLAR_MASS * BORIC_ACID_MOLAR_MASS;
    Ok(DosingResult::solid(
        ChemicalType::BoricAcid,
        grams,
        DoseUnit::Lbs,
        Some("May raise pH; adjust with acid afterwards".to_string()),
    ))
}
