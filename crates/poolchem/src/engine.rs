//! Boundary to the chemistry library
//!
//! The coordinator asks a [`ChemistryEngine`] for indices and doses. The
//! production engine forwards to `poolchem-chemistry`; tests swap in
//! engines that fail on purpose.

use poolchem_chemistry::{self as chemistry, ChemicalType, DosingResult, PhDose, WaterChemistry};

use crate::types::DoseKind;

/// Current value, target value and pool volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub current: f64,
    pub target: f64,
    pub pool_gallons: f64,
}

/// One dosing calculation
#[derive(Debug, Clone, PartialEq)]
pub enum DoseRequest {
    Ph(PhDose),
    Chlorine { step: Step, chemical: ChemicalType },
    Alkalinity(Step),
    Calcium(Step),
    Cya(Step),
    Salt(Step),
    Borates(Step),
}

impl DoseRequest {
    pub fn kind(&self) -> DoseKind {
        match self {
            DoseRequest::Ph(_) => DoseKind::Acid,
            DoseRequest::Chlorine { .. } => DoseKind::Chlorine,
            DoseRequest::Alkalinity(_) => DoseKind::Alkalinity,
            DoseRequest::Calcium(_) => DoseKind::Calcium,
            DoseRequest::Cya(_) => DoseKind::Cya,
            DoseRequest::Salt(_) => DoseKind::Salt,
            DoseRequest::Borates(_) => DoseKind::Borates,
        }
    }
}

pub trait ChemistryEngine: Send + Sync {
    fn csi(&self, water: &WaterChemistry) -> chemistry::Result<f64>;

    fn lsi(&self, water: &WaterChemistry) -> chemistry::Result<f64>;

    fn dose(&self, request: &DoseRequest) -> chemistry::Result<DosingResult>;
}

/// Engine backed by `poolchem-chemistry`
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryEngine;

impl ChemistryEngine for LibraryEngine {
    fn csi(&self, water: &WaterChemistry) -> chemistry::Result<f64> {
        chemistry::calculate_csi(water)
    }

    fn lsi(&self, water: &WaterChemistry) -> chemistry::Result<f64> {
        chemistry::calculate_lsi(water)
    }

    fn dose(&self, request: &DoseRequest) -> chemistry::Result<DosingResult> {
        match *request {
            DoseRequest::Ph(ref dose) => chemistry::calculate_ph_dose(dose),
            DoseRequest::Chlorine { step, chemical } => chemistry::calculate_chlorine_dose(
                step.current,
                step.target,
                step.pool_gallons,
                chemical,
            ),
            DoseRequest::Alkalinity(s) => {
                chemistry::calculate_alkalinity_dose(s.current, s.target, s.pool_gallons)
            }
            DoseRequest::Calcium(s) => {
                chemistry::calculate_calcium_dose(s.current, s.target, s.pool_gallons)
            }
            DoseRequest::Cya(s) => chemistry::calculate_cya_dose(s.current, s.target, s.pool_gallons),
            DoseRequest::Salt(s) => {
                chemistry::calculate_salt_dose(s.current, s.target, s.pool_gallons)
            }
            DoseRequest::Borates(s) => {
                chemistry::calculate_borate_dose(s.current, s.target, s.pool_gallons)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolchem_chemistry::DoseUnit;

    #[test]
    fn test_library_engine_indices() {
        let water = WaterChemistry::new(7.5, 84.0, 80.0, 300.0).with_cyanuric_acid(40.0);
        let csi = LibraryEngine.csi(&water).unwrap();
        let lsi = LibraryEngine.lsi(&water).unwrap();
        assert!(csi > -1.0 && csi < 1.0);
        assert!(lsi > -1.0 && lsi < 1.0);
    }

    #[test]
    fn test_library_engine_routes_doses() {
        let salt = LibraryEngine
            .dose(&DoseRequest::Salt(Step {
                current: 2700.0,
                target: 3200.0,
                pool_gallons: 15_000.0,
            }))
            .unwrap();
        assert_eq!(salt.chemical, ChemicalType::Salt);
        assert_eq!(salt.unit, DoseUnit::Lbs);

        let chlorine = DoseRequest::Chlorine {
            step: Step {
                current: 3.0,
                target: 5.0,
                pool_gallons: 15_000.0,
            },
            chemical: ChemicalType::Bleach8_25,
        };
        assert_eq!(chlorine.kind(), DoseKind::Chlorine);
        assert_eq!(
            LibraryEngine.dose(&chlorine).unwrap().chemical,
            ChemicalType::Bleach8_25
        );
    }

    #[test]
    fn test_wrong_chlorine_product_fails() {
        let request = DoseRequest::Chlorine {
            step: Step {
                current: 3.0,
                target: 5.0,
                pool_gallons: 15_000.0,
            },
            chemical: ChemicalType::BakingSoda,
        };
        assert!(LibraryEngine.dose(&request).is_err());
    }
}
