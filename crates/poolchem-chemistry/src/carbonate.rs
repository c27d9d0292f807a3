//! Closed-system carbonate equilibrium with cyanurate and borate buffers
//!
//! Used for pH adjustments: the sample's carbonate content is inferred from
//! its measured total alkalinity, then held constant while the alkalinity
//! at the target pH is evaluated.

use crate::error::{ChemistryError, Result};
use crate::units::fahrenheit_to_kelvin;

/// ppm CaCO3 per equivalent per litre
pub(crate) const CACO3_EQ_MG: f64 = 50_043.5;
pub(crate) const CYA_MOLAR_MASS: f64 = 129.07;
pub(crate) const BORON_MOLAR_MASS: f64 = 10.811;
pub(crate) const PKA_CYANURIC: f64 = 6.83;
pub(crate) const PKA_BORIC: f64 = 9.11;

/// Temperature-dependent dissociation constants
#[derive(Debug, Clone, Copy)]
struct Constants {
    k1: f64,
    k2: f64,
    kw: f64,
}

impl Constants {
    fn at(temperature_f: f64) -> Self {
        let t = fahrenheit_to_kelvin(temperature_f);
        let pk1 = 3404.71 / t + 0.032_786 * t - 14.8435;
        let pk2 = 2902.39 / t + 0.023_79 * t - 6.4980;
        let pkw = 4470.99 / t - 6.0875 + 0.017_06 * t;
        Self {
            k1: 10f64.powf(-pk1),
            k2: 10f64.powf(-pk2),
            kw: 10f64.powf(-pkw),
        }
    }
}

fn fraction_dissociated(pka: f64, ph: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(pka - ph))
}

/// Carbonate system of one body of water, in mol/L
#[derive(Debug, Clone, Copy)]
pub(crate) struct CarbonateSystem {
    constants: Constants,
    /// Dissolved inorganic carbon
    pub dic: f64,
    pub cyanurate: f64,
    pub borate: f64,
}

impl CarbonateSystem {
    /// Infer the carbonate content from a measured sample
    pub fn from_sample(
        ph: f64,
        total_alkalinity: f64,
        cyanuric_acid: f64,
        borates: f64,
        temperature_f: f64,
    ) -> Result<Self> {
        let constants = Constants::at(temperature_f);
        let mut system = Self {
            constants,
            dic: 0.0,
            cyanurate: cyanuric_acid / CYA_MOLAR_MASS / 1000.0,
            borate: borates / BORON_MOLAR_MASS / 1000.0,
        };

        let carbonate_alk = total_alkalinity / CACO3_EQ_MG - system.non_carbonate_alkalinity(ph);
        if carbonate_alk <= 0.0 {
            return Err(ChemistryError::NoCarbonateAlkalinity(
                carbonate_alk * CACO3_EQ_MG,
            ));
        }
        system.dic = carbonate_alk / system.carbonate_factor(ph);
        Ok(system)
    }

    /// Equivalents of alkalinity per mole of carbonate at `ph`
    pub fn carbonate_factor(&self, ph: f64) -> f64 {
        let Constants { k1, k2, .. } = self.constants;
        let h = 10f64.powf(-ph);
        let denom = h * h + k1 * h + k1 * k2;
        (k1 * h + 2.0 * k1 * k2) / denom
    }

    pub fn borate_fraction(&self, ph: f64) -> f64 {
        fraction_dissociated(PKA_BORIC, ph)
    }

    fn non_carbonate_alkalinity(&self, ph: f64) -> f64 {
        let h = 10f64.powf(-ph);
        self.cyanurate * fraction_dissociated(PKA_CYANURIC, ph)
            + self.borate * self.borate_fraction(ph)
            + self.constants.kw / h
            - h
    }

    /// Total alkalinity (eq/L) at `ph` with the current composition
    pub fn alkalinity(&self, ph: f64) -> f64 {
        self.dic * self.carbonate_factor(ph) + self.non_carbonate_alkalinity(ph)
    }
}
