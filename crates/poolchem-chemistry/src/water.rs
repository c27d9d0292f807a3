use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

/// One water sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterChemistry {
    pub ph: f64,
    pub temperature_f: f64,
    pub free_chlorine: f64,
    pub total_alkalinity: f64,
    pub calcium_hardness: f64,
    pub cyanuric_acid: f64,
    pub salt: f64,
    pub tds: f64,
    pub borates: f64,
}

impl WaterChemistry {
    /// Sample with the four balance inputs; everything else starts at the
    /// usual "not measured" values (TDS 1000, the rest 0)
    pub fn new(ph: f64, temperature_f: f64, total_alkalinity: f64, calcium_hardness: f64) -> Self {
        Self {
            ph,
            temperature_f,
            free_chlorine: 0.0,
            total_alkalinity,
            calcium_hardness,
            cyanuric_acid: 0.0,
            salt: 0.0,
            tds: 1000.0,
            borates: 0.0,
        }
    }

    pub fn with_free_chlorine(mut self, fc: f64) -> Self {
        self.free_chlorine = fc;
        self
    }

    pub fn with_cyanuric_acid(mut self, cya: f64) -> Self {
        self.cyanuric_acid = cya;
        self
    }

    pub fn with_salt(mut self, salt: f64) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_tds(mut self, tds: f64) -> Self {
        self.tds = tds;
        self
    }

    pub fn with_borates(mut self, borates: f64) -> Self {
        self.borates = borates;
        self
    }

    pub fn temperature_c(&self) -> f64 {
        crate::units::fahrenheit_to_celsius(self.temperature_f)
    }

    /// Reject values no index can be computed from
    pub fn validate(&self) -> Result<()> {
        error::ph(self.ph)?;
        error::finite("temperature", self.temperature_f)?;
        error::positive("total alkalinity", self.total_alkalinity)?;
        error::positive("calcium hardness", self.calcium_hardness)?;
        error::non_negative("free chlorine", self.free_chlorine)?;
        error::non_negative("cyanuric acid", self.cyanuric_acid)?;
        error::non_negative("salt", self.salt)?;
        error::non_negative("TDS", self.tds)?;
        error::non_negative("borates", self.borates)?;
        Ok(())
    }
}
