use thiserror::Error;

use crate::chemicals::{ChemicalType, Purpose};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChemistryError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} cannot be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("pH {0} is outside 0-14")]
    PhOutOfRange(f64),

    #[error("carbonate alkalinity is not positive ({0:.1} ppm); check TA, CYA and borates")]
    NoCarbonateAlkalinity(f64),

    #[error("{chemical} cannot raise pH to {target_ph}")]
    UnreachablePh {
        chemical: ChemicalType,
        target_ph: f64,
    },

    #[error("{chemical} cannot be used to {purpose}")]
    WrongChemical {
        chemical: ChemicalType,
        purpose: Purpose,
    },
}

pub type Result<T> = std::result::Result<T, ChemistryError>;

pub(crate) fn finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ChemistryError::NotFinite { field, value })
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64> {
    if finite(field, value)? > 0.0 {
        Ok(value)
    } else {
        Err(ChemistryError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64> {
    if finite(field, value)? >= 0.0 {
        Ok(value)
    } else {
        Err(ChemistryError::Negative { field, value })
    }
}

pub(crate) fn ph(value: f64) -> Result<f64> {
    if (0.0..=14.0).contains(&finite("pH", value)?) {
        Ok(value)
    } else {
        Err(ChemistryError::PhOutOfRange(value))
    }
}
