//! Pool water chemistry
//!
//! Saturation indices (CSI, LSI) for a [`WaterChemistry`] sample and dosing
//! calculators that turn "current value → target value" into an amount of
//! a concrete product for a given pool volume.
//!
//! All concentrations are ppm. Alkalinity and calcium hardness are ppm as
//! CaCO3, borates are ppm as boron. Temperatures are Fahrenheit and volumes
//! are US gallons.

mod balance;
mod carbonate;
mod chemicals;
mod dosing;
mod error;
pub mod units;
mod water;

pub use balance::{calculate_csi, calculate_lsi};
pub use chemicals::{ChemicalType, Purpose};
pub use dosing::{
    calculate_alkalinity_dose, calculate_borate_dose, calculate_calcium_dose,
    calculate_chlorine_dose, calculate_cya_dose, calculate_ph_dose, calculate_salt_dose,
    DoseUnit, DosingResult, PhDose, VolumeUnit,
};
pub use error::{ChemistryError, Result};
pub use water::WaterChemistry;
