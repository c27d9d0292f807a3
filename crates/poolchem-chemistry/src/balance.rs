//! Saturation indices
//!
//! Both indices are `pH - pHs`: negative water dissolves calcium carbonate
//! (etches plaster), positive water deposits it (scale).

use crate::carbonate::{CACO3_EQ_MG, PKA_BORIC, PKA_CYANURIC};
use crate::error::Result;
use crate::units::fahrenheit_to_kelvin;
use crate::water::WaterChemistry;

const CYA_ALK_PER_PPM: f64 = 0.387_72;
const BORATE_ALK_PER_PPM: f64 = 4.63;
const NACL_PER_CH: f64 = 1.1678;
const NACL_MG_PER_MOL: f64 = 58_440.0;

/// Alkalinity contributed by carbonate alone, ppm as CaCO3
fn carbonate_alkalinity(water: &WaterChemistry) -> f64 {
    water.total_alkalinity
        - CYA_ALK_PER_PPM * water.cyanuric_acid / (1.0 + 10f64.powf(PKA_CYANURIC - water.ph))
        - BORATE_ALK_PER_PPM * water.borates / (1.0 + 10f64.powf(PKA_BORIC - water.ph))
}

/// Calcite Saturation Index
///
/// Corrects alkalinity for cyanurate and borate, and derives ionic strength
/// from calcium, alkalinity and the sodium chloride not already accounted
/// for by calcium chloride.
pub fn calculate_csi(water: &WaterChemistry) -> Result<f64> {
    water.validate()?;

    let carb_alk = carbonate_alkalinity(water);
    if carb_alk <= 0.0 {
        return Err(crate::ChemistryError::NoCarbonateAlkalinity(carb_alk));
    }

    let extra_nacl = (water.salt - NACL_PER_CH * water.calcium_hardness).max(0.0);
    let ionic = (1.5 * water.calcium_hardness + water.total_alkalinity) / CACO3_EQ_MG
        + extra_nacl / NACL_MG_PER_MOL;
    let sqrt_i = ionic.sqrt();

    Ok(water.ph - 11.677
        + water.calcium_hardness.log10()
        + carb_alk.log10()
        - 2.56 * sqrt_i / (1.0 + 1.65 * sqrt_i)
        - 1412.5 / (water.temperature_c() + 273.15)
        + 4.7375)
}

/// Langelier Saturation Index
///
/// The classic form using TDS for the ionic term and total alkalinity as
/// measured.
pub fn calculate_lsi(water: &WaterChemistry) -> Result<f64> {
    water.validate()?;
    if water.tds <= 0.0 {
        return Err(crate::ChemistryError::NotPositive {
            field: "TDS",
            value: water.tds,
        });
    }

    let a = (water.tds.log10() - 1.0) / 10.0;
    let b = -13.12 * fahrenheit_to_kelvin(water.temperature_f).log10() + 34.55;
    let c = water.calcium_hardness.log10() - 0.4;
    let d = water.total_alkalinity.log10();
    let ph_s = 9.3 + a + b - (c + d);

    Ok(water.ph - ph_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChemistryError;

    fn reference_water() -> WaterChemistry {
        WaterChemistry::new(7.5, 84.0, 80.0, 300.0)
            .with_free_chlorine(5.0)
            .with_cyanuric_acid(40.0)
    }

    #[test]
    fn test_csi_reference_pool() {
        let csi = calculate_csi(&reference_water()).unwrap();
        assert!((csi - -0.04).abs() < 0.02, "csi = {csi}");
    }

    #[test]
    fn test_lsi_reference_pool() {
        let lsi = calculate_lsi(&reference_water()).unwrap();
        assert!((lsi - -0.03).abs() < 0.02, "lsi = {lsi}");
    }

    #[test]
    fn test_csi_moves_with_ph_and_calcium() {
        let base = calculate_csi(&reference_water()).unwrap();
        let higher_ph = WaterChemistry {
            ph: 7.8,
            ..reference_water()
        };
        let more_calcium = WaterChemistry {
            calcium_hardness: 600.0,
            ..reference_water()
        };
        assert!(calculate_csi(&higher_ph).unwrap() > base);
        assert!(calculate_csi(&more_calcium).unwrap() > base);
    }

    #[test]
    fn test_cya_lowers_csi() {
        let no_cya = WaterChemistry {
            cyanuric_acid: 0.0,
            ..reference_water()
        };
        assert!(calculate_csi(&no_cya).unwrap() > calculate_csi(&reference_water()).unwrap());
    }

    #[test]
    fn test_salt_lowers_csi() {
        let salty = reference_water().with_salt(3200.0);
        assert!(calculate_csi(&salty).unwrap() < calculate_csi(&reference_water()).unwrap());
    }

    #[test]
    fn test_invalid_inputs() {
        let zero_ta = WaterChemistry {
            total_alkalinity: 0.0,
            ..reference_water()
        };
        assert!(calculate_csi(&zero_ta).is_err());
        assert!(calculate_lsi(&zero_ta).is_err());

        let swamped = reference_water().with_cyanuric_acid(300.0);
        assert!(matches!(
            calculate_csi(&swamped),
            Err(ChemistryError::NoCarbonateAlkalinity(_))
        ));

        let no_tds = reference_water().with_tds(0.0);
        assert!(calculate_lsi(&no_tds).is_err());
    }
}
