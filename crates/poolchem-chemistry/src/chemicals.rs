//! Product catalog

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a product is dosed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    LowerPh,
    RaisePh,
    RaiseChlorine,
    RaiseAlkalinity,
    RaiseCalcium,
    RaiseCya,
    RaiseSalt,
    RaiseBorates,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Purpose::LowerPh => "lower pH",
            Purpose::RaisePh => "raise pH",
            Purpose::RaiseChlorine => "raise free chlorine",
            Purpose::RaiseAlkalinity => "raise alkalinity",
            Purpose::RaiseCalcium => "raise calcium hardness",
            Purpose::RaiseCya => "raise cyanuric acid",
            Purpose::RaiseSalt => "raise salt",
            Purpose::RaiseBorates => "raise borates",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChemicalType {
    MuriaticAcid14_5,
    MuriaticAcid28_3,
    MuriaticAcid31_45,
    MuriaticAcid34_6,
    DryAcid,
    SodaAsh,
    Borax,
    Bleach6,
    Bleach8_25,
    Bleach10,
    Bleach12_5,
    CalHypo65,
    CalHypo73,
    Dichlor,
    Trichlor,
    BakingSoda,
    CalciumChloride,
    Stabilizer,
    Salt,
    BoricAcid,
}

impl ChemicalType {
    pub fn display_name(&self) -> &'static str {
        use ChemicalType::*;
        match self {
            MuriaticAcid14_5 => "Muriatic Acid 14.5%",
            MuriaticAcid28_3 => "Muriatic Acid 28.3%",
            MuriaticAcid31_45 => "Muriatic Acid 31.45%",
            MuriaticAcid34_6 => "Muriatic Acid 34.6%",
            DryAcid => "Dry Acid",
            SodaAsh => "Soda Ash",
            Borax => "Borax",
            Bleach6 => "Bleach 6%",
            Bleach8_25 => "Bleach 8.25%",
            Bleach10 => "Bleach 10%",
            Bleach12_5 => "Bleach 12.5%",
            CalHypo65 => "Cal-Hypo 65%",
            CalHypo73 => "Cal-Hypo 73%",
            Dichlor => "Dichlor",
            Trichlor => "Trichlor",
            BakingSoda => "Baking Soda",
            CalciumChloride => "Calcium Chloride",
            Stabilizer => "Stabilizer (CYA)",
            Salt => "Salt",
            BoricAcid => "Boric Acid",
        }
    }

    pub fn purpose(&self) -> Purpose {
        use ChemicalType::*;
        match self {
            MuriaticAcid14_5 | MuriaticAcid28_3 | MuriaticAcid31_45 | MuriaticAcid34_6
            | DryAcid => Purpose::LowerPh,
            SodaAsh | Borax => Purpose::RaisePh,
            Bleach6 | Bleach8_25 | Bleach10 | Bleach12_5 | CalHypo65 | CalHypo73 | Dichlor
            | Trichlor => Purpose::RaiseChlorine,
            BakingSoda => Purpose::RaiseAlkalinity,
            CalciumChloride => Purpose::RaiseCalcium,
            Stabilizer => Purpose::RaiseCya,
            Salt => Purpose::RaiseSalt,
            BoricAcid => Purpose::RaiseBorates,
        }
    }

    /// Liquids are measured by volume (fl oz), solids by weight
    pub fn is_liquid(&self) -> bool {
        use ChemicalType::*;
        matches!(
            self,
            MuriaticAcid14_5
                | MuriaticAcid28_3
                | MuriaticAcid31_45
                | MuriaticAcid34_6
                | Bleach6
                | Bleach8_25
                | Bleach10
                | Bleach12_5
        )
    }

    /// Hydrochloric acid strength (% by weight) and solution density (g/mL)
    pub(crate) fn hcl_solution(&self) -> Option<(f64, f64)> {
        use ChemicalType::*;
        match self {
            MuriaticAcid14_5 => Some((14.5, 1.07)),
            MuriaticAcid28_3 => Some((28.3, 1.14)),
            MuriaticAcid31_45 => Some((31.45, 1.16)),
            MuriaticAcid34_6 => Some((34.6, 1.17)),
            _ => None,
        }
    }

    /// Available chlorine: g/100 mL for bleach, % by weight for solids
    pub(crate) fn available_chlorine(&self) -> Option<f64> {
        use ChemicalType::*;
        match self {
            Bleach6 => Some(6.0),
            Bleach8_25 => Some(8.25),
            Bleach10 => Some(10.0),
            Bleach12_5 => Some(12.5),
            CalHypo65 => Some(65.0),
            CalHypo73 => Some(73.0),
            Dichlor => Some(55.6),
            Trichlor => Some(90.0),
            _ => None,
        }
    }

    /// Side effect of each ppm of chlorine added, as (ppm, parameter)
    pub(crate) fn chlorine_side_effect(&self) -> Option<(f64, &'static str)> {
        use ChemicalType::*;
        match self {
            CalHypo65 | CalHypo73 => Some((0.7, "calcium hardness")),
            Dichlor => Some((0.9, "CYA")),
            Trichlor => Some((0.6, "CYA")),
            _ => None,
        }
    }
}

impl fmt::Display for ChemicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_consistency() {
        use ChemicalType::*;
        for acid in [MuriaticAcid14_5, MuriaticAcid28_3, MuriaticAcid31_45, MuriaticAcid34_6] {
            assert_eq!(acid.purpose(), Purpose::LowerPh);
            assert!(acid.is_liquid());
            assert!(acid.hcl_solution().is_some());
        }
        assert!(!DryAcid.is_liquid());
        assert!(DryAcid.hcl_solution().is_none());
        for cl in [Bleach6, Bleach12_5, CalHypo65, Trichlor] {
            assert_eq!(cl.purpose(), Purpose::RaiseChlorine);
            assert!(cl.available_chlorine().is_some());
        }
        assert!(Bleach8_25.chlorine_side_effect().is_none());
        assert_eq!(Dichlor.chlorine_side_effect(), Some((0.9, "CYA")));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_value(ChemicalType::MuriaticAcid31_45).unwrap(),
            "muriatic_acid31_45"
        );
        assert_eq!(
            serde_json::to_value(ChemicalType::Bleach12_5).unwrap(),
            "bleach12_5"
        );
        assert_eq!(ChemicalType::Bleach12_5.to_string(), "Bleach 12.5%");
    }
}
