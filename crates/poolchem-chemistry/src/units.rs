//! Unit conversions

pub const LITRES_PER_GALLON: f64 = 3.785_411_784;
pub const ML_PER_FL_OZ: f64 = 29.573_529_562_5;
pub const GRAMS_PER_OZ: f64 = 28.349_523_125;
pub const GRAMS_PER_LB: f64 = 453.592_37;
pub const FL_OZ_PER_CUP: f64 = 8.0;
pub const FL_OZ_PER_GALLON: f64 = 128.0;

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_kelvin(f: f64) -> f64 {
    fahrenheit_to_celsius(f) + 273.15
}

pub fn gallons_to_litres(gallons: f64) -> f64 {
    gallons * LITRES_PER_GALLON
}

/// Grams of solute that raise `litres` of water by `ppm`
pub fn ppm_to_grams(ppm: f64, litres: f64) -> f64 {
    ppm * litres / 1000.0
}
