//! The physical unit catalog and the category/conversion math it drives.

use std::collections::HashMap;

/// A family of mutually-convertible units sharing one base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum UnitCategory {
    Length,
    Mass,
    Temperature,
    Time,
}

/// `base = value * multiplier + offset`; conversion between units in the
/// same category goes through the base (spec.md §3.4).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDef {
    pub singular: &'static str,
    pub plural: &'static str,
    pub category: UnitCategory,
    pub base_name: &'static str,
    pub multiplier: f64,
    pub offset: f64,
    pub aliases: &'static [&'static str],
}

impl UnitDef {
    pub fn to_base(&self, value: f64) -> f64 {
        value * self.multiplier + self.offset
    }

    /// Converts a value already in this unit's base scale into this unit.
    pub fn from_base(&self, base_value: f64) -> f64 {
        (base_value - self.offset) / self.multiplier
    }

    pub fn is_base(&self) -> bool {
        self.singular == self.base_name
    }
}

macro_rules! unit {
    ($singular:literal, $plural:literal, $category:expr, $base:literal, $multiplier:expr, $offset:expr, [$($alias:literal),* $(,)?]) => {
        UnitDef {
            singular: $singular,
            plural: $plural,
            category: $category,
            base_name: $base,
            multiplier: $multiplier,
            offset: $offset,
            aliases: &[$($alias),*],
        }
    };
}

const UNITS: &[UnitDef] = &[
    // Length — base: meters.
    unit!("meters", "meters", UnitCategory::Length, "meters", 1.0, 0.0, ["meter", "m"]),
    unit!("feet", "feet", UnitCategory::Length, "meters", 0.3048, 0.0, ["foot", "ft"]),
    unit!("inches", "inches", UnitCategory::Length, "meters", 0.0254, 0.0, ["inch", "in"]),
    unit!(
        "kilometers",
        "kilometers",
        UnitCategory::Length,
        "meters",
        1000.0,
        0.0,
        ["kilometer", "km"]
    ),
    unit!("miles", "miles", UnitCategory::Length, "meters", 1609.344, 0.0, ["mile", "mi"]),
    unit!(
        "centimeters",
        "centimeters",
        UnitCategory::Length,
        "meters",
        0.01,
        0.0,
        ["centimeter", "cm"]
    ),
    // Mass — base: kilograms.
    unit!(
        "kilograms",
        "kilograms",
        UnitCategory::Mass,
        "kilograms",
        1.0,
        0.0,
        ["kilogram", "kg"]
    ),
    unit!("pounds", "pounds", UnitCategory::Mass, "kilograms", 0.453_592_37, 0.0, ["pound", "lb"]),
    unit!("grams", "grams", UnitCategory::Mass, "kilograms", 0.001, 0.0, ["gram", "g"]),
    // Temperature — base: kelvin. Non-zero offsets exercise the affine formula.
    unit!(
        "kelvin",
        "kelvin",
        UnitCategory::Temperature,
        "kelvin",
        1.0,
        0.0,
        ["k"]
    ),
    unit!(
        "celsius",
        "celsius",
        UnitCategory::Temperature,
        "kelvin",
        1.0,
        273.15,
        ["c"]
    ),
    unit!(
        "fahrenheit",
        "fahrenheit",
        UnitCategory::Temperature,
        "kelvin",
        5.0 / 9.0,
        273.15 - 32.0 * 5.0 / 9.0,
        ["f"]
    ),
    // Time — base: seconds.
    unit!("seconds", "seconds", UnitCategory::Time, "seconds", 1.0, 0.0, ["second", "s"]),
    unit!("minutes", "minutes", UnitCategory::Time, "seconds", 60.0, 0.0, ["minute", "min"]),
    unit!("hours", "hours", UnitCategory::Time, "seconds", 3600.0, 0.0, ["hour", "h"]),
    unit!("days", "days", UnitCategory::Time, "seconds", 86_400.0, 0.0, ["day", "d"]),
];

/// Looks up units by every lowercase spelling (singular, plural, alias);
/// distinct units enumerate by singular (spec.md §4.9 "Unit registry").
pub struct UnitRegistry {
    by_name: HashMap<&'static str, &'static UnitDef>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        for unit in UNITS {
            by_name.insert(unit.singular, unit);
            by_name.insert(unit.plural, unit);
            for alias in unit.aliases {
                by_name.insert(*alias, unit);
            }
        }
        Self { by_name }
    }

    pub fn lookup(&self, name: &str) -> Option<&'static UnitDef> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All distinct units, one entry per singular name.
    pub fn all(&self) -> impl Iterator<Item = &'static UnitDef> {
        UNITS.iter()
    }

    /// Converts `value` from `from` to `to`. Returns `None` if the units
    /// belong to different categories; the evaluator turns that into a
    /// `DomainError` (spec.md §3.4, §7).
    pub fn convert(&self, value: f64, from: &UnitDef, to: &UnitDef) -> Option<f64> {
        if from.category != to.category {
            return None;
        }
        let base = from.to_base(value);
        Some(to.from_base(base))
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_unit_round_trips_exactly() {
        let reg = UnitRegistry::new();
        let m = reg.lookup("m").unwrap();
        assert_eq!(reg.convert(5.0, m, m), Some(5.0));
    }

    #[test]
    fn affine_temperature_conversion_matches_known_point() {
        let reg = UnitRegistry::new();
        let c = reg.lookup("celsius").unwrap();
        let f = reg.lookup("fahrenheit").unwrap();
        let converted = reg.convert(0.0, c, f).unwrap();
        assert!((converted - 32.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_through_base_recovers_original_within_tolerance() {
        let reg = UnitRegistry::new();
        let c = reg.lookup("c").unwrap();
        let k = reg.lookup("kelvin").unwrap();
        let original = 37.0;
        let there = reg.convert(original, c, k).unwrap();
        let back = reg.convert(there, k, c).unwrap();
        assert!((back - original).abs() < 1e-9);
    }

    #[test]
    fn cross_category_conversion_is_rejected() {
        let reg = UnitRegistry::new();
        let m = reg.lookup("meters").unwrap();
        let kg = reg.lookup("kilograms").unwrap();
        assert_eq!(reg.convert(1.0, m, kg), None);
    }

    #[test]
    fn aliases_and_plural_resolve_to_the_same_unit() {
        let reg = UnitRegistry::new();
        assert_eq!(reg.lookup("foot"), reg.lookup("feet"));
        assert_eq!(reg.lookup("ft"), reg.lookup("feet"));
    }
}
