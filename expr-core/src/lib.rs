//! Position tracking, exact rational arithmetic, and the data-only
//! registries (units, constants, keywords) shared by every later stage of
//! the expression engine.
//!
//! This crate has no dependency on the compiler or evaluator crates, by
//! design: it sits at the leaf of the dependency order (spec.md §2).

pub mod constants;
pub mod keywords;
pub mod rational;
pub mod span;
pub mod units;

pub use constants::{ConstantRegistry, ConstantValue};
pub use keywords::{is_keyword, KEYWORDS};
pub use rational::Rational;
pub use span::Span;
pub use units::{UnitCategory, UnitDef, UnitRegistry};

/// The angle convention trigonometric functions consult (spec.md §3.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
    Gradians,
}

impl AngleUnit {
    /// Converts an angle expressed in this unit into radians.
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Radians => value,
            AngleUnit::Degrees => value.to_radians(),
            AngleUnit::Gradians => value * std::f64::consts::PI / 200.0,
        }
    }

    /// Converts a radian value back into this unit.
    pub fn from_radians(self, radians: f64) -> f64 {
        match self {
            AngleUnit::Radians => radians,
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Gradians => radians * 200.0 / std::f64::consts::PI,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrees_round_trip_through_radians() {
        let deg = AngleUnit::Degrees;
        let radians = deg.to_radians(90.0);
        assert!((radians - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((deg.from_radians(radians) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn default_angle_unit_is_radians() {
        assert_eq!(AngleUnit::default(), AngleUnit::Radians);
    }
}
