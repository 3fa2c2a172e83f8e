//! Geometric constants of the vehicle and the planner tuning knobs.
//!
//! Both structs deserialize with per-field defaults so a config file only
//! needs to name the values it changes.

use serde::{Deserialize, Serialize};

use crate::RoverError;
use crate::spatial::ObstaclePoint;

/// Vehicle and safety-envelope geometry (metres unless noted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    /// Diameter of the tightest turn; also the distance from the body
    /// axis to each turn-column centre.
    pub turn_diameter: f32,
    /// How far ahead/behind obstacles are considered at all.
    pub check_radius: f32,
    /// Minimum free distance in front of the bumper at reference speed.
    pub stop_distance: f32,
    /// Offset from the range sensor to the body centre along x.
    pub center_offset: f32,
    /// Safety buffer added to every boundary.
    pub fear_margin: f32,
    pub car_width: f32,
    /// Shrink applied to the body rectangle for self-return rejection.
    pub inner_offset: f32,
    /// Slight-turn pivot distance as a multiple of half the check radius.
    pub slight_pivot_factor: f32,
    /// Speed (m/s) above which the stop distance grows linearly.
    pub reference_speed: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            turn_diameter: 0.88,
            check_radius: 2.0,
            stop_distance: 0.35,
            center_offset: 0.07,
            fear_margin: 0.05,
            car_width: 0.18,
            inner_offset: 0.03,
            slight_pivot_factor: 2.5,
            reference_speed: 0.5,
        }
    }
}

impl Geometry {
    pub fn half_width(&self) -> f32 {
        self.car_width / 2.0
    }

    /// Radius of each turn column.
    pub fn column_radius(&self) -> f32 {
        self.turn_diameter - self.half_width() - self.fear_margin
    }

    /// Centre of the column on the left (+y) side.
    pub fn left_column_center(&self) -> ObstaclePoint {
        ObstaclePoint::new(0.0, self.turn_diameter)
    }

    /// Centre of the column on the right (-y) side.
    pub fn right_column_center(&self) -> ObstaclePoint {
        ObstaclePoint::new(0.0, -self.turn_diameter)
    }

    /// Outer radius of the corridor swept by a full-lock turn, fear margin
    /// included.
    pub fn full_turn_outer_radius(&self) -> f32 {
        self.column_radius() + 2.0 * (self.half_width() + self.fear_margin)
    }

    /// Lateral distance of the slight-turn pivot.
    pub fn slight_pivot(&self) -> f32 {
        self.check_radius / 2.0 * self.slight_pivot_factor
    }

    /// Range requested from the sensor before the anisotropic cutoff.
    pub fn prefilter_radius(&self) -> f32 {
        self.check_radius + self.half_width() + self.fear_margin + self.center_offset.abs()
    }

    /// Stop distance scaled up for speeds above the reference speed.
    pub fn stop_distance_at(&self, speed: f32) -> f32 {
        if speed > self.reference_speed {
            self.stop_distance * speed / self.reference_speed
        } else {
            self.stop_distance
        }
    }

    /// Reject configurations that would make the envelope degenerate.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), RoverError> {
        let positive = [
            ("turn_diameter", self.turn_diameter),
            ("check_radius", self.check_radius),
            ("stop_distance", self.stop_distance),
            ("car_width", self.car_width),
            ("slight_pivot_factor", self.slight_pivot_factor),
            ("reference_speed", self.reference_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RoverError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [
            ("fear_margin", self.fear_margin),
            ("inner_offset", self.inner_offset),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RoverError::Config(format!(
                    "{name} must be finite and not negative, got {value}"
                )));
            }
        }
        if !self.center_offset.is_finite() {
            return Err(RoverError::Config(format!(
                "center_offset must be finite, got {}",
                self.center_offset
            )));
        }
        if self.column_radius() <= 0.0 {
            return Err(RoverError::Config(format!(
                "turn_diameter {} leaves no room for a turn column",
                self.turn_diameter
            )));
        }
        if self.stop_distance >= self.check_radius {
            return Err(RoverError::Config(format!(
                "stop_distance {} must be shorter than check_radius {}",
                self.stop_distance, self.check_radius
            )));
        }
        Ok(())
    }
}

/// Empirically tuned selection constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerTuning {
    /// Sectors with less reach than this have their weight scaled by
    /// `clearance_penalty`.
    pub clearance_threshold: f32,
    pub clearance_penalty: f32,
    /// Multiplier for sectors continuing the current travel direction.
    pub continuity_bonus: f32,
    /// Ticks of unchanged full throttle without net motion before a jam.
    pub jam_ticks: u32,
    /// How long the jam stop is held.
    pub jam_hold_ticks: u32,
}

impl Default for PlannerTuning {
    fn default() -> Self {
        Self {
            clearance_threshold: 0.5,
            clearance_penalty: 0.5,
            continuity_bonus: 4.0,
            jam_ticks: 3,
            jam_hold_ticks: 4,
        }
    }
}

impl PlannerTuning {
    /// Returns [`RoverError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), RoverError> {
        let non_negative = [
            ("clearance_threshold", self.clearance_threshold),
            ("clearance_penalty", self.clearance_penalty),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RoverError::Config(format!(
                    "{name} must be finite and not negative, got {value}"
                )));
            }
        }
        if !(self.continuity_bonus.is_finite() && self.continuity_bonus > 0.0) {
            return Err(RoverError::Config(format!(
                "continuity_bonus must be positive, got {}",
                self.continuity_bonus
            )));
        }
        if self.jam_hold_ticks == 0 {
            return Err(RoverError::Config("jam_hold_ticks must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_is_valid() {
        Geometry::default().validate().expect("defaults must validate");
    }

    #[test]
    fn derived_radii() {
        let g = Geometry::default();
        assert!((g.column_radius() - 0.74).abs() < 1e-6);
        let outer = g.turn_diameter + g.half_width() + g.fear_margin;
        assert!((g.full_turn_outer_radius() - outer).abs() < 1e-6);
        assert!((g.slight_pivot() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn stop_distance_scales_above_reference_speed() {
        let g = Geometry::default();
        assert_eq!(g.stop_distance_at(0.0), g.stop_distance);
        assert_eq!(g.stop_distance_at(0.5), g.stop_distance);
        assert!((g.stop_distance_at(1.0) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_degenerate_column() {
        let g = Geometry {
            turn_diameter: 0.1,
            ..Geometry::default()
        };
        assert!(matches!(g.validate(), Err(RoverError::Config(_))));
    }

    #[test]
    fn validate_rejects_stop_beyond_check_radius() {
        let g = Geometry {
            stop_distance: 3.0,
            ..Geometry::default()
        };
        assert!(g.validate().is_err());
    }

    #[test]
    fn partial_toml_style_json_uses_defaults() {
        let g: Geometry = serde_json::from_str(r#"{"check_radius": 3.0}"#).unwrap();
        assert_eq!(g.check_radius, 3.0);
        assert_eq!(g.stop_distance, 0.35);
    }

    #[test]
    fn validate_rejects_non_finite_fields() {
        let cases: [fn(&mut Geometry, f32); 9] = [
            |g, v| g.turn_diameter = v,
            |g, v| g.check_radius = v,
            |g, v| g.stop_distance = v,
            |g, v| g.center_offset = v,
            |g, v| g.fear_margin = v,
            |g, v| g.car_width = v,
            |g, v| g.inner_offset = v,
            |g, v| g.slight_pivot_factor = v,
            |g, v| g.reference_speed = v,
        ];
        for (i, set) in cases.iter().enumerate() {
            for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
                let mut g = Geometry::default();
                set(&mut g, bad);
                assert!(
                    matches!(g.validate(), Err(RoverError::Config(_))),
                    "field #{i} accepted {bad}"
                );
            }
        }
    }

    #[test]
    fn center_offset_may_be_negative() {
        let g = Geometry {
            center_offset: -0.1,
            ..Geometry::default()
        };
        assert!(g.validate().is_ok());
    }

    #[test]
    fn default_tuning_is_valid() {
        PlannerTuning::default().validate().expect("defaults must validate");
    }

    #[test]
    fn tuning_rejects_unusable_values() {
        let cases: [fn(&mut PlannerTuning); 6] = [
            |t| t.clearance_threshold = f32::NAN,
            |t| t.clearance_penalty = -0.5,
            |t| t.clearance_penalty = f32::INFINITY,
            |t| t.continuity_bonus = f32::NAN,
            |t| t.continuity_bonus = 0.0,
            |t| t.jam_hold_ticks = 0,
        ];
        for set in cases {
            let mut tuning = PlannerTuning::default();
            set(&mut tuning);
            assert!(tuning.validate().is_err(), "{tuning:?} accepted");
        }
    }
}
