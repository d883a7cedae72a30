//! # Controller gain tables
//!
//! Every PID controller on the vehicle reads its gains from a [`ControlGains`] table. The table is
//! loaded from `gains.toml` at startup and may be replaced as a whole by the operator console.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Gains for a single PID axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Minimum time between two derivative samples.
    ///
    /// Units: seconds
    pub deriv_sample_interval_s: f64,

    /// Lower bound of the integrator
    pub integrator_min: f64,

    /// Upper bound of the integrator
    pub integrator_max: f64,
}

/// Gains for each axis of one controller family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerGains {
    /// Yaw gains used while driving forwards (and while spinning)
    pub yaw_fwd: PidGains,

    /// Yaw gains used while driving in reverse
    pub yaw_bwd: PidGains,
    pub pitch: PidGains,
    pub roll: PidGains,
    pub depth: PidGains,
    pub east: PidGains,
    pub north: PidGains,
}

/// The complete gain table for all controller families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlGains {
    /// Gains of the waypoint-following movement controller
    pub advanced: ControllerGains,

    /// Gains of the joystick controller
    pub joystick: ControllerGains,

    /// Gains of the position-holding controller used in manual mode
    pub locked: ControllerGains,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PidGains {
    /// Returns true if these gains are usable.
    ///
    /// Gains must be finite, the integrator range must not be inverted and the derivative sample
    /// interval must be non-negative.
    pub fn are_valid(&self) -> bool {
        let all_finite = [
            self.k_p,
            self.k_i,
            self.k_d,
            self.deriv_sample_interval_s,
            self.integrator_min,
            self.integrator_max,
        ]
        .iter()
        .all(|v| v.is_finite());

        all_finite
            && self.integrator_min <= self.integrator_max
            && self.deriv_sample_interval_s >= 0.0
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            k_p: 0.0,
            k_i: 0.0,
            k_d: 0.0,
            deriv_sample_interval_s: 0.0,
            integrator_min: -1000.0,
            integrator_max: 1000.0,
        }
    }
}

impl ControllerGains {
    /// Iterate over the axes of this family along with their names.
    pub fn axes(&self) -> [(&'static str, &PidGains); 7] {
        [
            ("yaw_fwd", &self.yaw_fwd),
            ("yaw_bwd", &self.yaw_bwd),
            ("pitch", &self.pitch),
            ("roll", &self.roll),
            ("depth", &self.depth),
            ("east", &self.east),
            ("north", &self.north),
        ]
    }

    pub fn are_valid(&self) -> bool {
        self.axes().iter().all(|(_, g)| g.are_valid())
    }
}

impl Default for ControllerGains {
    fn default() -> Self {
        Self {
            yaw_fwd: PidGains::default(),
            yaw_bwd: PidGains::default(),
            pitch: PidGains::default(),
            roll: PidGains::default(),
            depth: PidGains::default(),
            east: PidGains::default(),
            north: PidGains::default(),
        }
    }
}

impl ControlGains {
    pub fn are_valid(&self) -> bool {
        self.advanced.are_valid() && self.joystick.are_valid() && self.locked.are_valid()
    }
}

impl Default for ControlGains {
    fn default() -> Self {
        Self {
            advanced: ControllerGains::default(),
            joystick: ControllerGains::default(),
            locked: ControllerGains::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gain_validity() {
        let mut g = PidGains::default();
        assert!(g.are_valid());

        g.integrator_min = 10.0;
        g.integrator_max = -10.0;
        assert!(!g.are_valid());

        let mut g = PidGains::default();
        g.k_p = std::f64::NAN;
        assert!(!g.are_valid());

        let mut table = ControlGains::default();
        assert!(table.are_valid());
        table.locked.roll.deriv_sample_interval_s = -1.0;
        assert!(!table.are_valid());
    }
}
