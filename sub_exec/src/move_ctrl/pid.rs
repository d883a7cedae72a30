//! # PID controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::gains::PidGains;
use serde::Serialize;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller for a single axis.
///
/// The controller holds only its state, the gains are borrowed on every update so that a new gain
/// table takes effect on the next update without resetting the controller.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PidController {
    /// The integral accumulation, always within the integrator range of the last gains used
    integrator: f64,

    /// Time and (scaled) error of the last derivative sample
    prev_sample: Option<(f64, f64)>,

    /// Derivative term, held between samples
    deriv_term: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the output of the controller for the given error.
    ///
    /// - The integrator accumulates `error * error_scale` on every call and is clamped to the
    ///   gains' integrator range.
    /// - The derivative term is only recomputed when at least `deriv_sample_interval_s` has passed
    ///   since the last sample, otherwise the previous term is held. The first call only records
    ///   a sample.
    ///
    /// The output is not clamped.
    pub fn update(&mut self, gains: &PidGains, error: f64, error_scale: f64, time_s: f64) -> f64 {
        let scaled = error * error_scale;

        self.integrator = clamp(
            self.integrator + scaled,
            gains.integrator_min,
            gains.integrator_max,
        );

        match self.prev_sample {
            None => self.prev_sample = Some((time_s, scaled)),
            Some((t0, e0)) => {
                let dt = time_s - t0;

                if dt > 0.0 && dt >= gains.deriv_sample_interval_s {
                    self.deriv_term = gains.k_d * (scaled - e0) / dt;
                    self.prev_sample = Some((time_s, scaled));
                }
            }
        }

        gains.k_p * scaled + gains.k_i * self.integrator + self.deriv_term
    }

    /// Clear all controller state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn integrator(&self) -> f64 {
        self.integrator
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
