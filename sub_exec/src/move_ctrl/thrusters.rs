//! # Thruster model and allocation
//!
//! The allocation projects the six body-frame signals onto each thruster using only its mounting
//! orientation and location, so changing the number or placement of thrusters needs new
//! `vehicle.toml` values and no code.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use comms_if::eqpt::thruster::{ThrusterCmd, MAX_MAGNITUDE};
use serde::{Deserialize, Serialize};
use util::maths::{clamp, norm};

use super::{BodySignals, MoveCtrlError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance on the length of a thruster's orientation vector.
const UNIT_VECTOR_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mounting and limits of one thruster.
///
/// Vectors are in the body frame: x starboard, y up, z forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrusterSpec {
    /// Thruster ID, `1..=N`
    pub id: u8,

    /// Index of the driver board the thruster is attached to
    pub board: u8,

    /// Channel on the driver board
    pub channel: u8,

    /// Unit thrust direction
    pub orientation: [f64; 3],

    /// Lever arm from the centre of mass
    ///
    /// Units: feet
    pub location: [f64; 3],

    /// Largest duty cycle magnitude, `1..=204`
    pub max_duty_cycle: u8,
}

/// A single thruster with its clamped output.
#[derive(Debug, Clone)]
pub struct Thruster {
    spec: ThrusterSpec,
    duty_cycle: f64,
}

/// The set of thrusters on the vehicle, ordered by ID.
#[derive(Debug, Clone)]
pub struct ThrusterArray {
    thrusters: Vec<Thruster>,
}

/// Rate limiter for the thruster command bus.
///
/// A thruster is only sent a new command if it differs from the last one sent to it, and no more
/// often than once per `min_send_interval_s`.
#[derive(Debug, Clone)]
pub struct ThrusterBus {
    min_send_interval_s: f64,

    /// Last command and the time it was sent, per thruster
    last_sent: Vec<Option<(f64, ThrusterCmd)>>,
}

/// Commands to write to each board, keyed by board index.
pub type BoardCmds = BTreeMap<u8, Vec<ThrusterCmd>>;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ThrusterSpec {
    fn validate(&self) -> Result<(), MoveCtrlError> {
        let invalid = |reason: &str| MoveCtrlError::InvalidThrusterSpec(self.id, reason.into());

        if self.max_duty_cycle == 0 || self.max_duty_cycle > MAX_MAGNITUDE {
            return Err(invalid("max_duty_cycle must be in 1..=204"));
        }

        match norm(&self.orientation, &[0.0; 3]) {
            Some(n) if (n - 1.0).abs() < UNIT_VECTOR_TOLERANCE => (),
            _ => return Err(invalid("orientation must be a unit vector")),
        }

        if !self.location.iter().all(|v| v.is_finite()) {
            return Err(invalid("location must be finite"));
        }

        Ok(())
    }
}

impl Thruster {
    pub fn new(spec: ThrusterSpec) -> Self {
        Self {
            spec,
            duty_cycle: 0.0,
        }
    }

    /// Set the duty cycle, clamping it to the thruster's limits.
    ///
    /// Non-finite values are treated as zero.
    pub fn set_duty_cycle(&mut self, value: f64) {
        let max = self.spec.max_duty_cycle as f64;

        self.duty_cycle = if value.is_finite() {
            clamp(value, -max, max)
        } else {
            0.0
        };
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    pub fn spec(&self) -> &ThrusterSpec {
        &self.spec
    }
}

impl ThrusterArray {
    /// Build the array from the vehicle's thruster specs.
    ///
    /// IDs must be exactly `1..=N` and each (board, channel) pair must be unique.
    pub fn new(mut specs: Vec<ThrusterSpec>) -> Result<Self, MoveCtrlError> {
        if specs.is_empty() {
            return Err(MoveCtrlError::NoThrusters);
        }

        specs.sort_by_key(|s| s.id);

        for (i, spec) in specs.iter().enumerate() {
            spec.validate()?;

            if spec.id as usize != i + 1 {
                return Err(MoveCtrlError::InvalidThrusterSpec(
                    spec.id,
                    format!("expected ID {}, thruster IDs must run from 1 to N", i + 1),
                ));
            }

            if specs[..i]
                .iter()
                .any(|s| s.board == spec.board && s.channel == spec.channel)
            {
                return Err(MoveCtrlError::InvalidThrusterSpec(
                    spec.id,
                    format!("board {} channel {} is used twice", spec.board, spec.channel),
                ));
            }
        }

        Ok(Self {
            thrusters: specs.into_iter().map(Thruster::new).collect(),
        })
    }

    /// Allocate body-frame signals to the thrusters, returning the clamped duty cycles.
    ///
    /// For orientation `o` and location `l` of each thruster:
    ///
    /// `duty = -x*ox - y*oy - z*oz + pitch*oy*lz + yaw*(-ox*lz + oz*lx) + roll*(-oy*lx)`
    pub fn move_signals(&mut self, s: &BodySignals) -> Vec<f64> {
        for t in self.thrusters.iter_mut() {
            let [ox, oy, oz] = t.spec.orientation;
            let [lx, _, lz] = t.spec.location;

            let duty = -s.x * ox - s.y * oy - s.z * oz
                + s.pitch * oy * lz
                + s.yaw * (-ox * lz + oz * lx)
                + s.roll * (-oy * lx);

            t.set_duty_cycle(duty);
        }

        self.duty_cycles()
    }

    /// Set every thruster to zero.
    pub fn neutral(&mut self) -> Vec<f64> {
        for t in self.thrusters.iter_mut() {
            t.set_duty_cycle(0.0);
        }

        self.duty_cycles()
    }

    pub fn duty_cycles(&self) -> Vec<f64> {
        self.thrusters.iter().map(|t| t.duty_cycle).collect()
    }

    /// The largest duty cycle any thruster accepts, used to clamp controller outputs.
    pub fn max_duty_cycle(&self) -> f64 {
        self.thrusters
            .iter()
            .map(|t| t.spec.max_duty_cycle as f64)
            .fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.thrusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thrusters.is_empty()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ThrusterSpec> {
        self.thrusters.iter().map(|t| &t.spec)
    }
}

impl ThrusterBus {
    pub fn new(num_thrusters: usize, min_send_interval_s: f64) -> Self {
        Self {
            min_send_interval_s,
            last_sent: vec![None; num_thrusters],
        }
    }

    /// Get the commands which should be sent for these duty cycles at this time.
    pub fn commands<'a>(
        &mut self,
        specs: impl Iterator<Item = &'a ThrusterSpec>,
        duty_cycles: &[f64],
        time_s: f64,
    ) -> BoardCmds {
        self.build(specs, duty_cycles, time_s, false)
    }

    /// Get commands for every thruster, ignoring the rate limit and change detection.
    pub fn force_all<'a>(
        &mut self,
        specs: impl Iterator<Item = &'a ThrusterSpec>,
        duty_cycles: &[f64],
        time_s: f64,
    ) -> BoardCmds {
        self.build(specs, duty_cycles, time_s, true)
    }

    fn build<'a>(
        &mut self,
        specs: impl Iterator<Item = &'a ThrusterSpec>,
        duty_cycles: &[f64],
        time_s: f64,
        force: bool,
    ) -> BoardCmds {
        let mut cmds = BoardCmds::new();

        for ((spec, duty), last) in specs
            .zip(duty_cycles.iter())
            .zip(self.last_sent.iter_mut())
        {
            let cmd = ThrusterCmd::from_duty_cycle(spec.channel, *duty);

            let send = force
                || match last {
                    None => true,
                    Some((t, prev)) => {
                        *prev != cmd && time_s - *t >= self.min_send_interval_s
                    }
                };

            if send {
                *last = Some((time_s, cmd));
                cmds.entry(spec.board).or_insert_with(Vec::new).push(cmd);
            }
        }

        cmds
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// An eight thruster vehicle: four vertical thrusters at the corners and four vectored
    /// horizontal thrusters.
    pub(crate) fn vehicle_specs() -> Vec<ThrusterSpec> {
        let h = std::f64::consts::FRAC_1_SQRT_2;

        let mk = |id: u8, orientation: [f64; 3], location: [f64; 3]| ThrusterSpec {
            id,
            board: (id - 1) / 4,
            channel: (id - 1) % 4,
            orientation,
            location,
            max_duty_cycle: 204,
        };

        vec![
            mk(1, [0.0, 1.0, 0.0], [-1.0, 0.0, 1.5]),
            mk(2, [0.0, 1.0, 0.0], [1.0, 0.0, 1.5]),
            mk(3, [0.0, 1.0, 0.0], [-1.0, 0.0, -1.5]),
            mk(4, [0.0, 1.0, 0.0], [1.0, 0.0, -1.5]),
            mk(5, [h, 0.0, h], [-1.0, 0.0, 1.5]),
            mk(6, [-h, 0.0, h], [1.0, 0.0, 1.5]),
            mk(7, [-h, 0.0, h], [-1.0, 0.0, -1.5]),
            mk(8, [h, 0.0, h], [1.0, 0.0, -1.5]),
        ]
    }

    #[test]
    fn test_set_duty_cycle_clamps() {
        let mut t = Thruster::new(ThrusterSpec {
            max_duty_cycle: 100,
            ..vehicle_specs()[0].clone()
        });

        t.set_duty_cycle(150.0);
        assert_eq!(t.duty_cycle(), 100.0);
        t.set_duty_cycle(-1e9);
        assert_eq!(t.duty_cycle(), -100.0);
        t.set_duty_cycle(std::f64::NAN);
        assert_eq!(t.duty_cycle(), 0.0);
    }

    #[test]
    fn test_allocation_within_limits() {
        let mut array = ThrusterArray::new(vehicle_specs()).unwrap();
        let values = [-1e4, -300.0, -1.0, 0.0, 0.5, 204.0, 1e4];

        for &x in values.iter() {
            for &yaw in values.iter() {
                for &pitch in values.iter() {
                    let duty = array.move_signals(&BodySignals {
                        x,
                        y: -x,
                        z: pitch,
                        pitch,
                        yaw,
                        roll: x,
                    });

                    assert_eq!(duty.len(), 8);
                    assert!(duty.iter().all(|d| d.abs() <= 204.0));
                }
            }
        }
    }

    #[test]
    fn test_allocation_formula() {
        let mut array = ThrusterArray::new(vehicle_specs()).unwrap();

        // Pure heave only drives the vertical thrusters
        let duty = array.move_signals(&BodySignals {
            y: 10.0,
            ..Default::default()
        });
        assert_eq!(&duty[..4], &[-10.0; 4]);
        assert!(duty[4..].iter().all(|d| *d == 0.0));

        // Pure roll pushes the two sides in opposite directions
        let duty = array.move_signals(&BodySignals {
            roll: 10.0,
            ..Default::default()
        });
        assert_eq!(duty[0], 10.0);
        assert_eq!(duty[1], -10.0);
    }

    #[test]
    fn test_array_validation() {
        let mut specs = vehicle_specs();
        specs[2].id = 9;
        assert!(matches!(
            ThrusterArray::new(specs),
            Err(MoveCtrlError::InvalidThrusterSpec(_, _))
        ));

        let mut specs = vehicle_specs();
        specs[0].orientation = [1.0, 1.0, 0.0];
        assert!(ThrusterArray::new(specs).is_err());

        let mut specs = vehicle_specs();
        specs[7].channel = 0;
        specs[7].board = 0;
        assert!(ThrusterArray::new(specs).is_err());

        let mut specs = vehicle_specs();
        specs[3].max_duty_cycle = 205;
        assert!(ThrusterArray::new(specs).is_err());

        assert!(matches!(
            ThrusterArray::new(Vec::new()),
            Err(MoveCtrlError::NoThrusters)
        ));
    }

    #[test]
    fn test_bus_rate_limit() {
        let array = ThrusterArray::new(vehicle_specs()).unwrap();
        let mut bus = ThrusterBus::new(array.len(), 0.05);
        let mut duty = vec![0.0; 8];

        // Everything is sent the first time
        let cmds = bus.commands(array.specs(), &duty, 0.0);
        assert_eq!(cmds[&0].len() + cmds[&1].len(), 8);

        // Unchanged values are never resent
        assert!(bus.commands(array.specs(), &duty, 1.0).is_empty());

        // A change within the interval is held back, then sent once the interval has passed
        duty[5] = 50.0;
        assert!(bus.commands(array.specs(), &duty, 1.01).is_empty());
        let cmds = bus.commands(array.specs(), &duty, 1.06);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[&1], vec![ThrusterCmd::from_duty_cycle(1, 50.0)]);

        // Forcing sends everything regardless
        let cmds = bus.force_all(array.specs(), &duty, 1.07);
        assert_eq!(cmds[&0].len() + cmds[&1].len(), 8);
    }
}
