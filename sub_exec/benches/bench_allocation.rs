//! # Thruster Allocation Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::gains::{ControllerGains, PidGains};
use sub_lib::move_ctrl::{
    BodySignals, DrivingMode, MoveCtrlParams, MovementController, Pose, ThrusterArray,
    ThrusterSpec,
};

/// Four vertical thrusters at the corners and four vectored horizontal thrusters.
fn specs() -> Vec<ThrusterSpec> {
    let h = std::f64::consts::FRAC_1_SQRT_2;

    let layout = [
        ([0.0, 1.0, 0.0], [-1.0, 0.0, 1.5]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 1.5]),
        ([0.0, 1.0, 0.0], [-1.0, 0.0, -1.5]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, -1.5]),
        ([h, 0.0, h], [-1.0, 0.0, 1.5]),
        ([-h, 0.0, h], [1.0, 0.0, 1.5]),
        ([-h, 0.0, h], [-1.0, 0.0, -1.5]),
        ([h, 0.0, h], [1.0, 0.0, -1.5]),
    ];

    layout
        .iter()
        .enumerate()
        .map(|(i, (orientation, location))| ThrusterSpec {
            id: i as u8 + 1,
            board: i as u8 / 4,
            channel: i as u8 % 4,
            orientation: *orientation,
            location: *location,
            max_duty_cycle: 204,
        })
        .collect()
}

fn allocation_benchmark(c: &mut Criterion) {
    let mut array = ThrusterArray::new(specs()).unwrap();

    let signals = BodySignals {
        x: 40.0,
        y: -20.0,
        z: 120.0,
        pitch: 5.0,
        yaw: -30.0,
        roll: 2.0,
    };

    c.bench_function("ThrusterArray::move_signals", |b| {
        b.iter(|| array.move_signals(&signals))
    });

    let mut ctrl = MovementController::new(specs(), MoveCtrlParams::default()).unwrap();

    let p = PidGains {
        k_p: 10.0,
        k_i: 0.1,
        k_d: 1.0,
        deriv_sample_interval_s: 0.1,
        ..Default::default()
    };
    let gains = ControllerGains {
        yaw_fwd: p,
        yaw_bwd: p,
        pitch: p,
        roll: p,
        depth: p,
        east: p,
        north: p,
    };

    let pose = Pose {
        yaw_deg: 350.0,
        up_ft: -2.0,
        ..Default::default()
    };
    let target = Pose {
        yaw_deg: 10.0,
        east_ft: 12.0,
        up_ft: -4.0,
        north_ft: 30.0,
        ..Default::default()
    };

    let mut time_s = 0.0;

    c.bench_function("MovementController::advanced_move", |b| {
        b.iter(|| {
            time_s += 0.1;
            ctrl.advanced_move(&pose, &target, DrivingMode::Forward, &gains, time_s)
        })
    });
}

criterion_group!(benches, allocation_benchmark);
criterion_main!(benches);
