//! # Orientation sensor fusion
//!
//! The vehicle carries three orientation sensors. Headings are fused by an angular vote: the pair
//! of sensors which disagree most is found and the heading of the remaining sensor is used. A
//! plain numeric median is not valid for headings since they wrap at 360 degrees. Pitch and roll
//! do not wrap in practice and use the numeric median.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::Orientation;
use util::maths::{circular_mean_deg, great_circle_dist_deg, median3, wrap_360};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sensor pairs in the order they are compared, with the index of the sensor left out.
const PAIRS: [(usize, usize, usize); 3] = [(0, 1, 2), (0, 2, 1), (1, 2, 0)];

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Fuse the available orientation sources.
///
/// - Three sources: heading from the sensor outside the most-disagreeing pair, numeric median
///   pitch and roll.
/// - Two sources: circular mean heading, mean pitch and roll.
/// - One source: passed through.
/// - None: `None`.
pub fn fuse(sources: &[Option<Orientation>; 3]) -> Option<Orientation> {
    let present: Vec<Orientation> = sources.iter().filter_map(|s| *s).collect();

    match present.as_slice() {
        [] => None,
        [only] => Some(Orientation {
            yaw_deg: wrap_360(only.yaw_deg),
            ..*only
        }),
        [a, b] => Some(Orientation {
            yaw_deg: circular_mean_deg(&[a.yaw_deg, b.yaw_deg]).unwrap_or(a.yaw_deg),
            pitch_deg: 0.5 * (a.pitch_deg + b.pitch_deg),
            roll_deg: 0.5 * (a.roll_deg + b.roll_deg),
        }),
        [a, b, c] => Some(Orientation {
            yaw_deg: wrap_360(vote_heading([a.yaw_deg, b.yaw_deg, c.yaw_deg])),
            pitch_deg: median3(a.pitch_deg, b.pitch_deg, c.pitch_deg),
            roll_deg: median3(a.roll_deg, b.roll_deg, c.roll_deg),
        }),
        _ => None,
    }
}

/// Return the heading of the sensor which is not part of the most-disagreeing pair.
///
/// Ties are resolved in favour of the first pair compared.
pub fn vote_heading(headings: [f64; 3]) -> f64 {
    let mut worst = PAIRS[0];
    let mut worst_dist = great_circle_dist_deg(headings[worst.0], headings[worst.1]);

    for pair in PAIRS.iter().skip(1) {
        let dist = great_circle_dist_deg(headings[pair.0], headings[pair.1]);
        if dist > worst_dist {
            worst = *pair;
            worst_dist = dist;
        }
    }

    headings[worst.2]
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn orientation(yaw_deg: f64, pitch_deg: f64, roll_deg: f64) -> Option<Orientation> {
        Some(Orientation {
            yaw_deg,
            pitch_deg,
            roll_deg,
        })
    }

    #[test]
    fn test_vote_every_permutation() {
        // A and B disagree most (across the wrap), C sits between them
        let (a, b, c) = (340.0, 40.0, 5.0);

        let perms = [
            [a, b, c],
            [a, c, b],
            [b, a, c],
            [b, c, a],
            [c, a, b],
            [c, b, a],
        ];

        for p in perms.iter() {
            assert_eq!(vote_heading(*p), c, "permutation {:?}", p);
        }
    }

    #[test]
    fn test_vote_ignores_outlier() {
        // The outlier is part of both large pairs, so it is never the one selected
        let h = vote_heading([359.0, 1.0, 180.0]);
        assert!(h == 359.0 || h == 1.0);
    }

    #[test]
    fn test_fuse_three() {
        let f = fuse(&[
            orientation(10.0, 1.0, -3.0),
            orientation(200.0, 50.0, 0.0),
            orientation(12.0, 2.0, 2.0),
        ])
        .unwrap();

        assert!(f.yaw_deg == 10.0 || f.yaw_deg == 12.0);
        assert_eq!(f.pitch_deg, 2.0);
        assert_eq!(f.roll_deg, 0.0);
    }

    #[test]
    fn test_fuse_degraded() {
        assert_eq!(fuse(&[None, None, None]), None);

        let single = fuse(&[None, orientation(90.0, 1.0, 2.0), None]).unwrap();
        assert_eq!(single.yaw_deg, 90.0);
        assert_eq!(single.pitch_deg, 1.0);

        let pair = fuse(&[
            orientation(350.0, 2.0, 0.0),
            None,
            orientation(10.0, 4.0, 2.0),
        ])
        .unwrap();
        assert!(pair.yaw_deg < 1e-9 || 360.0 - pair.yaw_deg < 1e-9);
        assert_eq!(pair.pitch_deg, 3.0);
        assert_eq!(pair.roll_deg, 1.0);
    }
}
