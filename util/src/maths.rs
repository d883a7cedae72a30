//! Utility maths functions
//!
//! All angle helpers in this module work in degrees, the unit used by every sensor on the
//! vehicle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Return the euclidian norm (distance between) of two points.
///
/// If the points do not have the same number of dimentions then `None` is
/// returned.
pub fn norm<T>(point_0: &[T], point_1: &[T]) -> Option<T>
where
    T: Float,
{
    if point_0.len() != point_1.len() {
        return None;
    }

    let sum = point_0
        .iter()
        .zip(point_1.iter())
        .fold(T::zero(), |acc, (a, b)| acc + (*a - *b).powi(2));

    Some(sum.sqrt())
}

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    value.max(min).min(max)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in degrees into the range `[0, 360)`.
pub fn wrap_360<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full = T::from(360.0).unwrap();
    let wrapped = rem_euclid(angle_deg, full);

    // Rounding can land exactly on 360 for tiny negative inputs
    if wrapped >= full {
        T::zero()
    } else {
        wrapped
    }
}

/// Get the signed shortest angular distance in degrees to travel from `from_deg` to `to_deg`.
///
/// The result is in the range `(-180, 180]`, positive values meaning a clockwise (increasing
/// heading) rotation.
pub fn ang_dist_deg<T>(from_deg: T, to_deg: T) -> T
where
    T: Float,
{
    let half = T::from(180.0).unwrap();
    let full = T::from(360.0).unwrap();

    let dist = rem_euclid(to_deg - from_deg + half, full) - half;

    if dist <= -half {
        half
    } else {
        dist
    }
}

/// Get the unsigned great-circle distance in degrees between two headings.
///
/// Computed from the dot product of the two unit heading vectors, so the result is always in
/// `[0, 180]` regardless of wrapping.
pub fn great_circle_dist_deg<T>(a_deg: T, b_deg: T) -> T
where
    T: Float,
{
    let (a, b) = (a_deg.to_radians(), b_deg.to_radians());
    let dot = a.cos() * b.cos() + a.sin() * b.sin();

    clamp(dot, -T::one(), T::one()).acos().to_degrees()
}

/// Get the circular mean of a set of headings in degrees, wrapped into `[0, 360)`.
///
/// Returns `None` for an empty slice.
pub fn circular_mean_deg<T>(angles_deg: &[T]) -> Option<T>
where
    T: Float,
{
    if angles_deg.is_empty() {
        return None;
    }

    let (sin_sum, cos_sum) = angles_deg.iter().fold((T::zero(), T::zero()), |(s, c), a| {
        (s + a.to_radians().sin(), c + a.to_radians().cos())
    });

    Some(wrap_360(sin_sum.atan2(cos_sum).to_degrees()))
}

/// Median of three values.
pub fn median3<T>(a: T, b: T, c: T) -> T
where
    T: Float,
{
    a.max(b).min(a.min(b).max(c))
}
