//! Pure spherical geometry and angle helpers. Angles are degrees; every
//! wrap-around goes through [`normalize_angle`].

use crate::models::location::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default movement below which a heading is not derived from two fixes.
pub const MIN_MOVEMENT_M: f64 = 5.0;

pub fn haversine_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * central_angle
}

pub fn within_radius(a: &Coordinate, b: &Coordinate, radius_m: f64) -> bool {
    haversine_m(a, b) <= radius_m
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)`.
///
/// Identical points have no defined bearing; `atan2(0, 0)` yields 0 and that
/// is the value returned.
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let y = delta_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

    normalize_angle(y.atan2(x).to_degrees())
}

pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed smallest turn from `heading` to `bearing_to_target`, in `[-180, 180)`.
/// Positive means turn clockwise.
pub fn relative_bearing(heading: f64, bearing_to_target: f64) -> f64 {
    normalize_angle(bearing_to_target - heading + 180.0) - 180.0
}

/// Course over ground between two fixes, or `None` when the device moved less
/// than `min_movement_m` and the bearing would be noise.
pub fn heading_from_movement(
    prev: &Coordinate,
    curr: &Coordinate,
    min_movement_m: f64,
) -> Option<f64> {
    if haversine_m(prev, curr) < min_movement_m {
        return None;
    }
    Some(bearing(prev, curr))
}

/// Exponential smoothing of `current` toward `target` along the shortest arc.
/// `factor` is clamped to `[0, 1]`; 1 jumps straight to `target`.
pub fn smooth_angle(current: f64, target: f64, factor: f64) -> f64 {
    let factor = factor.clamp(0.0, 1.0);
    let delta = relative_bearing(current, target);
    normalize_angle(current + delta * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = Coordinate::new(53.5511, 9.9937);
        assert!(haversine_m(&p, &p) < 1e-6);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        let distance = haversine_m(&london, &paris);
        assert!((distance - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn cardinal_bearings() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!(close(bearing(&origin, &Coordinate::new(1.0, 0.0)), 0.0));
        assert!(close(bearing(&origin, &Coordinate::new(0.0, 1.0)), 90.0));
        assert!(close(bearing(&origin, &Coordinate::new(-1.0, 0.0)), 180.0));
        assert!(close(bearing(&origin, &Coordinate::new(0.0, -1.0)), 270.0));
    }

    #[test]
    fn bearing_to_self_is_zero_by_convention() {
        let p = Coordinate::new(52.52, 13.405);
        assert_eq!(bearing(&p, &p), 0.0);
    }

    #[test]
    fn reverse_bearing_is_not_exactly_opposite_at_high_latitude() {
        let a = Coordinate::new(60.0, 0.0);
        let b = Coordinate::new(60.0, 20.0);
        let diff = normalize_angle(bearing(&a, &b) - bearing(&b, &a));
        assert!((diff - 180.0).abs() > 1.0);
    }

    #[test]
    fn normalize_handles_negatives_and_overflow() {
        assert!(close(normalize_angle(-10.0), 350.0));
        assert!(close(normalize_angle(720.0), 0.0));
        assert!(close(normalize_angle(365.0), 5.0));
        assert!(normalize_angle(-1e-18) < 360.0);
    }

    #[test]
    fn relative_bearing_takes_shortest_turn() {
        assert!(close(relative_bearing(350.0, 10.0), 20.0));
        assert!(close(relative_bearing(10.0, 350.0), -20.0));
        assert!(close(relative_bearing(90.0, 90.0), 0.0));
    }

    #[test]
    fn smoothing_crosses_north_instead_of_swinging_back() {
        let halfway = smooth_angle(350.0, 10.0, 0.5);
        assert!(close(halfway, 0.0));
        let step = smooth_angle(350.0, 10.0, 0.25);
        assert!(close(step, 355.0));
    }

    #[test]
    fn smoothing_is_fixed_at_target() {
        for x in [0.0, 45.5, 180.0, 359.9] {
            for f in [0.1, 0.5, 1.0] {
                assert!(close(smooth_angle(x, x, f), x));
            }
        }
    }

    #[test]
    fn stationary_device_has_no_heading() {
        let a = Coordinate::new(52.52, 13.405);
        let b = Coordinate::new(52.520_01, 13.405);
        assert!(heading_from_movement(&a, &b, MIN_MOVEMENT_M).is_none());

        let c = Coordinate::new(52.521, 13.405);
        let heading = heading_from_movement(&a, &c, MIN_MOVEMENT_M).unwrap();
        assert!(heading < 1.0 || heading > 359.0);
    }
}
