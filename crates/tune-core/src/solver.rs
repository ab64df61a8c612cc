//! Ballistic launch velocity between two points.

use glam::Vec3;

/// Default lower bound on the flight time of a jump (seconds).
pub const MIN_FLIGHT_TIME: f32 = 0.25;

/// Flight time of a jump: distance over nominal speed, floored.
pub fn flight_time(source: Vec3, target: Vec3, speed: f32, min_flight_time: f32) -> f32 {
    let time = source.distance(target) / speed;
    if time.is_finite() {
        time.max(min_flight_time)
    } else {
        min_flight_time
    }
}

/// Initial velocity that carries a body from `source` to `target` under
/// constant `gravity`, arriving after the flight time derived from `speed`.
pub fn velocity_to(source: Vec3, target: Vec3, gravity: Vec3, speed: f32) -> Vec3 {
    LaunchSettings {
        gravity,
        speed,
        min_flight_time: MIN_FLIGHT_TIME,
    }
    .velocity_to(source, target)
}

/// Parameters shared by every jump in a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchSettings {
    pub gravity: Vec3,
    pub speed: f32,
    pub min_flight_time: f32,
}

impl LaunchSettings {
    pub fn flight_time(&self, source: Vec3, target: Vec3) -> f32 {
        flight_time(source, target, self.speed, self.min_flight_time)
    }

    pub fn velocity_to(&self, source: Vec3, target: Vec3) -> Vec3 {
        let t = self.flight_time(source, target);
        (target - source - 0.5 * self.gravity * t * t) / t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    const GRAVITY: Vec3 = Vec3::new(0.0, -196.2, 0.0);

    fn land(source: Vec3, velocity: Vec3, gravity: Vec3, t: f32) -> Vec3 {
        source + velocity * t + 0.5 * gravity * t * t
    }

    #[test]
    fn test_short_hop_uses_floor() {
        let source = Vec3::ZERO;
        let target = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(flight_time(source, target, 40.0, MIN_FLIGHT_TIME), MIN_FLIGHT_TIME);

        let v = velocity_to(source, target, GRAVITY, 40.0);
        assert_abs_diff_eq!(v.x, 4.0, epsilon = 1e-4);
        // Has to rise to come back down at the same height.
        assert!(v.y > 0.0);
    }

    #[test]
    fn test_long_jump_uses_speed() {
        let t = flight_time(Vec3::ZERO, Vec3::new(0.0, -80.0, 0.0), 40.0, MIN_FLIGHT_TIME);
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_same_point_is_finite() {
        let v = velocity_to(Vec3::ONE, Vec3::ONE, GRAVITY, 40.0);
        assert!(v.is_finite());
        assert_abs_diff_eq!(land(Vec3::ONE, v, GRAVITY, MIN_FLIGHT_TIME).y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_gravity_is_straight_line() {
        let v = velocity_to(Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO, 40.0);
        assert_abs_diff_eq!(v.z, 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(v.y, 0.0, epsilon = 1e-6);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Integrating the launch velocity for the flight time lands on the target.
        #[test]
        fn prop_velocity_lands_on_target(
            sx in -50.0f32..50.0, sy in -50.0f32..50.0, sz in -5.0f32..5.0,
            tx in -50.0f32..50.0, ty in -50.0f32..50.0, tz in -5.0f32..5.0,
            speed in 10.0f32..100.0,
        ) {
            let source = Vec3::new(sx, sy, sz);
            let target = Vec3::new(tx, ty, tz);
            let settings = LaunchSettings { gravity: GRAVITY, speed, min_flight_time: MIN_FLIGHT_TIME };

            let t = settings.flight_time(source, target);
            let landed = land(source, settings.velocity_to(source, target), GRAVITY, t);

            let tolerance = 1e-4 * (1.0 + GRAVITY.length() * t * t);
            prop_assert!(landed.distance(target) <= tolerance,
                "landed at {landed} instead of {target} (t = {t})");
        }
    }
}
