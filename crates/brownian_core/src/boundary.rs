//! Domain boundaries applied to candidate positions.
//!
//! Every policy is idempotent: feeding an already-valid position (and
//! heading) back in returns it unchanged.

use bevy::math::Vec3;

use crate::config::BoundaryKind;

/// Boundary handling for one simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryPolicy {
    Unbounded,
    PeriodicCubic { half_width: f32 },
    ClampingSphere { radius: f32 },
    ReflectingSphere { radius: f32 },
}

impl From<BoundaryKind> for BoundaryPolicy {
    fn from(kind: BoundaryKind) -> Self {
        match kind {
            BoundaryKind::Unbounded => BoundaryPolicy::Unbounded,
            BoundaryKind::PeriodicCubic { half_width } => {
                BoundaryPolicy::PeriodicCubic { half_width }
            }
            BoundaryKind::ClampingSphere { radius } => BoundaryPolicy::ClampingSphere { radius },
            BoundaryKind::ReflectingSphere { radius } => {
                BoundaryPolicy::ReflectingSphere { radius }
            }
        }
    }
}

/// Wrap one coordinate into `[-h, h]`.
///
/// Values already inside are returned untouched; anything outside is folded
/// back with a Euclidean modulo so multi-box jumps also land inside.
pub fn wrap_coordinate(coord: f32, half_width: f32) -> f32 {
    if coord > half_width || coord < -half_width {
        let span = 2.0 * half_width;
        let wrapped = (coord + half_width).rem_euclid(span) - half_width;
        // rem_euclid can round up to `span` for tiny negative inputs.
        if wrapped >= half_width {
            -half_width
        } else {
            wrapped
        }
    } else {
        coord
    }
}

/// Headings closer than this to tangent are left alone by reflection.
const TANGENT_TOLERANCE: f32 = 1e-6;

/// Rescale `position` (of length `len`) onto the sphere of `radius`.
///
/// The result never lies outside: rounding that lands a few ulps past the
/// surface is shrunk back.
fn onto_sphere(position: Vec3, len: f32, radius: f32) -> Vec3 {
    let mut scaled = position * (radius / len);
    while scaled.length() > radius {
        scaled *= 1.0 - f32::EPSILON;
    }
    scaled
}

/// Mirror `v` about the plane with unit normal `n`.
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

impl BoundaryPolicy {
    /// Whether this policy reads and writes headings.
    pub fn needs_orientation(&self) -> bool {
        matches!(self, BoundaryPolicy::ReflectingSphere { .. })
    }

    /// Constrain a candidate position; `ReflectingSphere` may also turn the heading.
    pub fn apply(&self, position: Vec3, orientation: &mut Option<Vec3>) -> Vec3 {
        match *self {
            BoundaryPolicy::Unbounded => position,
            BoundaryPolicy::PeriodicCubic { half_width } => Vec3::new(
                wrap_coordinate(position.x, half_width),
                wrap_coordinate(position.y, half_width),
                wrap_coordinate(position.z, half_width),
            ),
            BoundaryPolicy::ClampingSphere { radius } => {
                let len = position.length();
                if len > radius {
                    onto_sphere(position, len, radius)
                } else {
                    position
                }
            }
            BoundaryPolicy::ReflectingSphere { radius } => {
                let len = position.length();
                if len < radius || len == 0.0 {
                    return position;
                }
                let on_surface = if len > radius {
                    onto_sphere(position, len, radius)
                } else {
                    position
                };
                let normal = on_surface / len.min(radius);
                if let Some(v) = orientation.as_mut() {
                    // Only headings still pointing out of the domain are turned,
                    // so a second pass over the result changes nothing.
                    if v.dot(normal) > TANGENT_TOLERANCE {
                        let reflected = reflect(*v, normal);
                        *v = reflected.try_normalize().unwrap_or(-*v);
                    }
                }
                on_surface
            }
        }
    }

    /// Whether a position lies inside the domain (surface included).
    pub fn contains(&self, position: Vec3) -> bool {
        const SLACK: f32 = 1e-5;
        match *self {
            BoundaryPolicy::Unbounded => true,
            BoundaryPolicy::PeriodicCubic { half_width } => {
                position.abs().max_element() <= half_width
            }
            BoundaryPolicy::ClampingSphere { radius }
            | BoundaryPolicy::ReflectingSphere { radius } => {
                position.length() <= radius * (1.0 + SLACK)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;
    use crate::spawn::random_unit_vector;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_periodic_wrap_reference_values() {
        let policy = BoundaryPolicy::PeriodicCubic { half_width: 7.0 };
        let mut none = None;

        let out = policy.apply(Vec3::new(7.5, 0.0, 0.0), &mut none);
        assert!((out.x - -6.5).abs() < 1e-5, "7.5 wrapped to {}", out.x);

        let out = policy.apply(Vec3::new(-7.3, 0.0, 0.0), &mut none);
        assert!((out.x - 6.7).abs() < 1e-5, "-7.3 wrapped to {}", out.x);
    }

    #[test]
    fn test_periodic_wrap_is_per_axis() {
        let policy = BoundaryPolicy::PeriodicCubic { half_width: 7.0 };
        let out = policy.apply(Vec3::new(1.0, 8.0, -9.0), &mut None);
        assert!(close(out, Vec3::new(1.0, -6.0, 5.0)), "got {:?}", out);
    }

    #[test]
    fn test_periodic_wrap_handles_multi_box_jumps() {
        // 7 + 2*14 + 1 lands one unit past the left face.
        assert!((wrap_coordinate(36.0, 7.0) - -6.0).abs() < 1e-4);
        assert!((wrap_coordinate(-50.0, 7.0) - 6.0).abs() < 1e-4);
        // Surface points are already valid.
        assert_eq!(wrap_coordinate(7.0, 7.0), 7.0);
        assert_eq!(wrap_coordinate(-7.0, 7.0), -7.0);
    }

    #[test]
    fn test_clamping_sphere() {
        let policy = BoundaryPolicy::ClampingSphere { radius: 5.0 };
        let mut heading = Some(Vec3::X);
        let out = policy.apply(Vec3::new(6.0, 0.0, 0.0), &mut heading);
        assert!(close(out, Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(heading, Some(Vec3::X), "clamping leaves heading alone");

        let inside = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(policy.apply(inside, &mut None), inside);
    }

    #[test]
    fn test_reflecting_sphere_reference_case() {
        let policy = BoundaryPolicy::ReflectingSphere { radius: 5.0 };
        let mut heading = Some(Vec3::X);
        let out = policy.apply(Vec3::new(5.0, 0.0, 0.0), &mut heading);

        assert!((out.length() - 5.0).abs() < 1e-5);
        assert!(close(heading.unwrap(), -Vec3::X), "got {:?}", heading);
    }

    #[test]
    fn test_reflecting_sphere_escape() {
        let policy = BoundaryPolicy::ReflectingSphere { radius: 5.0 };
        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mut heading = Some(dir);
        let out = policy.apply(Vec3::new(8.0, 0.0, 0.0), &mut heading);

        assert!(close(out, Vec3::new(5.0, 0.0, 0.0)));
        let turned = heading.unwrap();
        assert!(close(turned, Vec3::new(-dir.x, dir.y, 0.0)));
        assert!((turned.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reflecting_sphere_keeps_inward_heading() {
        let policy = BoundaryPolicy::ReflectingSphere { radius: 5.0 };
        let mut heading = Some(-Vec3::Z);
        let out = policy.apply(Vec3::new(0.0, 0.0, 6.0), &mut heading);
        assert!(close(out, Vec3::new(0.0, 0.0, 5.0)));
        assert_eq!(heading, Some(-Vec3::Z));
    }

    #[test]
    fn test_every_policy_is_idempotent() {
        let policies = [
            BoundaryPolicy::Unbounded,
            BoundaryPolicy::PeriodicCubic { half_width: 7.0 },
            BoundaryPolicy::ClampingSphere { radius: 5.0 },
            BoundaryPolicy::ReflectingSphere { radius: 5.0 },
        ];
        let inputs = [
            (Vec3::new(7.5, -7.3, 20.0), Vec3::X),
            (Vec3::new(6.0, 0.0, 0.0), Vec3::X),
            (Vec3::new(5.0, 0.0, 0.0), Vec3::X),
            (Vec3::new(-3.0, 4.0, 12.0), Vec3::new(0.0, 0.6, 0.8)),
            (Vec3::new(0.1, 0.2, 0.3), Vec3::Y),
        ];

        for policy in policies {
            for (position, dir) in inputs {
                let mut once_dir = Some(dir);
                let once = policy.apply(position, &mut once_dir);
                let mut twice_dir = once_dir;
                let twice = policy.apply(once, &mut twice_dir);

                assert_eq!(once, twice, "{:?} moved the point on a second pass", policy);
                assert_eq!(once_dir, twice_dir, "{:?} turned heading twice", policy);
                assert!(policy.contains(once), "{:?} left {:?} outside", policy, once);
            }
        }
    }

    #[test]
    fn test_spheres_never_round_outside() {
        let radius = 5.0;
        let clamp = BoundaryPolicy::ClampingSphere { radius };
        let bounce = BoundaryPolicy::ReflectingSphere { radius };
        let mut rng = SimRng::from_seed(99);

        let mut escaped = 0;
        for _ in 0..100_000 {
            let p = Vec3::new(
                rng.next_symmetric(20.0),
                rng.next_symmetric(20.0),
                rng.next_symmetric(20.0),
            );
            if p.length() > radius {
                escaped += 1;
            }

            let clamped = clamp.apply(p, &mut None);
            assert!(clamped.length() <= radius, "clamp left {:?} outside", clamped);
            assert_eq!(clamp.apply(clamped, &mut None), clamped);

            let mut heading = Some(random_unit_vector(&mut rng));
            let bounced = bounce.apply(p, &mut heading);
            let mut again = heading;
            assert!(bounced.length() <= radius, "reflect left {:?} outside", bounced);
            assert_eq!(bounce.apply(bounced, &mut again), bounced);
            assert_eq!(again, heading, "heading turned on a second pass");
        }
        println!("{} of 100000 candidates started outside the sphere", escaped);
        assert!(escaped > 90_000);
    }

    #[test]
    fn test_from_boundary_kind() {
        assert_eq!(
            BoundaryPolicy::from(BoundaryKind::ReflectingSphere { radius: 2.0 }),
            BoundaryPolicy::ReflectingSphere { radius: 2.0 }
        );
        assert!(BoundaryPolicy::ReflectingSphere { radius: 2.0 }.needs_orientation());
        assert!(!BoundaryPolicy::Unbounded.needs_orientation());
    }
}
