//! Closest-hit raycaster over the scene.
//!
//! [`Raycaster`] owns one persistent ray that is mutated in place on every
//! cast: callers may update the origin, the direction, both, or neither.
//! The direction vector's length defines the ray extent, and hit distances
//! come back as a fraction of that length in `[0, 1]`.
//!
//! Casts run as the `Moving` layer, so a ray sees exactly what a moving
//! object would collide with. Results never leak between casts: each call
//! returns a fresh [`RayHit`], and a miss reports `hit = false` with a
//! fraction of zero.

use nalgebra::Point3;
use rapier3d::prelude::{ColliderHandle, Ray};

use crate::layers::Layer;
use crate::world::PhysicsWorld;
use crate::Vec3;

/// Result of one cast.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Whether anything was hit within the ray extent.
    pub hit: bool,
    /// Hit distance as a fraction of the direction vector's length
    /// (zero on a miss).
    pub fraction: f32,
    /// Surface normal at the hit point (zero on a miss).
    pub normal: Vec3,
    /// The collider that was hit, for correlating with created bodies.
    pub collider: Option<ColliderHandle>,
}

impl RayHit {
    #[inline]
    fn miss() -> Self {
        Self {
            hit: false,
            fraction: 0.0,
            normal: Vec3::zeros(),
            collider: None,
        }
    }
}

/// A reusable closest-hit ray.
pub struct Raycaster {
    ray: Ray,
}

impl Raycaster {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            ray: Ray::new(Point3::from(origin), direction),
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.ray.origin.coords
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.ray.dir
    }

    /// Cast the ray, optionally updating its origin and/or direction first.
    /// Omitted fields keep their previous values.
    pub fn cast(
        &mut self,
        world: &PhysicsWorld,
        origin: Option<Vec3>,
        direction: Option<Vec3>,
    ) -> RayHit {
        if let Some(origin) = origin {
            self.ray.origin = Point3::from(origin);
        }
        if let Some(direction) = direction {
            self.ray.dir = direction;
        }

        let pipeline = world.as_query_pipeline(Layer::Moving.query_filter());
        // Max time-of-impact 1.0: the direction length is the ray extent,
        // so the returned time of impact is already the fraction.
        match pipeline.cast_ray_and_get_normal(&self.ray, 1.0, true) {
            Some((collider, intersection)) => RayHit {
                hit: true,
                fraction: intersection.time_of_impact,
                normal: intersection.normal,
                collider: Some(collider),
            },
            None => RayHit::miss(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodySettings, MotionType};
    use crate::shape::ShapeDesc;
    use crate::world::default_gravity;
    use approx::assert_relative_eq;

    /// World with a static floor slab whose top face is at y = 0.
    fn floored_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(default_gravity());
        world
            .create_body(BodySettings::new(
                ShapeDesc::Box {
                    half_extents: Vec3::new(10.0, 0.5, 10.0),
                },
                Vec3::new(0.0, -0.5, 0.0),
                MotionType::Static,
            ))
            .unwrap();
        world.update_queries();
        world
    }

    #[test]
    fn downward_ray_reports_fraction_of_extent() {
        let world = floored_world();
        let mut caster = Raycaster::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -20.0, 0.0));

        let hit = caster.cast(&world, None, None);
        assert!(hit.hit);
        // Floor top is 10 m below the origin, the extent is 20 m.
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1.0e-3);
        assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1.0e-3);
        assert!(hit.collider.is_some());
    }

    #[test]
    fn miss_reports_false_and_zero() {
        let world = floored_world();
        let mut caster = Raycaster::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 20.0, 0.0));

        let hit = caster.cast(&world, None, None);
        assert!(!hit.hit);
        assert_relative_eq!(hit.fraction, 0.0);
        assert!(hit.collider.is_none());
    }

    #[test]
    fn results_do_not_leak_between_casts() {
        let world = floored_world();
        let mut caster = Raycaster::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -20.0, 0.0));

        let first = caster.cast(&world, None, None);
        assert!(first.hit);

        // Redirect the same ray upward: the previous hit must not survive.
        let second = caster.cast(&world, None, Some(Vec3::new(0.0, 20.0, 0.0)));
        assert!(!second.hit);
        assert_relative_eq!(second.fraction, 0.0);
    }

    #[test]
    fn short_ray_stops_before_the_floor() {
        let world = floored_world();
        let mut caster = Raycaster::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -5.0, 0.0));

        let hit = caster.cast(&world, None, None);
        assert!(!hit.hit);
    }

    #[test]
    fn origin_update_moves_the_persistent_ray() {
        let world = floored_world();
        let mut caster = Raycaster::new(Vec3::new(0.0, 100.0, 0.0), Vec3::new(0.0, -20.0, 0.0));

        assert!(!caster.cast(&world, None, None).hit);

        let hit = caster.cast(&world, Some(Vec3::new(0.0, 10.0, 0.0)), None);
        assert!(hit.hit);
        assert_relative_eq!(caster.origin().y, 10.0);
    }
}
