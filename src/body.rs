//! Body registry: descriptor-driven creation, pose/velocity access, and
//! exactly-once removal.
//!
//! [`BodySettings`] is a builder over the shape descriptor plus the knobs a
//! caller may set (rotation, mass, material overrides, initial velocity).
//! Creation validates the settings, builds the shape, and inserts a rigid
//! body with one attached collider whose layer follows the motion type:
//! static bodies go on the `NonMoving` layer, dynamic ones on `Moving`.
//!
//! [`BodyHandle`] is deliberately not `Copy` and is consumed by
//! [`PhysicsWorld::remove_body`], so releasing the same body twice does not
//! compile.

use nalgebra::Isometry3;
use rapier3d::prelude::{ColliderBuilder, ColliderHandle, RigidBodyBuilder, RigidBodyHandle};

use crate::error::{PhysicsError, PhysicsResult};
use crate::layers::Layer;
use crate::shape::{self, ShapeDesc};
use crate::world::PhysicsWorld;
use crate::{Iso, Quat, Vec3};

/// Default mass for dynamic bodies when the caller sets none (kilograms).
const DEFAULT_MASS: f32 = 1000.0;

/// How (whether) the engine moves a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionType {
    /// Never moves; placed on the `NonMoving` layer.
    Static,
    /// Fully simulated; placed on the `Moving` layer.
    Dynamic,
}

/// Optional surface material overrides.
///
/// `None` leaves the engine default untouched; `Some(0.0)` is a real
/// override (a frictionless or perfectly inelastic surface), not an unset
/// field.
#[derive(Clone, Copy, Debug, Default)]
pub struct Material {
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
}

/// Settings for creating one rigid body with one attached collider.
#[derive(Clone, Debug)]
pub struct BodySettings {
    pub shape: ShapeDesc,
    pub position: Vec3,
    pub rotation: Quat,
    pub motion_type: MotionType,
    pub mass: f32,
    pub material: Material,
    pub initial_velocity: Option<Vec3>,
    /// Escape hatch applied to the body builder after all other settings,
    /// for engine knobs this struct does not surface (damping, CCD, ...).
    pub body_override: Option<fn(RigidBodyBuilder) -> RigidBodyBuilder>,
    /// Same escape hatch for the collider builder.
    pub collider_override: Option<fn(ColliderBuilder) -> ColliderBuilder>,
}

impl BodySettings {
    pub fn new(shape: ShapeDesc, position: Vec3, motion_type: MotionType) -> Self {
        Self {
            shape,
            position,
            rotation: Quat::identity(),
            motion_type,
            mass: DEFAULT_MASS,
            material: Material::default(),
            initial_velocity: None,
            body_override: None,
            collider_override: None,
        }
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn initial_velocity(mut self, velocity: Vec3) -> Self {
        self.initial_velocity = Some(velocity);
        self
    }

    pub fn body_override(mut self, f: fn(RigidBodyBuilder) -> RigidBodyBuilder) -> Self {
        self.body_override = Some(f);
        self
    }

    pub fn collider_override(mut self, f: fn(ColliderBuilder) -> ColliderBuilder) -> Self {
        self.collider_override = Some(f);
        self
    }
}

/// Owning handle to a body and its collider.
///
/// Not `Copy`/`Clone`: removal consumes the handle, so a body can be
/// released at most once.
#[derive(Debug)]
pub struct BodyHandle {
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: ColliderHandle,
}

impl BodyHandle {
    /// Raw engine handle, for callers that need to correlate query hits
    /// (e.g. a raycast's collider) with a body they created.
    #[inline]
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }
}

impl PhysicsWorld {
    /// Create a rigid body plus collider from `settings`.
    pub fn create_body(&mut self, settings: BodySettings) -> PhysicsResult<BodyHandle> {
        if settings.motion_type == MotionType::Dynamic && settings.mass <= 0.0 {
            return Err(PhysicsError::invalid_body(format!(
                "dynamic body mass must be > 0, got {}",
                settings.mass
            )));
        }

        let shape = shape::build_shape(&settings.shape)?;
        let pose = Isometry3::from_parts(settings.position.into(), settings.rotation);

        let (builder, layer) = match settings.motion_type {
            MotionType::Static => (RigidBodyBuilder::fixed(), Layer::NonMoving),
            MotionType::Dynamic => (RigidBodyBuilder::dynamic(), Layer::Moving),
        };
        let mut builder = builder.pose(pose);
        if let Some(velocity) = settings.initial_velocity {
            builder = builder.linvel(velocity);
        }
        if let Some(customize) = settings.body_override {
            builder = customize(builder);
        }
        let body = self.bodies.insert(builder.build());

        let mut collider = ColliderBuilder::new(shape).collision_groups(layer.collision_groups());
        if settings.motion_type == MotionType::Dynamic {
            collider = collider.mass(settings.mass);
        }
        if let Some(friction) = settings.material.friction {
            collider = collider.friction(friction);
        }
        if let Some(restitution) = settings.material.restitution {
            collider = collider.restitution(restitution);
        }
        if let Some(customize) = settings.collider_override {
            collider = customize(collider);
        }
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        self.bodies[body].wake_up(true);
        log::trace!("created body {body:?} ({:?})", settings.motion_type);

        Ok(BodyHandle { body, collider })
    }

    /// Remove a body and its collider. Consumes the handle.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        log::trace!("removing body {:?}", handle.body);
        self.bodies.remove(
            handle.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// World-space pose of a body.
    #[inline]
    pub fn get_pose(&self, handle: &BodyHandle) -> Iso {
        *self.bodies[handle.body].position()
    }

    #[inline]
    pub fn linear_velocity(&self, handle: &BodyHandle) -> Vec3 {
        *self.bodies[handle.body].linvel()
    }

    pub fn set_linear_velocity(&mut self, handle: &BodyHandle, velocity: Vec3) {
        self.bodies[handle.body].set_linvel(velocity, true);
    }

    /// Override the collider's friction coefficient.
    pub fn set_friction(&mut self, handle: &BodyHandle, friction: f32) {
        self.colliders[handle.collider].set_friction(friction);
    }

    /// Override the collider's restitution coefficient.
    pub fn set_restitution(&mut self, handle: &BodyHandle, restitution: f32) {
        self.colliders[handle.collider].set_restitution(restitution);
    }
}
