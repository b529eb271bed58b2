//! Virtual character controller.
//!
//! A kinematic capsule that is never simulated by the solver: each
//! [`Character::update`] call composes a velocity from the ground state,
//! player input, and gravity, then sweeps the capsule through the scene
//! with the engine's kinematic controller and commits the corrected
//! translation. The capsule is anchored at the feet (`position` is the
//! lowest point), matching how gameplay code usually places characters.
//!
//! Velocity composition, per tick:
//! 1. When on ground and still moving toward it, the baseline is the
//!    ground's own velocity, so the character sticks to moving platforms.
//!    Airborne (or on a too-steep slope), the baseline keeps only the
//!    vertical component, dropping horizontal ground-following.
//! 2. A jump is an instantaneous `up * jump_speed` injection on top of the
//!    baseline, allowed only while grounded, moving toward ground, and not
//!    crouched.
//! 3. Gravity scaled by dt and the desired horizontal velocity (both
//!    rotated into the up-frame) are always added.
//! 4. An optional caller hook may post-process the final vector.
//!
//! The crouch/stand swap is best-effort: standing up is refused when the
//! standing capsule would start in penetration, and the controller simply
//! keeps the crouched shape.

use nalgebra::{Isometry3, Point3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::parry::shape::Capsule;
use rapier3d::prelude::Ray;

use crate::error::{PhysicsError, PhysicsResult};
use crate::layers::Layer;
use crate::world::PhysicsWorld;
use crate::{Quat, Vec3};

/// Gap kept between the capsule and surrounding geometry (meters).
const CHARACTER_PADDING: f32 = 0.02;

/// Allowed overlap before the solver pushes shapes apart (meters).
const PENETRATION_SLOP: f32 = 0.02;

/// Shrink applied to the standing capsule when testing a stand-up swap.
const STANCE_SWAP_TOLERANCE: f32 = 1.5 * PENETRATION_SLOP;

/// Downward vertical-vs-ground speed (m/s) below which the character
/// counts as moving toward the ground.
const TOWARDS_GROUND_EPS: f32 = 0.1;

/// How far below the feet the ground probe looks (meters).
const GROUND_PROBE_DISTANCE: f32 = 0.3;

/// Maximum step height the controller can climb when stair stepping is on.
const AUTOSTEP_MAX_HEIGHT: f32 = 0.4;

/// Maximum snap distance when stick-to-floor is on (meters).
const STICK_TO_FLOOR_DISTANCE: f32 = 0.2;

/// Capsule dimensions: `half_height` is half the cylindrical section.
#[derive(Clone, Copy, Debug)]
pub struct CapsuleDims {
    pub half_height: f32,
    pub radius: f32,
}

impl CapsuleDims {
    /// Total capsule height, caps included.
    #[inline]
    pub fn height(&self) -> f32 {
        2.0 * (self.half_height + self.radius)
    }
}

/// Character configuration, fixed at creation.
#[derive(Clone, Copy, Debug)]
pub struct CharacterOptions {
    pub standing: CapsuleDims,
    /// Crouched capsule; `None` disables the crouch/stand swap entirely.
    pub crouching: Option<CapsuleDims>,
    /// Whether horizontal input is honored while airborne.
    pub move_during_jump: bool,
    pub move_speed: f32,
    /// Move-speed multiplier while crouched.
    pub crouch_speed_ratio: f32,
    pub jump_speed: f32,
    /// Exponential velocity blending instead of instant acceleration.
    pub enable_inertia: bool,
    pub enable_stair_step: bool,
    pub enable_stick_to_floor: bool,
    /// Steepest walkable slope (degrees).
    pub max_slope_angle: f32,
    /// Fixed up-frame tilt around X (radians).
    pub up_rotation_x: f32,
    /// Fixed up-frame tilt around Z (radians).
    pub up_rotation_z: f32,
}

impl Default for CharacterOptions {
    fn default() -> Self {
        Self {
            standing: CapsuleDims {
                half_height: 1.0,
                radius: 0.3,
            },
            crouching: None,
            move_during_jump: true,
            move_speed: 6.0,
            crouch_speed_ratio: 0.5,
            jump_speed: 15.0,
            enable_inertia: true,
            enable_stair_step: true,
            enable_stick_to_floor: true,
            max_slope_angle: 45.0,
            up_rotation_x: 0.0,
            up_rotation_z: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundState {
    InAir,
    OnGround,
    /// Supported, but by a slope too steep to walk on.
    OnSteepGround,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stance {
    Standing,
    Crouching,
}

/// Player input for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharacterInput {
    /// Desired horizontal movement direction (unit or zero).
    pub direction: Vec3,
    pub jump: bool,
    pub crouch: bool,
    /// Honor horizontal input even when the movement gate would lock it.
    pub allow_locked_movement: bool,
}

/// What the ground probe saw directly under the feet.
#[derive(Clone, Copy, Debug)]
struct GroundInfo {
    normal: Vec3,
    /// Velocity of the surface at the contact point (moving platforms).
    velocity: Vec3,
}

pub struct Character {
    options: CharacterOptions,
    position: Vec3,
    rotation: Quat,
    up: Vec3,
    velocity: Vec3,
    desired_velocity: Vec3,
    should_slide: bool,
    ground_state: GroundState,
    stance: Stance,
    max_slope_rad: f32,
}

impl Character {
    /// Create a controller with its feet at `position`. The character is
    /// not inserted into the world; it only queries it.
    pub fn create(options: CharacterOptions, position: Vec3) -> PhysicsResult<Self> {
        validate_options(&options)?;
        Ok(Self {
            max_slope_rad: options.max_slope_angle.to_radians(),
            options,
            position,
            rotation: Quat::identity(),
            up: Vector3::y(),
            velocity: Vec3::zeros(),
            desired_velocity: Vec3::zeros(),
            should_slide: true,
            ground_state: GroundState::InAir,
            stance: Stance::Standing,
        })
    }

    /// Feet position (lowest point of the capsule).
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    #[inline]
    pub fn ground_state(&self) -> GroundState {
        self.ground_state
    }

    #[inline]
    pub fn stance(&self) -> Stance {
        self.stance
    }

    /// Whether the character is supported by any ground, steep or not.
    #[inline]
    pub fn is_supported(&self) -> bool {
        matches!(
            self.ground_state,
            GroundState::OnGround | GroundState::OnSteepGround
        )
    }

    fn current_dims(&self) -> CapsuleDims {
        match self.stance {
            Stance::Standing => self.options.standing,
            Stance::Crouching => self.options.crouching.unwrap_or(self.options.standing),
        }
    }

    /// Advance the controller by one tick. `velocity_override` may
    /// post-process the composed velocity (arguments: velocity, up) before
    /// it is committed.
    pub fn update(
        &mut self,
        world: &PhysicsWorld,
        input: &CharacterInput,
        dt: f32,
        velocity_override: Option<&mut dyn FnMut(Vec3, Vec3) -> Vec3>,
    ) {
        self.apply_stance(world, input.crouch);

        let up_rotation = UnitQuaternion::from_euler_angles(
            self.options.up_rotation_x,
            0.0,
            self.options.up_rotation_z,
        );
        self.up = up_rotation * Vector3::y();
        self.rotation = up_rotation;

        let crouched = self.stance == Stance::Crouching;
        let horizontal_enabled =
            self.options.move_during_jump || self.is_supported() || input.allow_locked_movement;

        if horizontal_enabled {
            self.should_slide = input.direction.norm_squared() >= 1.0e-12;
            let speed = self.options.move_speed
                * if crouched {
                    self.options.crouch_speed_ratio
                } else {
                    1.0
                };
            self.desired_velocity = blend_desired(
                self.desired_velocity,
                input.direction,
                speed,
                self.options.enable_inertia,
            );
        } else {
            self.should_slide = true;
        }

        let ground = self.probe_ground(world);
        let ground_velocity = ground.map(|g| g.velocity).unwrap_or_else(Vec3::zeros);
        let steep = ground
            .map(|g| g.normal.angle(&self.up) > self.max_slope_rad)
            .unwrap_or(false);
        let on_ground = self.ground_state == GroundState::OnGround;
        let moving_towards_ground =
            (self.velocity.dot(&self.up) - ground_velocity.dot(&self.up)) < TOWARDS_GROUND_EPS;
        let jumped = input.jump && on_ground && moving_towards_ground && !crouched;

        let mut new_velocity = compose_velocity(&VelocityInputs {
            current: self.velocity,
            ground_velocity,
            up: self.up,
            up_rotation,
            on_ground,
            ground_steep: steep,
            enable_inertia: self.options.enable_inertia,
            jump: input.jump,
            crouched,
            jump_speed: self.options.jump_speed,
            gravity: world.gravity(),
            dt,
            desired: self.desired_velocity,
        });

        if let Some(hook) = velocity_override {
            new_velocity = hook(new_velocity, self.up);
        }

        // Slip correction: standing still on a walkable slope must not
        // drift, so the gravity-induced corrective velocity is cancelled
        // when there is no input and the ground itself is not moving.
        if !self.should_slide
            && on_ground
            && !steep
            && !jumped
            && ground_velocity.norm_squared() < 1.0e-6
        {
            new_velocity = Vec3::zeros();
        }

        self.move_capsule(world, new_velocity, dt, steep);
    }

    /// Apply the requested stance, refusing a stand-up that would start in
    /// penetration (best-effort, never an error).
    fn apply_stance(&mut self, world: &PhysicsWorld, crouch: bool) {
        if self.options.crouching.is_none() {
            return;
        }
        let target = if crouch {
            Stance::Crouching
        } else {
            Stance::Standing
        };
        if target == self.stance {
            return;
        }

        if target == Stance::Standing && !self.stand_up_clear(world) {
            log::trace!("stand-up blocked by geometry, keeping crouched stance");
            return;
        }
        self.stance = target;
    }

    /// Test whether the standing capsule, shrunk by the swap tolerance,
    /// fits at the current position.
    fn stand_up_clear(&self, world: &PhysicsWorld) -> bool {
        let dims = self.options.standing;
        let capsule = Capsule::new_y(
            (dims.half_height - STANCE_SWAP_TOLERANCE).max(0.01),
            (dims.radius - STANCE_SWAP_TOLERANCE).max(0.01),
        );
        let center = self.position + self.up * (dims.half_height + dims.radius);
        let iso = Isometry3::from_parts(center.into(), self.rotation);

        let pipeline = world.as_query_pipeline(Layer::Moving.query_filter());
        pipeline.intersect_shape(iso, &capsule).next().is_none()
    }

    /// Short ray under the feet: surface normal and platform velocity.
    fn probe_ground(&self, world: &PhysicsWorld) -> Option<GroundInfo> {
        // Start slightly inside the capsule so a surface flush with the
        // feet is still seen.
        let lift = 0.1;
        let origin = Point3::from(self.position + self.up * lift);
        let ray = Ray::new(origin, -self.up);

        let pipeline = world.as_query_pipeline(Layer::Moving.query_filter());
        let (collider, hit) =
            pipeline.cast_ray_and_get_normal(&ray, lift + GROUND_PROBE_DISTANCE, true)?;

        let point = origin + (-self.up) * hit.time_of_impact;
        let velocity = world.colliders[collider]
            .parent()
            .map(|body| world.bodies[body].velocity_at_point(&point))
            .unwrap_or_else(Vec3::zeros);

        Some(GroundInfo {
            normal: hit.normal,
            velocity,
        })
    }

    /// Sweep the capsule through the scene and commit the corrected
    /// translation and the resulting ground state.
    fn move_capsule(&mut self, world: &PhysicsWorld, velocity: Vec3, dt: f32, steep: bool) {
        let controller = KinematicCharacterController {
            up: UnitVector3::new_normalize(self.up),
            offset: CharacterLength::Absolute(CHARACTER_PADDING),
            autostep: self.options.enable_stair_step.then(|| CharacterAutostep {
                include_dynamic_bodies: false,
                max_height: CharacterLength::Absolute(AUTOSTEP_MAX_HEIGHT),
                ..CharacterAutostep::default()
            }),
            snap_to_ground: self
                .options
                .enable_stick_to_floor
                .then_some(CharacterLength::Absolute(STICK_TO_FLOOR_DISTANCE)),
            max_slope_climb_angle: self.max_slope_rad,
            min_slope_slide_angle: self.max_slope_rad,
            ..KinematicCharacterController::default()
        };

        let dims = self.current_dims();
        let center = self.position + self.up * (dims.half_height + dims.radius);
        let iso = Isometry3::from_parts(center.into(), self.rotation);

        let pipeline = world.as_query_pipeline(Layer::Moving.query_filter());
        let correction = controller.move_shape(
            dt,
            &pipeline,
            &Capsule::new_y(dims.half_height, dims.radius),
            &iso,
            velocity * dt,
            |_| {},
        );

        self.position += correction.translation;
        self.velocity = velocity;
        self.ground_state = if correction.grounded {
            if steep {
                GroundState::OnSteepGround
            } else {
                GroundState::OnGround
            }
        } else {
            GroundState::InAir
        };
    }
}

/// Desired-velocity integrator: exponential blend under inertia, direct
/// assignment otherwise.
fn blend_desired(desired: Vec3, direction: Vec3, speed: f32, inertia: bool) -> Vec3 {
    if inertia {
        desired * 0.75 + direction * (0.25 * speed)
    } else {
        direction * speed
    }
}

struct VelocityInputs {
    current: Vec3,
    ground_velocity: Vec3,
    up: Vec3,
    up_rotation: Quat,
    on_ground: bool,
    ground_steep: bool,
    enable_inertia: bool,
    jump: bool,
    crouched: bool,
    jump_speed: f32,
    gravity: Vec3,
    dt: f32,
    desired: Vec3,
}

/// Compose the velocity to commit this tick. Pure function so the
/// ground-stick and jump rules can be tested without a world.
fn compose_velocity(inputs: &VelocityInputs) -> Vec3 {
    let vertical = inputs.up * inputs.current.dot(&inputs.up);
    let moving_towards_ground =
        (vertical.dot(&inputs.up) - inputs.ground_velocity.dot(&inputs.up)) < TOWARDS_GROUND_EPS;

    let follow_ground = inputs.on_ground
        && if inputs.enable_inertia {
            moving_towards_ground
        } else {
            !inputs.ground_steep
        };

    let mut velocity = if follow_ground {
        let mut v = inputs.ground_velocity;
        if inputs.jump && moving_towards_ground && !inputs.crouched {
            v += inputs.up * inputs.jump_speed;
        }
        v
    } else {
        vertical
    };

    velocity += inputs.up_rotation * (inputs.gravity * inputs.dt);
    velocity += inputs.up_rotation * inputs.desired;
    velocity
}

fn validate_options(options: &CharacterOptions) -> PhysicsResult<()> {
    if options.standing.half_height <= 0.0 || options.standing.radius <= 0.0 {
        return Err(PhysicsError::invalid_character(format!(
            "standing capsule dimensions must be positive, got ({}, {})",
            options.standing.half_height, options.standing.radius
        )));
    }
    if let Some(crouching) = options.crouching {
        if crouching.half_height <= 0.0 || crouching.radius <= 0.0 {
            return Err(PhysicsError::invalid_character(format!(
                "crouching capsule dimensions must be positive, got ({}, {})",
                crouching.half_height, crouching.radius
            )));
        }
        if crouching.height() >= options.standing.height() {
            return Err(PhysicsError::invalid_character(
                "crouching capsule must be shorter than the standing capsule",
            ));
        }
    }
    if options.move_speed < 0.0 || options.jump_speed < 0.0 {
        return Err(PhysicsError::invalid_character(
            "move and jump speeds must be non-negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodySettings, MotionType};
    use crate::shape::ShapeDesc;
    use crate::world::default_gravity;
    use approx::assert_relative_eq;

    fn ground_stick_inputs() -> VelocityInputs {
        VelocityInputs {
            current: Vec3::new(3.0, 0.05, 0.0),
            ground_velocity: Vec3::new(1.0, 0.0, 1.0),
            up: Vector3::y(),
            up_rotation: Quat::identity(),
            on_ground: true,
            ground_steep: false,
            enable_inertia: true,
            jump: false,
            crouched: false,
            jump_speed: 15.0,
            gravity: Vec3::zeros(),
            dt: 0.0,
            desired: Vec3::zeros(),
        }
    }

    #[test]
    fn grounded_baseline_is_the_ground_velocity() {
        // Vertical speed 0.05 vs ground 0.0: still moving toward ground,
        // so the platform velocity becomes the baseline.
        let velocity = compose_velocity(&ground_stick_inputs());
        assert_relative_eq!(velocity, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn jump_adds_impulse_on_top_of_ground_velocity() {
        let mut inputs = ground_stick_inputs();
        inputs.jump = true;
        let velocity = compose_velocity(&inputs);
        assert_relative_eq!(velocity, Vec3::new(1.0, 15.0, 1.0));
    }

    #[test]
    fn crouching_blocks_the_jump() {
        let mut inputs = ground_stick_inputs();
        inputs.jump = true;
        inputs.crouched = true;
        let velocity = compose_velocity(&inputs);
        assert_relative_eq!(velocity, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn airborne_baseline_keeps_only_the_vertical_component() {
        let mut inputs = ground_stick_inputs();
        inputs.on_ground = false;
        inputs.current = Vec3::new(3.0, -2.0, 1.0);
        let velocity = compose_velocity(&inputs);
        assert_relative_eq!(velocity, Vec3::new(0.0, -2.0, 0.0));
    }

    #[test]
    fn rising_fast_off_a_platform_is_not_ground_following() {
        // Vertical 0.5 vs ground 0.0: no longer moving toward ground.
        let mut inputs = ground_stick_inputs();
        inputs.current = Vec3::new(3.0, 0.5, 0.0);
        let velocity = compose_velocity(&inputs);
        assert_relative_eq!(velocity, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn gravity_and_desired_are_always_added() {
        let mut inputs = ground_stick_inputs();
        inputs.gravity = Vec3::new(0.0, -9.81, 0.0);
        inputs.dt = 0.1;
        inputs.desired = Vec3::new(2.0, 0.0, 0.0);
        let velocity = compose_velocity(&inputs);
        assert_relative_eq!(velocity, Vec3::new(3.0, -0.981, 1.0), epsilon = 1.0e-5);
    }

    #[test]
    fn inertia_blend_converges_towards_direction() {
        let direction = Vec3::new(0.0, 0.0, 1.0);
        let mut desired = Vec3::zeros();
        for _ in 0..64 {
            desired = blend_desired(desired, direction, 6.0, true);
        }
        assert_relative_eq!(desired.z, 6.0, epsilon = 1.0e-3);

        // Without inertia the assignment is immediate.
        assert_relative_eq!(
            blend_desired(Vec3::zeros(), direction, 6.0, false).z,
            6.0
        );
    }

    #[test]
    fn crouch_must_be_shorter_than_standing() {
        let options = CharacterOptions {
            crouching: Some(CapsuleDims {
                half_height: 1.0,
                radius: 0.3,
            }),
            ..CharacterOptions::default()
        };
        assert!(matches!(
            Character::create(options, Vec3::zeros()),
            Err(PhysicsError::InvalidCharacter(_))
        ));
    }

    /// World with a static floor whose top face is at y = 0.
    fn world_with_floor() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(default_gravity());
        world
            .create_body(BodySettings::new(
                ShapeDesc::Box {
                    half_extents: Vec3::new(50.0, 0.5, 50.0),
                },
                Vec3::new(0.0, -0.5, 0.0),
                MotionType::Static,
            ))
            .unwrap();
        world.update_queries();
        world
    }

    #[test]
    fn falls_then_lands_on_the_floor() {
        let world = world_with_floor();
        let mut character =
            Character::create(CharacterOptions::default(), Vec3::new(0.0, 1.0, 0.0)).unwrap();

        let dt = 1.0 / 60.0;
        for _ in 0..120 {
            character.update(&world, &CharacterInput::default(), dt, None);
        }

        assert_eq!(character.ground_state(), GroundState::OnGround);
        assert!(
            character.position().y.abs() < 0.1,
            "feet should rest near the floor, got y = {}",
            character.position().y
        );
    }

    #[test]
    fn idle_on_ground_does_not_drift() {
        let world = world_with_floor();
        let mut character =
            Character::create(CharacterOptions::default(), Vec3::new(0.0, 0.0, 0.0)).unwrap();

        let dt = 1.0 / 60.0;
        for _ in 0..60 {
            character.update(&world, &CharacterInput::default(), dt, None);
        }
        let before = character.position();
        for _ in 0..60 {
            character.update(&world, &CharacterInput::default(), dt, None);
        }
        let delta = character.position() - before;
        let horizontal = Vec3::new(delta.x, 0.0, delta.z).norm();
        assert!(horizontal < 1.0e-3, "idle character drifted {horizontal} m");
        assert!(delta.y.abs() < 0.05);
    }

    #[test]
    fn moves_horizontally_under_input() {
        let world = world_with_floor();
        let mut character =
            Character::create(CharacterOptions::default(), Vec3::new(0.0, 0.0, 0.0)).unwrap();

        let dt = 1.0 / 60.0;
        let input = CharacterInput {
            direction: Vec3::new(0.0, 0.0, 1.0),
            ..CharacterInput::default()
        };
        for _ in 0..120 {
            character.update(&world, &input, dt, None);
        }
        assert!(
            character.position().z > 1.0,
            "expected forward progress, got z = {}",
            character.position().z
        );
    }

    #[test]
    fn airborne_input_is_locked_without_move_during_jump() {
        let world = world_with_floor();
        let options = CharacterOptions {
            move_during_jump: false,
            enable_inertia: false,
            ..CharacterOptions::default()
        };
        let mut character = Character::create(options, Vec3::new(0.0, 3.0, 0.0)).unwrap();

        let input = CharacterInput {
            direction: Vec3::new(1.0, 0.0, 0.0),
            ..CharacterInput::default()
        };
        let dt = 1.0 / 60.0;
        for _ in 0..10 {
            character.update(&world, &input, dt, None);
        }

        assert_eq!(character.ground_state(), GroundState::InAir);
        assert!(
            character.position().x.abs() < 1.0e-6,
            "airborne input moved the character to x = {}",
            character.position().x
        );
    }

    #[test]
    fn allow_locked_movement_overrides_the_gate() {
        let world = world_with_floor();
        let options = CharacterOptions {
            move_during_jump: false,
            enable_inertia: false,
            ..CharacterOptions::default()
        };
        let mut character = Character::create(options, Vec3::new(0.0, 3.0, 0.0)).unwrap();

        let input = CharacterInput {
            direction: Vec3::new(1.0, 0.0, 0.0),
            allow_locked_movement: true,
            ..CharacterInput::default()
        };
        let dt = 1.0 / 60.0;
        for _ in 0..10 {
            character.update(&world, &input, dt, None);
        }

        assert_eq!(character.ground_state(), GroundState::InAir);
        assert!(
            character.position().x > 0.5,
            "override should re-enable input, got x = {}",
            character.position().x
        );
    }

    #[test]
    fn jump_injects_upward_velocity_once_grounded() {
        let world = world_with_floor();
        let mut character =
            Character::create(CharacterOptions::default(), Vec3::new(0.0, 0.0, 0.0)).unwrap();

        let dt = 1.0 / 60.0;
        for _ in 0..60 {
            character.update(&world, &CharacterInput::default(), dt, None);
        }
        assert_eq!(character.ground_state(), GroundState::OnGround);

        character.update(
            &world,
            &CharacterInput {
                jump: true,
                ..CharacterInput::default()
            },
            dt,
            None,
        );
        assert!(
            character.velocity().y > 10.0,
            "expected a jump impulse, got {:?}",
            character.velocity()
        );
    }

    #[test]
    fn stand_up_is_refused_under_a_low_ceiling() {
        let mut world = world_with_floor();
        // Ceiling slab leaving 1.4 m of clearance: enough for the crouched
        // capsule (1.0 m) but not the standing one (2.6 m).
        world
            .create_body(BodySettings::new(
                ShapeDesc::Box {
                    half_extents: Vec3::new(5.0, 0.1, 5.0),
                },
                Vec3::new(0.0, 1.5, 0.0),
                MotionType::Static,
            ))
            .unwrap();
        world.update_queries();

        let options = CharacterOptions {
            crouching: Some(CapsuleDims {
                half_height: 0.2,
                radius: 0.3,
            }),
            ..CharacterOptions::default()
        };
        let mut character = Character::create(options, Vec3::zeros()).unwrap();

        let dt = 1.0 / 60.0;
        let crouched = CharacterInput {
            crouch: true,
            ..CharacterInput::default()
        };
        for _ in 0..30 {
            character.update(&world, &crouched, dt, None);
        }
        assert_eq!(character.stance(), Stance::Crouching);

        // Release crouch under the ceiling: the swap must be refused.
        character.update(&world, &CharacterInput::default(), dt, None);
        assert_eq!(character.stance(), Stance::Crouching);
    }

    #[test]
    fn stand_up_succeeds_in_the_open() {
        let world = world_with_floor();
        let options = CharacterOptions {
            crouching: Some(CapsuleDims {
                half_height: 0.2,
                radius: 0.3,
            }),
            ..CharacterOptions::default()
        };
        let mut character = Character::create(options, Vec3::zeros()).unwrap();

        let dt = 1.0 / 60.0;
        character.update(
            &world,
            &CharacterInput {
                crouch: true,
                ..CharacterInput::default()
            },
            dt,
            None,
        );
        assert_eq!(character.stance(), Stance::Crouching);

        character.update(&world, &CharacterInput::default(), dt, None);
        assert_eq!(character.stance(), Stance::Standing);
    }

    #[test]
    fn velocity_override_post_processes_the_committed_velocity() {
        let world = world_with_floor();
        let mut character =
            Character::create(CharacterOptions::default(), Vec3::new(0.0, 5.0, 0.0)).unwrap();

        let mut hook = |_velocity: Vec3, _up: Vec3| Vec3::new(0.0, 1.0, 0.0);
        character.update(
            &world,
            &CharacterInput::default(),
            1.0 / 60.0,
            Some(&mut hook),
        );
        assert_relative_eq!(character.velocity(), Vec3::new(0.0, 1.0, 0.0));
    }
}
