//! Four-wheeled vehicle controller.
//!
//! A vehicle is a dynamic chassis body plus four suspension/tire units and
//! a drivetrain. Nothing here owns a solver: each [`Vehicle::update`] call
//! probes the ground under every wheel through scene queries, then applies
//! suspension, drive, brake, and tire impulses to the chassis before the
//! world steps. The caller is expected to invoke `update` once per tick,
//! before [`PhysicsWorld::step`].
//!
//! Layout conventions (chassis-local):
//! - +Z is forward, +X is left, +Y is up.
//! - Wheels are indexed FL = 0, FR = 1, BL = 2, BR = 3 for the vehicle's
//!   lifetime; front wheels steer, rear wheels carry the handbrake, all
//!   four carry the service brake.
//! - The center of mass sits half the chassis height below the geometric
//!   center, which is what keeps the box-shaped chassis from rolling over
//!   in ordinary cornering.
//!
//! Wheel poses in the output snapshot are chassis-local and meant for
//! visualization only; they carry no collision state.

pub mod drivetrain;

use std::f32::consts::FRAC_PI_2;

use nalgebra::{Isometry3, Point3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::parry::query::ShapeCastOptions;
use rapier3d::parry::shape::{Ball, Cylinder};
use rapier3d::prelude::{ColliderBuilder, MassProperties, QueryFilter, Ray, RigidBodyBuilder};

use crate::body::BodyHandle;
use crate::error::{PhysicsError, PhysicsResult};
use crate::layers::Layer;
use crate::world::PhysicsWorld;
use crate::{Quat, Vec3};

pub use drivetrain::{
    build_differentials, limited_slip_split, reduce_input, DriveCommand, DriveType, VehicleInput,
};
use drivetrain::Differential;

pub const FRONT_LEFT: usize = 0;
pub const FRONT_RIGHT: usize = 1;
pub const BACK_LEFT: usize = 2;
pub const BACK_RIGHT: usize = 3;

/// Torque impulse gain pulling an over-tilted chassis back upright.
const UPRIGHT_TORQUE_GAIN: f32 = 20.0;

/// Anti-roll bar stiffness as a fraction of the suspension spring rate.
const ANTI_ROLLBAR_STIFFNESS: f32 = 0.5;

/// How the wheel ground probe is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelCast {
    /// Single ray from the wheel attachment straight down.
    Ray,
    /// Cylinder matching the wheel, cast along the suspension.
    Cylinder,
    /// Sphere of half the wheel width, cast along the suspension.
    Sphere,
}

#[derive(Clone, Copy, Debug)]
pub struct WheelSettings {
    pub radius: f32,
    pub width: f32,
    /// Distance of each axle from the chassis center, along forward.
    pub offset_horizontal: f32,
    /// How far below the chassis center the wheels attach.
    pub offset_vertical: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct VehicleSize {
    pub length: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct SuspensionSettings {
    /// Shortest the suspension can compress to (meters).
    pub min_length: f32,
    /// Rest length at full droop (meters).
    pub max_length: f32,
    /// Natural frequency of the spring (Hz).
    pub frequency: f32,
    /// Damping ratio (1.0 = critically damped).
    pub damping_ratio: f32,
}

impl Default for SuspensionSettings {
    fn default() -> Self {
        Self {
            min_length: 0.3,
            max_length: 0.5,
            frequency: 2.0,
            damping_ratio: 0.5,
        }
    }
}

/// Full vehicle configuration. Defaults mirror a mid-size car.
#[derive(Clone, Debug)]
pub struct VehicleConfig {
    pub position: Vec3,
    pub rotation: Quat,
    pub cast_type: WheelCast,
    pub wheel: WheelSettings,
    pub size: VehicleSize,
    pub suspension: SuspensionSettings,
    /// Steering lock of the front wheels (degrees).
    pub max_steer_angle: f32,
    /// Tilt beyond which upright correction kicks in (degrees).
    pub max_pitch_roll_angle: f32,
    pub drive_type: DriveType,
    pub front_back_limited_slip_ratio: f32,
    pub left_right_limited_slip_ratio: f32,
    pub anti_rollbar: bool,
    pub mass: f32,
    pub max_torque: f32,
    /// How quickly engine force ramps toward its target (1/s).
    pub clutch_strength: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            cast_type: WheelCast::Cylinder,
            wheel: WheelSettings {
                radius: 0.3,
                width: 0.2,
                offset_horizontal: 1.5,
                offset_vertical: 0.3,
            },
            size: VehicleSize {
                length: 4.0,
                width: 2.0,
                height: 1.0,
            },
            suspension: SuspensionSettings::default(),
            max_steer_angle: 30.0,
            max_pitch_roll_angle: 60.0,
            drive_type: DriveType::Rwd,
            front_back_limited_slip_ratio: 1.4,
            left_right_limited_slip_ratio: 1.4,
            anti_rollbar: true,
            mass: 1500.0,
            max_torque: 500.0,
            clutch_strength: 10.0,
        }
    }
}

/// Per-wheel controller state.
#[derive(Clone, Copy, Debug)]
struct Wheel {
    /// Chassis-local suspension attachment point.
    attachment: Vec3,
    steerable: bool,
    has_brake: bool,
    has_handbrake: bool,
    suspension_length: f32,
    steer_angle: f32,
    spin_angle: f32,
    /// Smoothed engine force routed to this wheel (N).
    drive_force: f32,
}

/// Result of one wheel's ground probe.
#[derive(Clone, Copy, Debug)]
struct WheelContact {
    /// Suspension length at contact, clamped to the configured range.
    length: f32,
    point: Point3<f32>,
}

/// Chassis-local wheel pose for rendering.
#[derive(Clone, Copy, Debug)]
pub struct WheelPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Chassis pose/velocity plus wheel poses, sampled at the end of `update`.
#[derive(Clone, Copy, Debug)]
pub struct VehicleSnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub wheels: [WheelPose; 4],
}

pub struct Vehicle {
    chassis: BodyHandle,
    wheels: [Wheel; 4],
    differentials: Vec<Differential>,
    config: VehicleConfig,
    max_steer_rad: f32,
    max_pitch_roll_rad: f32,
    previous_forward: f32,
}

impl Vehicle {
    /// Create the chassis body and wheel state from a configuration.
    ///
    /// The chassis is inserted into the world immediately; wheels exist
    /// only as controller state.
    pub fn create(world: &mut PhysicsWorld, config: VehicleConfig) -> PhysicsResult<Self> {
        validate_config(&config)?;

        let half = Vec3::new(
            config.size.width / 2.0,
            config.size.height / 2.0,
            config.size.length / 2.0,
        );

        let pose = Isometry3::from_parts(config.position.into(), config.rotation);
        let body = world
            .bodies
            .insert(
                RigidBodyBuilder::dynamic()
                    .pose(pose)
                    .additional_mass_properties(chassis_mass_properties(&config))
                    .build(),
            );
        // Mass comes entirely from the explicit override above; the
        // collider contributes geometry only.
        let collider = world.colliders.insert_with_parent(
            ColliderBuilder::cuboid(half.x, half.y, half.z)
                .collision_groups(Layer::Moving.collision_groups())
                .density(0.0)
                .build(),
            body,
            &mut world.bodies,
        );
        world.bodies[body].wake_up(true);

        let wheels = wheel_layout(&config);
        let differentials =
            build_differentials(config.drive_type, config.left_right_limited_slip_ratio);

        log::debug!(
            "created vehicle ({:?}, {:?} wheel cast) at {:?}",
            config.drive_type,
            config.cast_type,
            config.position
        );

        Ok(Self {
            chassis: BodyHandle { body, collider },
            wheels,
            differentials,
            max_steer_rad: config.max_steer_angle.to_radians(),
            max_pitch_roll_rad: config.max_pitch_roll_angle.to_radians(),
            config,
            previous_forward: 0.0,
        })
    }

    /// Handle of the chassis body, e.g. for raycast correlation.
    #[inline]
    pub fn chassis(&self) -> &BodyHandle {
        &self.chassis
    }

    /// Advance the controller by one tick: reduce input, probe the ground
    /// under each wheel, apply suspension and tire impulses, and return a
    /// render snapshot. Call once per tick before `PhysicsWorld::step`.
    pub fn update(
        &mut self,
        world: &mut PhysicsWorld,
        input: &VehicleInput,
        dt: f32,
    ) -> VehicleSnapshot {
        let (pose, linvel) = {
            let body = &world.bodies[self.chassis.body];
            (*body.position(), *body.linvel())
        };

        let longitudinal = (pose.rotation.inverse() * linvel).z;
        let command = reduce_input(input, &mut self.previous_forward, longitudinal);

        for wheel in &mut self.wheels {
            wheel.steer_angle = if wheel.steerable {
                -command.right * self.max_steer_rad
            } else {
                0.0
            };
        }

        let contacts = self.probe_wheels(world, &pose);
        self.apply_wheel_forces(world, &pose, &command, &contacts, dt);
        self.apply_tilt_limit(world, &pose, dt);

        if input.is_active() {
            world.bodies[self.chassis.body].wake_up(true);
        }

        self.snapshot(world, &contacts)
    }

    /// Remove the chassis from the world. Consumes the vehicle.
    pub fn remove(self, world: &mut PhysicsWorld) {
        world.remove_body(self.chassis);
    }

    /// Ground probe for all four wheels, using the configured cast shape.
    /// Pure query phase: no world mutation.
    fn probe_wheels(&self, world: &PhysicsWorld, pose: &Isometry3<f32>) -> [Option<WheelContact>; 4] {
        let filter: QueryFilter = Layer::Moving
            .query_filter()
            .exclude_rigid_body(self.chassis.body);
        let pipeline = world.as_query_pipeline(filter);

        let down = pose.rotation * -Vector3::y();
        let susp = &self.config.suspension;
        let radius = self.config.wheel.radius;

        let mut contacts = [None; 4];
        for (i, wheel) in self.wheels.iter().enumerate() {
            let attach = pose * Point3::from(wheel.attachment);

            contacts[i] = match self.config.cast_type {
                WheelCast::Ray => {
                    // Contact when the ground is within full droop plus the
                    // wheel radius below the attachment.
                    let max = susp.max_length + radius;
                    let ray = Ray::new(attach, down);
                    pipeline.cast_ray_and_get_normal(&ray, max, true).map(|(_, hit)| {
                        WheelContact {
                            length: (hit.time_of_impact - radius)
                                .clamp(susp.min_length, susp.max_length),
                            point: attach + down * hit.time_of_impact,
                        }
                    })
                }
                WheelCast::Sphere => {
                    let ball_radius = 0.5 * self.config.wheel.width;
                    let max_travel = susp.max_length + radius - ball_radius;
                    let iso = Isometry3::from_parts(attach.coords.into(), Quat::identity());
                    let mut opts = ShapeCastOptions::with_max_time_of_impact(max_travel);
                    opts.stop_at_penetration = true;
                    pipeline
                        .cast_shape(&iso, &down, &Ball::new(ball_radius), opts)
                        .map(|(_, hit)| {
                            let ground_dist = hit.time_of_impact + ball_radius;
                            WheelContact {
                                length: (ground_dist - radius)
                                    .clamp(susp.min_length, susp.max_length),
                                point: attach + down * ground_dist,
                            }
                        })
                }
                WheelCast::Cylinder => {
                    // Wheel-shaped probe: axis along the (steered) axle.
                    let axle_rot = pose.rotation
                        * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), wheel.steer_angle)
                        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
                    let iso = Isometry3::from_parts(attach.coords.into(), axle_rot);
                    let cylinder = Cylinder::new(self.config.wheel.width / 2.0, radius);
                    let mut opts = ShapeCastOptions::with_max_time_of_impact(susp.max_length);
                    opts.stop_at_penetration = true;
                    pipeline.cast_shape(&iso, &down, &cylinder, opts).map(|(_, hit)| {
                        WheelContact {
                            length: hit
                                .time_of_impact
                                .clamp(susp.min_length, susp.max_length),
                            point: attach + down * (hit.time_of_impact + radius),
                        }
                    })
                }
            };
        }
        contacts
    }

    /// Apply suspension, drive, brake, and lateral-grip impulses for every
    /// wheel with ground contact.
    fn apply_wheel_forces(
        &mut self,
        world: &mut PhysicsWorld,
        pose: &Isometry3<f32>,
        command: &DriveCommand,
        contacts: &[Option<WheelContact>; 4],
        dt: f32,
    ) {
        let up = pose.rotation * Vector3::y();
        let down = -up;
        let quarter_mass = self.config.mass / 4.0;
        let susp = &self.config.suspension;

        // Spring rate from the natural frequency of a quarter-car.
        let omega = std::f32::consts::TAU * susp.frequency;
        let spring_k = quarter_mass * omega * omega;
        let damping_c = 2.0 * susp.damping_ratio * (spring_k * quarter_mass).sqrt();

        let mut suspension_force = [0.0f32; 4];
        for i in 0..4 {
            let Some(contact) = contacts[i] else { continue };
            let velocity = world.bodies[self.chassis.body].velocity_at_point(&contact.point);
            let compression = susp.max_length - contact.length;
            let compression_speed = velocity.dot(&down);
            suspension_force[i] = (spring_k * compression + damping_c * compression_speed).max(0.0);
        }

        // Anti-roll bars shift suspension load toward the compressed side
        // of each axle.
        if self.config.anti_rollbar {
            for (left, right) in [(FRONT_LEFT, FRONT_RIGHT), (BACK_LEFT, BACK_RIGHT)] {
                if contacts[left].is_some() && contacts[right].is_some() {
                    let (x_left, x_right) = (
                        susp.max_length - contacts[left].map(|c| c.length).unwrap_or(susp.max_length),
                        susp.max_length - contacts[right].map(|c| c.length).unwrap_or(susp.max_length),
                    );
                    let transfer = ANTI_ROLLBAR_STIFFNESS * spring_k * (x_left - x_right);
                    suspension_force[left] = (suspension_force[left] + transfer).max(0.0);
                    suspension_force[right] = (suspension_force[right] - transfer).max(0.0);
                }
            }
        }

        let engine_force = command.forward * self.config.max_torque / self.config.wheel.radius;
        let clutch_blend = (self.config.clutch_strength * dt).min(1.0);
        let max_brake_force = 2.0 * self.config.max_torque / self.config.wheel.radius;
        let lateral_grip = (1.0 / self.config.left_right_limited_slip_ratio).min(1.0);

        // Engine force routed through the differentials. With two driven
        // axles the front/back limited slip shifts torque toward the axle
        // carrying more suspension load; within each axle the pair's own
        // limited slip does the same between left and right.
        let axle_load =
            |d: &Differential| suspension_force[d.left_wheel] + suspension_force[d.right_wheel];
        let axle_ratios: Vec<f32> = if let [rear, front] = self.differentials.as_slice() {
            let (rear_share, front_share) = limited_slip_split(
                axle_load(rear),
                axle_load(front),
                self.config.front_back_limited_slip_ratio,
            );
            vec![rear_share, front_share]
        } else {
            self.differentials
                .iter()
                .map(|d| d.engine_torque_ratio)
                .collect()
        };

        let mut drive_target = [0.0f32; 4];
        for (diff, ratio) in self.differentials.iter().zip(&axle_ratios) {
            let (left_share, right_share) = limited_slip_split(
                suspension_force[diff.left_wheel],
                suspension_force[diff.right_wheel],
                diff.limited_slip_ratio,
            );
            drive_target[diff.left_wheel] = engine_force * ratio * left_share;
            drive_target[diff.right_wheel] = engine_force * ratio * right_share;
        }

        for i in 0..4 {
            let wheel = &mut self.wheels[i];
            wheel.drive_force += (drive_target[i] - wheel.drive_force) * clutch_blend;

            let Some(contact) = contacts[i] else {
                wheel.suspension_length = susp.max_length;
                continue;
            };
            wheel.suspension_length = contact.length;

            let forward = pose.rotation
                * (UnitQuaternion::from_axis_angle(&Vector3::y_axis(), wheel.steer_angle)
                    * Vector3::z());
            let lateral = up.cross(&forward);

            let body = &mut world.bodies[self.chassis.body];
            let velocity = body.velocity_at_point(&contact.point);
            let v_forward = velocity.dot(&forward);
            let v_lateral = velocity.dot(&lateral);

            let mut impulse = up * suspension_force[i] * dt;
            impulse += forward * wheel.drive_force * dt;

            let brake_factor = (command.brake * wheel.has_brake as u8 as f32
                + command.handbrake * wheel.has_handbrake as u8 as f32)
                .min(1.0);
            if brake_factor > 0.0 {
                let magnitude = (v_forward.abs() * quarter_mass).min(max_brake_force * dt);
                impulse -= forward * v_forward.signum() * magnitude * brake_factor;
            }

            impulse -= lateral * v_lateral * quarter_mass * lateral_grip;

            body.apply_impulse_at_point(impulse, contact.point, true);

            wheel.spin_angle += v_forward / self.config.wheel.radius * dt;
        }
    }

    /// Pull the chassis back toward upright once tilt exceeds the limit.
    fn apply_tilt_limit(&self, world: &mut PhysicsWorld, pose: &Isometry3<f32>, dt: f32) {
        let chassis_up = pose.rotation * Vector3::y();
        let tilt = chassis_up.angle(&Vector3::y());
        if tilt <= self.max_pitch_roll_rad {
            return;
        }

        let Some(axis) = UnitVector3::try_new(chassis_up.cross(&Vector3::y()), 1.0e-6) else {
            return;
        };
        let torque = axis.into_inner()
            * (tilt - self.max_pitch_roll_rad)
            * self.config.mass
            * UPRIGHT_TORQUE_GAIN
            * dt;
        world.bodies[self.chassis.body].apply_torque_impulse(torque, true);
    }

    fn snapshot(
        &self,
        world: &PhysicsWorld,
        contacts: &[Option<WheelContact>; 4],
    ) -> VehicleSnapshot {
        let body = &world.bodies[self.chassis.body];
        let pose = body.position();

        let mut wheels = [WheelPose {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }; 4];
        for i in 0..4 {
            let wheel = &self.wheels[i];
            let length = contacts[i]
                .map(|c| c.length)
                .unwrap_or(self.config.suspension.max_length);
            wheels[i] = WheelPose {
                position: wheel.attachment + Vec3::new(0.0, -length, 0.0),
                rotation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), wheel.steer_angle)
                    * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), wheel.spin_angle),
            };
        }

        VehicleSnapshot {
            position: pose.translation.vector,
            rotation: pose.rotation,
            velocity: *body.linvel(),
            wheels,
        }
    }
}

/// Fixed wheel layout: left = +X, forward = +Z, attachments dropped
/// `offset_vertical` below the chassis center.
fn wheel_layout(config: &VehicleConfig) -> [Wheel; 4] {
    let half_width = config.size.width / 2.0;
    let (oh, ov) = (config.wheel.offset_horizontal, config.wheel.offset_vertical);

    let wheel = |x: f32, z: f32, front: bool| Wheel {
        attachment: Vec3::new(x, -ov, z),
        steerable: front,
        has_brake: true,
        has_handbrake: !front,
        suspension_length: config.suspension.max_length,
        steer_angle: 0.0,
        spin_angle: 0.0,
        drive_force: 0.0,
    };

    [
        wheel(half_width, oh, true),    // FL
        wheel(-half_width, oh, true),   // FR
        wheel(half_width, -oh, false),  // BL
        wheel(-half_width, -oh, false), // BR
    ]
}

/// Chassis mass properties: configured mass with cuboid inertia, center of
/// mass lowered by half the height for rollover stability.
fn chassis_mass_properties(config: &VehicleConfig) -> MassProperties {
    let (w, h, l) = (config.size.width, config.size.height, config.size.length);
    let m = config.mass;
    let inertia = Vector3::new(
        m / 12.0 * (h * h + l * l),
        m / 12.0 * (w * w + l * l),
        m / 12.0 * (w * w + h * h),
    );
    MassProperties::new(Point3::new(0.0, -h / 2.0, 0.0), m, inertia)
}

fn validate_config(config: &VehicleConfig) -> PhysicsResult<()> {
    if config.size.length <= 0.0 || config.size.width <= 0.0 || config.size.height <= 0.0 {
        return Err(PhysicsError::invalid_vehicle(format!(
            "vehicle size must be positive, got {:?}",
            config.size
        )));
    }
    if config.wheel.radius <= 0.0 || config.wheel.width <= 0.0 {
        return Err(PhysicsError::invalid_vehicle(format!(
            "wheel radius and width must be positive, got ({}, {})",
            config.wheel.radius, config.wheel.width
        )));
    }
    if config.suspension.min_length < 0.0
        || config.suspension.max_length <= config.suspension.min_length
    {
        return Err(PhysicsError::invalid_vehicle(format!(
            "suspension lengths must satisfy 0 <= min < max, got ({}, {})",
            config.suspension.min_length, config.suspension.max_length
        )));
    }
    if config.mass <= 0.0 {
        return Err(PhysicsError::invalid_vehicle(format!(
            "vehicle mass must be positive, got {}",
            config.mass
        )));
    }
    if config.max_torque <= 0.0 {
        return Err(PhysicsError::invalid_vehicle(format!(
            "max torque must be positive, got {}",
            config.max_torque
        )));
    }
    if !(0.0..=90.0).contains(&config.max_steer_angle) {
        return Err(PhysicsError::invalid_vehicle(format!(
            "max steer angle must be within [0, 90] degrees, got {}",
            config.max_steer_angle
        )));
    }
    Ok(())
}
