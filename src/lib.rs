//! Scene/body lifecycle layer over the Rapier physics engine.
//!
//! This crate sits between application code and the engine: declarative
//! shape and body descriptors go in, owned handles and per-tick pose
//! snapshots come out. It implements no collision or solver algorithms of
//! its own.
//!
//! Subsystems
//! - [`world`]: owns all engine state; clamped, sub-stepped ticking.
//! - [`layers`]: the fixed two-layer broad-phase partition.
//! - [`shape`]: validated descriptor-to-shape construction and debug
//!   triangulation.
//! - [`body`]: body creation/removal and pose/velocity/material access.
//! - [`vehicle`]: chassis + four-wheel suspension/drivetrain controller.
//! - [`character`]: kinematic capsule character controller.
//! - [`raycast`]: persistent closest-hit ray queries.
//!
//! Ownership
//! - The [`PhysicsWorld`] outlives everything; every operation borrows it,
//!   so handles cannot be used after the world is dropped.
//! - Creation handles ([`BodyHandle`], [`Vehicle`], [`Character`]) are
//!   consumed by their removal calls, making double-free unrepresentable.
//!
//! Single-threaded by contract: one logical simulation thread owns all
//! mutation (creation, removal, stepping); queries borrow the world
//! immutably between steps.

pub mod body;
pub mod character;
pub mod error;
pub mod layers;
pub mod raycast;
pub mod shape;
pub mod vehicle;
pub mod world;

/// Math aliases shared across the crate (single precision, 3D).
pub type Vec3 = nalgebra::Vector3<f32>;
pub type Quat = nalgebra::UnitQuaternion<f32>;
pub type Iso = nalgebra::Isometry3<f32>;

pub use body::{BodyHandle, BodySettings, Material, MotionType};
pub use character::{
    CapsuleDims, Character, CharacterInput, CharacterOptions, GroundState, Stance,
};
pub use error::{PhysicsError, PhysicsResult};
pub use layers::Layer;
pub use raycast::{RayHit, Raycaster};
pub use shape::{build_shape, shape_to_triangles, CompoundChild, ShapeDesc};
pub use vehicle::{
    DriveType, SuspensionSettings, Vehicle, VehicleConfig, VehicleInput, VehicleSize,
    VehicleSnapshot, WheelCast, WheelPose, WheelSettings,
};
pub use world::{default_gravity, PhysicsWorld, MAX_STEP_DT, SUBSTEP_THRESHOLD_DT};
