//! World lifecycle and the clamped, sub-stepped simulation tick.
//!
//! [`PhysicsWorld`] owns every engine structure (body/collider sets, solver
//! pipelines, broad/narrow phase) for one simulation scene. All other
//! modules operate through a borrowed world, so handles cannot outlive the
//! structures they index and teardown happens exactly once, on drop.
//!
//! Stepping policy
//! - The caller passes the real elapsed frame time. It is clamped to
//!   [`MAX_STEP_DT`] so a stall (tab switch, debugger pause) cannot inject a
//!   huge impulse into the scene.
//! - Frames slower than [`SUBSTEP_THRESHOLD_DT`] are integrated as two
//!   sub-steps of half the clamped dt; faster frames run a single step.
//!   Sub-steps always cover the clamped dt exactly.
//!
//! Scene queries (rays, shape casts, character moves) go through a borrowed
//! [`QueryPipeline`] view over the broad phase; it reflects the state as of
//! the last `step` or `update_queries` call.

use nalgebra::Vector3;
use rapier3d::prelude::{
    BroadPhaseBvh, CCDSolver, CollisionPipeline, ColliderSet, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryFilter, QueryPipeline, RigidBodySet,
};

use crate::Vec3;

/// Longest frame time a single tick will integrate (seconds).
pub const MAX_STEP_DT: f32 = 1.0 / 30.0;

/// Frames longer than this are split into two sub-steps (seconds).
pub const SUBSTEP_THRESHOLD_DT: f32 = 1.0 / 55.0;

/// One simulation scene: all engine state plus the stepping policy.
pub struct PhysicsWorld {
    gravity: Vec3,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    collision_pipeline: CollisionPipeline,
    pub(crate) islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) impulse_joints: ImpulseJointSet,
    pub(crate) multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        log::debug!("creating physics world, gravity = {gravity:?}");
        Self {
            gravity,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            collision_pipeline: CollisionPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
        }
    }

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    /// Number of rigid bodies currently in the scene.
    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advance the simulation by one frame of `real_dt` seconds, applying
    /// the clamp and sub-step policy.
    pub fn step(&mut self, real_dt: f32) {
        let (dt, substeps) = step_plan(real_dt);
        self.params.dt = dt / substeps as f32;

        for _ in 0..substeps {
            self.pipeline.step(
                &self.gravity,
                &self.params,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd,
                &(),
                &(),
            );
        }
    }

    /// Refresh the broad/narrow phase without advancing the simulation, so
    /// scene queries see colliders added or moved since the last `step`.
    pub fn update_queries(&mut self) {
        self.collision_pipeline.step(
            0.0,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &(),
            &(),
        );
    }

    /// Borrowed query-pipeline view for scene queries under `filter`.
    pub fn as_query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }
}

/// Clamp a frame time and decide its sub-step count.
///
/// Returns `(clamped_dt, substeps)`; the tick integrates
/// `clamped_dt / substeps` per sub-step. Kept as a free function so the
/// policy is testable without a world.
#[inline]
pub fn step_plan(real_dt: f32) -> (f32, u32) {
    let dt = real_dt.min(MAX_STEP_DT);
    let substeps = if dt > SUBSTEP_THRESHOLD_DT { 2 } else { 1 };
    (dt, substeps)
}

/// Default gravity for Earth-like scenes.
#[inline]
pub fn default_gravity() -> Vec3 {
    Vector3::new(0.0, -9.81, 0.0)
}
