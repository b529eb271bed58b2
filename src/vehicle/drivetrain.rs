//! Drivetrain model: drive-type wiring and per-tick input reduction.
//!
//! Everything here is pure state-machine logic with no engine access, so the
//! input-gate and differential rules are testable in isolation. The wheel
//! indices referenced by [`Differential`] follow the fixed order declared in
//! the parent module (FL, FR, BL, BR).

use super::{BACK_LEFT, BACK_RIGHT, FRONT_LEFT, FRONT_RIGHT};

/// Longitudinal speed (m/s) below which a requested direction flip is
/// treated as "already stopped" and allowed through.
const REVERSAL_SPEED_THRESHOLD: f32 = 0.1;

/// Throttle multiplier applied to forward acceleration when the boost
/// modifier is not held. Braking and reversing are unaffected.
const UNBOOSTED_FORWARD_SCALE: f32 = 0.5;

/// Which axle(s) receive engine torque.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveType {
    /// Rear-wheel drive.
    Rwd,
    /// Front-wheel drive.
    Fwd,
    /// All-wheel drive: torque split 50/50 between the axles.
    Awd,
}

/// Torque distribution over one wheel pair.
#[derive(Clone, Copy, Debug)]
pub struct Differential {
    pub left_wheel: usize,
    pub right_wheel: usize,
    /// Fraction of total engine torque routed to this pair.
    pub engine_torque_ratio: f32,
    /// How much the pair may spin at different rates before the
    /// differential locks up.
    pub limited_slip_ratio: f32,
}

/// Build the differential set for a drive type.
///
/// AWD gets two differentials at half torque each; FWD/RWD get a single
/// differential carrying all of it on the driven axle.
pub fn build_differentials(drive_type: DriveType, limited_slip_ratio: f32) -> Vec<Differential> {
    let front = |ratio| Differential {
        left_wheel: FRONT_LEFT,
        right_wheel: FRONT_RIGHT,
        engine_torque_ratio: ratio,
        limited_slip_ratio,
    };
    let rear = |ratio| Differential {
        left_wheel: BACK_LEFT,
        right_wheel: BACK_RIGHT,
        engine_torque_ratio: ratio,
        limited_slip_ratio,
    };

    match drive_type {
        DriveType::Awd => vec![rear(0.5), front(0.5)],
        DriveType::Fwd => vec![front(1.0)],
        DriveType::Rwd => vec![rear(1.0)],
    }
}

/// Split a torque share between two outputs in proportion to the load each
/// carries, bounded by a limited-slip ratio.
///
/// A ratio of 1.0 behaves like a locked differential (torque follows load
/// exactly, so an unloaded wheel gets nothing); large ratios approach an
/// open differential that always splits evenly. With no load on either
/// output the split stays even.
pub fn limited_slip_split(left_load: f32, right_load: f32, limited_slip_ratio: f32) -> (f32, f32) {
    let lockup = 1.0 / limited_slip_ratio.max(1.0);
    let total = left_load + right_load;
    let balance = if total > 0.0 { left_load / total } else { 0.5 };
    let left = 0.5 + (balance - 0.5) * lockup;
    (left, 1.0 - left)
}

/// Raw boolean input sampled from the player for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct VehicleInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub handbrake: bool,
    /// Boost: without it, forward acceleration is halved.
    pub modifier: bool,
}

impl VehicleInput {
    /// Whether any control is active this tick (used to keep a commanded
    /// vehicle awake).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.forward || self.backward || self.left || self.right || self.handbrake
    }
}

/// Reduced driver command submitted to the wheels each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveCommand {
    /// Throttle in [-1, 1].
    pub forward: f32,
    /// Steering in [-1, 1] (positive = right).
    pub right: f32,
    /// Service brake in [0, 1].
    pub brake: f32,
    /// Handbrake in [0, 1].
    pub handbrake: f32,
}

/// Reduce raw input to a drive command, applying the direction-reversal
/// brake gate.
///
/// If the commanded forward sign flips against `previous_forward` while the
/// car is still moving in the old direction faster than the threshold, the
/// request becomes a full brake for this tick instead of an instant
/// reversal; `previous_forward` is only advanced once the flip is accepted.
/// `longitudinal_velocity` is the chassis velocity along its body-space
/// forward axis.
pub fn reduce_input(
    input: &VehicleInput,
    previous_forward: &mut f32,
    longitudinal_velocity: f32,
) -> DriveCommand {
    let mut forward = if input.forward {
        1.0
    } else if input.backward {
        -1.0
    } else {
        0.0
    };
    let right = if input.right {
        1.0
    } else if input.left {
        -1.0
    } else {
        0.0
    };
    let mut brake = 0.0;
    let mut handbrake = 0.0;

    if *previous_forward * forward < 0.0 {
        let opposing = (forward > 0.0 && longitudinal_velocity < -REVERSAL_SPEED_THRESHOLD)
            || (forward < 0.0 && longitudinal_velocity > REVERSAL_SPEED_THRESHOLD);
        if opposing {
            forward = 0.0;
            brake = 1.0;
        } else {
            *previous_forward = forward;
        }
    } else if forward != 0.0 {
        *previous_forward = forward;
    }

    if input.handbrake {
        forward = 0.0;
        handbrake = 1.0;
    }

    if !input.modifier && forward > 0.0 {
        forward *= UNBOOSTED_FORWARD_SCALE;
    }

    DriveCommand {
        forward,
        right,
        brake,
        handbrake,
    }
}
