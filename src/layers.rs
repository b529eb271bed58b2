//! Collision layer table.
//!
//! The scene uses exactly two broad-phase layers, fixed at world creation:
//! - `NonMoving`: static geometry. Never tested against other non-moving
//!   colliders.
//! - `Moving`: everything that can move. Collides with both layers.
//!
//! The pair rules therefore are:
//! - NonMoving vs NonMoving: never collide.
//! - NonMoving vs Moving: collide.
//! - Moving vs Moving: collide.
//!
//! Rapier expresses this through `InteractionGroups` (membership bits +
//! filter bits); a pair is tested when each side's filter accepts the
//! other's membership. Scene queries (rays, shape casts, character moves)
//! run "as a layer": they use the same groups a collider on that layer
//! would carry, so a Moving-layer query sees everything a moving object
//! would hit.

use rapier3d::prelude::{Group, InteractionGroups, InteractionTestMode, QueryFilter};

const NON_MOVING_GROUP: Group = Group::GROUP_1;
const MOVING_GROUP: Group = Group::GROUP_2;

/// Broad-phase layer tag assigned to every collider in the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    /// Static geometry; only tested against moving colliders.
    NonMoving,
    /// Movable objects; tested against everything.
    Moving,
}

impl Layer {
    /// Membership bits for a collider on this layer.
    #[inline]
    pub fn memberships(self) -> Group {
        match self {
            Layer::NonMoving => NON_MOVING_GROUP,
            Layer::Moving => MOVING_GROUP,
        }
    }

    /// Filter bits: the set of layers this layer collides with.
    #[inline]
    pub fn collides_with(self) -> Group {
        match self {
            // Static geometry never needs to be tested against itself.
            Layer::NonMoving => MOVING_GROUP,
            Layer::Moving => NON_MOVING_GROUP | MOVING_GROUP,
        }
    }

    /// Interaction groups to attach to a collider on this layer.
    #[inline]
    pub fn collision_groups(self) -> InteractionGroups {
        InteractionGroups::new(
            self.memberships(),
            self.collides_with(),
            InteractionTestMode::And,
        )
    }

    /// Query filter for scene queries performed "as" this layer.
    #[inline]
    pub fn query_filter(self) -> QueryFilter<'static> {
        QueryFilter::default().groups(self.collision_groups())
    }
}
