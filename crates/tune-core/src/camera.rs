//! Marble-following camera.
//!
//! The camera itself belongs to the renderer; the rig only decides where it
//! should be. While locked it eases toward a fixed front-view offset from the
//! followed marble.

use glam::Vec3;

use crate::model::EntityId;

/// Offset of the locked camera from the marble.
pub const FOLLOW_OFFSET: Vec3 = Vec3::new(0.0, 10.0, 40.0);
/// Fraction of the remaining distance covered per frame.
pub const FOLLOW_LERP: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 20.0, 100.0),
            look_at: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CameraRig {
    pose: CameraPose,
    following: Option<EntityId>,
    saved: Option<CameraPose>,
}

impl CameraRig {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            pose,
            following: None,
            saved: None,
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Moves the free camera. Ignored while locked.
    pub fn set_pose(&mut self, pose: CameraPose) {
        if self.following.is_none() {
            self.pose = pose;
        }
    }

    pub fn following(&self) -> Option<EntityId> {
        self.following
    }

    /// Locks onto a marble, remembering the free pose.
    pub fn lock(&mut self, marble: EntityId, marble_position: Vec3) {
        if self.following.is_none() {
            self.saved = Some(self.pose);
        }
        self.following = Some(marble);
        self.pose = CameraPose {
            position: marble_position + FOLLOW_OFFSET,
            look_at: marble_position,
        };
    }

    /// Releases the lock and restores the free pose.
    pub fn unlock(&mut self) {
        self.following = None;
        if let Some(pose) = self.saved.take() {
            self.pose = pose;
        }
    }

    /// Unlocks if `entity` is the followed marble. Returns whether it was.
    pub fn release(&mut self, entity: EntityId) -> bool {
        if self.following == Some(entity) {
            self.unlock();
            true
        } else {
            false
        }
    }

    /// Eases toward the followed marble; call once per frame.
    pub fn follow(&mut self, marble_position: Vec3) {
        if self.following.is_none() {
            return;
        }
        let goal = marble_position + FOLLOW_OFFSET;
        self.pose.position = self.pose.position.lerp(goal, FOLLOW_LERP);
        self.pose.look_at = self.pose.look_at.lerp(marble_position, FOLLOW_LERP);
    }
}
