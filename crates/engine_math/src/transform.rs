//! Hierarchical 3D transform component.
//!
//! [`Transform`] holds a *local* position/rotation/scale, which is what
//! clients edit, and a *global* one, which is derived from the local part and
//! the parent's global part by the transform system. Globals are only
//! meaningful after a propagation pass.

use engine_component::Component;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and per-axis scale, relative to the parent (local) and
/// to the world (global).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Transform {
    pub local_position: Vec3,
    pub local_rotation: Quat,
    pub local_scale: Vec3,
    /// Derived. Overwritten by propagation.
    pub global_position: Vec3,
    /// Derived. Overwritten by propagation.
    pub global_rotation: Quat,
    /// Derived. Overwritten by propagation.
    pub global_scale: Vec3,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        local_position: Vec3::ZERO,
        local_rotation: Quat::IDENTITY,
        local_scale: Vec3::ONE,
        global_position: Vec3::ZERO,
        global_rotation: Quat::IDENTITY,
        global_scale: Vec3::ONE,
    };

    /// Create a transform with the given local position and identity
    /// rotation/scale.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            local_position: position,
            ..Self::IDENTITY
        }
    }

    /// Create a transform with local position and rotation.
    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            local_position: position,
            local_rotation: rotation,
            ..Self::IDENTITY
        }
    }

    /// Translate the local position by the given offset.
    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.local_position += offset;
        self
    }

    /// Rotate the local rotation by the given quaternion.
    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.local_rotation = rotation * self.local_rotation;
        self
    }

    /// Apply a uniform scale factor to the local scale.
    #[must_use]
    pub fn scaled(mut self, factor: f32) -> Self {
        self.local_scale *= factor;
        self
    }

    /// Recompute the global part from the local part and the parent's
    /// global part. Without a parent, global equals local.
    pub fn propagate(&mut self, parent: Option<&Transform>) {
        match parent {
            None => {
                self.global_position = self.local_position;
                self.global_rotation = self.local_rotation;
                self.global_scale = self.local_scale;
            }
            Some(parent) => {
                self.global_position =
                    parent.global_rotation * self.local_position + parent.global_position;
                self.global_scale = parent.global_scale * self.local_scale;
                self.global_rotation = parent.global_rotation * self.local_rotation;
            }
        }
    }

    /// The 4×4 world matrix built from the global part.
    #[must_use]
    pub fn global_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.global_scale,
            self.global_rotation,
            self.global_position,
        )
    }

    /// The 4×4 parent-relative matrix built from the local part.
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.local_scale,
            self.local_rotation,
            self.local_position,
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }
}
