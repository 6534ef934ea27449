//! Skeleton and animation clip resources

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::error::{AnimError, Result};
use crate::math::{Aabb, BoneMatrix3x4};

/// Decomposed local joint transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointTransform {
    /// Identity transform (no rotation, no translation, unit scale)
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Lerp position and scale, slerp rotation
    pub fn interpolate(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    pub fn to_matrix(&self) -> BoneMatrix3x4 {
        BoneMatrix3x4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    /// Parent joint index, `None` for roots
    pub parent: Option<usize>,
}

/// Per-frame local transforms of one joint
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    pub joint: usize,
    pub frames: Vec<JointTransform>,
}

/// A sampled animation clip
///
/// Frames are evenly spaced: frame 0 at time 0 and the last frame at
/// `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalAnimation {
    name: String,
    frame_count: usize,
    duration: f32,
    channels: Vec<AnimationChannel>,
    bounds: Vec<Aabb>,
}

impl SkeletalAnimation {
    pub fn new(name: impl Into<String>, frame_count: usize, duration: f32) -> Self {
        Self {
            name: name.into(),
            frame_count,
            duration,
            channels: Vec::new(),
            bounds: Vec::new(),
        }
    }

    /// Add a joint channel
    ///
    /// `frames` must hold `frame_count` transforms.
    pub fn with_channel(mut self, joint: usize, frames: Vec<JointTransform>) -> Self {
        debug_assert_eq!(frames.len(), self.frame_count);
        self.channels.push(AnimationChannel { joint, frames });
        self
    }

    /// Set the per-frame bounding boxes
    pub fn with_bounds(mut self, bounds: Vec<Aabb>) -> Self {
        debug_assert_eq!(bounds.len(), self.frame_count);
        self.bounds = bounds;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    /// Bounds of one frame, if the clip carries bounds
    pub fn frame_bounds(&self, frame: usize) -> Option<&Aabb> {
        self.bounds.get(frame)
    }
}

/// Joint hierarchy, bind pose and the clips authored for it
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: Vec<Joint>,
    bind_pose: Vec<JointTransform>,
    bind_matrices: Vec<BoneMatrix3x4>,
    bounds: Aabb,
    animations: Vec<Arc<SkeletalAnimation>>,
}

impl Skeleton {
    /// `joints` and `bind_pose` are parallel; every parent index must be
    /// smaller than its child's.
    pub fn new(joints: Vec<Joint>, bind_pose: Vec<JointTransform>, bounds: Aabb) -> Result<Self> {
        debug_assert_eq!(joints.len(), bind_pose.len());

        for (index, joint) in joints.iter().enumerate() {
            if let Some(parent) = joint.parent
                && parent >= index
            {
                return Err(AnimError::InvalidJointParent {
                    joint: index,
                    parent,
                });
            }
        }

        let bind_matrices = bind_pose.iter().map(JointTransform::to_matrix).collect();
        Ok(Self {
            joints,
            bind_pose,
            bind_matrices,
            bounds,
            animations: Vec::new(),
        })
    }

    pub fn add_animation(&mut self, animation: SkeletalAnimation) -> usize {
        self.animations.push(Arc::new(animation));
        self.animations.len() - 1
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joints_count(&self) -> usize {
        self.joints.len()
    }

    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|joint| joint.name == name)
    }

    pub fn bind_pose(&self) -> &[JointTransform] {
        &self.bind_pose
    }

    /// Bind pose local transforms as matrices
    pub fn bind_matrices(&self) -> &[BoneMatrix3x4] {
        &self.bind_matrices
    }

    /// Bounds of the bind pose
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn animations(&self) -> &[Arc<SkeletalAnimation>] {
        &self.animations
    }

    pub fn animation(&self, index: usize) -> Option<&Arc<SkeletalAnimation>> {
        self.animations.get(index)
    }

    pub fn find_animation(&self, name: &str) -> Option<usize> {
        self.animations
            .iter()
            .position(|animation| animation.name() == name)
    }
}
