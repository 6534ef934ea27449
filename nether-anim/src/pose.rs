//! Skeleton pose accumulation
//!
//! A pose is built in three steps per tick: [`SkeletonPose::reset`],
//! any number of weighted [`SkeletonPose::accumulate`] calls, then
//! [`SkeletonPose::finalize`]. [`SkeletonPose::update_absolute_transforms`]
//! then walks the hierarchy for skinning.

use crate::math::{Aabb, BoneMatrix3x4};
use crate::skeleton::Skeleton;

#[derive(Debug, Clone, Default)]
pub struct SkeletonPose {
    relative: Vec<BoneMatrix3x4>,
    weights: Vec<f32>,
    /// `joints + 1` entries; entry 0 is the implicit root parent
    absolute: Vec<BoneMatrix3x4>,
    bounds: Option<Aabb>,
    final_bounds: Aabb,
}

impl SkeletonPose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the accumulators for `joints_count` joints
    pub fn reset(&mut self, joints_count: usize) {
        self.relative.clear();
        self.relative.resize(joints_count, BoneMatrix3x4::ZERO);
        self.weights.clear();
        self.weights.resize(joints_count, 0.0);
        self.bounds = None;
    }

    /// Add `matrix * weight` to a joint's accumulator
    pub fn accumulate(&mut self, joint: usize, matrix: &BoneMatrix3x4, weight: f32) {
        if let (Some(relative), Some(sum)) = (self.relative.get_mut(joint), self.weights.get_mut(joint)) {
            relative.add_scaled(matrix, weight);
            *sum += weight;
        }
    }

    /// Grow the pose bounds by one sampled box
    pub fn add_bounds(&mut self, bounds: &Aabb) {
        self.bounds = Some(match &self.bounds {
            Some(current) => current.union(bounds),
            None => *bounds,
        });
    }

    /// Normalize accumulated joints and resolve bounds
    ///
    /// Joints without any contribution take the bind pose. With no sampled
    /// bounds the skeleton's bind bounds are used.
    pub fn finalize(&mut self, skeleton: &Skeleton) {
        let bind = skeleton.bind_matrices();
        for (joint, (relative, sum)) in self.relative.iter_mut().zip(&self.weights).enumerate() {
            if *sum > 0.0 {
                relative.scale_by(1.0 / *sum);
            } else {
                *relative = bind.get(joint).copied().unwrap_or(BoneMatrix3x4::IDENTITY);
            }
        }

        self.final_bounds = self.bounds.unwrap_or(*skeleton.bounds());
    }

    /// Compose relative transforms down the hierarchy
    pub fn update_absolute_transforms(&mut self, skeleton: &Skeleton) {
        self.absolute.clear();
        self.absolute.reserve(self.relative.len() + 1);
        self.absolute.push(BoneMatrix3x4::IDENTITY);

        for (joint, relative) in self.relative.iter().enumerate() {
            // Parents precede children, so the parent entry is already final
            let parent_entry = skeleton
                .joints()
                .get(joint)
                .and_then(|j| j.parent)
                .map_or(0, |parent| parent + 1);
            let absolute = self.absolute[parent_entry].mul_affine(relative);
            self.absolute.push(absolute);
        }
    }

    pub fn joints_count(&self) -> usize {
        self.relative.len()
    }

    /// Local joint transforms (valid after [`Self::finalize`])
    pub fn relative_transforms(&self) -> &[BoneMatrix3x4] {
        &self.relative
    }

    /// Accumulated weight per joint
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Model-space transforms, offset by one (entry 0 is identity)
    pub fn absolute_transforms(&self) -> &[BoneMatrix3x4] {
        &self.absolute
    }

    pub fn bounds(&self) -> &Aabb {
        &self.final_bounds
    }

    /// Whether any sampled animation contributed bounds this tick
    pub fn has_sampled_bounds(&self) -> bool {
        self.bounds.is_some()
    }
}
