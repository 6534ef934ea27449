//! Sampling one clip into a pose

use crate::frame::FrameLocation;
use crate::pose::SkeletonPose;
use crate::skeleton::SkeletalAnimation;

/// Below this blend factor the first frame is used as-is
const MIN_INTERPOLATION_BLEND: f32 = 0.0001;

/// Sample every channel of `animation` at `location` and accumulate it into
/// `pose` with `weight`
///
/// Also adds the sampled frames' bounds to the pose.
pub fn calculate_joint_transforms(
    animation: &SkeletalAnimation,
    location: FrameLocation,
    weight: f32,
    pose: &mut SkeletonPose,
) {
    let interpolate =
        location.blend >= MIN_INTERPOLATION_BLEND && location.frame != location.next_frame;

    for channel in animation.channels() {
        let Some(first) = channel.frames.get(location.frame) else {
            continue;
        };
        let transform = match channel.frames.get(location.next_frame) {
            Some(second) if interpolate => first.interpolate(second, location.blend),
            _ => *first,
        };
        pose.accumulate(channel.joint, &transform.to_matrix(), weight);
    }

    if let Some(bounds) = animation.frame_bounds(location.frame) {
        pose.add_bounds(bounds);
    }
    if interpolate && let Some(bounds) = animation.frame_bounds(location.next_frame) {
        pose.add_bounds(bounds);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::math::Aabb;
    use crate::skeleton::JointTransform;

    fn slide() -> SkeletalAnimation {
        SkeletalAnimation::new("slide", 3, 2.0)
            .with_channel(
                0,
                vec![
                    JointTransform::from_position(Vec3::ZERO),
                    JointTransform::from_position(Vec3::new(2.0, 0.0, 0.0)),
                    JointTransform::from_position(Vec3::new(4.0, 0.0, 0.0)),
                ],
            )
            .with_bounds(vec![
                Aabb::new(Vec3::ZERO, Vec3::ONE),
                Aabb::new(Vec3::ZERO, Vec3::splat(2.0)),
                Aabb::new(Vec3::ZERO, Vec3::splat(3.0)),
            ])
    }

    #[test]
    fn test_interpolates_between_frames() {
        let mut pose = SkeletonPose::new();
        pose.reset(1);
        let location = FrameLocation {
            frame: 0,
            next_frame: 1,
            blend: 0.25,
        };
        calculate_joint_transforms(&slide(), location, 2.0, &mut pose);

        assert_eq!(pose.weights(), &[2.0]);
        // Accumulator holds matrix * weight
        let m = pose.relative_transforms()[0];
        assert!(m.translation().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_tiny_blend_uses_first_frame() {
        let mut pose = SkeletonPose::new();
        pose.reset(1);
        let location = FrameLocation {
            frame: 1,
            next_frame: 2,
            blend: 0.00005,
        };
        calculate_joint_transforms(&slide(), location, 1.0, &mut pose);
        assert_eq!(
            pose.relative_transforms()[0].translation(),
            Vec3::new(2.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_bounds_cover_sampled_frames() {
        let animation = slide();
        let mut pose = SkeletonPose::new();
        pose.reset(1);
        calculate_joint_transforms(
            &animation,
            FrameLocation {
                frame: 1,
                next_frame: 2,
                blend: 0.5,
            },
            1.0,
            &mut pose,
        );
        assert!(pose.has_sampled_bounds());

        // Held frame only contributes its own bounds
        let mut held = SkeletonPose::new();
        held.reset(1);
        calculate_joint_transforms(
            &animation,
            FrameLocation {
                frame: 0,
                next_frame: 0,
                blend: 0.0,
            },
            1.0,
            &mut held,
        );
        let skeleton = crate::test_support::single_joint_skeleton();
        held.finalize(&skeleton);
        assert_eq!(held.bounds(), &Aabb::new(Vec3::ZERO, Vec3::ONE));

        pose.finalize(&skeleton);
        assert_eq!(pose.bounds(), &Aabb::new(Vec3::ZERO, Vec3::splat(3.0)));
    }

    #[test]
    fn test_channels_for_unknown_joints_are_skipped() {
        let animation = SkeletalAnimation::new("stray", 1, 1.0)
            .with_channel(7, vec![JointTransform::IDENTITY]);
        let mut pose = SkeletonPose::new();
        pose.reset(1);
        calculate_joint_transforms(&animation, FrameLocation::default(), 1.0, &mut pose);
        assert_eq!(pose.weights(), &[0.0]);
    }
}
