//! Shared fixtures for unit tests

use glam::Vec3;

use crate::machine::AnimationBlendMachine;
use crate::math::Aabb;
use crate::skeleton::{Joint, JointTransform, SkeletalAnimation, Skeleton};
use crate::track::SkeletalAnimationTrack;

pub const ROOT_BIND_POSITION: Vec3 = Vec3::new(0.0, 5.0, 0.0);
pub const CHILD_BIND_POSITION: Vec3 = Vec3::new(0.0, 1.0, 0.0);

pub fn bind_bounds() -> Aabb {
    Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
}

pub fn single_joint_skeleton() -> Skeleton {
    Skeleton::new(
        vec![Joint {
            name: "root".into(),
            parent: None,
        }],
        vec![JointTransform::from_position(ROOT_BIND_POSITION)],
        bind_bounds(),
    )
    .unwrap()
}

/// Two frames holding the root at `position`, bounds around it
fn constant(name: &str, position: Vec3) -> SkeletalAnimation {
    let bounds = Aabb::new(position - Vec3::ONE, position + Vec3::ONE);
    SkeletalAnimation::new(name, 2, 1.0)
        .with_channel(0, vec![JointTransform::from_position(position); 2])
        .with_bounds(vec![bounds; 2])
}

/// Root x goes from 0 to 1 over one second
fn ramp(name: &str) -> SkeletalAnimation {
    SkeletalAnimation::new(name, 2, 1.0).with_channel(
        0,
        vec![
            JointTransform::from_position(Vec3::ZERO),
            JointTransform::from_position(Vec3::X),
        ],
    )
}

/// Root + child; clips only animate the root
///
/// Clips: `left` (root at -X), `right` (root at +X), `ramp`, `ramp_fast`.
pub fn test_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::new(
        vec![
            Joint {
                name: "root".into(),
                parent: None,
            },
            Joint {
                name: "child".into(),
                parent: Some(0),
            },
        ],
        vec![
            JointTransform::from_position(ROOT_BIND_POSITION),
            JointTransform::from_position(CHILD_BIND_POSITION),
        ],
        bind_bounds(),
    )
    .unwrap();
    skeleton.add_animation(constant("left", -Vec3::X));
    skeleton.add_animation(constant("right", Vec3::X));
    skeleton.add_animation(ramp("ramp"));
    skeleton.add_animation(ramp("ramp_fast"));
    skeleton
}

/// One layer `base` with states `left`, `right`, `ramp`, `ramp_fast`,
/// `mix` (0.25 left + 0.75 right) and `missing` (unknown clip)
///
/// `ramp -> ramp_fast` is an explicit 1s transition with sync factor 2.
pub fn test_machine() -> AnimationBlendMachine {
    let mut machine = AnimationBlendMachine::new();
    let handle = machine.add_layer("base");
    let layer = machine.layer_mut(handle).unwrap();

    let left = layer.add_node(SkeletalAnimationTrack::new("left"));
    let right = layer.add_node(SkeletalAnimationTrack::new("right"));
    let ramp = layer.add_node(SkeletalAnimationTrack::new("ramp"));
    let ramp_fast = layer.add_node(SkeletalAnimationTrack::new("ramp_fast"));
    let missing = layer.add_node(SkeletalAnimationTrack::new("nonexistent"));
    let mix = layer.add_blend_node([(left, 0.25), (right, 0.75)]).unwrap();

    layer.add_state("left", left).unwrap();
    layer.add_state("right", right).unwrap();
    let ramp = layer.add_state("ramp", ramp).unwrap();
    let ramp_fast = layer.add_state("ramp_fast", ramp_fast).unwrap();
    layer.add_state("mix", mix).unwrap();
    layer.add_state("missing", missing).unwrap();
    layer.add_transition(ramp, ramp_fast, 1.0, 2.0).unwrap();

    machine
}
