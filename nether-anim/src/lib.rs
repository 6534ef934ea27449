//! Skeletal animation blending
//!
//! An [`AnimationBlendMachine`] describes, per layer, a graph of nodes
//! (animation leaves and weighted blends), named states pointing at nodes,
//! and timed transitions between states. The machine is shared; each animated
//! object owns an [`AnimationInstance`] holding its per-layer playback state
//! ([`LayerData`]) and composes a [`SkeletonPose`] once per tick.
//!
//! Pose composition accumulates weighted joint matrices from every sampled
//! animation, then normalizes by the weight sum. Joints nothing contributed to
//! fall back to the skeleton's bind pose.

pub mod config;
pub mod error;
pub mod frame;
pub mod instance;
pub mod layer_data;
pub mod machine;
pub mod math;
pub mod pose;
pub mod sampling;
pub mod skeleton;
pub mod track;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::AnimationConfig;
pub use error::{AnimError, Result};
pub use frame::{FrameLocation, locate_frame, quantize};
pub use instance::AnimationInstance;
pub use layer_data::{LayerData, NodeSampler};
pub use machine::{
    AnimationBlendMachine, BlendChildren, Layer, LayerHandle, Node, NodeHandle, State,
    StateHandle, Transition,
};
pub use math::{Aabb, BoneMatrix3x4};
pub use pose::SkeletonPose;
pub use sampling::calculate_joint_transforms;
pub use skeleton::{AnimationChannel, Joint, JointTransform, SkeletalAnimation, Skeleton};
pub use track::{PlaybackMode, SkeletalAnimationTrack};
