//! Graph nodes

use smallvec::SmallVec;

use super::NodeHandle;
use crate::track::SkeletalAnimationTrack;

/// Weighted children of a blend node
///
/// Weights are not normalized.
pub type BlendChildren = SmallVec<[(NodeHandle, f32); 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Leaf sampling one track
    Anim(SkeletalAnimationTrack),
    /// Distributes `weight * child_weight` to each child
    Blend(BlendChildren),
}

impl Node {
    pub fn track(&self) -> Option<&SkeletalAnimationTrack> {
        match self {
            Node::Anim(track) => Some(track),
            Node::Blend(_) => None,
        }
    }

    pub fn children(&self) -> &[(NodeHandle, f32)] {
        match self {
            Node::Anim(_) => &[],
            Node::Blend(children) => children,
        }
    }
}
