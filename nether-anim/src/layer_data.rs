//! Per-instance playback state of one layer
//!
//! A layer is idle until its first state is set. It is transitioning while
//! the cross-fade clock is behind the transition time and steady once the two
//! match. During a transition both states are sampled and cross-faded.

use crate::frame::locate_frame;
use crate::machine::{Layer, Node, NodeHandle, StateHandle};
use crate::pose::SkeletonPose;
use crate::sampling::calculate_joint_transforms;
use crate::skeleton::Skeleton;

/// Skeleton plus the clip index each node of a layer resolved to
#[derive(Debug, Clone, Copy)]
pub struct NodeSampler<'a> {
    skeleton: &'a Skeleton,
    animations: &'a [Option<usize>],
}

impl<'a> NodeSampler<'a> {
    pub fn new(skeleton: &'a Skeleton, animations: &'a [Option<usize>]) -> Self {
        Self {
            skeleton,
            animations,
        }
    }

    /// Map each node of `layer` to the skeleton clip its track names
    pub fn resolve(layer: &Layer, skeleton: &Skeleton) -> Vec<Option<usize>> {
        layer
            .nodes()
            .iter()
            .map(|node| {
                node.track()
                    .and_then(|track| skeleton.find_animation(track.animation()))
            })
            .collect()
    }

    /// Sample `node` and its subtree into `pose`
    pub fn process_node(
        &self,
        layer: &Layer,
        node: NodeHandle,
        weight: f32,
        position: f32,
        pose: &mut SkeletonPose,
    ) {
        if weight < f32::EPSILON {
            return;
        }

        match layer.node(node) {
            Some(Node::Anim(track)) => {
                let Some(animation) = self
                    .animations
                    .get(node.index())
                    .copied()
                    .flatten()
                    .and_then(|index| self.skeleton.animation(index))
                else {
                    return;
                };
                let location = locate_frame(
                    animation.frame_count(),
                    animation.duration(),
                    track.mode(),
                    track.quantizer(),
                    position,
                );
                calculate_joint_transforms(animation, location, weight, pose);
            }
            Some(Node::Blend(children)) => {
                for &(child, child_weight) in children {
                    self.process_node(layer, child, weight * child_weight, position, pose);
                }
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerData {
    current_state: Option<StateHandle>,
    transition_state: Option<StateHandle>,
    position: f32,
    transition_position: f32,
    cur_transition_time: f32,
    transition_time: f32,
    sync_factor: f32,
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl LayerData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `state` with no blending, restarting playback
    pub fn set_state(&mut self, state: StateHandle) {
        self.current_state = Some(state);
        self.transition_state = Some(state);
        self.position = 0.0;
        self.transition_position = 0.0;
        self.cur_transition_time = 0.0;
        self.transition_time = 0.0;
        self.sync_factor = 0.0;
    }

    /// Start a transition from the current state to `state`
    ///
    /// Uses the layer's explicit transition if one exists, otherwise
    /// `default_transition_time` without synchronization. A zero or negative
    /// transition time switches immediately.
    pub fn change_state(&mut self, layer: &Layer, state: StateHandle, default_transition_time: f32) {
        let Some(current) = self.current_state else {
            self.set_state(state);
            return;
        };
        if self.transition_state == Some(state) {
            return;
        }

        let (time, sync_factor) = match layer.transition(current, state) {
            Some(transition) => (transition.time, transition.sync_factor),
            None => (default_transition_time, 0.0),
        };

        self.transition_state = Some(state);
        self.transition_time = time.max(0.0);
        self.cur_transition_time = 0.0;
        self.sync_factor = sync_factor;
        self.transition_position = if sync_factor != 0.0 {
            self.position * sync_factor
        } else {
            0.0
        };

        if self.transition_time == 0.0 {
            self.current_state = Some(state);
            self.position = self.transition_position;
        }
    }

    /// Advance playback by `time_step` and sample into `pose` at `weight`
    pub fn update(
        &mut self,
        layer: &Layer,
        sampler: &NodeSampler<'_>,
        time_step: f32,
        weight: f32,
        pose: &mut SkeletonPose,
    ) {
        let Some(current) = self.current_state.and_then(|state| layer.state(state)) else {
            return;
        };
        let current_node = current.node();

        if !self.is_transitioning() {
            self.position += time_step;
            sampler.process_node(layer, current_node, weight, self.position, pose);
            return;
        }

        self.cur_transition_time =
            (self.cur_transition_time + time_step).clamp(0.0, self.transition_time);
        let blend = self.transition_blend();

        let (current_step, transition_step) = if self.sync_factor > 0.0 {
            (
                time_step * lerp(1.0, 1.0 / self.sync_factor, blend),
                time_step * lerp(self.sync_factor, 1.0, blend),
            )
        } else {
            (time_step, time_step)
        };
        self.position += current_step;
        self.transition_position += transition_step;

        sampler.process_node(layer, current_node, weight * (1.0 - blend), self.position, pose);
        if let Some(target) = self.transition_state.and_then(|state| layer.state(state)) {
            sampler.process_node(
                layer,
                target.node(),
                weight * blend,
                self.transition_position,
                pose,
            );
        }

        if self.cur_transition_time == self.transition_time {
            self.current_state = self.transition_state;
            self.position = self.transition_position;
        }
    }

    pub fn current_state(&self) -> Option<StateHandle> {
        self.current_state
    }

    pub fn transition_state(&self) -> Option<StateHandle> {
        self.transition_state
    }

    pub fn is_idle(&self) -> bool {
        self.current_state.is_none()
    }

    /// True until the cross-fade clock reaches the transition time
    ///
    /// A transition back to the current state also counts: it fades from the
    /// old playback position to the restarted one.
    pub fn is_transitioning(&self) -> bool {
        self.current_state.is_some() && self.cur_transition_time < self.transition_time
    }

    /// Playback position of the current state, seconds
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Playback position of the incoming state, seconds
    pub fn transition_position(&self) -> f32 {
        self.transition_position
    }

    pub fn transition_time(&self) -> f32 {
        self.transition_time
    }

    pub fn cur_transition_time(&self) -> f32 {
        self.cur_transition_time
    }

    pub fn sync_factor(&self) -> f32 {
        self.sync_factor
    }

    /// Cross-fade factor toward the incoming state, in `[0, 1]`
    pub fn transition_blend(&self) -> f32 {
        if self.transition_time > 0.0 {
            self.cur_transition_time / self.transition_time
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::machine::AnimationBlendMachine;
    use crate::test_support::{self, test_machine};

    struct Fixture {
        machine: AnimationBlendMachine,
        skeleton: Skeleton,
        resolved: Vec<Option<usize>>,
    }

    impl Fixture {
        fn new() -> Self {
            let machine = test_machine();
            let skeleton = test_support::test_skeleton();
            let resolved = NodeSampler::resolve(&machine.layers()[0], &skeleton);
            Self {
                machine,
                skeleton,
                resolved,
            }
        }

        fn layer(&self) -> &Layer {
            &self.machine.layers()[0]
        }

        fn state(&self, name: &str) -> StateHandle {
            self.layer().find_state(name).unwrap()
        }

        /// Step once and return the root joint's translation
        fn step(&self, data: &mut LayerData, time_step: f32) -> Vec3 {
            let mut pose = SkeletonPose::new();
            pose.reset(self.skeleton.joints_count());
            let sampler = NodeSampler::new(&self.skeleton, &self.resolved);
            data.update(self.layer(), &sampler, time_step, 1.0, &mut pose);
            pose.finalize(&self.skeleton);
            pose.relative_transforms()[0].translation()
        }
    }

    #[test]
    fn test_idle_layer_samples_nothing() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        assert!(data.is_idle());

        let root = fixture.step(&mut data, 0.1);
        // Bind pose
        assert_eq!(root, test_support::ROOT_BIND_POSITION);
    }

    #[test]
    fn test_set_state_is_immediate() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        assert!(!data.is_transitioning());
        assert!(fixture.step(&mut data, 0.1).abs_diff_eq(-Vec3::X, 1e-6));
        assert!((data.position() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_first_change_state_acts_as_set_state() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.change_state(fixture.layer(), fixture.state("right"), 0.3);
        assert_eq!(data.current_state(), Some(fixture.state("right")));
        assert!(!data.is_transitioning());
    }

    #[test]
    fn test_change_to_same_target_is_noop() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        data.change_state(fixture.layer(), fixture.state("right"), 0.4);
        fixture.step(&mut data, 0.1);
        let before = data.clone();

        data.change_state(fixture.layer(), fixture.state("right"), 0.4);
        assert_eq!(data, before);
    }

    #[test]
    fn test_transition_weights_and_collapse() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        data.change_state(fixture.layer(), fixture.state("right"), 0.4);
        assert!(data.is_transitioning());

        // Quarter of the way: 0.75 * left + 0.25 * right
        let root = fixture.step(&mut data, 0.1);
        assert!(root.abs_diff_eq(Vec3::new(-0.5, 0.0, 0.0), 1e-5));
        assert!((data.transition_blend() - 0.25).abs() < 1e-6);

        fixture.step(&mut data, 0.2);
        assert!(data.is_transitioning());

        // Overshooting clamps and completes the transition
        let root = fixture.step(&mut data, 0.5);
        assert!(root.abs_diff_eq(Vec3::X, 1e-5));
        assert!(!data.is_transitioning());
        assert_eq!(data.current_state(), Some(fixture.state("right")));
        assert!((data.position() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_explicit_transition_overrides_default() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("ramp"));
        data.change_state(fixture.layer(), fixture.state("ramp_fast"), 0.3);
        assert_eq!(data.transition_time(), 1.0);
        assert_eq!(data.sync_factor(), 2.0);
    }

    #[test]
    fn test_sync_seeds_incoming_position() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("ramp"));
        fixture.step(&mut data, 0.25);

        data.change_state(fixture.layer(), fixture.state("ramp_fast"), 0.3);
        assert!((data.transition_position() - 0.5).abs() < 1e-6);
        assert_eq!(data.cur_transition_time(), 0.0);
    }

    #[test]
    fn test_sync_scales_time_steps() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("ramp"));
        data.change_state(fixture.layer(), fixture.state("ramp_fast"), 0.3);

        // Transition time 1.0, sync 2.0; after 0.5s blend is 0.5
        fixture.step(&mut data, 0.5);
        // Outgoing: 0.5 * lerp(1, 0.5, 0.5) = 0.375
        assert!((data.position() - 0.375).abs() < 1e-6);
        // Incoming: 0.5 * lerp(2, 1, 0.5) = 0.75
        assert!((data.transition_position() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_unsynced_transition_starts_at_zero() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        fixture.step(&mut data, 0.7);
        data.change_state(fixture.layer(), fixture.state("right"), 0.3);
        assert_eq!(data.transition_position(), 0.0);
        assert_eq!(data.transition_time(), 0.3);
    }

    #[test]
    fn test_retarget_mid_transition_restarts() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        data.change_state(fixture.layer(), fixture.state("right"), 0.4);
        fixture.step(&mut data, 0.2);

        data.change_state(fixture.layer(), fixture.state("mix"), 0.4);
        assert_eq!(data.current_state(), Some(fixture.state("left")));
        assert_eq!(data.transition_state(), Some(fixture.state("mix")));
        assert_eq!(data.cur_transition_time(), 0.0);
    }

    #[test]
    fn test_change_back_to_current_fades_and_collapses() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        let left = fixture.state("left");
        data.set_state(left);
        fixture.step(&mut data, 0.3);
        data.change_state(fixture.layer(), fixture.state("right"), 0.4);
        fixture.step(&mut data, 0.2);

        data.change_state(fixture.layer(), left, 0.4);
        assert_eq!(data.current_state(), Some(left));
        assert_eq!(data.transition_state(), Some(left));
        assert_eq!(data.cur_transition_time(), 0.0);
        assert_eq!(data.transition_time(), 0.4);
        assert!(data.is_transitioning());

        // Both sides sample `left`, so the root stays put
        let root = fixture.step(&mut data, 0.01);
        assert!(root.abs_diff_eq(-Vec3::X, 1e-5));
        assert!(data.is_transitioning());
        assert!(data.cur_transition_time() < data.transition_time());
        // Outgoing side keeps its clock, incoming side restarted
        assert!((data.position() - 0.51).abs() < 1e-5);
        assert!((data.transition_position() - 0.01).abs() < 1e-6);

        let root = fixture.step(&mut data, 0.5);
        assert!(root.abs_diff_eq(-Vec3::X, 1e-5));
        assert!(!data.is_transitioning());
        assert_eq!(data.cur_transition_time(), data.transition_time());
        assert!((data.position() - 0.51).abs() < 1e-5);
    }

    #[test]
    fn test_steady_layer_is_never_mid_fade() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        let sequence = [("right", 0.15), ("left", 0.1), ("mix", 0.3), ("mix", 0.4), ("right", 0.05)];
        for (name, step) in sequence {
            data.change_state(fixture.layer(), fixture.state(name), 0.3);
            fixture.step(&mut data, step);
            assert_eq!(
                data.is_transitioning(),
                data.cur_transition_time() < data.transition_time()
            );
            if !data.is_transitioning() {
                assert_eq!(data.current_state(), data.transition_state());
            }
        }
    }

    #[test]
    fn test_zero_time_transition_switches_immediately() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("left"));
        data.change_state(fixture.layer(), fixture.state("right"), 0.0);
        assert!(!data.is_transitioning());
        assert!(fixture.step(&mut data, 0.1).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_blend_node_distributes_weight() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("mix"));
        // 0.25 * left + 0.75 * right
        let root = fixture.step(&mut data, 0.1);
        assert!(root.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_zero_weight_subtree_is_pruned() {
        let fixture = Fixture::new();
        let sampler = NodeSampler::new(&fixture.skeleton, &fixture.resolved);
        let mut pose = SkeletonPose::new();
        pose.reset(fixture.skeleton.joints_count());

        let mix = fixture.layer().state(fixture.state("mix")).unwrap().node();
        sampler.process_node(fixture.layer(), mix, 0.0, 0.0, &mut pose);
        sampler.process_node(fixture.layer(), mix, -1.0, 0.0, &mut pose);
        assert!(pose.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_unresolved_track_contributes_nothing() {
        let fixture = Fixture::new();
        let mut data = LayerData::new();
        data.set_state(fixture.state("missing"));
        assert_eq!(fixture.step(&mut data, 0.1), test_support::ROOT_BIND_POSITION);
    }
}
