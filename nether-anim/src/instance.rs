//! Per-object animation state


use std::sync::Arc;

use hashbrown::HashSet;

use crate::config::AnimationConfig;
use crate::layer_data::{LayerData, NodeSampler};
use crate::machine::{AnimationBlendMachine, Layer, StateHandle};
use crate::pose::SkeletonPose;
use crate::skeleton::Skeleton;

/// Weight every layer is applied at
///
/// Layers are not weighted against each other; later layers add into the
/// same accumulators and the result is normalized by the total.
const LAYER_WEIGHT: f32 = 1.0;

/// Playback state of one animated object over a shared machine
pub struct AnimationInstance {
    machine: Arc<AnimationBlendMachine>,
    config: AnimationConfig,
    skeleton: Option<Arc<Skeleton>>,
    layers: Vec<LayerData>,
    /// Per layer, per node: resolved clip index on the bound skeleton
    resolved: Vec<Vec<Option<usize>>>,
}

impl AnimationInstance {
    pub fn new(machine: Arc<AnimationBlendMachine>, config: AnimationConfig) -> Self {
        let layers = vec![LayerData::new(); machine.layers_count()];
        let resolved = machine
            .layers()
            .iter()
            .map(|layer| vec![None; layer.nodes().len()])
            .collect();
        Self {
            machine,
            config,
            skeleton: None,
            layers,
            resolved,
        }
    }

    pub fn machine(&self) -> &Arc<AnimationBlendMachine> {
        &self.machine
    }

    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }

    /// Bind (or unbind) the skeleton clips are sampled from
    ///
    /// Track names are resolved here once. Names the skeleton does not have
    /// are logged and sample nothing.
    pub fn set_skeleton(&mut self, skeleton: Option<Arc<Skeleton>>) {
        self.resolved = match &skeleton {
            Some(skeleton) => {
                let mut missing = HashSet::new();
                let resolved = self
                    .machine
                    .layers()
                    .iter()
                    .map(|layer| {
                        let resolved = NodeSampler::resolve(layer, skeleton);
                        for (node, clip) in layer.nodes().iter().zip(&resolved) {
                            if let Some(track) = node.track()
                                && clip.is_none()
                                && missing.insert(track.animation().to_string())
                            {
                                tracing::warn!(
                                    "Animation '{}' not found on skeleton ({} clips)",
                                    track.animation(),
                                    skeleton.animations().len()
                                );
                            }
                        }
                        resolved
                    })
                    .collect();
                tracing::debug!(
                    "Bound skeleton: {} joints, {} clips, {} unresolved tracks",
                    skeleton.joints_count(),
                    skeleton.animations().len(),
                    missing.len()
                );
                resolved
            }
            None => self
                .machine
                .layers()
                .iter()
                .map(|layer| vec![None; layer.nodes().len()])
                .collect(),
        };
        self.skeleton = skeleton;
    }

    /// Advance every layer and compose `pose`
    ///
    /// Without a skeleton the pose is left untouched.
    pub fn update(&mut self, time_step: f32, pose: &mut SkeletonPose) {
        let Some(skeleton) = self.skeleton.as_deref() else {
            return;
        };

        pose.reset(skeleton.joints_count());
        for ((layer, data), resolved) in self
            .machine
            .layers()
            .iter()
            .zip(&mut self.layers)
            .zip(&self.resolved)
        {
            let sampler = NodeSampler::new(skeleton, resolved);
            data.update(layer, &sampler, time_step, LAYER_WEIGHT, pose);
        }
        pose.finalize(skeleton);
        pose.update_absolute_transforms(skeleton);
    }

    /// Jump a layer to `state`; false if either is out of range
    pub fn set_layer_state(&mut self, layer: usize, state: StateHandle) -> bool {
        let Some((_, data)) = self.request_layer(layer, state) else {
            return false;
        };
        data.set_state(state);
        true
    }

    /// Transition a layer to `state`; false if either is out of range
    pub fn change_layer_state(&mut self, layer: usize, state: StateHandle) -> bool {
        let default_transition_time = self.config.default_transition_time;
        let Some((layer_def, data)) = self.request_layer(layer, state) else {
            return false;
        };
        data.change_state(layer_def, state, default_transition_time);
        true
    }

    pub fn set_layer_state_by_name(&mut self, layer: &str, state: &str) -> bool {
        match self.lookup(layer, state) {
            Some((layer, state)) => self.set_layer_state(layer, state),
            None => false,
        }
    }

    pub fn change_layer_state_by_name(&mut self, layer: &str, state: &str) -> bool {
        match self.lookup(layer, state) {
            Some((layer, state)) => self.change_layer_state(layer, state),
            None => false,
        }
    }

    pub fn layer_data(&self, layer: usize) -> Option<&LayerData> {
        self.layers.get(layer)
    }

    pub fn layers_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer definition and playback data for a state request
    ///
    /// Out-of-range requests are logged and yield `None`.
    fn request_layer(&mut self, layer: usize, state: StateHandle) -> Option<(&Layer, &mut LayerData)> {
        let layers_count = self.layers.len();
        let (Some(layer_def), Some(data)) = (self.machine.layers().get(layer), self.layers.get_mut(layer)) else {
            tracing::warn!("Layer {} out of range ({} layers)", layer, layers_count);
            return None;
        };
        if layer_def.state(state).is_none() {
            tracing::warn!(
                "State {} out of range on layer '{}' ({} states)",
                state.index(),
                layer_def.name(),
                layer_def.states().len()
            );
            return None;
        }
        Some((layer_def, data))
    }

    fn lookup(&self, layer: &str, state: &str) -> Option<(usize, StateHandle)> {
        let Some(handle) = self.machine.find_layer(layer) else {
            tracing::warn!("Layer '{}' not found", layer);
            return None;
        };
        let found = self
            .machine
            .layer(handle)
            .and_then(|layer_def| layer_def.find_state(state));
        let Some(state_handle) = found else {
            tracing::warn!("State '{}' not found on layer '{}'", state, layer);
            return None;
        };
        Some((handle.index(), state_handle))
    }
}
