//! Tests for graph construction and validation

use super::*;
use crate::track::{PlaybackMode, SkeletalAnimationTrack};

fn leaf(name: &str) -> SkeletalAnimationTrack {
    SkeletalAnimationTrack::new(name).with_mode(PlaybackMode::Wrap)
}

#[test]
fn test_layers_by_name() {
    let mut machine = AnimationBlendMachine::new();
    let base = machine.add_layer("base");
    let upper = machine.add_layer("upper_body");

    assert_eq!(machine.layers_count(), 2);
    assert_eq!(machine.find_layer("upper_body"), Some(upper));
    assert_eq!(machine.find_layer("base"), Some(base));
    assert_eq!(machine.find_layer("face"), None);
    assert_eq!(machine.layer(upper).unwrap().name(), "upper_body");
}

#[test]
fn test_invalid_layer_handle() {
    let mut machine = AnimationBlendMachine::new();
    assert_eq!(
        machine.layer_mut(LayerHandle(3)).unwrap_err(),
        AnimError::InvalidLayer { index: 3 }
    );
}

#[test]
fn test_states_and_transitions() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();

    let idle_node = layer.add_node(leaf("idle"));
    let walk_node = layer.add_node(leaf("walk"));
    let idle = layer.add_state("idle", idle_node).unwrap();
    let walk = layer.add_state("walk", walk_node).unwrap();
    layer.add_transition(idle, walk, 0.5, 1.0).unwrap();

    assert_eq!(layer.find_state("walk"), Some(walk));
    assert_eq!(layer.state(walk).unwrap().node(), walk_node);
    assert_eq!(
        layer.transition(idle, walk),
        Some(&Transition {
            time: 0.5,
            sync_factor: 1.0
        })
    );
    // Transitions are directional
    assert_eq!(layer.transition(walk, idle), None);

    // Redefinition replaces
    layer.add_transition(idle, walk, 0.1, 0.0).unwrap();
    assert_eq!(layer.transition(idle, walk).unwrap().time, 0.1);
}

#[test]
fn test_dangling_handles_rejected() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();
    let node = layer.add_node(leaf("idle"));
    let state = layer.add_state("idle", node).unwrap();

    assert_eq!(
        layer.add_state("ghost", NodeHandle(9)),
        Err(AnimError::InvalidNode { index: 9 })
    );
    assert_eq!(
        layer.add_blend_node([(node, 1.0), (NodeHandle(4), 1.0)]),
        Err(AnimError::InvalidNode { index: 4 })
    );
    assert_eq!(
        layer.add_transition(state, StateHandle(2), 0.2, 0.0),
        Err(AnimError::InvalidState { index: 2 })
    );
}

#[test]
fn test_blend_node_children() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();
    let walk = layer.add_node(leaf("walk"));
    let run = layer.add_node(leaf("run"));
    let blend = layer.add_blend_node([(walk, 0.7), (run, 0.3)]).unwrap();

    let node = layer.node(blend).unwrap();
    assert!(node.track().is_none());
    assert_eq!(node.children(), &[(walk, 0.7), (run, 0.3)]);
    assert_eq!(layer.node(walk).unwrap().track().unwrap().animation(), "walk");
}

#[test]
fn test_set_blend_children_rejects_cycles() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();
    let walk = layer.add_node(leaf("walk"));
    let inner = layer.add_blend_node([(walk, 1.0)]).unwrap();
    let outer = layer.add_blend_node([(inner, 1.0)]).unwrap();

    // Direct self reference
    assert_eq!(
        layer.set_blend_children(inner, [(inner, 1.0)]),
        Err(AnimError::CycleDetected { node: inner.0 })
    );
    // Indirect through `outer`
    assert_eq!(
        layer.set_blend_children(inner, [(outer, 1.0)]),
        Err(AnimError::CycleDetected { node: inner.0 })
    );
    // Rejected edits leave the graph unchanged
    assert_eq!(layer.node(inner).unwrap().children(), &[(walk, 1.0)]);
    assert!(machine.validate().is_ok());
}

#[test]
fn test_set_blend_children_on_leaf_rejected() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();
    let walk = layer.add_node(leaf("walk"));
    let run = layer.add_node(leaf("run"));
    assert_eq!(
        layer.set_blend_children(walk, [(run, 1.0)]),
        Err(AnimError::InvalidNode { index: walk.0 })
    );
}

#[test]
fn test_set_blend_children_diamond_is_allowed() {
    let mut machine = AnimationBlendMachine::new();
    let layer = machine.add_layer("base");
    let layer = machine.layer_mut(layer).unwrap();
    let walk = layer.add_node(leaf("walk"));
    let a = layer.add_blend_node([(walk, 1.0)]).unwrap();
    let b = layer.add_blend_node([(walk, 1.0)]).unwrap();
    let top = layer.add_blend_node([]).unwrap();

    layer.set_blend_children(top, [(a, 0.5), (b, 0.5)]).unwrap();
    assert!(machine.validate().is_ok());
}

#[test]
fn test_validate_detects_cycle() {
    // Build a cycle behind the builder's back
    let mut machine = AnimationBlendMachine::new();
    let handle = machine.add_layer("base");
    let layer = machine.layer_mut(handle).unwrap();
    let walk = layer.add_node(leaf("walk"));
    let a = layer.add_blend_node([(walk, 1.0)]).unwrap();
    let b = layer.add_blend_node([(a, 1.0)]).unwrap();
    layer.nodes[a.index()] = Node::Blend([(b, 1.0)].into_iter().collect());

    assert!(matches!(
        machine.validate(),
        Err(AnimError::CycleDetected { .. })
    ));
}
