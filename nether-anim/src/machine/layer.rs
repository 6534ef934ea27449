//! Layer graph: nodes, states and transitions

use hashbrown::HashMap;

use super::node::{BlendChildren, Node};
use super::{NodeHandle, StateHandle};
use crate::error::{AnimError, Result};
use crate::track::SkeletalAnimationTrack;

/// A named entry point into the node graph
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    name: String,
    node: NodeHandle,
}

impl State {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeHandle {
        self.node
    }
}

/// Explicit transition timing between two states
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Blend duration in seconds
    pub time: f32,
    /// Phase ratio between the incoming and outgoing clips (0 = unsynchronized)
    pub sync_factor: f32,
}

#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    pub(super) nodes: Vec<Node>,
    states: Vec<State>,
    transitions: HashMap<u64, Transition>,
}

fn transition_key(from: StateHandle, to: StateHandle) -> u64 {
    (u64::from(from.0) << 32) | u64::from(to.0)
}

impl Layer {
    pub(super) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            states: Vec::new(),
            transitions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an animation leaf
    pub fn add_node(&mut self, track: SkeletalAnimationTrack) -> NodeHandle {
        self.push_node(Node::Anim(track))
    }

    /// Add a blend node over existing nodes
    pub fn add_blend_node(
        &mut self,
        children: impl IntoIterator<Item = (NodeHandle, f32)>,
    ) -> Result<NodeHandle> {
        let children: BlendChildren = children.into_iter().collect();
        self.check_nodes(&children)?;
        Ok(self.push_node(Node::Blend(children)))
    }

    /// Replace a blend node's children
    ///
    /// Rejected if `node` is not a blend node or if the new children would
    /// make `node` reachable from itself.
    pub fn set_blend_children(
        &mut self,
        node: NodeHandle,
        children: impl IntoIterator<Item = (NodeHandle, f32)>,
    ) -> Result<()> {
        let children: BlendChildren = children.into_iter().collect();
        self.check_nodes(&children)?;

        if !matches!(self.nodes.get(node.index()), Some(Node::Blend(_))) {
            return Err(AnimError::InvalidNode { index: node.0 });
        }
        if self.reaches(&children, node) {
            return Err(AnimError::CycleDetected { node: node.0 });
        }

        self.nodes[node.index()] = Node::Blend(children);
        Ok(())
    }

    pub fn add_state(&mut self, name: impl Into<String>, node: NodeHandle) -> Result<StateHandle> {
        if node.index() >= self.nodes.len() {
            return Err(AnimError::InvalidNode { index: node.0 });
        }
        self.states.push(State {
            name: name.into(),
            node,
        });
        Ok(StateHandle((self.states.len() - 1) as u32))
    }

    pub fn find_state(&self, name: &str) -> Option<StateHandle> {
        self.states
            .iter()
            .position(|state| state.name == name)
            .map(|index| StateHandle(index as u32))
    }

    /// Define the timing for `from -> to`, replacing any previous definition
    pub fn add_transition(
        &mut self,
        from: StateHandle,
        to: StateHandle,
        time: f32,
        sync_factor: f32,
    ) -> Result<()> {
        for state in [from, to] {
            if state.index() >= self.states.len() {
                return Err(AnimError::InvalidState { index: state.0 });
            }
        }
        self.transitions
            .insert(transition_key(from, to), Transition { time, sync_factor });
        Ok(())
    }

    pub fn transition(&self, from: StateHandle, to: StateHandle) -> Option<&Transition> {
        self.transitions.get(&transition_key(from, to))
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn state(&self, handle: StateHandle) -> Option<&State> {
        self.states.get(handle.index())
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Check handles and acyclicity of the whole layer
    pub fn validate(&self) -> Result<()> {
        for node in &self.nodes {
            self.check_nodes(node.children())?;
        }
        for state in &self.states {
            if state.node.index() >= self.nodes.len() {
                return Err(AnimError::InvalidNode {
                    index: state.node.0,
                });
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        // Iterative DFS, (node, next child) frames
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            let mut stack = vec![(root, 0usize)];

            while let Some((current, child)) = stack.last_mut() {
                let children = self.nodes[*current].children();
                if *child == children.len() {
                    marks[*current] = Mark::Done;
                    stack.pop();
                    continue;
                }
                let next = children[*child].0.index();
                *child += 1;

                match marks[next] {
                    Mark::InProgress => {
                        return Err(AnimError::CycleDetected { node: next as u32 });
                    }
                    Mark::Unvisited => {
                        marks[next] = Mark::InProgress;
                        stack.push((next, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    fn push_node(&mut self, node: Node) -> NodeHandle {
        self.nodes.push(node);
        NodeHandle((self.nodes.len() - 1) as u32)
    }

    fn check_nodes(&self, children: &[(NodeHandle, f32)]) -> Result<()> {
        match children
            .iter()
            .find(|(child, _)| child.index() >= self.nodes.len())
        {
            Some((child, _)) => Err(AnimError::InvalidNode { index: child.0 }),
            None => Ok(()),
        }
    }

    /// Whether `target` is reachable from any of `roots`
    fn reaches(&self, roots: &[(NodeHandle, f32)], target: NodeHandle) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeHandle> = roots.iter().map(|(child, _)| *child).collect();

        while let Some(handle) = stack.pop() {
            if handle == target {
                return true;
            }
            if std::mem::replace(&mut visited[handle.index()], true) {
                continue;
            }
            stack.extend(self.nodes[handle.index()].children().iter().map(|(child, _)| *child));
        }
        false
    }
}
