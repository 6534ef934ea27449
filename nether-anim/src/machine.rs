//! Animation blend machine
//!
//! The machine is built once and shared between instances. It owns an
//! ordered list of [`Layer`]s; each layer is an arena of [`Node`]s, a list of
//! named [`State`]s and a table of [`Transition`] overrides. Handles are plain
//! indices into those arenas and are never invalidated since nothing is
//! removed after construction.

mod layer;
mod node;

#[cfg(test)]
mod tests;

use crate::error::{AnimError, Result};

pub use layer::{Layer, State, Transition};
pub use node::{BlendChildren, Node};

/// Index of a node within its layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) u32);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a state within its layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateHandle(pub(crate) u32);

impl StateHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a layer within the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub(crate) u32);

impl LayerHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationBlendMachine {
    layers: Vec<Layer>,
}

impl AnimationBlendMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerHandle {
        self.layers.push(Layer::new(name));
        LayerHandle((self.layers.len() - 1) as u32)
    }

    pub fn find_layer(&self, name: &str) -> Option<LayerHandle> {
        self.layers
            .iter()
            .position(|layer| layer.name() == name)
            .map(|index| LayerHandle(index as u32))
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&Layer> {
        self.layers.get(handle.index())
    }

    pub fn layer_mut(&mut self, handle: LayerHandle) -> Result<&mut Layer> {
        self.layers
            .get_mut(handle.index())
            .ok_or(AnimError::InvalidLayer { index: handle.0 })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_count(&self) -> usize {
        self.layers.len()
    }

    /// Check every layer for dangling handles and blend cycles
    pub fn validate(&self) -> Result<()> {
        self.layers.iter().try_for_each(Layer::validate)
    }
}
