//! Node registry: explicit map from node name to node factory.

use std::collections::HashMap;

use crate::agent::node::StateNode;
use crate::error::StateError;

/// Builds one node, using the registry to build its child nodes.
pub type NodeFactory = fn(&NodeRegistry) -> Result<StateNode, StateError>;

/// Name of the root node the controller builds.
pub const ROOT_NODE: &str = "Agent";

/// Registry of node factories.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration under the same name wins.
    pub fn register(&mut self, name: &str, factory: NodeFactory) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            tracing::warn!(node = name, "Node factory replaced");
        } else {
            tracing::debug!("Registered node: {}", name);
        }
    }

    pub fn with(mut self, name: &str, factory: NodeFactory) -> Self {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build and validate the node registered under `name`.
    pub fn build(&self, name: &str) -> Result<StateNode, StateError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StateError::UnregisteredNode {
                name: name.to_string(),
            })?;
        let node = factory(self)?;
        node.validate()?;
        Ok(node)
    }

    /// Build the root node.
    pub fn build_root(&self) -> Result<StateNode, StateError> {
        self.build(ROOT_NODE)
    }
}
