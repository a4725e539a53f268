//! State nodes: the hierarchical state machine the controller drives.
//!
//! A `StateNode` owns an ordered list of sub-states and exactly one active
//! sub-state. Each sub-state is either a child node (the container case) or
//! a handler (the leaf case). Transitions between sub-states must be
//! declared; everything else is rejected and leaves the node unchanged.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::snapshot::{NestedStateSnapshot, StatePath};
use crate::agent::turn::TurnContext;
use crate::error::{Result, StateError};

/// What the controller should do after a leaf has processed a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Keep the current position.
    Stay,
    /// Apply these paths from the root, in order, atomically.
    Goto(Vec<StatePath>),
    /// Persist the position and end the session.
    Quit,
}

impl Directive {
    /// Shorthand for a single-path `Goto`.
    pub fn goto(path: impl Into<StatePath>) -> Self {
        Self::Goto(vec![path.into()])
    }
}

/// Processing logic of one leaf sub-state.
#[async_trait]
pub trait StateHandler: Send + Sync {
    /// Role fragment appended to the composed role while this sub-state is active.
    fn role(&self) -> &str {
        ""
    }

    /// Run one turn. `commands` is the owning node's command table.
    async fn handle(
        &self,
        ctx: &mut TurnContext<'_>,
        commands: &CommandTable,
    ) -> Result<Directive>;
}

/// An action bound to a command token.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, ctx: &mut TurnContext<'_>) -> Result<Directive>;
}

pub struct Command {
    pub token: String,
    pub description: String,
    pub handler: Arc<dyn CommandHandler>,
}

/// Per-node command tokens, kept in insertion order for the menu.
#[derive(Default)]
pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A token registered twice replaces the earlier entry.
    pub fn add(
        &mut self,
        token: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) {
        let token = token.into().trim().to_lowercase();
        let command = Command {
            token,
            description: description.into(),
            handler,
        };
        match self.commands.iter_mut().find(|c| c.token == command.token) {
            Some(existing) => *existing = command,
            None => self.commands.push(command),
        }
    }

    /// Find the command whose token equals the trimmed input, ignoring ASCII case.
    pub fn find(&self, input: &str) -> Option<&Command> {
        let input = input.trim();
        self.commands
            .iter()
            .find(|c| c.token.eq_ignore_ascii_case(input))
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// One `token: description` line per command.
    pub fn menu(&self) -> String {
        self.commands
            .iter()
            .map(|c| format!("  {}: {}", c.token, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What a declared sub-state resolves to.
pub enum SubState {
    Node(StateNode),
    Handler(Arc<dyn StateHandler>),
}

pub struct StateNode {
    name: String,
    role: String,
    sub_states: Vec<String>,
    active: String,
    transitions: HashSet<(String, String)>,
    entries: HashMap<String, SubState>,
    commands: CommandTable,
}

impl StateNode {
    /// A node whose initial sub-state is the first one declared.
    pub fn new(name: impl Into<String>, sub_states: &[&str]) -> Self {
        let sub_states: Vec<String> = sub_states.iter().map(|s| s.to_string()).collect();
        Self {
            name: name.into(),
            role: String::new(),
            active: sub_states.first().cloned().unwrap_or_default(),
            sub_states,
            transitions: HashSet::new(),
            entries: HashMap::new(),
            commands: CommandTable::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_transition(mut self, from: &str, to: &str) -> Self {
        self.transitions.insert((from.to_string(), to.to_string()));
        self
    }

    /// Declare a chain of transitions `a -> b -> c ...`.
    pub fn with_chain(mut self, states: &[&str]) -> Self {
        for pair in states.windows(2) {
            self.transitions
                .insert((pair[0].to_string(), pair[1].to_string()));
        }
        self
    }

    pub fn with_child(mut self, sub_state: &str, child: StateNode) -> Self {
        self.entries
            .insert(sub_state.to_string(), SubState::Node(child));
        self
    }

    pub fn with_handler(mut self, sub_state: &str, handler: Arc<dyn StateHandler>) -> Self {
        self.entries
            .insert(sub_state.to_string(), SubState::Handler(handler));
        self
    }

    pub fn with_command(
        mut self,
        token: &str,
        description: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        self.commands.add(token, description, handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn sub_states(&self) -> &[String] {
        &self.sub_states
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn child(&self, sub_state: &str) -> Option<&StateNode> {
        match self.entries.get(sub_state) {
            Some(SubState::Node(child)) => Some(child),
            _ => None,
        }
    }

    fn child_mut(&mut self, sub_state: &str) -> Option<&mut StateNode> {
        match self.entries.get_mut(sub_state) {
            Some(SubState::Node(child)) => Some(child),
            _ => None,
        }
    }

    /// Check the node's declarations, recursively.
    pub fn validate(&self) -> std::result::Result<(), StateError> {
        if self.sub_states.is_empty() {
            return Err(StateError::UnknownState {
                node: self.name.clone(),
                state: String::new(),
            });
        }
        for name in self.entries.keys() {
            if !self.sub_states.contains(name) {
                return Err(StateError::UnknownNode {
                    parent: self.name.clone(),
                    name: name.clone(),
                });
            }
        }
        for (from, to) in &self.transitions {
            for end in [from, to] {
                if !self.sub_states.contains(end) {
                    return Err(StateError::UnknownState {
                        node: self.name.clone(),
                        state: end.clone(),
                    });
                }
            }
        }
        for entry in self.entries.values() {
            if let SubState::Node(child) = entry {
                child.validate()?;
            }
        }
        Ok(())
    }

    /// Move to `name`. Fails unless `name` is declared and the edge
    /// `(active, name)` exists; on failure nothing changes.
    pub fn activate(&mut self, name: &str) -> std::result::Result<(), StateError> {
        let declared = self.sub_states.iter().any(|s| s == name);
        let edge = (self.active.clone(), name.to_string());
        if !declared || !self.transitions.contains(&edge) {
            return Err(StateError::InvalidTransition {
                node: self.name.clone(),
                from: self.active.clone(),
                to: name.to_string(),
            });
        }
        tracing::debug!(node = %self.name, from = %self.active, to = name, "Sub-state activated");
        self.active = name.to_string();
        Ok(())
    }

    /// Path of active sub-states from this node down to the leaf.
    pub fn active_path(&self) -> StatePath {
        let mut segments = Vec::new();
        let mut node = self;
        loop {
            segments.push(node.active.clone());
            match node.child(&node.active) {
                Some(child) => node = child,
                None => return StatePath::new(segments),
            }
        }
    }

    /// Own role text followed by the active sub-state's role, recursively.
    pub fn composed_role(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let mut node = self;
        loop {
            if !node.role.is_empty() {
                parts.push(&node.role);
            }
            match node.entries.get(&node.active) {
                Some(SubState::Node(child)) => node = child,
                Some(SubState::Handler(handler)) => {
                    if !handler.role().is_empty() {
                        parts.push(handler.role());
                    }
                    break;
                }
                None => break,
            }
        }
        parts.join("\n\n")
    }

    /// Complete snapshot: the active sub-state plus every child node.
    pub fn snapshot(&self) -> NestedStateSnapshot {
        let mut snapshot = NestedStateSnapshot::leaf(self.active.clone());
        for (name, entry) in &self.entries {
            if let SubState::Node(child) = entry {
                snapshot.children.insert(name.clone(), child.snapshot());
            }
        }
        snapshot
    }

    /// Restore a snapshot. Missing children keep their current sub-state.
    /// The snapshot is checked in full before anything changes.
    pub fn restore(
        &mut self,
        snapshot: &NestedStateSnapshot,
    ) -> std::result::Result<(), StateError> {
        self.check_snapshot(snapshot)?;
        self.assign(snapshot);
        Ok(())
    }

    fn check_snapshot(
        &self,
        snapshot: &NestedStateSnapshot,
    ) -> std::result::Result<(), StateError> {
        if !self.sub_states.contains(&snapshot.active) {
            return Err(StateError::InvalidSnapshot {
                node: self.name.clone(),
                reason: format!("'{}' is not a sub-state", snapshot.active),
            });
        }
        for (name, child_snapshot) in &snapshot.children {
            let child = self.child(name).ok_or_else(|| StateError::UnknownNode {
                parent: self.name.clone(),
                name: name.clone(),
            })?;
            child.check_snapshot(child_snapshot)?;
        }
        Ok(())
    }

    fn assign(&mut self, snapshot: &NestedStateSnapshot) {
        self.active = snapshot.active.clone();
        for (name, child_snapshot) in &snapshot.children {
            if let Some(child) = self.child_mut(name) {
                child.assign(child_snapshot);
            }
        }
    }

    /// Apply paths from this node, in order. Levels already on the requested
    /// sub-state are left alone. Any failure restores the prior position.
    pub fn apply(&mut self, paths: &[StatePath]) -> std::result::Result<(), StateError> {
        let before = self.snapshot();
        for path in paths {
            if let Err(e) = self.apply_segments(path.segments()) {
                self.assign(&before);
                return Err(e);
            }
        }
        Ok(())
    }

    fn apply_segments(&mut self, segments: &[String]) -> std::result::Result<(), StateError> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(());
        };
        if self.active != *first {
            self.activate(first)?;
        }
        if rest.is_empty() {
            return Ok(());
        }
        let name = self.name.clone();
        let child = self
            .child_mut(first)
            .ok_or_else(|| StateError::UnknownNode {
                parent: name,
                name: first.clone(),
            })?;
        child.apply_segments(rest)
    }

    /// Resolve the active chain to its leaf handler and run one turn there.
    pub async fn process(&self, ctx: &mut TurnContext<'_>) -> Result<Directive> {
        let mut node = self;
        let mut segments = Vec::new();
        loop {
            segments.push(node.active.clone());
            match node.entries.get(&node.active) {
                Some(SubState::Node(child)) => node = child,
                Some(SubState::Handler(handler)) => {
                    ctx.path = StatePath::new(segments);
                    ctx.role = self.composed_role();
                    return handler.handle(ctx, &node.commands).await;
                }
                None => {
                    let err = StateError::UnknownState {
                        node: node.name.clone(),
                        state: node.active.clone(),
                    };
                    tracing::error!(error = %err, "No handler for active sub-state");
                    return Err(err.into());
                }
            }
        }
    }
}

impl std::fmt::Debug for StateNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateNode")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("sub_states", &self.sub_states)
            .finish()
    }
}
