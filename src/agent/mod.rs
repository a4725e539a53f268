//! Agent module: the hierarchical conversation state machine.
//!
//! - `node`: state nodes, handlers, commands and directives
//! - `registry`: name-to-factory map the tree is built from
//! - `snapshot`: resumable nested position and state paths
//! - `conversation`: the oracle's structured reply
//! - `turn`: one exchange with the user
//! - `events`: exchange compression for the event log
//! - `controller`: the tick loop

pub mod controller;
pub mod conversation;
pub mod events;
pub mod node;
pub mod registry;
pub mod snapshot;
pub mod turn;

pub use controller::{AgentDeps, ConversationController};
pub use conversation::ConversationState;
pub use node::{Command, CommandHandler, CommandTable, Directive, StateHandler, StateNode};
pub use registry::{NodeRegistry, ROOT_NODE};
pub use snapshot::{NestedStateSnapshot, StatePath};
pub use turn::{
    Answer, ConversationTurn, EventWindow, TurnContext, TurnInput, TurnOutcome, TurnRequest,
};
