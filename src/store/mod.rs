//! Persistence layer: libSQL-backed storage for agent state, conversation
//! history and journey artifacts.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{ConversationEvent, Database, TurnCommit};
