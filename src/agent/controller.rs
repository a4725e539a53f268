//! Conversation controller: drives the state tree one turn at a time.

use std::sync::Arc;

use tracing::{error, info};

use crate::agent::conversation::ConversationState;
use crate::agent::node::{Directive, StateNode};
use crate::agent::registry::NodeRegistry;
use crate::agent::snapshot::{NestedStateSnapshot, StatePath};
use crate::agent::turn::TurnContext;
use crate::analysis::AnalysisService;
use crate::channels::Terminal;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::llm::ResponseOracle;
use crate::profile::UserProfile;
use crate::store::{Database, TurnCommit};

const SAVE_FAILED_NOTICE: &str =
    "I couldn't save that last exchange, so let's pick up from where we were.";

/// Shared collaborators handed to every handler.
pub struct AgentDeps {
    pub store: Arc<dyn Database>,
    pub oracle: Arc<dyn ResponseOracle>,
    pub analysis: Arc<AnalysisService>,
}

impl AgentDeps {
    /// Wire the analysis service to the given store and oracle.
    pub fn new(
        store: Arc<dyn Database>,
        oracle: Arc<dyn ResponseOracle>,
        config: &AgentConfig,
    ) -> Self {
        let analysis = Arc::new(AnalysisService::new(
            Arc::clone(&store),
            Arc::clone(&oracle),
            config.conversation_model.clone(),
        ));
        Self {
            store,
            oracle,
            analysis,
        }
    }
}

pub struct ConversationController {
    tree: StateNode,
    user: UserProfile,
    deps: AgentDeps,
    config: AgentConfig,
    last_state: Option<ConversationState>,
    consecutive_failures: u32,
}

impl ConversationController {
    /// Build the tree and resume the user's persisted position, if any.
    pub async fn load(
        registry: &NodeRegistry,
        user: UserProfile,
        deps: AgentDeps,
        config: AgentConfig,
    ) -> Result<Self> {
        let mut tree = registry.build_root()?;

        match deps.store.get_agent_state(&user.username).await? {
            Some(snapshot) => {
                tree.restore(&snapshot)?;
                info!(user = %user.username, path = %tree.active_path(), "Resumed conversation");
            }
            None => {
                info!(
                    user = %user.username,
                    path = %tree.active_path(),
                    "Starting new conversation"
                );
            }
        }

        let last_state = deps.store.get_conversation_state(&user.username).await?;

        Ok(Self {
            tree,
            user,
            deps,
            config,
            last_state,
            consecutive_failures: 0,
        })
    }

    pub fn snapshot(&self) -> NestedStateSnapshot {
        self.tree.snapshot()
    }

    pub fn active_path(&self) -> StatePath {
        self.tree.active_path()
    }

    pub fn last_state(&self) -> Option<&ConversationState> {
        self.last_state.as_ref()
    }

    /// Process one turn. Returns `false` once the session should end.
    pub async fn tick(&mut self, terminal: &mut dyn Terminal) -> Result<bool> {
        let before = self.tree.snapshot();

        let (directive, pending) = {
            let mut ctx = TurnContext::new(
                &self.user,
                &self.deps,
                &self.config,
                &mut *terminal,
                self.last_state.clone(),
            );
            let directive = self.tree.process(&mut ctx).await?;
            (directive, ctx.pending.take())
        };

        let quitting = match directive {
            Directive::Stay => false,
            Directive::Goto(paths) => {
                if let Err(e) = self.tree.apply(&paths) {
                    error!(error = %e, from = %before.active_path(), "Rejected state transition");
                }
                false
            }
            Directive::Quit => true,
        };

        let snapshot = self.tree.snapshot();
        if !quitting && pending.is_none() && snapshot == before {
            return Ok(true);
        }

        let commit = TurnCommit {
            user_id: self.user.username.clone(),
            snapshot,
            conversation_state: pending.as_ref().map(|p| p.conversation_state.clone()),
            event: pending.map(|p| p.event),
        };

        match self.deps.store.commit_turn(&commit).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                if let Some(state) = commit.conversation_state {
                    self.last_state = Some(state);
                }
                if quitting {
                    info!(
                        user = %self.user.username,
                        path = %self.tree.active_path(),
                        "Session ended"
                    );
                }
                Ok(!quitting)
            }
            Err(e) if quitting => {
                error!(error = %e, "Failed to save position on quit");
                Err(e.into())
            }
            Err(e) => {
                self.consecutive_failures += 1;
                error!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "Turn commit failed, rolling back"
                );
                self.tree.restore(&before)?;
                terminal.notice(SAVE_FAILED_NOTICE);
                if self.consecutive_failures >= self.config.max_persistence_failures {
                    return Err(e.into());
                }
                Ok(true)
            }
        }
    }

    /// Tick until the session ends.
    pub async fn run(&mut self, terminal: &mut dyn Terminal) -> Result<()> {
        info!(
            agent = %self.config.name,
            user = %self.user.username,
            "Conversation loop started"
        );
        while self.tick(terminal).await? {}
        Ok(())
    }
}

impl std::fmt::Debug for ConversationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationController")
            .field("user", &self.user.username)
            .field("path", &self.tree.active_path().to_string())
            .finish()
    }
}
