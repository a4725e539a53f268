use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use awareness_agent::agent::{AgentDeps, ConversationController};
use awareness_agent::channels::{CliTerminal, Terminal};
use awareness_agent::config::AgentConfig;
use awareness_agent::llm::{LlmConfig, create_oracle};
use awareness_agent::profile;
use awareness_agent::states;
use awareness_agent::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let _log_guard = init_tracing(&config);

    eprintln!("{} v{}", config.name, env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Logs: {}", config.log_dir.display());
    eprintln!("   Type `quit` to save and exit.\n");

    let mut terminal = CliTerminal::new();
    let mut controller = match startup(config, &mut terminal).await {
        Ok(controller) => controller,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "Startup failed");
            eprintln!("Error: {message}");
            return ExitCode::from(1);
        }
    };

    match controller.run(&mut terminal).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Conversation loop stopped");
            eprintln!("The agent had to stop: {e}");
            ExitCode::from(2)
        }
    }
}

/// Logs go to a daily rolling file so they never interleave with the
/// conversation. `AWARENESS_LOG_STDERR=1` sends them to stderr instead.
fn init_tracing(config: &AgentConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let to_stderr = std::env::var("AWARENESS_LOG_STDERR").is_ok_and(|v| v.trim() == "1");
    if !to_stderr {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("awareness-agent")
            .filename_suffix("log")
            .build(&config.log_dir)
        {
            Ok(appender) => {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer)
                    .init();
                return Some(guard);
            }
            Err(e) => {
                eprintln!(
                    "Warning: cannot write logs to {} ({e}), logging to stderr",
                    config.log_dir.display()
                );
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    None
}

/// Open the store, connect the oracle, resolve the user and resume their
/// conversation.
async fn startup(
    config: AgentConfig,
    terminal: &mut dyn Terminal,
) -> anyhow::Result<ConversationController> {
    let store: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    let llm_config = LlmConfig::from_env().context("oracle configuration")?;
    let oracle = create_oracle(&llm_config).context("failed to create oracle client")?;

    let username = profile::resolve_username(terminal, config.username.as_deref()).await?;
    let user = profile::load_or_create(store.as_ref(), terminal, &username)
        .await
        .context("failed to load user profile")?;

    let deps = AgentDeps::new(store, oracle, &config);
    let controller = ConversationController::load(&states::registry(), user, deps, config)
        .await
        .context("failed to restore conversation state")?;
    tracing::info!(controller = ?controller, "Agent ready");
    Ok(controller)
}
