//! Terminal abstraction for conversational I/O.

pub mod cli;

pub use cli::CliTerminal;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Line-oriented terminal the conversation reads from and writes to.
///
/// `Sync` so a shared `&TurnContext` can be held across an await.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Read one line of user input. `Ok(None)` signals end of input.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ChannelError>;

    /// Show agent speech.
    fn say(&mut self, text: &str);

    /// Show status output (HUD, notices, rendered analysis).
    fn notice(&mut self, text: &str);
}

/// Word-wrap `text` to `width` columns, prefixing every line with `indent`.
pub fn wrap(text: &str, width: usize, indent: &str) -> String {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && indent.len() + line.len() + 1 + word.len() > width {
                lines.push(format!("{indent}{line}"));
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(format!("{indent}{line}"));
    }
    lines.join("\n")
}
