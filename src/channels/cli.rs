//! CLI terminal: stdin/stdout REPL.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::channels::{Terminal, wrap};
use crate::error::ChannelError;

/// Text width used when printing agent speech.
const TEXT_WIDTH: usize = 100;

/// Reads lines from stdin and writes to stdout / stderr.
pub struct CliTerminal {
    lines: Lines<BufReader<Stdin>>,
}

impl CliTerminal {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for CliTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Terminal for CliTerminal {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, ChannelError> {
        eprint!("{prompt}");
        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(Some(line.trim().to_string())),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                Err(ChannelError::Read(e.to_string()))
            }
        }
    }

    fn say(&mut self, text: &str) {
        println!("\n{}\n", wrap(text, TEXT_WIDTH, ""));
    }

    fn notice(&mut self, text: &str) {
        eprintln!("{text}");
    }
}
