//! Operator confirmation before teardown.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A blocking gate the sequencer waits on after the last phase.
#[async_trait::async_trait]
pub trait Confirmation: Send + Sync {
    /// Waits until the operator confirms.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the operator's input cannot be read.
    async fn confirm(&mut self, prompt: &str) -> io::Result<()>;
}

/// Prompts on stderr and waits for a line on stdin.
#[derive(Debug, Default)]
pub struct StdinConfirmation;

#[async_trait::async_trait]
impl Confirmation for StdinConfirmation {
    async fn confirm(&mut self, prompt: &str) -> io::Result<()> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(())
    }
}

/// Confirms immediately.
#[derive(Debug, Default)]
pub struct AutoConfirmation;

#[async_trait::async_trait]
impl Confirmation for AutoConfirmation {
    async fn confirm(&mut self, _prompt: &str) -> io::Result<()> {
        Ok(())
    }
}
