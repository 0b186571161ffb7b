//! Interactive prompt capability.
//!
//! State handlers ask for usernames, passwords, verification codes, and list
//! choices through [`Prompter`] so tests can script answers without a TTY.

use std::io::Write;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("prompt task aborted")]
    Aborted,
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

/// Question-and-answer surface for one login attempt.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Free-form input; an empty answer falls back to `default` when present.
    async fn input(&self, message: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Masked input.
    async fn password(&self, message: &str) -> Result<String, PromptError>;

    /// Pick one of `choices`; an empty answer falls back to `default`.
    async fn select(
        &self,
        message: &str,
        choices: &[String],
        default: Option<&str>,
    ) -> Result<String, PromptError>;
}

/// Terminal-backed prompter. Reads run on the blocking pool so an abandoned
/// prompt cannot stall the async login loop.
#[derive(Debug, Default)]
pub struct StdPrompter;

impl StdPrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for StdPrompter {
    async fn input(&self, message: &str, default: Option<&str>) -> Result<String, PromptError> {
        let message = match default {
            Some(default) if !default.is_empty() => format!("{message} [{default}]: "),
            _ => format!("{message}: "),
        };
        let default = default.map(|value| value.to_string());

        tokio::task::spawn_blocking(move || {
            let answer = read_line(&message)?;
            if answer.is_empty()
                && let Some(default) = default
            {
                return Ok(default);
            }
            Ok(answer)
        })
        .await
        .map_err(|_| PromptError::Aborted)?
    }

    async fn password(&self, message: &str) -> Result<String, PromptError> {
        let message = format!("{message}: ");
        tokio::task::spawn_blocking(move || Ok(rpassword::prompt_password(message)?))
            .await
            .map_err(|_| PromptError::Aborted)?
    }

    async fn select(
        &self,
        message: &str,
        choices: &[String],
        default: Option<&str>,
    ) -> Result<String, PromptError> {
        let message = message.to_string();
        let choices = choices.to_vec();
        let default = default.map(|value| value.to_string());

        tokio::task::spawn_blocking(move || {
            println!("{message}");
            for (index, choice) in choices.iter().enumerate() {
                println!("  {}) {choice}", index + 1);
            }

            let answer = read_line("Enter a number: ")?;
            if answer.is_empty()
                && let Some(default) = default
                && choices.iter().any(|choice| choice == &default)
            {
                return Ok(default);
            }

            let index: usize = answer
                .parse()
                .map_err(|_| PromptError::InvalidSelection(answer.clone()))?;
            choices
                .get(index.wrapping_sub(1))
                .cloned()
                .ok_or(PromptError::InvalidSelection(answer))
        })
        .await
        .map_err(|_| PromptError::Aborted)?
    }
}

fn read_line(message: &str) -> Result<String, PromptError> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut buffer = String::new();
    std::io::stdin().read_line(&mut buffer)?;
    Ok(buffer.trim().to_string())
}
