// ABOUTME: Operator confirmation before any statement batch touches a database
// ABOUTME: Terminal prompt via dialoguer, or a fixed answer for --yes and tests

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Asks the operator whether to proceed with a mutating step
pub trait ConfirmationGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Prompts on the terminal; defaults to "no"
#[derive(Debug, Default)]
pub struct TerminalGate;

impl ConfirmationGate for TerminalGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to get confirmation")
    }
}

/// Answers every prompt the same way without asking
#[derive(Debug, Clone, Copy)]
pub struct AutoGate(pub bool);

impl ConfirmationGate for AutoGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        tracing::info!("{} [auto: {}]", prompt, if self.0 { "yes" } else { "no" });
        Ok(self.0)
    }
}

/// Gate for a command run: automatic approval with `--yes`, otherwise the terminal
pub fn gate_for(assume_yes: bool) -> Box<dyn ConfirmationGate> {
    if assume_yes {
        Box::new(AutoGate(true))
    } else {
        Box::new(TerminalGate)
    }
}

/// Records every prompt and replays scripted answers; unscripted prompts decline
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedGate {
    pub answers: Vec<bool>,
    pub prompts: Vec<String>,
}

#[cfg(test)]
impl ConfirmationGate for ScriptedGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        if self.answers.is_empty() {
            return Ok(false);
        }
        Ok(self.answers.remove(0))
    }
}
