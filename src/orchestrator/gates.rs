//! The human approval gate.
//!
//! Sits between planning and implementation. Suspension is unbounded and
//! ends only with an explicit signal; there is deliberately no timeout
//! and no default answer.

use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

pub trait ApprovalGate: Send {
    /// Present the plan and block until the operator answers.
    fn await_approval(&mut self, plan: &str) -> Result<ApprovalDecision>;
}

/// Interactive gate on the terminal. `assume_yes` (the `--yes` flag)
/// approves without prompting.
pub struct ConsoleGate {
    pub assume_yes: bool,
}

impl ConsoleGate {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ApprovalGate for ConsoleGate {
    fn await_approval(&mut self, plan: &str) -> Result<ApprovalDecision> {
        println!("\n{}", console::style("Proposed plan").bold().underlined());
        println!("{plan}\n");

        if self.assume_yes {
            println!("  {} (--yes flag)", console::style("Auto-approved").dim());
            return Ok(ApprovalDecision::Approved);
        }

        let options = &["Approve and implement", "Reject the plan"];
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Proceed with this plan?")
            .items(options)
            .default(0)
            .interact()?;

        Ok(match selection {
            0 => ApprovalDecision::Approved,
            _ => ApprovalDecision::Rejected,
        })
    }
}
