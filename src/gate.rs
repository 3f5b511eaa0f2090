//! Threshold gate between the cost estimate and execution.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cost::{format_bytes, format_number, CostEstimate};
use crate::error::Result;

/// Ceiling of the manual safety tool: 100 MiB
pub const INTERACTIVE_SAFETY_CEILING: u64 = 104_857_600;

/// Ceiling of the bulk runner, which expects larger batch jobs
pub const BATCH_CEILING: u64 = 15_000_000_000;

/// What to do with an over-ceiling query when nobody can be asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonInteractivePolicy {
    AutoDeny,
    #[default]
    AutoAllow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Ask the operator through a [`Prompter`]
    Interactive,
    NonInteractive(NonInteractivePolicy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Estimate is within the ceiling
    Proceed,
    /// Estimate exceeds the ceiling but the operator or policy allowed it
    ProceedOverCeiling,
    Cancelled,
}

impl GateDecision {
    pub fn proceeds(self) -> bool {
        !matches!(self, GateDecision::Cancelled)
    }
}

/// Asks the operator whether an over-ceiling query may run
pub trait Prompter {
    fn confirm(&mut self, estimate: &CostEstimate, ceiling: u64) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdGate {
    pub ceiling: u64,
    pub mode: GateMode,
}

impl ThresholdGate {
    pub fn new(ceiling: u64, mode: GateMode) -> Self {
        Self { ceiling, mode }
    }

    /// `interactive-safety`: 100 MiB, operator confirms anything above it
    pub fn interactive_safety() -> Self {
        Self::new(INTERACTIVE_SAFETY_CEILING, GateMode::Interactive)
    }

    /// `batch`: ~14 GiB, over-ceiling queries run with a logged warning
    pub fn batch() -> Self {
        Self::new(
            BATCH_CEILING,
            GateMode::NonInteractive(NonInteractivePolicy::AutoAllow),
        )
    }

    pub fn with_ceiling(mut self, ceiling: u64) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_mode(mut self, mode: GateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn check<P: Prompter + ?Sized>(
        &self,
        estimate: &CostEstimate,
        prompter: &mut P,
    ) -> Result<GateDecision> {
        if estimate.bytes_processed <= self.ceiling {
            return Ok(GateDecision::Proceed);
        }

        match self.mode {
            GateMode::Interactive => {
                if prompter.confirm(estimate, self.ceiling)? {
                    Ok(GateDecision::ProceedOverCeiling)
                } else {
                    Ok(GateDecision::Cancelled)
                }
            }
            GateMode::NonInteractive(NonInteractivePolicy::AutoAllow) => {
                warn!(
                    bytes = estimate.bytes_processed,
                    ceiling = self.ceiling,
                    cost = %estimate.cost_display(),
                    "estimate exceeds ceiling, proceeding without confirmation"
                );
                Ok(GateDecision::ProceedOverCeiling)
            }
            GateMode::NonInteractive(NonInteractivePolicy::AutoDeny) => {
                warn!(
                    bytes = estimate.bytes_processed,
                    ceiling = self.ceiling,
                    cost = %estimate.cost_display(),
                    "estimate exceeds ceiling, refusing without confirmation"
                );
                Ok(GateDecision::Cancelled)
            }
        }
    }
}

/// Line-based confirmation over any reader/writer pair
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn confirm(&mut self, estimate: &CostEstimate, ceiling: u64) -> Result<bool> {
        writeln!(
            self.output,
            "Query exceeds limit of {} bytes ({})",
            format_number(ceiling),
            format_bytes(ceiling)
        )?;
        writeln!(
            self.output,
            "  Will process: {} bytes ({})",
            format_number(estimate.bytes_processed),
            format_bytes(estimate.bytes_processed)
        )?;
        writeln!(self.output, "  Estimated cost: {}", estimate.cost_display())?;
        write!(self.output, "Continue anyway? (y/N): ")?;
        self.output.flush()?;

        let mut answer = String::new();
        // EOF reads zero bytes and leaves the answer empty, which declines
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
