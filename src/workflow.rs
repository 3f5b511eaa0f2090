//! Cost-guarded query execution: estimate, gate, then execute with a billing cap.

use tracing::{debug, info};

use crate::cost::{CostEstimate, DEFAULT_PRICE_PER_TERABYTE};
use crate::error::Result;
use crate::gate::{GateDecision, Prompter, ThresholdGate};
use crate::warehouse::{Outcome, WarehouseClient};

/// Called once with the estimate, before the gate decides
pub type EstimateCallback<'a> = Option<&'a dyn Fn(&CostEstimate)>;

/// What a guarded run did at each stage
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedRun {
    pub estimate: CostEstimate,
    pub decision: GateDecision,
    pub outcome: Outcome,
}

pub struct CostGuard<C> {
    client: C,
    gate: ThresholdGate,
    price_per_terabyte: f64,
}

impl<C: WarehouseClient> CostGuard<C> {
    pub fn new(client: C, gate: ThresholdGate) -> Self {
        Self {
            client,
            gate,
            price_per_terabyte: DEFAULT_PRICE_PER_TERABYTE,
        }
    }

    pub fn with_price_per_terabyte(mut self, price: f64) -> Self {
        self.price_per_terabyte = price;
        self
    }

    pub fn gate(&self) -> &ThresholdGate {
        &self.gate
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Dry-run stage only
    pub fn estimate(&self, query: &str) -> Result<CostEstimate> {
        let bytes = self.client.estimate(query)?;
        let estimate = CostEstimate::with_price(bytes, self.price_per_terabyte);
        debug!(bytes, cost = estimate.estimated_cost_usd, "dry run estimate");
        Ok(estimate)
    }

    /// Run all three stages in order.
    ///
    /// Estimation failure is returned as an error and nothing is executed.
    /// The executor always receives the gate ceiling as its cap, never the
    /// estimated bytes.
    pub fn run<P: Prompter + ?Sized>(
        &self,
        query: &str,
        prompter: &mut P,
        on_estimate: EstimateCallback<'_>,
    ) -> Result<GuardedRun> {
        let estimate = self.estimate(query)?;
        if let Some(cb) = on_estimate {
            cb(&estimate);
        }

        let decision = self.gate.check(&estimate, prompter)?;
        if !decision.proceeds() {
            info!(bytes = estimate.bytes_processed, ceiling = self.gate.ceiling, "query cancelled for safety");
            return Ok(GuardedRun {
                estimate,
                decision,
                outcome: Outcome::CancelledBySafetyGate,
            });
        }

        let outcome = self.client.execute(query, self.gate.ceiling)?;
        Ok(GuardedRun {
            estimate,
            decision,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::error::AppError;
    use crate::gate::{GateMode, NonInteractivePolicy};

    struct FakeWarehouse {
        bytes: Option<u64>,
        outcome: Outcome,
        estimate_calls: Cell<usize>,
        executed_caps: RefCell<Vec<u64>>,
    }

    impl FakeWarehouse {
        fn reporting(bytes: u64) -> Self {
            Self {
                bytes: Some(bytes),
                outcome: Outcome::Completed {
                    output: "n\n1\n".to_string(),
                },
                estimate_calls: Cell::new(0),
                executed_caps: RefCell::new(Vec::new()),
            }
        }

        fn unparseable() -> Self {
            Self {
                bytes: None,
                ..Self::reporting(0)
            }
        }
    }

    impl WarehouseClient for FakeWarehouse {
        fn estimate(&self, _query: &str) -> Result<u64> {
            self.estimate_calls.set(self.estimate_calls.get() + 1);
            self.bytes.ok_or_else(|| AppError::EstimationFailed {
                raw_output: "no byte count".to_string(),
            })
        }

        fn execute(&self, _query: &str, max_bytes_billed: u64) -> Result<Outcome> {
            self.executed_caps.borrow_mut().push(max_bytes_billed);
            Ok(self.outcome.clone())
        }
    }

    struct ScriptedPrompter {
        answer: bool,
        calls: usize,
    }

    impl ScriptedPrompter {
        fn answering(answer: bool) -> Self {
            Self { answer, calls: 0 }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&mut self, _estimate: &CostEstimate, _ceiling: u64) -> Result<bool> {
            self.calls += 1;
            Ok(self.answer)
        }
    }

    #[test]
    fn test_within_ceiling_executes_without_prompt() {
        let warehouse = FakeWarehouse::reporting(1_000);
        let guard = CostGuard::new(&warehouse, ThresholdGate::interactive_safety());
        let mut prompter = ScriptedPrompter::answering(false);

        let run = guard.run("SELECT 1", &mut prompter, None).unwrap();

        assert_eq!(prompter.calls, 0);
        assert_eq!(run.decision, GateDecision::Proceed);
        assert_eq!(*warehouse.executed_caps.borrow(), vec![104_857_600]);
        assert!(matches!(run.outcome, Outcome::Completed { .. }));
    }

    #[test]
    fn test_declined_never_executes() {
        let warehouse = FakeWarehouse::reporting(1_073_741_824);
        let guard = CostGuard::new(&warehouse, ThresholdGate::interactive_safety());
        let mut prompter = ScriptedPrompter::answering(false);

        let run = guard.run("SELECT 1", &mut prompter, None).unwrap();

        assert_eq!(prompter.calls, 1);
        assert_eq!(run.outcome, Outcome::CancelledBySafetyGate);
        assert_eq!(run.outcome.exit_code(), 0);
        assert!(warehouse.executed_caps.borrow().is_empty());
    }

    #[test]
    fn test_confirmed_executes_once_with_ceiling_as_cap() {
        let warehouse = FakeWarehouse::reporting(1_073_741_824);
        let guard = CostGuard::new(&warehouse, ThresholdGate::interactive_safety());
        let mut prompter = ScriptedPrompter::answering(true);

        let run = guard.run("SELECT 1", &mut prompter, None).unwrap();

        assert_eq!(run.decision, GateDecision::ProceedOverCeiling);
        assert_eq!(*warehouse.executed_caps.borrow(), vec![104_857_600]);
    }

    #[test]
    fn test_estimation_failure_stops_workflow() {
        let warehouse = FakeWarehouse::unparseable();
        let guard = CostGuard::new(&warehouse, ThresholdGate::batch());
        let mut prompter = ScriptedPrompter::answering(true);

        let result = guard.run("SELECT 1", &mut prompter, None);

        assert!(matches!(result, Err(AppError::EstimationFailed { .. })));
        assert_eq!(prompter.calls, 0);
        assert!(warehouse.executed_caps.borrow().is_empty());
    }

    #[test]
    fn test_batch_auto_allow_runs_over_ceiling() {
        let warehouse = FakeWarehouse::reporting(20_000_000_000);
        let guard = CostGuard::new(&warehouse, ThresholdGate::batch());
        let mut prompter = ScriptedPrompter::answering(false);

        let run = guard.run("SELECT 1", &mut prompter, None).unwrap();

        assert_eq!(prompter.calls, 0);
        assert_eq!(run.decision, GateDecision::ProceedOverCeiling);
        assert_eq!(*warehouse.executed_caps.borrow(), vec![15_000_000_000]);
    }

    #[test]
    fn test_batch_auto_deny_cancels() {
        let warehouse = FakeWarehouse::reporting(20_000_000_000);
        let gate = ThresholdGate::batch()
            .with_mode(GateMode::NonInteractive(NonInteractivePolicy::AutoDeny));
        let guard = CostGuard::new(&warehouse, gate);
        let mut prompter = ScriptedPrompter::answering(true);

        let run = guard.run("SELECT 1", &mut prompter, None).unwrap();

        assert_eq!(run.outcome, Outcome::CancelledBySafetyGate);
        assert!(warehouse.executed_caps.borrow().is_empty());
    }

    #[test]
    fn test_estimate_callback_sees_estimate_before_gate() {
        let warehouse = FakeWarehouse::reporting(1_073_741_824);
        let guard = CostGuard::new(&warehouse, ThresholdGate::interactive_safety());
        let mut prompter = ScriptedPrompter::answering(false);
        let seen = Cell::new(None);
        let record = |e: &CostEstimate| seen.set(Some(e.bytes_processed));

        guard.run("SELECT 1", &mut prompter, Some(&record)).unwrap();

        assert_eq!(seen.get(), Some(1_073_741_824));
    }

    #[test]
    fn test_estimate_uses_configured_price() {
        let warehouse = FakeWarehouse::reporting(1_099_511_627_776);
        let guard = CostGuard::new(&warehouse, ThresholdGate::batch()).with_price_per_terabyte(6.25);

        let estimate = guard.estimate("SELECT 1").unwrap();

        assert_eq!(estimate.estimated_cost_usd, 6.25);
        assert!(warehouse.executed_caps.borrow().is_empty());
    }

    #[test]
    fn test_estimate_is_idempotent() {
        let warehouse = FakeWarehouse::reporting(31_337);
        let guard = CostGuard::new(&warehouse, ThresholdGate::batch());

        let first = guard.estimate("SELECT 1").unwrap();
        let second = guard.estimate("SELECT 1").unwrap();

        assert_eq!(first, second);
        assert_eq!(warehouse.estimate_calls.get(), 2);
    }
}
