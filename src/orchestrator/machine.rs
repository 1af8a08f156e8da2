//! The orchestrator state machine.
//!
//! Drives one claimed task through the canonical phase order, invoking
//! external workers, recording every transition in the checkpoint log,
//! and updating the shared registry at the terminal states. A phase
//! begins only after the previous one checkpointed as completed; a failed
//! phase halts the machine — resumable, never silently retried — with one
//! exception: a failed delivery validation routes backward to
//! implementation with a structured fix list, a bounded number of times.

use std::path::PathBuf;

use crate::checkpoint::{CheckpointLog, StepStatus};
use crate::config::Config;
use crate::errors::EngineError;
use crate::orchestrator::gates::{ApprovalDecision, ApprovalGate};
use crate::orchestrator::worker::{ExternalWorker, PhaseInput, WorkerStatus};
use crate::phase::{Outcome, Phase};
use crate::registry::{ClaimRecord, Registry};
use crate::task::{Policy, Task};

/// Runtime view of one instance, reconstructed from the registry and the
/// checkpoint log on resume.
#[derive(Debug, Clone)]
pub struct WorkflowInstance {
    pub task: Task,
    pub policy: Policy,
    pub worktree: PathBuf,
    pub branch: String,
}

/// Rebuild the runtime instance for a live claim. The policy and task are
/// read back from their recording checkpoints; a log missing either is
/// structurally invalid.
pub fn instance_from_claim(
    claim: &ClaimRecord,
    log: &CheckpointLog,
) -> Result<WorkflowInstance, EngineError> {
    let doc = log.load()?;
    let corrupt = |what: &str| EngineError::CorruptState {
        path: log.path().to_path_buf(),
        reason: format!("log for claim {} has no recorded {what}", claim.id),
    };

    let policy: Policy = doc
        .last_result(Phase::PolicySelection)
        .and_then(|r| serde_json::from_str(r).ok())
        .ok_or_else(|| corrupt("policy"))?;
    let task: Task = doc
        .last_result(Phase::TaskDiscovery)
        .and_then(|r| serde_json::from_str(r).ok())
        .ok_or_else(|| corrupt("task"))?;

    Ok(WorkflowInstance {
        task,
        policy,
        worktree: claim.worktree.clone(),
        branch: claim.branch.clone(),
    })
}

/// Pull a structured fix list out of a validation worker's report.
/// Bulleted or `FIX:`-prefixed lines win; a report with neither becomes a
/// single opaque finding.
pub fn parse_fix_list(report: &str) -> Vec<String> {
    let fixes: Vec<String> = report
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("FIX:"))
                .map(|rest| rest.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect();
    if fixes.is_empty() && !report.trim().is_empty() {
        vec![report.trim().to_string()]
    } else {
        fixes
    }
}

pub struct StateMachine {
    config: Config,
    registry: Registry,
    log: CheckpointLog,
    worker: Box<dyn ExternalWorker>,
    gate: Box<dyn ApprovalGate>,
}

impl StateMachine {
    pub fn new(
        config: Config,
        registry: Registry,
        log: CheckpointLog,
        worker: Box<dyn ExternalWorker>,
        gate: Box<dyn ApprovalGate>,
    ) -> Self {
        Self {
            config,
            registry,
            log,
            worker,
            gate,
        }
    }

    /// Drive the instance until it ships or something halts it. Halting
    /// errors leave the claim and the log in place so the run is
    /// resumable (or inspectable) afterwards.
    pub async fn run(&mut self, instance: &WorkflowInstance) -> Result<Outcome, EngineError> {
        self.bootstrap(instance)?;

        let mut fixes: Vec<String> = Vec::new();
        let mut validation_attempts = self.failed_validation_count()?;
        // Set when validation routes backward, overriding the log-derived
        // next phase for one step.
        let mut rerouted: Option<Phase> = None;

        loop {
            let doc = self.log.load()?;
            let phase = match rerouted.take() {
                Some(p) => p,
                None => match doc.next_phase()? {
                    Some(p) => p,
                    None => return Ok(Outcome::Shipped),
                },
            };
            tracing::info!(%phase, task = %instance.task.id, "entering phase");

            match phase {
                // Recorded by bootstrap; reaching one here means a crash
                // landed between its started and completed entries.
                Phase::PolicySelection | Phase::TaskDiscovery | Phase::WorktreeSetup => {
                    self.log.append_step(phase, StepStatus::Completed, None)?;
                }

                Phase::Exploration | Phase::Planning | Phase::DocsUpdate => {
                    self.worker_phase(instance, phase, &[]).await?;
                }

                Phase::AwaitApproval => {
                    self.log.append_step(phase, StepStatus::Started, None)?;
                    let plan = doc
                        .last_result(Phase::Planning)
                        .unwrap_or_default()
                        .to_string();
                    match self.gate.await_approval(&plan)? {
                        ApprovalDecision::Approved => {
                            self.log.append_step(phase, StepStatus::Completed, None)?;
                        }
                        ApprovalDecision::Rejected => {
                            self.log.append_step(
                                phase,
                                StepStatus::Failed,
                                Some("plan rejected by operator".into()),
                            )?;
                            return Err(EngineError::PlanRejected);
                        }
                    }
                }

                Phase::Implementation => {
                    self.worker_phase(instance, phase, &fixes).await?;
                    fixes.clear();
                }

                Phase::PreReviewGates => self.pre_review_gates(instance).await?,

                Phase::ReviewLoop => self.review_loop(instance).await?,

                Phase::DeliveryValidation => match self.delivery_validation(instance).await {
                    Ok(()) => {}
                    Err(EngineError::ValidationFailed { fixes: found }) => {
                        validation_attempts += 1;
                        if validation_attempts >= self.config.validation_max_attempts {
                            return Err(EngineError::IterationLimitExceeded {
                                phase,
                                iterations: validation_attempts,
                            });
                        }
                        tracing::warn!(
                            attempt = validation_attempts,
                            findings = found.len(),
                            "validation failed, rerouting to implementation"
                        );
                        fixes = found;
                        rerouted = Some(Phase::Implementation);
                    }
                    Err(e) => return Err(e),
                },

                Phase::Ship => {
                    self.log.append_step(phase, StepStatus::Started, None)?;
                    self.registry
                        .release(&instance.task.id, &instance.task.source)?;
                    self.log.append_step(
                        phase,
                        StepStatus::Completed,
                        Some(format!(
                            "stopped at {:?}",
                            instance.policy.stopping_point
                        )),
                    )?;
                    self.log.record_outcome(Outcome::Shipped)?;
                    return Ok(Outcome::Shipped);
                }
            }
        }
    }

    /// Mark the instance aborted: release the claim, keep the log for
    /// post-mortem.
    pub fn abort(&self, instance: &WorkflowInstance) -> Result<(), EngineError> {
        self.log.record_outcome(Outcome::Aborted)?;
        self.registry
            .release(&instance.task.id, &instance.task.source)
    }

    /// Record the selection-time phases on a fresh log. Policy selection,
    /// discovery, and worktree setup happened in the caller before the
    /// machine existed; their checkpoints carry the data resume needs.
    fn bootstrap(&self, instance: &WorkflowInstance) -> Result<(), EngineError> {
        if !self.log.load()?.steps.is_empty() {
            return Ok(());
        }
        let policy = serde_json::to_string(&instance.policy)
            .map_err(|e| anyhow::anyhow!("failed to serialize policy: {e}"))?;
        let task = serde_json::to_string(&instance.task)
            .map_err(|e| anyhow::anyhow!("failed to serialize task: {e}"))?;
        let worktree = instance.worktree.display().to_string();

        for (phase, result) in [
            (Phase::PolicySelection, policy),
            (Phase::TaskDiscovery, task),
            (Phase::WorktreeSetup, worktree),
        ] {
            self.log.append_step(phase, StepStatus::Started, None)?;
            self.log.append_step(phase, StepStatus::Completed, Some(result))?;
        }
        Ok(())
    }

    fn failed_validation_count(&self) -> Result<u32, EngineError> {
        Ok(self
            .log
            .load()?
            .steps
            .iter()
            .filter(|e| {
                e.step == Phase::DeliveryValidation.as_str() && e.status == StepStatus::Failed
            })
            .count() as u32)
    }

    fn input(
        &self,
        instance: &WorkflowInstance,
        phase: Phase,
        iteration: u32,
        sub_step: Option<&str>,
        fixes: &[String],
    ) -> PhaseInput {
        PhaseInput {
            phase,
            sub_step: sub_step.map(|s| s.to_string()),
            iteration,
            task: instance.task.clone(),
            policy: instance.policy.clone(),
            worktree: instance.worktree.clone(),
            fixes: fixes.to_vec(),
        }
    }

    /// One worker-backed phase: checkpoint in, block on the worker,
    /// checkpoint out. A worker failure is recorded and halts the machine.
    async fn worker_phase(
        &self,
        instance: &WorkflowInstance,
        phase: Phase,
        fixes: &[String],
    ) -> Result<(), EngineError> {
        let iteration = self.log.load()?.attempt_count(phase) + 1;
        self.log.append_step(phase, StepStatus::Started, None)?;

        let outcome = self
            .worker
            .run(&self.input(instance, phase, iteration, None, fixes))
            .await?;

        match outcome.status {
            WorkerStatus::Completed => {
                self.log
                    .append_step(phase, StepStatus::Completed, outcome.result)?;
                Ok(())
            }
            WorkerStatus::Failed => {
                let message = outcome.result.unwrap_or_default();
                self.log
                    .append_step(phase, StepStatus::Failed, Some(message.clone()))?;
                Err(EngineError::WorkerFailed { phase, message })
            }
        }
    }

    /// Cleanup and coverage run concurrently with no shared state and no
    /// ordering dependency; both are joined before the phase resolves, so
    /// a failure in one never aborts the other.
    async fn pre_review_gates(&self, instance: &WorkflowInstance) -> Result<(), EngineError> {
        let phase = Phase::PreReviewGates;
        let iteration = self.log.load()?.attempt_count(phase) + 1;
        self.log.append_step(phase, StepStatus::Started, None)?;

        let cleanup_input = self.input(instance, phase, iteration, Some("cleanup"), &[]);
        let coverage_input = self.input(instance, phase, iteration, Some("coverage"), &[]);
        let (cleanup, coverage) = tokio::join!(
            self.worker.run(&cleanup_input),
            self.worker.run(&coverage_input)
        );
        let (cleanup, coverage) = (cleanup?, coverage?);

        let mut failures = Vec::new();
        if cleanup.status == WorkerStatus::Failed {
            failures.push(format!("cleanup: {}", cleanup.result.unwrap_or_default()));
        }
        if coverage.status == WorkerStatus::Failed {
            failures.push(format!("coverage: {}", coverage.result.unwrap_or_default()));
        }

        if failures.is_empty() {
            self.log.append_step(phase, StepStatus::Completed, None)?;
            Ok(())
        } else {
            let message = failures.join("; ");
            self.log
                .append_step(phase, StepStatus::Failed, Some(message.clone()))?;
            Err(EngineError::WorkerFailed { phase, message })
        }
    }

    /// Bounded review iterations. Each pass checkpoints; running out of
    /// budget is fatal and leaves the claim in place for inspection.
    async fn review_loop(&self, instance: &WorkflowInstance) -> Result<(), EngineError> {
        let phase = Phase::ReviewLoop;
        let max = self.config.review_max_iterations;

        for iteration in 1..=max {
            self.log.append_step(phase, StepStatus::Started, None)?;
            let outcome = self
                .worker
                .run(&self.input(instance, phase, iteration, None, &[]))
                .await?;
            match outcome.status {
                WorkerStatus::Completed => {
                    self.log
                        .append_step(phase, StepStatus::Completed, outcome.result)?;
                    return Ok(());
                }
                WorkerStatus::Failed => {
                    tracing::info!(iteration, "review found issues, iterating");
                    self.log
                        .append_step(phase, StepStatus::Failed, outcome.result)?;
                }
            }
        }

        Err(EngineError::IterationLimitExceeded {
            phase,
            iterations: max,
        })
    }

    async fn delivery_validation(&self, instance: &WorkflowInstance) -> Result<(), EngineError> {
        let phase = Phase::DeliveryValidation;
        let iteration = self.log.load()?.attempt_count(phase) + 1;
        self.log.append_step(phase, StepStatus::Started, None)?;

        let outcome = self
            .worker
            .run(&self.input(instance, phase, iteration, None, &[]))
            .await?;

        match outcome.status {
            WorkerStatus::Completed => {
                self.log
                    .append_step(phase, StepStatus::Completed, outcome.result)?;
                Ok(())
            }
            WorkerStatus::Failed => {
                let report = outcome.result.unwrap_or_default();
                let fixes = parse_fix_list(&report);
                self.log
                    .append_step(phase, StepStatus::Failed, Some(report))?;
                Err(EngineError::ValidationFailed { fixes })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::worker::WorkerOutcome;
    use crate::registry::new_claim;
    use crate::task::{PriorityFilter, SourceKind, StoppingPoint, TaskSourceSpec};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Scripted worker: per-phase queues of outcomes, defaulting to
    /// success. Records every invocation for assertions.
    #[derive(Default)]
    struct ScriptWorker {
        script: Mutex<HashMap<Phase, VecDeque<WorkerOutcome>>>,
        calls: Mutex<Vec<(Phase, Option<String>, Vec<String>)>>,
    }

    impl ScriptWorker {
        fn fail_once(self, phase: Phase, report: &str) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(phase)
                .or_default()
                .push_back(WorkerOutcome {
                    status: WorkerStatus::Failed,
                    result: Some(report.to_string()),
                });
            self
        }

        fn fail_times(self, phase: Phase, times: usize) -> Self {
            {
                let mut script = self.script.lock().unwrap();
                let queue = script.entry(phase).or_default();
                for _ in 0..times {
                    queue.push_back(WorkerOutcome {
                        status: WorkerStatus::Failed,
                        result: Some("still broken".into()),
                    });
                }
            }
            self
        }

        fn calls_for(&self, phase: Phase) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _, _)| *p == phase)
                .count()
        }
    }

    #[async_trait]
    impl ExternalWorker for ScriptWorker {
        async fn run(&self, input: &PhaseInput) -> Result<WorkerOutcome, EngineError> {
            self.calls.lock().unwrap().push((
                input.phase,
                input.sub_step.clone(),
                input.fixes.clone(),
            ));
            let scripted = self
                .script
                .lock()
                .unwrap()
                .get_mut(&input.phase)
                .and_then(|q| q.pop_front());
            Ok(scripted.unwrap_or(WorkerOutcome {
                status: WorkerStatus::Completed,
                result: Some(format!("{} done", input.phase)),
            }))
        }
    }

    struct AutoGate(ApprovalDecision);

    impl ApprovalGate for AutoGate {
        fn await_approval(&mut self, _plan: &str) -> anyhow::Result<ApprovalDecision> {
            Ok(self.0)
        }
    }

    struct Fixture {
        config: Config,
        instance: WorkflowInstance,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        let worktree = dir.path().join("wt");
        std::fs::create_dir_all(&worktree).unwrap();
        let instance = WorkflowInstance {
            task: Task {
                id: "7".into(),
                title: "Fix login".into(),
                body: String::new(),
                labels: vec!["bug".into()],
                created_at: Utc::now(),
                source: "github:acme/app".into(),
                kind: SourceKind::Github,
                score: 0,
            },
            policy: Policy {
                task_source: TaskSourceSpec::Fixed {
                    reference: "acme/app".into(),
                },
                priority_filter: PriorityFilter::All,
                stopping_point: StoppingPoint::PrCreated,
            },
            worktree,
            branch: "drydock/github-7-fix-login".into(),
        };
        Fixture {
            config,
            instance,
            _dir: dir,
        }
    }

    fn machine_with(
        fx: &Fixture,
        worker: ScriptWorker,
        decision: ApprovalDecision,
    ) -> (StateMachine, std::sync::Arc<ScriptWorker>) {
        let worker = std::sync::Arc::new(worker);
        let registry = Registry::new(fx.config.registry_path.clone());
        registry
            .claim(new_claim(
                &fx.instance.task.id,
                &fx.instance.task.source,
                fx.instance.worktree.clone(),
                fx.instance.branch.clone(),
            ))
            .unwrap();
        let log = CheckpointLog::new(Config::checkpoint_path(&fx.instance.worktree));
        let machine = StateMachine::new(
            fx.config.clone(),
            Registry::new(fx.config.registry_path.clone()),
            log,
            Box::new(ArcWorker(worker.clone())),
            Box::new(AutoGate(decision)),
        );
        (machine, worker)
    }

    /// Adapter so the test can keep a handle on the worker the machine owns.
    struct ArcWorker(std::sync::Arc<ScriptWorker>);

    #[async_trait]
    impl ExternalWorker for ArcWorker {
        async fn run(&self, input: &PhaseInput) -> Result<WorkerOutcome, EngineError> {
            self.0.run(input).await
        }
    }

    fn log_for(fx: &Fixture) -> CheckpointLog {
        CheckpointLog::new(Config::checkpoint_path(&fx.instance.worktree))
    }

    fn registry_for(fx: &Fixture) -> Registry {
        Registry::new(fx.config.registry_path.clone())
    }

    #[tokio::test]
    async fn happy_path_ships_and_releases_claim() {
        let fx = fixture();
        let (mut machine, worker) =
            machine_with(&fx, ScriptWorker::default(), ApprovalDecision::Approved);

        let outcome = machine.run(&fx.instance).await.unwrap();
        assert_eq!(outcome, Outcome::Shipped);
        assert!(registry_for(&fx).list().unwrap().is_empty());

        let doc = log_for(&fx).load().unwrap();
        assert_eq!(doc.outcome(), Some(Outcome::Shipped));
        assert_eq!(doc.next_phase().unwrap(), None);
        // Worker phases each ran once.
        for phase in [
            Phase::Exploration,
            Phase::Planning,
            Phase::Implementation,
            Phase::ReviewLoop,
            Phase::DeliveryValidation,
            Phase::DocsUpdate,
        ] {
            assert_eq!(worker.calls_for(phase), 1, "{phase}");
        }
    }

    #[tokio::test]
    async fn validation_failure_reroutes_to_implementation_once() {
        let fx = fixture();
        let worker = ScriptWorker::default().fail_once(
            Phase::DeliveryValidation,
            "- add a regression test\n- fix the lint warning",
        );
        let (mut machine, worker) = machine_with(&fx, worker, ApprovalDecision::Approved);

        let outcome = machine.run(&fx.instance).await.unwrap();
        assert_eq!(outcome, Outcome::Shipped);
        // Implementation ran twice: once normally, once with the fix list.
        assert_eq!(worker.calls_for(Phase::Implementation), 2);
        let calls = worker.calls.lock().unwrap();
        let retry_fixes = &calls
            .iter()
            .filter(|(p, _, _)| *p == Phase::Implementation)
            .next_back()
            .unwrap()
            .2;
        assert_eq!(
            retry_fixes,
            &vec![
                "add a regression test".to_string(),
                "fix the lint warning".to_string()
            ]
        );
        drop(calls);

        // The log shows the re-entry and still validates.
        let doc = log_for(&fx).load().unwrap();
        let impl_starts = doc
            .steps
            .iter()
            .filter(|e| e.step == "implementation" && e.status == StepStatus::Started)
            .count();
        assert_eq!(impl_starts, 2);
    }

    #[tokio::test]
    async fn validation_budget_exhaustion_is_fatal_and_keeps_claim() {
        let fx = fixture();
        let worker = ScriptWorker::default().fail_times(Phase::DeliveryValidation, 10);
        let (mut machine, _worker) = machine_with(&fx, worker, ApprovalDecision::Approved);

        let err = machine.run(&fx.instance).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::IterationLimitExceeded {
                phase: Phase::DeliveryValidation,
                ..
            }
        ));
        assert_eq!(registry_for(&fx).list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn review_loop_exceeding_budget_halts_with_claim_retained() {
        let fx = fixture();
        let worker = ScriptWorker::default().fail_times(Phase::ReviewLoop, 10);
        let (mut machine, worker) = machine_with(&fx, worker, ApprovalDecision::Approved);

        let err = machine.run(&fx.instance).await.unwrap_err();
        match err {
            EngineError::IterationLimitExceeded { phase, iterations } => {
                assert_eq!(phase, Phase::ReviewLoop);
                assert_eq!(iterations, fx.config.review_max_iterations);
            }
            other => panic!("expected IterationLimitExceeded, got {other}"),
        }
        assert_eq!(
            worker.calls_for(Phase::ReviewLoop),
            fx.config.review_max_iterations as usize
        );
        // Claim retained for inspection; log preserved.
        assert_eq!(registry_for(&fx).list().unwrap().len(), 1);
        assert!(!log_for(&fx).load().unwrap().steps.is_empty());
    }

    #[tokio::test]
    async fn rejected_plan_halts_before_implementation() {
        let fx = fixture();
        let (mut machine, worker) =
            machine_with(&fx, ScriptWorker::default(), ApprovalDecision::Rejected);

        let err = machine.run(&fx.instance).await.unwrap_err();
        assert!(matches!(err, EngineError::PlanRejected));
        assert_eq!(worker.calls_for(Phase::Implementation), 0);
        // Halted, not aborted: the claim survives for resume.
        assert_eq!(registry_for(&fx).list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_worker_phase_halts_then_resumes_in_place() {
        let fx = fixture();
        let worker = ScriptWorker::default().fail_once(Phase::Exploration, "repo unreadable");
        let (mut machine, _worker) = machine_with(&fx, worker, ApprovalDecision::Approved);

        let err = machine.run(&fx.instance).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::WorkerFailed {
                phase: Phase::Exploration,
                ..
            }
        ));

        // A fresh machine over the same log resumes at exploration and
        // finishes.
        let log = log_for(&fx);
        assert_eq!(log.load().unwrap().next_phase().unwrap(), Some(Phase::Exploration));
        let mut machine2 = StateMachine::new(
            fx.config.clone(),
            registry_for(&fx),
            log,
            Box::new(ScriptWorker::default()),
            Box::new(AutoGate(ApprovalDecision::Approved)),
        );
        assert_eq!(machine2.run(&fx.instance).await.unwrap(), Outcome::Shipped);
    }

    #[tokio::test]
    async fn pre_review_gates_run_both_substeps_even_when_one_fails() {
        let fx = fixture();
        // First scripted outcome feeds whichever sub-step pops it; both
        // sub-steps are still invoked.
        let worker = ScriptWorker::default().fail_once(Phase::PreReviewGates, "stray debug print");
        let (mut machine, worker) = machine_with(&fx, worker, ApprovalDecision::Approved);

        let err = machine.run(&fx.instance).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::WorkerFailed {
                phase: Phase::PreReviewGates,
                ..
            }
        ));
        let calls = worker.calls.lock().unwrap();
        let substeps: Vec<_> = calls
            .iter()
            .filter(|(p, _, _)| *p == Phase::PreReviewGates)
            .map(|(_, s, _)| s.clone().unwrap())
            .collect();
        assert_eq!(substeps.len(), 2);
        assert!(substeps.contains(&"cleanup".to_string()));
        assert!(substeps.contains(&"coverage".to_string()));
    }

    #[tokio::test]
    async fn abort_releases_claim_and_preserves_log() {
        let fx = fixture();
        let worker = ScriptWorker::default().fail_once(Phase::Planning, "stuck");
        let (mut machine, _worker) = machine_with(&fx, worker, ApprovalDecision::Approved);
        let _ = machine.run(&fx.instance).await.unwrap_err();

        machine.abort(&fx.instance).unwrap();
        assert!(registry_for(&fx).list().unwrap().is_empty());
        let doc = log_for(&fx).load().unwrap();
        assert_eq!(doc.outcome(), Some(Outcome::Aborted));
        assert!(!doc.steps.is_empty());
    }

    #[tokio::test]
    async fn instance_round_trips_through_bootstrap_checkpoints() {
        let fx = fixture();
        let (mut machine, _worker) =
            machine_with(&fx, ScriptWorker::default(), ApprovalDecision::Approved);
        machine.run(&fx.instance).await.unwrap();

        let claim = new_claim(
            "7",
            "github:acme/app",
            fx.instance.worktree.clone(),
            fx.instance.branch.clone(),
        );
        let rebuilt = instance_from_claim(&claim, &log_for(&fx)).unwrap();
        assert_eq!(rebuilt.task.id, fx.instance.task.id);
        assert_eq!(rebuilt.policy, fx.instance.policy);
    }

    #[test]
    fn fix_list_parses_bullets_and_fix_prefixes() {
        let report = "Validation report\n- add a test\n* update docs\nFIX: rename the flag\n";
        assert_eq!(
            parse_fix_list(report),
            vec!["add a test", "update docs", "rename the flag"]
        );
    }

    #[test]
    fn unstructured_report_becomes_single_finding() {
        assert_eq!(parse_fix_list("it is broken"), vec!["it is broken"]);
        assert!(parse_fix_list("   \n").is_empty());
    }
}
