//! # Scenario Orchestrator
//!
//! Realizes one interleaving of a `ScenarioSpec`:
//!
//! 1. Seed the row under test
//! 2. Begin the transactions in order, performing setup reads
//! 3. Spawn one task per flow and wait for all of them
//! 4. Roll back anything still active, count open engine sessions
//!
//! ## Ordering
//!
//! Flows are spawned in declaration order onto the current runtime. A milestone is
//! recorded immediately before and after every lock-sensitive call, and
//! after each completed call the flow yields once, so a flow woken by that
//! call (a lock grant, a deadlock abort) records its outcome before this
//! flow issues its next statement. Milestone order is reproducible only on
//! a current-thread runtime.

use crate::domain::errors::HarnessError;
use crate::domain::events::{EventRecorder, Operation, Phase};
use crate::domain::handle::TransactionHandle;
use crate::domain::outcome::{FlowFailure, FlowOutcome, FlowReport, ScenarioResult, TxnReport};
use crate::domain::scenario::{FlowSpec, ScenarioSpec, Step, TxnLabel};
use crate::domain::signals::ScenarioSignals;
use crate::ports::inbound::ScenarioExecutor;
use crate::ports::outbound::TransactionStore;
use async_trait::async_trait;
use shared_types::{ErrorKind, Patch, RowId, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Runs scenarios against one store.
pub struct ScenarioOrchestrator {
    store: Arc<dyn TransactionStore>,
}

/// State shared by the flows of one run.
struct FlowContext {
    row: RowId,
    handles: Vec<Arc<TransactionHandle>>,
    recorder: EventRecorder,
    signals: ScenarioSignals,
}

impl FlowContext {
    fn handle(&self, label: &TxnLabel) -> Option<&Arc<TransactionHandle>> {
        self.handles.iter().find(|handle| handle.label() == label)
    }
}

/// A lock-sensitive step, resolved from a `Step`.
enum Action<'a> {
    Read,
    Write(&'a Patch),
    Commit,
    Rollback,
}

impl Action<'_> {
    fn operation(&self) -> Operation {
        match self {
            Self::Read => Operation::Read,
            Self::Write(_) => Operation::Write,
            Self::Commit => Operation::Commit,
            Self::Rollback => Operation::Rollback,
        }
    }
}

impl ScenarioOrchestrator {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Run `spec` once.
    pub async fn run(&self, spec: &ScenarioSpec) -> Result<ScenarioResult, HarnessError> {
        spec.validate()?;
        let run_id = Uuid::new_v4();
        let span = info_span!("scenario", name = %spec.name, %run_id);

        self.run_once(spec, run_id).instrument(span).await
    }

    async fn run_once(&self, spec: &ScenarioSpec, run_id: Uuid) -> Result<ScenarioResult, HarnessError> {
        let started = Instant::now();
        info!(dialect = %spec.dialect, flows = spec.flows.len(), "Scenario started");

        self.store
            .seed(spec.row.clone())
            .await
            .map_err(|source| HarnessError::Seed {
                row: spec.row.id,
                source,
            })?;

        let handles = self.begin_all(spec).await?;
        let context = Arc::new(FlowContext {
            row: spec.row.id,
            handles,
            recorder: EventRecorder::new(),
            signals: ScenarioSignals::new(spec.labels()),
        });

        let tasks: Vec<_> = spec
            .flows
            .iter()
            .map(|flow| {
                let task = run_flow(context.clone(), flow.clone()).instrument(Span::current());
                (flow.owner.clone(), tokio::spawn(task))
            })
            .collect();

        let mut flows = Vec::with_capacity(tasks.len());
        let mut task_error = None;
        for (owner, task) in tasks {
            match task.await {
                Ok(outcome) => flows.push(FlowReport { owner, outcome }),
                Err(e) => {
                    warn!(%owner, error = %e, "Flow task did not finish");
                    if task_error.is_none() {
                        task_error = Some(HarnessError::FlowTask {
                            owner,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        let swept = sweep(&context.handles).await;
        let leaked = self.store.active_transactions().await;
        if leaked > 0 {
            warn!(leaked, "Engine still reports open transactions");
        }
        if let Some(e) = task_error {
            return Err(e);
        }

        let transactions: BTreeMap<TxnLabel, TxnReport> = context
            .handles
            .iter()
            .map(|handle| {
                let report = TxnReport {
                    id: handle.id(),
                    isolation_level: handle.isolation_level(),
                    status: handle.status(),
                    commit_seq: handle.commit_seq(),
                    aborted_by_engine: handle.aborted_by_engine(),
                    swept: swept.contains(handle.label()),
                };
                (handle.label().clone(), report)
            })
            .collect();

        let elapsed = started.elapsed();
        info!(elapsed_ms = elapsed.as_millis() as u64, leaked, "Scenario finished");

        Ok(ScenarioResult {
            scenario: spec.name.clone(),
            run_id,
            milestones: context.recorder.milestones(),
            transactions,
            flows,
            leaked,
            elapsed,
        })
    }

    /// Begin every transaction in order. On failure, roll back the ones
    /// already begun before reporting.
    async fn begin_all(&self, spec: &ScenarioSpec) -> Result<Vec<Arc<TransactionHandle>>, HarnessError> {
        let mut handles: Vec<Arc<TransactionHandle>> = Vec::with_capacity(spec.transactions.len());

        for setup in &spec.transactions {
            let begun = TransactionHandle::begin(
                self.store.clone(),
                setup.label.clone(),
                setup.isolation_level,
                setup.lock_mode_on_first_read,
            )
            .await;

            let handle = match begun {
                Ok(handle) => Arc::new(handle),
                Err(source) => {
                    sweep(&handles).await;
                    return Err(HarnessError::Setup {
                        txn: setup.label.clone(),
                        source,
                    });
                }
            };
            handles.push(handle.clone());

            if setup.setup_read {
                if let Err(source) = handle.read(spec.row.id).await {
                    sweep(&handles).await;
                    return Err(HarnessError::Setup {
                        txn: setup.label.clone(),
                        source,
                    });
                }
            }
            debug!(label = %setup.label, txn = %handle.id(), setup_read = setup.setup_read, "Setup complete");
        }

        Ok(handles)
    }
}

#[async_trait]
impl ScenarioExecutor for ScenarioOrchestrator {
    async fn execute(&self, spec: &ScenarioSpec) -> Result<ScenarioResult, HarnessError> {
        self.run(spec).await
    }
}

/// Roll back every handle that is still active. Returns the labels rolled back.
async fn sweep(handles: &[Arc<TransactionHandle>]) -> Vec<TxnLabel> {
    let mut swept = Vec::new();
    for handle in handles {
        if !handle.is_terminal() && handle.rollback_quietly().await {
            debug!(label = %handle.label(), "Swept active transaction");
            swept.push(handle.label().clone());
        }
    }
    swept
}

async fn run_flow(context: Arc<FlowContext>, flow: FlowSpec) -> FlowOutcome {
    for (index, step) in flow.steps.iter().enumerate() {
        let (txn, action) = match step {
            Step::Delay { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                continue;
            }
            Step::Read { txn } => (txn, Action::Read),
            Step::Write { txn, patch } => (txn, Action::Write(patch)),
            Step::Commit { txn } => (txn, Action::Commit),
            Step::Rollback { txn } => (txn, Action::Rollback),
        };

        let Some(handle) = context.handle(txn) else {
            return FlowOutcome::Failed(FlowFailure {
                txn: txn.clone(),
                kind: ErrorKind::Internal,
                message: format!("no transaction labelled {txn}"),
            });
        };

        if context.signals.is_terminal(txn) || handle.is_terminal() {
            let skipped = flow.steps[index..]
                .iter()
                .filter(|step| step.txn().is_some())
                .count();
            debug!(owner = %flow.owner, %txn, skipped, "Transaction already finished, stopping flow");
            return FlowOutcome::Stopped { skipped };
        }

        let op = action.operation();
        context.recorder.record_step(txn, op, Phase::Begin);
        let result = perform(&context, handle, txn, &action).await;

        match result {
            Ok(()) => {
                context.recorder.record_step(txn, op, Phase::Done);
                if handle.is_terminal() {
                    context.signals.mark_terminal(txn);
                }
                tokio::task::yield_now().await;
            }
            Err(e) => {
                context.recorder.record_step(txn, op, Phase::Fails(e.kind()));
                if handle.is_terminal() {
                    context.signals.mark_terminal(txn);
                }
                info!(owner = %flow.owner, %txn, %op, kind = %e.kind(), error = %e, "Flow step failed");

                let own_commit = matches!(action, Action::Commit) && txn == &flow.owner;
                cleanup(&context, &flow.owner, own_commit).await;
                return FlowOutcome::Failed(FlowFailure::from_store(txn.clone(), &e));
            }
        }
    }

    FlowOutcome::Completed
}

async fn perform(
    context: &FlowContext,
    handle: &TransactionHandle,
    txn: &TxnLabel,
    action: &Action<'_>,
) -> Result<(), StoreError> {
    match action {
        Action::Read => handle.read(context.row).await.map(|_| ()),
        Action::Write(patch) => handle.write(context.row, patch).await,
        Action::Commit => {
            context.signals.mark_committing(txn);
            handle.commit().await.map(|_| ())
        }
        Action::Rollback => handle.rollback().await,
    }
}

/// Roll back the flow's own transaction after a failure, unless it is
/// already terminal or another flow is committing it.
async fn cleanup(context: &FlowContext, owner: &TxnLabel, own_commit: bool) {
    let Some(handle) = context.handle(owner) else {
        return;
    };
    if handle.is_terminal() {
        context.signals.mark_terminal(owner);
        return;
    }
    if context.signals.is_committing(owner) && !own_commit {
        debug!(%owner, "Skipping cleanup rollback, another flow is committing");
        return;
    }
    handle.rollback_quietly().await;
    context.signals.mark_terminal(owner);
}
