//! # Built-in Scenarios
//!
//! All three share one setup: row `{id: 1, username: "jan", awesome: false}`,
//! T1 begun with a shared-lock first read, T2 begun read-committed.
//!
//! | Scenario | Dialect | What it shows |
//! |---|---|---|
//! | `contention` | postgres | T2's write waits until T1 has committed |
//! | `deadlock` | mysql | T1's lock upgrade closes a cycle; T2 is aborted |
//! | `plain-read-not-blocked` | mysql | T2's plain read passes T1's locks; its write does not |

use crate::config::CatalogConfig;
use crate::domain::errors::HarnessError;
use crate::domain::scenario::{
    Expectation, ExpectedFailure, FlowSpec, ScenarioSpec, Step, TxnLabel, TxnSetup,
};
use shared_types::{
    Dialect, ErrorKind, IsolationLevel, LockMode, Patch, RowSnapshot, TxnStatus, DEADLOCK_MESSAGE,
};
use std::collections::BTreeMap;

pub const CONTENTION: &str = "contention";
pub const DEADLOCK: &str = "deadlock";
pub const PLAIN_READ_NOT_BLOCKED: &str = "plain-read-not-blocked";

/// Names of every built-in scenario.
pub fn names() -> [&'static str; 3] {
    [CONTENTION, DEADLOCK, PLAIN_READ_NOT_BLOCKED]
}

/// Look up a built-in scenario.
pub fn by_name(name: &str, config: &CatalogConfig) -> Result<ScenarioSpec, HarnessError> {
    match name {
        CONTENTION => Ok(contention(config)),
        DEADLOCK => Ok(deadlock(config)),
        PLAIN_READ_NOT_BLOCKED => Ok(plain_read_not_blocked(config)),
        other => Err(HarnessError::UnknownScenario(other.to_string())),
    }
}

/// Every built-in scenario.
pub fn all(config: &CatalogConfig) -> Vec<ScenarioSpec> {
    vec![contention(config), deadlock(config), plain_read_not_blocked(config)]
}

fn t1() -> TxnLabel {
    TxnLabel::new("T1")
}

fn t2() -> TxnLabel {
    TxnLabel::new("T2")
}

fn row() -> RowSnapshot {
    RowSnapshot::new(1).with("username", "jan").with("awesome", false)
}

fn awesome(value: bool) -> Patch {
    Patch::new().set("awesome", value)
}

fn ordering(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|label| label.to_string()).collect()
}

/// T1 shared-locks, T2 plain-reads; both during setup unless `t2_setup_read` is off.
fn transactions(t2_setup_read: bool) -> Vec<TxnSetup> {
    vec![
        TxnSetup {
            label: t1(),
            isolation_level: None,
            lock_mode_on_first_read: LockMode::Shared,
            setup_read: true,
        },
        TxnSetup {
            label: t2(),
            isolation_level: Some(IsolationLevel::ReadCommitted),
            lock_mode_on_first_read: LockMode::None,
            setup_read: t2_setup_read,
        },
    ]
}

/// T2 writes straight away; T1 writes after `writer_delay_ms`, then commits.
fn upgrade_flows(config: &CatalogConfig, t2_patch: Patch) -> Vec<FlowSpec> {
    vec![
        FlowSpec {
            owner: t2(),
            steps: vec![Step::write(t2(), t2_patch), Step::commit(t2())],
        },
        FlowSpec {
            owner: t1(),
            steps: vec![
                Step::Delay {
                    ms: config.writer_delay_ms,
                },
                Step::write(t1(), awesome(true)),
                Step::commit(t1()),
            ],
        },
    ]
}

/// Shared lock serializes writers: T2's write completes only after T1's commit.
pub fn contention(config: &CatalogConfig) -> ScenarioSpec {
    ScenarioSpec {
        name: CONTENTION.to_string(),
        description: "T2's write waits behind T1's shared lock until T1 upgrades, writes and commits"
            .to_string(),
        dialect: Dialect::Postgres,
        row: row(),
        transactions: transactions(true),
        flows: upgrade_flows(config, awesome(false)),
        expectation: Expectation {
            reference_orderings: vec![
                ordering(&[
                    "T2 write begin",
                    "T1 write begin",
                    "T1 write done",
                    "T1 commit begin",
                    "T1 commit done",
                    "T2 write done",
                    "T2 commit begin",
                    "T2 commit done",
                ]),
                // The waiter may observe its grant before the committer observes its commit.
                ordering(&[
                    "T2 write begin",
                    "T1 write begin",
                    "T1 write done",
                    "T1 commit begin",
                    "T2 write done",
                    "T1 commit done",
                    "T2 commit begin",
                    "T2 commit done",
                ]),
            ],
            final_states: BTreeMap::from([(t1(), TxnStatus::Committed), (t2(), TxnStatus::Committed)]),
            expected_failure: None,
            commit_order: Some(vec![t1(), t2()]),
        },
    }
}

/// Lock upgrade against a queued writer: the engine aborts T2, T1 commits.
pub fn deadlock(config: &CatalogConfig) -> ScenarioSpec {
    ScenarioSpec {
        name: DEADLOCK.to_string(),
        description: "T1 upgrades its shared lock while T2 waits for exclusive access".to_string(),
        dialect: Dialect::Mysql,
        row: row(),
        transactions: transactions(true),
        flows: upgrade_flows(config, awesome(true)),
        expectation: Expectation {
            reference_orderings: vec![
                ordering(&[
                    "T2 write begin",
                    "T1 write begin",
                    "T1 write done",
                    "T2 write fails(deadlock)",
                    "T1 commit begin",
                    "T1 commit done",
                ]),
                // The victim may observe the abort before T1 observes its grant.
                ordering(&[
                    "T2 write begin",
                    "T1 write begin",
                    "T2 write fails(deadlock)",
                    "T1 write done",
                    "T1 commit begin",
                    "T1 commit done",
                ]),
            ],
            final_states: BTreeMap::from([(t1(), TxnStatus::Committed), (t2(), TxnStatus::RolledBack)]),
            expected_failure: Some(ExpectedFailure {
                flow: t2(),
                kind: ErrorKind::Deadlock,
                message: DEADLOCK_MESSAGE.to_string(),
            }),
            commit_order: Some(vec![t1()]),
        },
    }
}

/// A plain read is not blocked by a lock holder, a write is.
pub fn plain_read_not_blocked(config: &CatalogConfig) -> ScenarioSpec {
    ScenarioSpec {
        name: PLAIN_READ_NOT_BLOCKED.to_string(),
        description: "T2's plain read returns before T1 commits; T2's write only after".to_string(),
        dialect: Dialect::Mysql,
        row: row(),
        transactions: transactions(false),
        flows: vec![
            FlowSpec {
                owner: t2(),
                steps: vec![Step::read(t2()), Step::write(t2(), awesome(false)), Step::commit(t2())],
            },
            FlowSpec {
                owner: t1(),
                steps: vec![
                    Step::write(t1(), awesome(true)),
                    Step::Delay {
                        ms: config.hold_delay_ms,
                    },
                    Step::commit(t1()),
                ],
            },
        ],
        expectation: Expectation {
            reference_orderings: vec![
                ordering(&[
                    "T2 read begin",
                    "T2 read done",
                    "T1 write begin",
                    "T1 write done",
                    "T2 write begin",
                    "T1 commit begin",
                    "T1 commit done",
                    "T2 write done",
                    "T2 commit begin",
                    "T2 commit done",
                ]),
                ordering(&[
                    "T2 read begin",
                    "T2 read done",
                    "T1 write begin",
                    "T1 write done",
                    "T2 write begin",
                    "T1 commit begin",
                    "T2 write done",
                    "T1 commit done",
                    "T2 commit begin",
                    "T2 commit done",
                ]),
            ],
            final_states: BTreeMap::from([(t1(), TxnStatus::Committed), (t2(), TxnStatus::Committed)]),
            expected_failure: None,
            commit_order: Some(vec![t1(), t2()]),
        },
    }
}
