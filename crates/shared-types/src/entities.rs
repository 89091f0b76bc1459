//! # Core Entities
//!
//! Value types describing rows, transactions and lock requests.
//!
//! ## Clusters
//!
//! - **Rows**: `RowId`, `Attributes`, `RowSnapshot`, `Patch`
//! - **Transactions**: `TxnId`, `TxnInfo`, `TxnStatus`, `CommitSeq`, `BeginOptions`
//! - **Locking**: `LockMode`, `IsolationLevel`, `Dialect`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: ROWS
// =============================================================================

/// Primary key of a row.
pub type RowId = u64;

/// Mutable attributes of a row, keyed by column name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A row as seen by one transaction at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSnapshot {
    /// Primary key.
    pub id: RowId,
    /// Column values.
    pub attributes: Attributes,
}

impl RowSnapshot {
    /// Create a snapshot with no attributes.
    pub fn new(id: RowId) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(column.into(), value.into());
        self
    }

    /// Read one column.
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.attributes.get(column)
    }
}

/// A set of column assignments applied by a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub Attributes);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column assignment.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Merge this patch over `base`, returning the new row image.
    pub fn apply_to(&self, base: &Attributes) -> Attributes {
        let mut merged = base.clone();
        for (column, value) in &self.0 {
            merged.insert(column.clone(), value.clone());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// Engine-assigned transaction identifier. Higher ids are younger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Engine-assigned commit number; strictly increasing in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitSeq(pub u64);

/// Lifecycle state of a transaction.
///
/// Transitions are one-way: `Active -> Committed` or `Active -> RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxnStatus {
    Active,
    Committed,
    RolledBack,
}

impl TxnStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled-back"),
        }
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadUncommitted => write!(f, "read-uncommitted"),
            Self::ReadCommitted => write!(f, "read-committed"),
            Self::RepeatableRead => write!(f, "repeatable-read"),
            Self::Serializable => write!(f, "serializable"),
        }
    }
}

/// Row lock requested by a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockMode {
    /// Plain (consistent) read.
    #[default]
    None,
    /// `FOR SHARE`: concurrent readers allowed, writers blocked.
    Shared,
    /// `FOR UPDATE`: exclusive.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Options passed to `TransactionStore::begin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginOptions {
    /// `None` selects the engine default.
    pub isolation_level: Option<IsolationLevel>,
}

impl BeginOptions {
    pub fn with_isolation(isolation_level: IsolationLevel) -> Self {
        Self {
            isolation_level: Some(isolation_level),
        }
    }
}

/// What `begin` hands back: the session id and the isolation it runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnInfo {
    pub id: TxnId,
    pub isolation_level: IsolationLevel,
}

/// Locking dialect of a storage engine.
///
/// The dialects differ in how a shared-lock holder's upgrade to exclusive is
/// queued relative to transactions already waiting on the same row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// InnoDB-style: an upgrade conflicts with earlier queued waiters.
    #[default]
    Mysql,
    /// PostgreSQL-style: a holder upgrades ahead of queued waiters.
    Postgres,
}

impl Dialect {
    /// Isolation level used when `BeginOptions::isolation_level` is `None`.
    pub fn default_isolation(self) -> IsolationLevel {
        match self {
            Self::Mysql => IsolationLevel::RepeatableRead,
            Self::Postgres => IsolationLevel::ReadCommitted,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql => write!(f, "mysql"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" | "innodb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}
