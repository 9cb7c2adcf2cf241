//! Table lifecycle and capacity types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Throughput billing mode for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CapacityMode {
    Provisioned {
        read_capacity_units: i64,
        write_capacity_units: i64,
    },
    OnDemand,
}

impl CapacityMode {
    pub fn provisioned(read_capacity_units: i64, write_capacity_units: i64) -> Self {
        Self::Provisioned {
            read_capacity_units,
            write_capacity_units,
        }
    }

    /// Provisioned units must be at least one.
    pub fn validate(&self, table: &str) -> Result<()> {
        if let Self::Provisioned {
            read_capacity_units,
            write_capacity_units,
        } = self
        {
            if *read_capacity_units < 1 || *write_capacity_units < 1 {
                return Err(Error::schema(
                    table,
                    format!(
                        "provisioned throughput must be at least 1 unit, got {read_capacity_units} read / {write_capacity_units} write"
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for CapacityMode {
    fn default() -> Self {
        Self::provisioned(1, 1)
    }
}

impl fmt::Display for CapacityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioned {
                read_capacity_units,
                write_capacity_units,
            } => write!(
                f,
                "provisioned ({read_capacity_units} RCU / {write_capacity_units} WCU)"
            ),
            Self::OnDemand => write!(f, "on-demand"),
        }
    }
}

/// Table lifecycle status. A missing table is represented by `None` at the
/// call sites that describe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl TableStatus {
    /// Parses the status string the remote reports.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATING" => Some(Self::Creating),
            "ACTIVE" => Some(Self::Active),
            "UPDATING" => Some(Self::Updating),
            "DELETING" => Some(Self::Deleting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TableStatus) -> bool {
        matches!(
            (self, next),
            (Self::Creating, Self::Active)
                | (Self::Active, Self::Updating)
                | (Self::Updating, Self::Active)
                | (Self::Active, Self::Deleting)
        )
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a table as the remote describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub table_name: String,
    pub status: TableStatus,
    pub capacity_mode: CapacityMode,
    pub item_count: u64,
}

/// Read consistency. Always passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    Eventual,
    Strong,
}

impl Consistency {
    pub fn is_strong(&self) -> bool {
        matches!(self, Self::Strong)
    }
}
