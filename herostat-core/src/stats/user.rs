//! Per-user activity aggregates.

use serde::{Deserialize, Serialize};

use super::Activity;
use crate::entity::{Factory, Record, RecordKind};
use crate::types::Address;

/// Activity counters for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Lowercased address.
    pub id: Address,
    /// Staking, combat and crafting activity.
    pub activity: Activity,
}

impl UserStats {
    /// Zero stats for `address`.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            id: address,
            activity: Activity::new(),
        }
    }
}

impl Record for UserStats {
    const KIND: RecordKind = RecordKind::UserStats;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

impl Factory for UserStats {
    fn with_defaults(id: &str) -> Self {
        Self::new(Address::new(id))
    }
}
