//! Player records: holdings, balances and spend per address.

use serde::{Deserialize, Serialize};

use super::{Factory, Record, RecordKind};
use crate::stats::{Economy, Holdings};
use crate::types::Address;

/// A player, keyed by lowercased address. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Lowercased address.
    pub id: Address,
    /// Block time of the first event that touched this player.
    pub first_seen_at: Option<u64>,
    /// Heroes and weapons attributed to this player.
    pub holdings: Holdings,
    /// Spend and purchase counts.
    pub economy: Economy,
    /// Reward token balance tracked by the engine (wei).
    pub balance: u128,
    /// Shards held.
    pub shards: u64,
    /// Gacha tickets held.
    pub gacha_tickets: u64,
    /// Lifetime rewards minus spend. May be negative.
    pub net_earnings: i128,
}

impl Player {
    /// A zero player for `address`.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            id: address,
            first_seen_at: None,
            holdings: Holdings::new(),
            economy: Economy::default(),
            balance: 0,
            shards: 0,
            gacha_tickets: 0,
            net_earnings: 0,
        }
    }

    /// Credit a reward payout.
    pub fn credit(&mut self, amount: u128) {
        self.balance = self.balance.saturating_add(amount);
        self.net_earnings = self.net_earnings.saturating_add(to_signed(amount));
    }

    /// Debit a purchase. The balance never goes below zero; the shortfall is
    /// returned so callers can log it. `net_earnings` is charged in full.
    pub fn debit(&mut self, amount: u128) -> u128 {
        let shortfall = amount.saturating_sub(self.balance);
        self.balance = self.balance.saturating_sub(amount);
        self.net_earnings = self.net_earnings.saturating_sub(to_signed(amount));
        shortfall
    }
}

fn to_signed(amount: u128) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}

impl Record for Player {
    const KIND: RecordKind = RecordKind::Player;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

impl Factory for Player {
    fn with_defaults(id: &str) -> Self {
        Self::new(Address::new(id))
    }
}
