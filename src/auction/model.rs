// Persisted document types and derived read-only views.
//
// The serialized shapes of these types are the compatibility contract for
// anything polling the engine's state: field names and nesting round-trip
// losslessly through the document store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique player identifier.
pub type PlayerId = u64;

/// Auction currency. All prices, purses, and increments are whole units.
pub type Money = u64;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Account roles recognized by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Auctioneer,
    Bidder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    pub role: Role,
    /// The team a bidder bids for. Empty for the auctioneer.
    #[serde(default)]
    pub team_name: String,
}

// ---------------------------------------------------------------------------
// Teams and players
// ---------------------------------------------------------------------------

/// A bidding team. The roster is a derived view (see [`TeamView`]), never
/// stored on the team itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    /// Remaining spendable budget.
    pub purse: Money,
    /// The purse the team started with; `reset` restores to this.
    pub default_purse: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub age: u32,
    pub role: String,
    pub base_price: Money,
    pub grade: String,
    #[serde(default)]
    pub sold: bool,
    /// Name of the owning team; empty while unsold.
    #[serde(default)]
    pub sold_to: String,
    #[serde(default)]
    pub final_price: Money,
}

impl Player {
    /// Revert to the unsold state (rollback and reset paths).
    pub fn mark_unsold(&mut self) {
        self.sold = false;
        self.sold_to.clear();
        self.final_price = 0;
    }
}

// ---------------------------------------------------------------------------
// Auction state singleton
// ---------------------------------------------------------------------------

/// The standing high bid on the current lot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentBid {
    /// `None` until the first bid on the lot is accepted.
    pub amount: Option<Money>,
    pub bidder: String,
    pub team_name: String,
}

/// One accepted bid, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidEvent {
    pub bidder: String,
    pub team_name: String,
    pub amount: Money,
}

/// The auction state singleton. Long-lived; reinitialized wholesale by reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionState {
    /// Index into the players document, or -1 when no lot is selected.
    pub current_player_index: i64,
    pub auction_active: bool,
    pub current_bid: CurrentBid,
    pub last_bid_team: String,
    pub sold_to: String,
    /// Accepted bids keyed by player id; holds entries only for the current
    /// (or most recently active) lot.
    pub current_bid_history: BTreeMap<PlayerId, Vec<BidEvent>>,
}

impl Default for AuctionState {
    fn default() -> Self {
        AuctionState {
            current_player_index: -1,
            auction_active: false,
            current_bid: CurrentBid::default(),
            last_bid_team: String::new(),
            sold_to: String::new(),
            current_bid_history: BTreeMap::new(),
        }
    }
}

impl AuctionState {
    /// The current lot's index, when one is selected and valid.
    pub fn current_index(&self) -> Option<usize> {
        usize::try_from(self.current_player_index).ok()
    }

    /// Open bidding on the lot at `index`: clears all bid state from the
    /// previous lot.
    pub fn begin_lot(&mut self, index: usize) {
        self.current_player_index = index as i64;
        self.auction_active = true;
        self.clear_bid_fields();
    }

    /// Drop the lot pointer entirely (pass / next).
    pub fn clear_lot(&mut self) {
        self.current_player_index = -1;
        self.auction_active = false;
        self.clear_bid_fields();
    }

    /// Reset bid fields without touching the lot pointer (rollback keeps the
    /// pointer where it was, matching the settlement it undoes).
    pub fn clear_bidding(&mut self) {
        self.auction_active = false;
        self.clear_bid_fields();
    }

    fn clear_bid_fields(&mut self) {
        self.current_bid = CurrentBid::default();
        self.last_bid_team.clear();
        self.sold_to.clear();
        self.current_bid_history.clear();
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// Action recorded by a sell settlement.
pub const ACTION_SELL: &str = "sell";

/// Undo-ledger item. Created at sell, consumable exactly once by rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub player_id: PlayerId,
    pub team: String,
    pub price: Money,
}

impl HistoryEntry {
    pub fn sell(player_id: PlayerId, team: &str, price: Money) -> Self {
        HistoryEntry {
            action: ACTION_SELL.to_string(),
            player_id,
            team: team.to_string(),
            price,
        }
    }
}

/// Immutable audit record of a completed sale. Append-only; never replayed
/// by rollback, so a rollback-then-resell leaves two entries for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoldRecord {
    /// Snapshot of the player at the moment of sale.
    pub player: Player,
    pub team_name: String,
    pub final_price: Money,
    pub sold_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// One player on a team's derived roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSlot {
    pub id: PlayerId,
    pub name: String,
    pub final_price: Money,
}

/// A team plus its derived roster of currently-owned players.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamView {
    pub team_name: String,
    pub purse: Money,
    pub default_purse: Money,
    pub players: Vec<RosterSlot>,
}

/// Snapshot returned by `state_view` for pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateView {
    pub current_player: Option<Player>,
    pub highest_bid: Option<Money>,
    pub teams: Vec<TeamView>,
    pub auction_active: bool,
    pub min_increment: Money,
    pub bid_history: Vec<BidEvent>,
    pub last_bid_team: String,
    pub sold_to: String,
}

/// Successful bid acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidAccepted {
    pub team_name: String,
    pub amount: Money,
}

/// Result of a sell settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub player: Player,
    pub sold_to: String,
    pub final_price: Money,
}
