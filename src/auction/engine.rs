// The auction state machine.
//
// Every mutating operation runs as an atomic read-validate-write critical
// section over the combined state/teams/players snapshot, serialized by a
// single exclusive guard. Guard acquisition is bounded: a caller that cannot
// take the guard within the configured timeout gets `Busy` instead of
// blocking indefinitely. Read-only queries read the latest committed
// snapshot without taking the guard.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::auction::bid;
use crate::auction::ledger::{SettlementLedger, TeamLedger};
use crate::auction::model::{
    AuctionState, BidAccepted, BidEvent, CurrentBid, HistoryEntry, Money, Player, PlayerId,
    RosterSlot, Settlement, SoldRecord, StateView, Team, TeamView, User,
};
use crate::error::{AuctionError, Result};
use crate::store::{Doc, Store};

/// How long to wait between guard acquisition attempts.
const GUARD_RETRY_INTERVAL: Duration = Duration::from_millis(1);

pub struct AuctionEngine {
    store: Arc<Store>,
    /// The single serialization point for all mutating operations.
    gate: Mutex<()>,
    lock_timeout: Duration,
}

impl AuctionEngine {
    pub fn new(store: Arc<Store>, lock_timeout: Duration) -> Self {
        AuctionEngine {
            store,
            gate: Mutex::new(()),
            lock_timeout,
        }
    }

    /// Write seed data for any document that has never been written. Existing
    /// documents are left untouched so a restart resumes the running auction.
    pub fn seed(&self, users: &[User], teams: &[Team], players: &[Player]) -> Result<()> {
        let _guard = self.guard()?;
        self.seed_doc(Doc::Users, &users)?;
        self.seed_doc(Doc::Teams, &teams)?;
        self.seed_doc(Doc::Players, &players)?;
        self.seed_doc(Doc::Sold, &Vec::<SoldRecord>::new())?;
        self.seed_doc(Doc::History, &Vec::<HistoryEntry>::new())?;
        self.seed_doc(Doc::State, &AuctionState::default())?;
        Ok(())
    }

    fn seed_doc<T: Serialize>(&self, doc: Doc, value: &T) -> Result<()> {
        if !self.store.exists(doc)? {
            debug!(doc = doc.name(), "seeding document");
            self.store.replace(doc, value)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutating operations
    // -----------------------------------------------------------------------

    /// Put an unsold player up for auction. Clears all bid state from the
    /// previous lot.
    pub fn select_lot(&self, player_id: PlayerId) -> Result<Player> {
        let _guard = self.guard()?;
        let players = self.read_players()?;
        let index = players
            .iter()
            .position(|p| p.id == player_id && !p.sold)
            .ok_or(AuctionError::NotFound(player_id))?;
        let player = players[index].clone();

        let mut state = self.read_state()?;
        state.begin_lot(index);
        self.store.replace(Doc::State, &state)?;

        info!(player_id, player = %player.name, "lot selected");
        Ok(player)
    }

    /// Submit a bid on the current lot. On success the bid is immediately
    /// visible to all readers; there is no staged visibility.
    pub fn place_bid(
        &self,
        bidder: &str,
        team_name: &str,
        player_id: PlayerId,
        amount: Money,
    ) -> Result<BidAccepted> {
        let _guard = self.guard()?;
        let mut state = self.read_state()?;
        if !state.auction_active {
            return Err(AuctionError::Inactive);
        }

        let players = self.read_players()?;
        let player = state
            .current_index()
            .and_then(|i| players.get(i))
            .ok_or(AuctionError::Inactive)?;
        if player.id != player_id {
            return Err(AuctionError::LotMismatch);
        }

        let teams = self.read_teams()?;
        let team = teams
            .iter()
            .find(|t| t.team_name == team_name)
            .ok_or_else(|| AuctionError::UnknownTeam(team_name.to_string()))?;

        let accepted = bid::check_bid(
            player.base_price,
            state.current_bid.amount,
            team.purse,
            amount,
        )?;

        state.current_bid = CurrentBid {
            amount: Some(accepted),
            bidder: bidder.to_string(),
            team_name: team.team_name.clone(),
        };
        state.last_bid_team = team.team_name.clone();
        state
            .current_bid_history
            .entry(player.id)
            .or_default()
            .push(BidEvent {
                bidder: bidder.to_string(),
                team_name: team.team_name.clone(),
                amount: accepted,
            });

        self.store.replace(Doc::State, &state)?;

        info!(player_id, team = team_name, amount = accepted, "bid accepted");
        Ok(BidAccepted {
            team_name: team.team_name.clone(),
            amount: accepted,
        })
    }

    /// Settle the current lot to the standing high bid: mark the player sold,
    /// debit the winning team, and append to both ledgers. All five touched
    /// documents commit in one transaction.
    pub fn sell_current(&self) -> Result<Settlement> {
        let _guard = self.guard()?;
        let mut state = self.read_state()?;
        let index = state.current_index().ok_or(AuctionError::NoLotSelected)?;
        // A standing amount of 0 (possible on a zero-base lot) never settles.
        let amount = state
            .current_bid
            .amount
            .filter(|&amount| amount > 0)
            .ok_or(AuctionError::NoBids)?;
        let team_name = state.current_bid.team_name.clone();

        let mut players = self.read_players()?;
        let player = players
            .get_mut(index)
            .ok_or(AuctionError::NoLotSelected)?;
        player.sold = true;
        player.sold_to = team_name.clone();
        player.final_price = amount;
        let snapshot = player.clone();

        let mut teams = TeamLedger::new(self.read_teams()?);
        teams.debit(&team_name, amount)?;

        let mut ledger = SettlementLedger::new(self.read_history()?, self.read_sold()?);
        ledger.record_sale(&snapshot, &team_name, amount);

        state.auction_active = false;
        state.sold_to = team_name.clone();

        let (history, sold) = ledger.into_parts();
        self.store.commit(&[
            doc_value(Doc::Players, &players)?,
            doc_value(Doc::Teams, &teams.into_inner())?,
            doc_value(Doc::Sold, &sold)?,
            doc_value(Doc::History, &history)?,
            doc_value(Doc::State, &state)?,
        ])?;

        info!(
            player_id = snapshot.id,
            team = %team_name,
            price = amount,
            "lot sold"
        );
        Ok(Settlement {
            player: snapshot,
            sold_to: team_name,
            final_price: amount,
        })
    }

    /// Skip the current lot (or move on after a sale). Resets the lot pointer
    /// and all bid state; never touches purses or ownership.
    pub fn pass_current(&self) -> Result<()> {
        let _guard = self.guard()?;
        let mut state = self.read_state()?;
        state.clear_lot();
        self.store.replace(Doc::State, &state)?;
        info!("lot passed");
        Ok(())
    }

    /// Undo the most recent settlement: restore the player to unsold, refund
    /// the purse delta, and reset bid state. Exactly one level of undo over a
    /// single shared ledger; only "sell" actions are ever recorded, so select
    /// and pass are intentionally non-undoable.
    pub fn rollback_last(&self) -> Result<()> {
        let _guard = self.guard()?;
        let mut ledger = SettlementLedger::new(self.read_history()?, self.read_sold()?);
        let entry = ledger.pop_last().ok_or(AuctionError::NothingToRollback)?;

        let mut players = self.read_players()?;
        let mut teams = TeamLedger::new(self.read_teams()?);
        if let Some(player) = players.iter_mut().find(|p| p.id == entry.player_id) {
            // Refund exactly what the sale deducted, to the recorded owner.
            teams.credit(&player.sold_to, player.final_price)?;
            player.mark_unsold();
        }

        let mut state = self.read_state()?;
        state.clear_bidding();

        let (history, sold) = ledger.into_parts();
        self.store.commit(&[
            doc_value(Doc::Players, &players)?,
            doc_value(Doc::Teams, &teams.into_inner())?,
            doc_value(Doc::History, &history)?,
            doc_value(Doc::Sold, &sold)?,
            doc_value(Doc::State, &state)?,
        ])?;

        info!(player_id = entry.player_id, price = entry.price, "sale rolled back");
        Ok(())
    }

    /// Destructively reinitialize the whole auction: every player unsold,
    /// every team back to its own default purse, both ledgers emptied.
    pub fn reset_auction(&self) -> Result<()> {
        let _guard = self.guard()?;
        let mut players = self.read_players()?;
        for player in &mut players {
            player.mark_unsold();
        }
        let mut teams = TeamLedger::new(self.read_teams()?);
        teams.restore_defaults();

        self.store.commit(&[
            doc_value(Doc::Players, &players)?,
            doc_value(Doc::Teams, &teams.into_inner())?,
            doc_value(Doc::Sold, &Vec::<SoldRecord>::new())?,
            doc_value(Doc::History, &Vec::<HistoryEntry>::new())?,
            doc_value(Doc::State, &AuctionState::default())?,
        ])?;

        info!("auction reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read-only queries
    // -----------------------------------------------------------------------

    /// Full poller snapshot: current lot, standing bid, teams with derived
    /// rosters. Reads a consistent committed snapshot without blocking
    /// writers; slightly stale reads are acceptable.
    pub fn state_view(&self) -> Result<StateView> {
        let docs = self
            .store
            .snapshot(&[Doc::Players, Doc::Teams, Doc::State])?;
        let players: Vec<Player> = from_doc(Doc::Players, docs[0].clone())?;
        let teams: Vec<Team> = from_doc(Doc::Teams, docs[1].clone())?;
        let state: AuctionState = from_doc(Doc::State, docs[2].clone())?;

        let current_player = state
            .current_index()
            .and_then(|i| players.get(i))
            .cloned();

        let bid_history = current_player
            .as_ref()
            .and_then(|p| state.current_bid_history.get(&p.id))
            .cloned()
            .unwrap_or_default();

        let min_increment = bid::min_increment(
            current_player.as_ref().map(|p| p.base_price).unwrap_or(0),
        );

        let team_views = teams
            .iter()
            .map(|team| TeamView {
                team_name: team.team_name.clone(),
                purse: team.purse,
                default_purse: team.default_purse,
                players: players
                    .iter()
                    .filter(|p| p.sold && p.sold_to == team.team_name)
                    .map(|p| RosterSlot {
                        id: p.id,
                        name: p.name.clone(),
                        final_price: p.final_price,
                    })
                    .collect(),
            })
            .collect();

        Ok(StateView {
            current_player,
            highest_bid: state.current_bid.amount,
            teams: team_views,
            auction_active: state.auction_active,
            min_increment,
            bid_history,
            last_bid_team: state.last_bid_team,
            sold_to: state.sold_to,
        })
    }

    /// Unsold players, in document order.
    pub fn available_players(&self) -> Result<Vec<Player>> {
        let mut players = self.read_players()?;
        players.retain(|p| !p.sold);
        Ok(players)
    }

    /// Completed sales, oldest first (audit trail).
    pub fn sold_records(&self) -> Result<Vec<SoldRecord>> {
        self.read_sold()
    }

    /// Credential lookup for the external auth layer. Role enforcement is
    /// the caller's responsibility; the engine only verifies the pair.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let users: Vec<User> = self.store.read(Doc::Users)?.unwrap_or_default();
        users
            .into_iter()
            .find(|u| u.username == username && u.password == password)
            .ok_or(AuctionError::Unauthorized)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Acquire the exclusive guard, bounded by the configured timeout.
    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match self.gate.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => panic!("auction gate poisoned"),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(AuctionError::Busy);
                    }
                    std::thread::sleep(GUARD_RETRY_INTERVAL);
                }
            }
        }
    }

    fn read_players(&self) -> Result<Vec<Player>> {
        Ok(self.store.read(Doc::Players)?.unwrap_or_default())
    }

    fn read_teams(&self) -> Result<Vec<Team>> {
        Ok(self.store.read(Doc::Teams)?.unwrap_or_default())
    }

    fn read_state(&self) -> Result<AuctionState> {
        Ok(self.store.read(Doc::State)?.unwrap_or_default())
    }

    fn read_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.store.read(Doc::History)?.unwrap_or_default())
    }

    fn read_sold(&self) -> Result<Vec<SoldRecord>> {
        Ok(self.store.read(Doc::Sold)?.unwrap_or_default())
    }
}

fn doc_value<T: Serialize>(doc: Doc, value: &T) -> Result<(Doc, serde_json::Value)> {
    let json = serde_json::to_value(value)
        .with_context(|| format!("failed to serialize document {}", doc.name()))?;
    Ok((doc, json))
}

fn from_doc<T: serde::de::DeserializeOwned + Default>(
    doc: Doc,
    value: Option<serde_json::Value>,
) -> Result<T> {
    match value {
        Some(json) => Ok(serde_json::from_value(json)
            .with_context(|| format!("failed to deserialize document {}", doc.name()))?),
        None => Ok(T::default()),
    }
}
