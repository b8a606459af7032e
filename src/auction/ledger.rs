// Team purse bookkeeping and the settlement ledgers.
//
// `TeamLedger` is the only code path that mutates purses; the engine invokes
// it exclusively inside sell and rollback, under the serialization guard.
// `SettlementLedger` pairs the undo history (append + pop-last only) with the
// append-only sold-records audit trail.

use chrono::Utc;
use tracing::warn;

use crate::auction::model::{HistoryEntry, Money, Player, SoldRecord, Team};
use crate::error::AuctionError;

// ---------------------------------------------------------------------------
// TeamLedger
// ---------------------------------------------------------------------------

/// Purse bookkeeping over the teams document.
pub struct TeamLedger {
    teams: Vec<Team>,
}

impl TeamLedger {
    pub fn new(teams: Vec<Team>) -> Self {
        TeamLedger { teams }
    }

    pub fn get(&self, team_name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.team_name == team_name)
    }

    fn get_mut(&mut self, team_name: &str) -> Result<&mut Team, AuctionError> {
        self.teams
            .iter_mut()
            .find(|t| t.team_name == team_name)
            .ok_or_else(|| AuctionError::UnknownTeam(team_name.to_string()))
    }

    /// Deduct a settled price from a team's purse. The floor at zero is a
    /// safety net only: bid-time purse checks make it unreachable.
    pub fn debit(&mut self, team_name: &str, amount: Money) -> Result<(), AuctionError> {
        let team = self.get_mut(team_name)?;
        if amount > team.purse {
            warn!(
                team = %team.team_name,
                purse = team.purse,
                amount,
                "settlement exceeds purse; clamping at zero"
            );
        }
        team.purse = team.purse.saturating_sub(amount);
        Ok(())
    }

    /// Refund a rolled-back settlement.
    pub fn credit(&mut self, team_name: &str, amount: Money) -> Result<(), AuctionError> {
        let team = self.get_mut(team_name)?;
        team.purse += amount;
        Ok(())
    }

    /// Restore every team to its own default purse (full reset).
    pub fn restore_defaults(&mut self) {
        for team in &mut self.teams {
            team.purse = team.default_purse;
        }
    }

    pub fn into_inner(self) -> Vec<Team> {
        self.teams
    }
}

// ---------------------------------------------------------------------------
// SettlementLedger
// ---------------------------------------------------------------------------

/// Undo history plus the immutable audit trail of completed sales.
pub struct SettlementLedger {
    history: Vec<HistoryEntry>,
    sold: Vec<SoldRecord>,
}

impl SettlementLedger {
    pub fn new(history: Vec<HistoryEntry>, sold: Vec<SoldRecord>) -> Self {
        SettlementLedger { history, sold }
    }

    /// Record a completed sale: one undo entry, one audit record. The player
    /// snapshot is taken after the sale fields are applied.
    pub fn record_sale(&mut self, player: &Player, team_name: &str, price: Money) {
        self.history.push(HistoryEntry::sell(player.id, team_name, price));
        self.sold.push(SoldRecord {
            player: player.clone(),
            team_name: team_name.to_string(),
            final_price: price,
            sold_at: Utc::now(),
        });
    }

    /// Pop the most recent undo entry. Audit records are intentionally left
    /// in place: rollback-then-resell produces two audit entries for one
    /// player, which is the documented behavior.
    pub fn pop_last(&mut self) -> Option<HistoryEntry> {
        self.history.pop()
    }

    pub fn into_parts(self) -> (Vec<HistoryEntry>, Vec<SoldRecord>) {
        (self.history, self.sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_teams() -> Vec<Team> {
        vec![
            Team {
                team_name: "Chaitu Cheetahs".into(),
                purse: 10_000,
                default_purse: 10_000,
            },
            Team {
                team_name: "Sai Warriors".into(),
                purse: 10_000,
                default_purse: 10_000,
            },
        ]
    }

    fn sample_player(id: u64) -> Player {
        Player {
            id,
            name: format!("Player {id}"),
            age: 30,
            role: "Batsman".into(),
            base_price: 1000,
            grade: "A".into(),
            sold: true,
            sold_to: "Chaitu Cheetahs".into(),
            final_price: 1050,
        }
    }

    #[test]
    fn debit_and_credit_round_trip() {
        let mut ledger = TeamLedger::new(two_teams());
        ledger.debit("Chaitu Cheetahs", 1050).unwrap();
        assert_eq!(ledger.get("Chaitu Cheetahs").unwrap().purse, 8950);

        ledger.credit("Chaitu Cheetahs", 1050).unwrap();
        assert_eq!(ledger.get("Chaitu Cheetahs").unwrap().purse, 10_000);
    }

    #[test]
    fn debit_unknown_team_fails() {
        let mut ledger = TeamLedger::new(two_teams());
        match ledger.debit("Nobody", 100) {
            Err(AuctionError::UnknownTeam(name)) => assert_eq!(name, "Nobody"),
            other => panic!("expected UnknownTeam, got {other:?}"),
        }
    }

    #[test]
    fn debit_clamps_at_zero() {
        let mut ledger = TeamLedger::new(two_teams());
        ledger.debit("Sai Warriors", 50_000).unwrap();
        assert_eq!(ledger.get("Sai Warriors").unwrap().purse, 0);
    }

    #[test]
    fn restore_defaults_resets_every_purse() {
        let mut ledger = TeamLedger::new(two_teams());
        ledger.debit("Chaitu Cheetahs", 4000).unwrap();
        ledger.debit("Sai Warriors", 2500).unwrap();
        ledger.restore_defaults();
        for team in ledger.into_inner() {
            assert_eq!(team.purse, team.default_purse);
        }
    }

    #[test]
    fn record_sale_appends_both_ledgers() {
        let mut ledger = SettlementLedger::new(vec![], vec![]);
        let player = sample_player(1);
        ledger.record_sale(&player, "Chaitu Cheetahs", 1050);

        let (history, sold) = ledger.into_parts();
        assert_eq!(history, vec![HistoryEntry::sell(1, "Chaitu Cheetahs", 1050)]);
        assert_eq!(sold.len(), 1);
        assert_eq!(sold[0].final_price, 1050);
        assert_eq!(sold[0].player.name, "Player 1");
    }

    #[test]
    fn pop_last_is_lifo_and_leaves_audit_trail() {
        let mut ledger = SettlementLedger::new(vec![], vec![]);
        ledger.record_sale(&sample_player(1), "Chaitu Cheetahs", 1050);
        ledger.record_sale(&sample_player(2), "Sai Warriors", 2620);

        let last = ledger.pop_last().unwrap();
        assert_eq!(last.player_id, 2);
        assert!(ledger.pop_last().is_some());
        assert!(ledger.pop_last().is_none());

        // Audit trail is never pruned by undo.
        let (history, sold) = ledger.into_parts();
        assert!(history.is_empty());
        assert_eq!(sold.len(), 2);
    }
}
