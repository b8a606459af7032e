// Domain error taxonomy for auction operations.
//
// Every variant except `Storage` is a local, recoverable rejection returned
// synchronously to the caller; a rejected bid never halts the auction.
// `Storage` wraps persistence I/O failures (disk full, permission denied),
// the only fatal class: the failed operation aborts and previously persisted
// state is left untouched.

use thiserror::Error;

use crate::auction::model::{Money, PlayerId};

#[derive(Debug, Error)]
pub enum AuctionError {
    /// Credential lookup failed. Role enforcement itself lives in the
    /// external auth layer; the engine trusts the caller's role.
    #[error("invalid credentials")]
    Unauthorized,

    #[error("no unsold player with id {0}")]
    NotFound(PlayerId),

    #[error("auction is not active")]
    Inactive,

    /// The bid names a player other than the current lot. Rejects stale
    /// clients racing a lot change.
    #[error("bid targets a different lot")]
    LotMismatch,

    #[error("no lot selected")]
    NoLotSelected,

    #[error("no bids placed yet")]
    NoBids,

    #[error("minimum bid is {min_required}")]
    BidTooLow { min_required: Money },

    #[error("insufficient purse")]
    InsufficientFunds,

    #[error("team not found: {0}")]
    UnknownTeam(String),

    #[error("nothing to roll back")]
    NothingToRollback,

    /// The exclusive guard could not be acquired within the configured
    /// timeout. The caller may retry.
    #[error("auction engine busy")]
    Busy,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuctionError {
    /// Whether this error is an infrastructure failure rather than a
    /// recoverable domain rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuctionError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, AuctionError>;
