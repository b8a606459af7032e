// Auction domain: data model, bid rules, ledgers, and the engine that ties
// them to the document store.

pub mod bid;
pub mod engine;
pub mod ledger;
pub mod model;
