//! Supplier bids.
//!
//! - `types` - Bid status, items, evaluation and payloads
//! - `lifecycle` - Draft upsert, submission and status transitions
//! - `award` - Coupled bid/RFQ award settlement
//! - `evaluation` - Buyer scoring

pub mod award;
pub mod evaluation;
pub mod lifecycle;
pub mod types;

pub use award::{AwardSettlement, settle_award};
pub use evaluation::{evaluate, mean_score};
pub use lifecycle::{BidChange, BidLifecycle};
pub use types::{
    Bid, BidEvaluation, BidInput, BidItem, BidItemInput, BidStatus, EvaluationInput,
    MAX_AMOUNT,
};
