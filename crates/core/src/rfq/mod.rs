//! Requests for quotation.
//!
//! - `types` - RFQ status, items and payloads
//! - `workflow` - Lifecycle rules, including the coupled award

pub mod types;
pub mod workflow;

pub use types::{Rfq, RfqInput, RfqItem, RfqItemInput, RfqStatus};
pub use workflow::{RfqChange, RfqWorkflow};
