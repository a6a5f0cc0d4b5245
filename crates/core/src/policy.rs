//! Configurable workflow policy.

use chrono::{DateTime, Duration, Utc};
use procura_shared::{LateSubmission, WorkflowConfig};

use crate::error::WorkflowError;
use crate::purchase_order::PurchaseOrderStatus;

/// Policy knobs consulted by the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowPolicy {
    /// Default bidding window applied when an RFQ is published without a
    /// deadline.
    pub bid_window: Duration,
    /// Late bid handling.
    pub late_submission: LateSubmission,
    /// Derived purchase orders wait for internal approval first.
    pub purchase_order_requires_approval: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for WorkflowPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            bid_window: Duration::days(config.bid_window_days),
            late_submission: config.late_submission,
            purchase_order_requires_approval: config.purchase_order_requires_approval,
        }
    }
}

impl WorkflowPolicy {
    /// Deadline applied to an RFQ published at `now` without one.
    #[must_use]
    pub fn default_bid_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.bid_window
    }

    /// Checks whether a bid may still be submitted at `now`.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` when late bids are rejected and the
    /// deadline has passed.
    pub fn check_submission_time(
        &self,
        bid_deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        match (self.late_submission, bid_deadline) {
            (LateSubmission::Reject, Some(deadline)) if now > deadline => {
                Err(WorkflowError::precondition(format!(
                    "bid deadline {} has passed",
                    deadline.to_rfc3339()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Status a freshly derived purchase order starts in.
    #[must_use]
    pub const fn initial_purchase_order_status(&self) -> PurchaseOrderStatus {
        if self.purchase_order_requires_approval {
            PurchaseOrderStatus::PendingApproval
        } else {
            PurchaseOrderStatus::SentToSupplier
        }
    }
}
