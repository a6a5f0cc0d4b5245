//! Human readable document numbers.
//!
//! Numbers look like `RFQ-2026-0001`. The counter is per kind and calendar
//! year and is allocated by the store so it stays unique across processes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Request for quotation.
    Rfq,
    /// Supplier bid.
    Bid,
    /// Purchase order.
    PurchaseOrder,
}

impl DocumentKind {
    /// Storage key of the sequence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rfq => "rfq",
            Self::Bid => "bid",
            Self::PurchaseOrder => "purchase_order",
        }
    }

    /// Prefix printed in front of the number.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Rfq => "RFQ",
            Self::Bid => "BID",
            Self::PurchaseOrder => "PO",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Formats a document number, zero padded to four digits.
#[must_use]
pub fn format_number(kind: DocumentKind, year: i32, sequence: i64) -> String {
    format!("{}-{year}-{sequence:04}", kind.prefix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DocumentKind::Rfq, 2026, 1, "RFQ-2026-0001")]
    #[case(DocumentKind::Bid, 2026, 42, "BID-2026-0042")]
    #[case(DocumentKind::PurchaseOrder, 2027, 9999, "PO-2027-9999")]
    #[case(DocumentKind::PurchaseOrder, 2027, 12345, "PO-2027-12345")]
    fn test_format_number(
        #[case] kind: DocumentKind,
        #[case] year: i32,
        #[case] sequence: i64,
        #[case] expected: &str,
    ) {
        assert_eq!(format_number(kind, year, sequence), expected);
    }
}
