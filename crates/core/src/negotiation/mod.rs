//! Buyer/supplier negotiations over a bid.

pub mod protocol;
pub mod types;

#[cfg(test)]
mod protocol_props;

pub use protocol::{MessageOutcome, NegotiationChange, NegotiationProtocol};
pub use types::{
    MessageInput, MessageType, Negotiation, NegotiationMessage, NegotiationStatus, OfferResolution,
    OfferStatus,
};
