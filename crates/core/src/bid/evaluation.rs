//! Buyer scoring of submitted bids.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{Bid, BidEvaluation, BidStatus, EvaluationInput};
use crate::error::{FieldError, WorkflowError};
use crate::machine::{Actor, ActorRole, non_blank};
use crate::rfq::Rfq;

const MIN_SCORE: Decimal = Decimal::ONE;
const MAX_SCORE: Decimal = Decimal::TEN;

/// Unweighted mean of the three scores, rounded half-up to 2 dp.
#[must_use]
pub fn mean_score(technical: Decimal, commercial: Decimal, delivery: Decimal) -> Decimal {
    ((technical + commercial + delivery) / Decimal::from(3))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn check_range(field: &str, score: Decimal, errors: &mut Vec<FieldError>) {
    if score < MIN_SCORE || score > MAX_SCORE {
        errors.push(FieldError::new(field, "must be between 1 and 10"));
    }
}

/// Records a buyer's evaluation on a submitted bid.
///
/// # Errors
///
/// - `Unauthorized` unless the actor is a buyer of the RFQ owner or admin.
/// - `PreconditionFailed` unless the bid is `submitted`.
/// - `Validation` when a score is outside 1..=10.
pub fn evaluate(
    bid: &Bid,
    rfq: &Rfq,
    input: &EvaluationInput,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<Bid, WorkflowError> {
    if !actor.acts_as(ActorRole::Buyer, rfq.company_id) {
        return Err(WorkflowError::unauthorized(format!(
            "only buyers of the owning company may evaluate bid {}",
            bid.bid_number
        )));
    }
    if bid.status != BidStatus::Submitted {
        return Err(WorkflowError::precondition(format!(
            "bid {} is {} and can only be evaluated while submitted",
            bid.bid_number, bid.status
        )));
    }

    let mut errors = Vec::new();
    check_range("technical_score", input.technical_score, &mut errors);
    check_range("commercial_score", input.commercial_score, &mut errors);
    check_range("delivery_score", input.delivery_score, &mut errors);
    if let Some(total) = input.total_score {
        check_range("total_score", total, &mut errors);
    }
    if !errors.is_empty() {
        return Err(WorkflowError::Validation(errors));
    }

    let total_score = input.total_score.unwrap_or_else(|| {
        mean_score(
            input.technical_score,
            input.commercial_score,
            input.delivery_score,
        )
    });

    let mut updated = bid.clone();
    updated.evaluation = Some(BidEvaluation {
        technical_score: input.technical_score,
        commercial_score: input.commercial_score,
        delivery_score: input.delivery_score,
        total_score,
        notes: non_blank(input.notes.as_deref()),
        evaluated_by: actor.user_id,
        evaluated_at: now,
    });
    updated.updated_at = now;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bid_on, buyer_of, rfq_in, supplier_of};
    use crate::rfq::RfqStatus;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn scores(t: Decimal, c: Decimal, d: Decimal, total: Option<Decimal>) -> EvaluationInput {
        EvaluationInput {
            technical_score: t,
            commercial_score: c,
            delivery_score: d,
            total_score: total,
            notes: None,
        }
    }

    #[rstest]
    #[case(dec!(8), dec!(7), dec!(9), dec!(8.00))]
    #[case(dec!(10), dec!(9), dec!(9), dec!(9.33))]
    #[case(dec!(7), dec!(7), dec!(8), dec!(7.33))]
    #[case(dec!(8), dec!(8), dec!(9), dec!(8.33))]
    #[case(dec!(1), dec!(1), dec!(2), dec!(1.33))]
    #[case(dec!(5), dec!(6), dec!(6), dec!(5.67))]
    fn test_mean_score(
        #[case] t: Decimal,
        #[case] c: Decimal,
        #[case] d: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(mean_score(t, c, d), expected);
    }

    #[test]
    fn test_evaluate_defaults_total_to_mean() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let evaluated = evaluate(
            &bid,
            &rfq,
            &scores(dec!(8), dec!(7), dec!(9), None),
            &buyer_of(rfq.company_id),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(evaluated.evaluation.unwrap().total_score, dec!(8.00));
    }

    #[test]
    fn test_evaluate_keeps_explicit_total() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let evaluated = evaluate(
            &bid,
            &rfq,
            &scores(dec!(8), dec!(7), dec!(9), Some(dec!(9.5))),
            &buyer_of(rfq.company_id),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(evaluated.evaluation.unwrap().total_score, dec!(9.5));
    }

    #[test]
    fn test_evaluate_rejects_out_of_range() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::Submitted);
        let err = evaluate(
            &bid,
            &rfq,
            &scores(dec!(0), dec!(7), dec!(11), None),
            &buyer_of(rfq.company_id),
            Utc::now(),
        )
        .unwrap_err();
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.clone()).collect();
        assert_eq!(fields, vec!["technical_score", "delivery_score"]);
    }

    #[test]
    fn test_evaluate_only_while_submitted() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let bid = bid_on(&rfq, Uuid::new_v4(), BidStatus::UnderReview);
        assert!(matches!(
            evaluate(
                &bid,
                &rfq,
                &scores(dec!(5), dec!(5), dec!(5), None),
                &buyer_of(rfq.company_id),
                Utc::now(),
            ),
            Err(WorkflowError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_supplier_cannot_evaluate() {
        let rfq = rfq_in(RfqStatus::BiddingClosed);
        let company = Uuid::new_v4();
        let bid = bid_on(&rfq, company, BidStatus::Submitted);
        assert!(matches!(
            evaluate(
                &bid,
                &rfq,
                &scores(dec!(5), dec!(5), dec!(5), None),
                &supplier_of(company),
                Utc::now(),
            ),
            Err(WorkflowError::Unauthorized(_))
        ));
    }
}
