use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AccountId, CardId, Cents, LoanId, MAX_MOVEMENT_CENTS, MovementType, PostingLeg};

/// The user-initiated money movements the ledger knows how to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Transfer,
    LoanPayment,
    CreditCardRepayment,
    Deposit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Transfer => "transfer",
            MovementKind::LoanPayment => "loan_payment",
            MovementKind::CreditCardRepayment => "credit_card_repayment",
            MovementKind::Deposit => "deposit",
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single movement request.
///
/// `Requested -> Validated -> Posted -> Confirmed`, or it ends in `Rejected`
/// (validation) or `Failed` (posting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementState {
    Requested,
    Validated,
    Posted,
    Confirmed,
    Rejected,
    Failed,
}

impl MovementState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MovementState::Confirmed | MovementState::Rejected | MovementState::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: MovementState) -> bool {
        use MovementState::*;
        matches!(
            (self, next),
            (Requested, Validated)
                | (Requested, Rejected)
                | (Requested, Failed)
                | (Validated, Posted)
                | (Validated, Failed)
                | (Posted, Confirmed)
                | (Posted, Failed)
        )
    }
}

impl std::fmt::Display for MovementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount must be greater than zero")]
    NonPositive,
    #[error("amount exceeds the per-movement maximum")]
    OutOfRange,
}

/// Every user-supplied amount passes through here before anything else happens.
pub fn validate_amount(amount: Cents) -> Result<Cents, AmountError> {
    if amount <= 0 {
        return Err(AmountError::NonPositive);
    }
    if amount > MAX_MOVEMENT_CENTS {
        return Err(AmountError::OutOfRange);
    }
    Ok(amount)
}

/// Withdrawal from the source then deposit into the destination, in that order.
pub fn transfer_legs(source: AccountId, destination: AccountId, amount: Cents) -> [PostingLeg; 2] {
    [
        PostingLeg::account(-amount, source, MovementType::TransferOut),
        PostingLeg::account(amount, destination, MovementType::TransferIn),
    ]
}

pub fn loan_payment_legs(source: AccountId, loan_id: LoanId, amount: Cents) -> [PostingLeg; 1] {
    [PostingLeg::loan_payment(-amount, source, loan_id)]
}

/// The two legs of a credit-card repayment.
///
/// The card leg carries `+amount` and is the only thing the card view sees. The
/// account leg carries `-2 * amount`; the account view also counts the card leg
/// against its funding account, so the account nets to `-amount`.
pub fn card_repayment_legs(source: AccountId, card_id: CardId, amount: Cents) -> [PostingLeg; 2] {
    [
        PostingLeg::card(amount, source, card_id),
        PostingLeg::account(-2 * amount, source, MovementType::CcRepayment),
    ]
}

pub fn deposit_legs(account: AccountId, amount: Cents) -> [PostingLeg; 1] {
    [PostingLeg::account(amount, account, MovementType::Deposit)]
}
