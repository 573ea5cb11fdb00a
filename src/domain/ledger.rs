//! Pure balance views over posted ledger entries.
//!
//! Each view declares which posting kinds it sums. The storage layer computes the
//! same figures in SQL; these folds are the reference definition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    AccountId, Cents, CreditCard, EntryId, Loan, MovementType, Posting, PostedEntry, PostingKind,
};

/// Kinds summed by the account view. A card posting counts toward its funding account,
/// which is what nets the doubled `CC_Repayment` leg back to the repaid amount.
pub const ACCOUNT_VIEW_KINDS: &[PostingKind] = &[PostingKind::Account, PostingKind::Card];

/// Kinds summed by the card view. Account postings are invisible to it.
pub const CARD_VIEW_KINDS: &[PostingKind] = &[PostingKind::Card];

/// Current balance of an account: signed sum of every posting the account view sees.
pub fn account_balance(account_id: AccountId, entries: &[PostedEntry]) -> Cents {
    entries
        .iter()
        .filter(|e| ACCOUNT_VIEW_KINDS.contains(&e.posting.kind()))
        .filter(|e| e.posting.account_id() == account_id)
        .map(|e| e.entry.signed_amount)
        .sum()
}

/// Outstanding debt of a loan: principal minus the magnitude of its payments.
pub fn loan_debt(loan: &Loan, entries: &[PostedEntry]) -> Cents {
    let paid: Cents = entries
        .iter()
        .filter(|e| match &e.posting {
            Posting::Account(p) => {
                p.movement_type == MovementType::LoanPayment && p.loan_id == Some(loan.id)
            }
            Posting::Card(_) => false,
        })
        .map(|e| e.entry.signed_amount.abs())
        .sum();
    loan.principal - paid
}

/// Available credit on a card, capped at its limit.
pub fn card_available(card: &CreditCard, entries: &[PostedEntry]) -> Cents {
    let repaid: Cents = entries
        .iter()
        .filter(|e| CARD_VIEW_KINDS.contains(&e.posting.kind()))
        .filter(|e| matches!(&e.posting, Posting::Card(p) if p.card_id == card.id))
        .map(|e| e.entry.signed_amount.abs())
        .sum();
    (card.opening_available + repaid).min(card.credit_limit)
}

/// Amount to show a person for an account posting.
///
/// `CC_Repayment` legs are stored at twice the economic amount, so they are halved
/// for presentation. The stored value is always even, the division is exact.
pub fn display_amount(movement_type: MovementType, signed_amount: Cents) -> Cents {
    match movement_type {
        MovementType::CcRepayment => signed_amount / 2,
        _ => signed_amount,
    }
}

/// One account posting as shown in a transaction history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryLine {
    pub entry_id: EntryId,
    pub occurred_at: DateTime<Utc>,
    pub account_id: AccountId,
    pub account_number: String,
    pub movement_type: MovementType,
    /// Amount exactly as stored in the ledger.
    pub ledger_amount: Cents,
    /// Economic amount for the account holder, see [`display_amount`].
    pub display_amount: Cents,
}

impl HistoryLine {
    pub fn new(
        entry_id: EntryId,
        occurred_at: DateTime<Utc>,
        account_id: AccountId,
        account_number: String,
        movement_type: MovementType,
        ledger_amount: Cents,
    ) -> Self {
        Self {
            entry_id,
            occurred_at,
            account_id,
            account_number,
            movement_type,
            ledger_amount,
            display_amount: display_amount(movement_type, ledger_amount),
        }
    }
}
