use serde::Serialize;

use crate::domain::{Account, Cents, CreditCard, Customer, HistoryLine, Loan};

/// An account with its derived balance.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: Account,
    pub balance: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanSummary {
    pub loan: Loan,
    pub debt: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardSummary {
    pub card: CreditCard,
    pub available: Cents,
    pub used: Cents,
    /// A card with nothing used has nothing to repay.
    pub eligible_for_repayment: bool,
}

impl CardSummary {
    pub fn new(card: CreditCard, available: Cents) -> Self {
        let used = card.used_credit(available);
        let eligible_for_repayment = available < card.credit_limit;
        Self {
            card,
            available,
            used,
            eligible_for_repayment,
        }
    }
}

/// Everything a customer sees on their landing page.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOverview {
    pub customer: Customer,
    pub accounts: Vec<AccountSummary>,
    /// Sum of account balances.
    pub net_worth: Cents,
    /// Loans that still carry debt, oldest first.
    pub active_loans: Vec<LoanSummary>,
    pub cards: Vec<CardSummary>,
    /// Most recent account postings across all accounts, newest first.
    pub recent_activity: Vec<HistoryLine>,
}
