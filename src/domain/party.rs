use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type CustomerId = i64;
pub type AccountId = i64;
pub type LoanId = i64;
pub type CardId = i64;

// Parties are owned by the surrounding banking application. The ledger only
// reads them and references them from postings. Ids are assigned by the
// repository on insert.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Tax identification number, unique per customer.
    pub tin: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, tin: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            tin: tin.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Public account number, unique across the bank.
    pub number: String,
    pub customer_id: CustomerId,
    pub currency: String,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    pub fn new(number: impl Into<String>, customer_id: CustomerId, currency: impl Into<String>) -> Self {
        Self {
            id: 0,
            number: number.into(),
            customer_id,
            currency: currency.into(),
            opened_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub loan_type: String,
    /// Original amount lent. Outstanding debt is derived from payments against it.
    pub principal: Cents,
    pub expires_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(customer_id: CustomerId, loan_type: impl Into<String>, principal: Cents) -> Self {
        Self {
            id: 0,
            customer_id,
            loan_type: loan_type.into(),
            principal,
            expires_on: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_expiry(mut self, expires_on: NaiveDate) -> Self {
        self.expires_on = Some(expires_on);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: CardId,
    pub customer_id: CustomerId,
    pub card_number: String,
    pub credit_limit: Cents,
    /// Available credit when the card was issued (or last reconciled by the card system).
    pub opening_available: Cents,
    pub created_at: DateTime<Utc>,
}

impl CreditCard {
    pub fn new(customer_id: CustomerId, card_number: impl Into<String>, credit_limit: Cents) -> Self {
        Self {
            id: 0,
            customer_id,
            card_number: card_number.into(),
            credit_limit,
            opening_available: credit_limit,
            created_at: Utc::now(),
        }
    }

    pub fn with_opening_available(mut self, available: Cents) -> Self {
        self.opening_available = available;
        self
    }

    /// Outstanding card debt for a given available balance.
    pub fn used_credit(&self, available: Cents) -> Cents {
        (self.credit_limit - available).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_card_starts_fully_available() {
        let card = CreditCard::new(1, "4000-0000-0000-0001", 100000);
        assert_eq!(card.opening_available, 100000);
        assert_eq!(card.used_credit(card.opening_available), 0);
    }

    #[test]
    fn test_used_credit() {
        let card = CreditCard::new(1, "4000-0000-0000-0002", 100000).with_opening_available(40000);
        assert_eq!(card.used_credit(40000), 60000);
        assert_eq!(card.used_credit(120000), 0);
    }
}
