use thiserror::Error;

use crate::domain::{AccountId, AmountError, CardId, Cents, CustomerId, LoanId, format_cents};
use crate::storage::PostingFailure;

/// A movement refused during validation. Nothing was allocated or written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("amount exceeds the per-movement maximum")]
    AmountOutOfRange,

    #[error("source account not found: {0}")]
    SourceAccountNotFound(AccountId),

    #[error("destination account not found: {0}")]
    DestinationNotFound(String),

    #[error("source and destination are the same account")]
    SelfTransfer,

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("no active loan for this customer")]
    NoActiveLoan,

    #[error("payment {requested} exceeds outstanding debt {debt}")]
    PaymentExceedsDebt { debt: Cents, requested: Cents },

    #[error("credit card not found: {0}")]
    CardNotFound(CardId),

    #[error("repayment {requested} exceeds used credit {used}")]
    RepaymentExceedsUsedCredit { used: Cents, requested: Cents },
}

impl Rejection {
    /// Message suitable for the person who asked for the movement.
    pub fn user_message(&self) -> String {
        match self {
            Rejection::NonPositiveAmount => "Please enter an amount greater than zero.".to_string(),
            Rejection::AmountOutOfRange => "The amount is larger than a single movement allows.".to_string(),
            Rejection::SourceAccountNotFound(_) => "The account to pay from does not exist.".to_string(),
            Rejection::DestinationNotFound(number) => {
                format!("No account with number {} was found.", number)
            }
            Rejection::SelfTransfer => "You cannot transfer money to the same account.".to_string(),
            Rejection::InsufficientFunds { balance, .. } => format!(
                "Insufficient funds. Your available balance is {}.",
                format_cents(*balance)
            ),
            Rejection::NoActiveLoan => "You have no active loan to pay.".to_string(),
            Rejection::PaymentExceedsDebt { debt, .. } => format!(
                "The payment is larger than the outstanding debt of {}.",
                format_cents(*debt)
            ),
            Rejection::CardNotFound(_) => "The credit card to repay does not exist.".to_string(),
            Rejection::RepaymentExceedsUsedCredit { used, .. } => format!(
                "The repayment is larger than the used credit of {}.",
                format_cents(*used)
            ),
        }
    }
}

impl From<AmountError> for Rejection {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::NonPositive => Rejection::NonPositiveAmount,
            AmountError::OutOfRange => Rejection::AmountOutOfRange,
        }
    }
}

/// Why a money movement did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MovementError {
    #[error("movement rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("movement failed: {0}")]
    Failed(#[from] PostingFailure),
}

impl MovementError {
    pub fn user_message(&self) -> String {
        match self {
            MovementError::Rejected(rejection) => rejection.user_message(),
            MovementError::Failed(_) => {
                "The transaction could not be completed. Please try again.".to_string()
            }
        }
    }

    /// Only infrastructure failures are worth retrying; a rejection will repeat.
    pub fn is_retryable(&self) -> bool {
        match self {
            MovementError::Rejected(_) => false,
            MovementError::Failed(failure) => failure.is_retryable(),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            MovementError::Rejected(rejection) => Some(rejection),
            MovementError::Failed(_) => None,
        }
    }
}

impl From<AmountError> for MovementError {
    fn from(err: AmountError) -> Self {
        MovementError::Rejected(err.into())
    }
}

impl From<sqlx::Error> for MovementError {
    fn from(err: sqlx::Error) -> Self {
        MovementError::Failed(err.into())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Customer already exists: {0}")]
    CustomerAlreadyExists(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    #[error("Credit card not found: {0}")]
    CardNotFound(String),

    #[error("Credit card already exists: {0}")]
    CardAlreadyExists(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Movement(#[from] MovementError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub(crate) fn customer_not_found(id: CustomerId) -> Self {
        AppError::CustomerNotFound(id.to_string())
    }

    pub(crate) fn account_not_found(id: AccountId) -> Self {
        AppError::AccountNotFound(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_not_retryable() {
        let err = MovementError::from(Rejection::NoActiveLoan);
        assert!(!err.is_retryable());
        assert_eq!(err.user_message(), "You have no active loan to pay.");
    }

    #[test]
    fn test_posting_failures_are_retryable_with_generic_message() {
        let err = MovementError::from(PostingFailure::StorageUnavailable("busy".into()));
        assert!(err.is_retryable());
        assert!(err.user_message().contains("try again"));
        assert!(!err.user_message().contains("busy"));
    }

    #[test]
    fn test_amount_errors_become_rejections() {
        assert_eq!(
            MovementError::from(AmountError::NonPositive).rejection(),
            Some(&Rejection::NonPositiveAmount)
        );
        assert_eq!(
            MovementError::from(AmountError::OutOfRange).rejection(),
            Some(&Rejection::AmountOutOfRange)
        );
    }

    #[test]
    fn test_insufficient_funds_message_shows_balance() {
        let rejection = Rejection::InsufficientFunds {
            balance: 8000,
            required: 9000,
        };
        assert_eq!(
            rejection.user_message(),
            "Insufficient funds. Your available balance is 80.00."
        );
    }

    #[test]
    fn test_card_overpayment_message_shows_used_credit() {
        let rejection = Rejection::RepaymentExceedsUsedCredit {
            used: 2000,
            requested: 5000,
        };
        assert_eq!(
            rejection.user_message(),
            "The repayment is larger than the used credit of 20.00."
        );
    }
}
