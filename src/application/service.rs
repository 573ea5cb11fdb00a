use chrono::{DateTime, NaiveDate, Utc};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, CardId, Cents, CreditCard, Customer, CustomerId, EntryId, HistoryLine,
    IntegrityReport, Loan, LoanId, MovementKind, MovementState, PostingLeg,
    build_integrity_report, card_repayment_legs, deposit_legs, loan_payment_legs, transfer_legs,
    validate_amount,
};
use crate::storage::{BalanceView, LedgerPoster, Parties, PostingScope, Repository};

use super::{
    AccountSummary, AppError, CardSummary, CustomerOverview, LoanSummary, MovementError, Receipt,
    Rejection,
};

/// One movement request on its way through the state machine.
struct Movement {
    kind: MovementKind,
    operation_id: Uuid,
    amount: Cents,
    state: MovementState,
    occurred_at: DateTime<Utc>,
}

impl Movement {
    fn new(kind: MovementKind, amount: Cents) -> Self {
        Self {
            kind,
            operation_id: Uuid::new_v4(),
            amount,
            state: MovementState::Requested,
            occurred_at: Utc::now(),
        }
    }

    fn span(&self) -> tracing::Span {
        tracing::info_span!("movement", kind = %self.kind, operation_id = %self.operation_id)
    }

    fn advance(&mut self, next: MovementState) {
        debug_assert!(!self.state.is_terminal(), "movement already concluded as {}", self.state);
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal movement transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "movement state changed");
        self.state = next;
    }

    fn conclude(&mut self, result: Result<Vec<EntryId>, MovementError>) -> Result<Receipt, MovementError> {
        match result {
            Ok(entry_ids) => {
                self.advance(MovementState::Confirmed);
                tracing::info!(entries = ?entry_ids, amount = self.amount, "movement confirmed");
                Ok(Receipt {
                    operation_id: self.operation_id,
                    kind: self.kind,
                    entry_ids,
                    amount: self.amount,
                    occurred_at: self.occurred_at,
                })
            }
            Err(MovementError::Rejected(rejection)) => {
                self.advance(MovementState::Rejected);
                tracing::info!(reason = %rejection, "movement rejected");
                Err(rejection.into())
            }
            Err(MovementError::Failed(failure)) => {
                self.advance(MovementState::Failed);
                tracing::warn!(error = %failure, "movement failed");
                Err(failure.into())
            }
        }
    }
}

/// Application service for money movements and the reads around them.
/// This is the primary interface for any client (CLI, API, tests).
///
/// Every movement validates, allocates and writes inside one [`PostingScope`], so
/// the balance it checked is still the balance when its entries commit.
#[derive(Clone)]
pub struct MoneyMovementService {
    repo: Repository,
    poster: LedgerPoster,
}

impl MoneyMovementService {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            poster: LedgerPoster::new(),
        }
    }

    /// Create the database if needed, apply the schema and connect.
    pub async fn init(config: &LedgerConfig) -> Result<Self, AppError> {
        let repo = Repository::init(config).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, AppError> {
        let repo = Repository::connect(config).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Money movements
    // ========================

    /// Move `amount` from one of the caller's accounts to any account, by number.
    pub async fn transfer(
        &self,
        source_id: AccountId,
        destination_number: &str,
        amount: Cents,
    ) -> Result<Receipt, MovementError> {
        let mut movement = Movement::new(MovementKind::Transfer, amount);
        let span = movement.span();
        async {
            tracing::debug!(source_id, destination = destination_number, amount, "transfer requested");
            let result = self
                .post_transfer(&mut movement, source_id, destination_number)
                .await;
            movement.conclude(result)
        }
        .instrument(span)
        .await
    }

    /// Pay `amount` off the account holder's oldest loan that still carries debt.
    pub async fn pay_loan(&self, source_id: AccountId, amount: Cents) -> Result<Receipt, MovementError> {
        let mut movement = Movement::new(MovementKind::LoanPayment, amount);
        let span = movement.span();
        async {
            tracing::debug!(source_id, amount, "loan payment requested");
            let result = self.post_loan_payment(&mut movement, source_id).await;
            movement.conclude(result)
        }
        .instrument(span)
        .await
    }

    /// Repay `amount` of a credit card's used credit from an account.
    pub async fn repay_credit_card(
        &self,
        source_id: AccountId,
        card_id: CardId,
        amount: Cents,
    ) -> Result<Receipt, MovementError> {
        let mut movement = Movement::new(MovementKind::CreditCardRepayment, amount);
        let span = movement.span();
        async {
            tracing::debug!(source_id, card_id, amount, "card repayment requested");
            let result = self
                .post_card_repayment(&mut movement, source_id, card_id)
                .await;
            movement.conclude(result)
        }
        .instrument(span)
        .await
    }

    /// Credit `amount` to an account from outside the bank.
    pub async fn deposit(&self, account_number: &str, amount: Cents) -> Result<Receipt, MovementError> {
        let mut movement = Movement::new(MovementKind::Deposit, amount);
        let span = movement.span();
        async {
            tracing::debug!(account = account_number, amount, "deposit requested");
            let result = self.post_deposit(&mut movement, account_number).await;
            movement.conclude(result)
        }
        .instrument(span)
        .await
    }

    async fn post_transfer(
        &self,
        movement: &mut Movement,
        source_id: AccountId,
        destination_number: &str,
    ) -> Result<Vec<EntryId>, MovementError> {
        let amount = validate_amount(movement.amount)?;

        let mut scope = PostingScope::begin(self.repo.pool()).await?;
        let source = source_account(&mut scope, source_id).await?;
        let destination = Parties::account_by_number(scope.conn(), destination_number)
            .await?
            .ok_or_else(|| Rejection::DestinationNotFound(destination_number.to_string()))?;
        if destination.id == source.id {
            return Err(Rejection::SelfTransfer.into());
        }
        require_funds(&mut scope, source.id, amount).await?;

        let legs = transfer_legs(source.id, destination.id, amount);
        self.post_and_commit(movement, scope, &legs).await
    }

    async fn post_loan_payment(
        &self,
        movement: &mut Movement,
        source_id: AccountId,
    ) -> Result<Vec<EntryId>, MovementError> {
        let amount = validate_amount(movement.amount)?;

        let mut scope = PostingScope::begin(self.repo.pool()).await?;
        let source = source_account(&mut scope, source_id).await?;
        let (loan_id, debt) = BalanceView::first_active_loan(scope.conn(), source.customer_id)
            .await?
            .ok_or(Rejection::NoActiveLoan)?;
        if amount > debt {
            return Err(Rejection::PaymentExceedsDebt {
                debt,
                requested: amount,
            }
            .into());
        }
        require_funds(&mut scope, source.id, amount).await?;

        tracing::debug!(loan_id, debt, "paying loan");
        let legs = loan_payment_legs(source.id, loan_id, amount);
        self.post_and_commit(movement, scope, &legs).await
    }

    async fn post_card_repayment(
        &self,
        movement: &mut Movement,
        source_id: AccountId,
        card_id: CardId,
    ) -> Result<Vec<EntryId>, MovementError> {
        let amount = validate_amount(movement.amount)?;

        let mut scope = PostingScope::begin(self.repo.pool()).await?;
        let source = source_account(&mut scope, source_id).await?;
        let card = Parties::card(scope.conn(), card_id)
            .await?
            .ok_or(Rejection::CardNotFound(card_id))?;
        let available = BalanceView::card_available(scope.conn(), card.id)
            .await?
            .ok_or(Rejection::CardNotFound(card_id))?;
        let used = card.used_credit(available);
        if amount > used {
            return Err(Rejection::RepaymentExceedsUsedCredit {
                used,
                requested: amount,
            }
            .into());
        }
        require_funds(&mut scope, source.id, amount).await?;

        tracing::debug!(card_id, used, "repaying card");
        let legs = card_repayment_legs(source.id, card.id, amount);
        self.post_and_commit(movement, scope, &legs).await
    }

    async fn post_deposit(
        &self,
        movement: &mut Movement,
        account_number: &str,
    ) -> Result<Vec<EntryId>, MovementError> {
        let amount = validate_amount(movement.amount)?;

        let mut scope = PostingScope::begin(self.repo.pool()).await?;
        let account = Parties::account_by_number(scope.conn(), account_number)
            .await?
            .ok_or_else(|| Rejection::DestinationNotFound(account_number.to_string()))?;

        let legs = deposit_legs(account.id, amount);
        self.post_and_commit(movement, scope, &legs).await
    }

    /// Validation passed: write the legs and commit. Dropping `scope` on any
    /// error path rolls the whole movement back.
    async fn post_and_commit(
        &self,
        movement: &mut Movement,
        mut scope: PostingScope,
        legs: &[PostingLeg],
    ) -> Result<Vec<EntryId>, MovementError> {
        movement.advance(MovementState::Validated);
        movement.occurred_at = Utc::now();

        let ids = self
            .poster
            .post_in(&mut scope, legs, movement.occurred_at)
            .await?;
        movement.advance(MovementState::Posted);

        scope.commit().await?;
        Ok(ids)
    }

    // ========================
    // Party setup
    // ========================

    pub async fn register_customer(&self, name: String, tin: String) -> Result<Customer, AppError> {
        if self.repo.get_customer_by_tin(&tin).await?.is_some() {
            return Err(AppError::CustomerAlreadyExists(tin));
        }

        let mut customer = Customer::new(name, tin);
        self.repo.save_customer(&mut customer).await?;
        tracing::info!(customer_id = customer.id, "customer registered");
        Ok(customer)
    }

    pub async fn open_account(
        &self,
        customer_id: CustomerId,
        number: String,
        currency: String,
    ) -> Result<Account, AppError> {
        self.get_customer(customer_id).await?;
        if self.repo.get_account_by_number(&number).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(number));
        }

        let mut account = Account::new(number, customer_id, currency);
        self.repo.save_account(&mut account).await?;
        tracing::info!(account_id = account.id, customer_id, "account opened");
        Ok(account)
    }

    pub async fn grant_loan(
        &self,
        customer_id: CustomerId,
        loan_type: String,
        principal: Cents,
        expires_on: Option<NaiveDate>,
    ) -> Result<Loan, AppError> {
        validate_amount(principal).map_err(|e| AppError::InvalidAmount(e.to_string()))?;
        self.get_customer(customer_id).await?;

        let mut loan = Loan::new(customer_id, loan_type, principal);
        if let Some(date) = expires_on {
            loan = loan.with_expiry(date);
        }
        self.repo.save_loan(&mut loan).await?;
        tracing::info!(loan_id = loan.id, customer_id, principal, "loan granted");
        Ok(loan)
    }

    /// Issue a card. Without `opening_available` the card starts fully available.
    pub async fn issue_credit_card(
        &self,
        customer_id: CustomerId,
        card_number: String,
        credit_limit: Cents,
        opening_available: Option<Cents>,
    ) -> Result<CreditCard, AppError> {
        if credit_limit < 0 {
            return Err(AppError::InvalidAmount(
                "Credit limit cannot be negative".to_string(),
            ));
        }
        let opening_available = opening_available.unwrap_or(credit_limit);
        if !(0..=credit_limit).contains(&opening_available) {
            return Err(AppError::InvalidAmount(
                "Available credit must be between zero and the credit limit".to_string(),
            ));
        }
        self.get_customer(customer_id).await?;
        if self.repo.get_card_by_number(&card_number).await?.is_some() {
            return Err(AppError::CardAlreadyExists(card_number));
        }

        let mut card =
            CreditCard::new(customer_id, card_number, credit_limit).with_opening_available(opening_available);
        self.repo.save_card(&mut card).await?;
        tracing::info!(card_id = card.id, customer_id, credit_limit, "credit card issued");
        Ok(card)
    }

    // ========================
    // Lookups
    // ========================

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::customer_not_found(id))
    }

    pub async fn get_customer_by_tin(&self, tin: &str) -> Result<Customer, AppError> {
        self.repo
            .get_customer_by_tin(tin)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(tin.to_string()))
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::account_not_found(id))
    }

    pub async fn get_account_by_number(&self, number: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_number(number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))
    }

    pub async fn get_card_by_number(&self, number: &str) -> Result<CreditCard, AppError> {
        let card = self.repo.get_card_by_number(number).await?;
        card.ok_or_else(|| AppError::CardNotFound(number.to_string()))
    }

    // ========================
    // Derived views
    // ========================

    pub async fn account_summary(&self, account_id: AccountId) -> Result<AccountSummary, AppError> {
        let account = self.get_account(account_id).await?;
        let balance = self.repo.account_balance(account.id).await?;
        Ok(AccountSummary { account, balance })
    }

    pub async fn loan_summary(&self, loan_id: LoanId) -> Result<LoanSummary, AppError> {
        let loan = self
            .repo
            .get_loan(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))?;
        let debt = self
            .repo
            .loan_debt(loan_id)
            .await?
            .ok_or(AppError::LoanNotFound(loan_id))?;
        Ok(LoanSummary { loan, debt })
    }

    pub async fn card_summary(&self, card_id: CardId) -> Result<CardSummary, AppError> {
        let card = self
            .repo
            .get_card(card_id)
            .await?
            .ok_or_else(|| AppError::CardNotFound(card_id.to_string()))?;
        let available = self
            .repo
            .card_available(card_id)
            .await?
            .ok_or_else(|| AppError::CardNotFound(card_id.to_string()))?;
        Ok(CardSummary::new(card, available))
    }

    /// Account postings newest first, with card repayments shown at their economic amount.
    pub async fn account_history(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<HistoryLine>, AppError> {
        self.get_account(account_id).await?;
        Ok(self.repo.account_history(account_id, limit).await?)
    }

    pub async fn customer_overview(
        &self,
        customer_id: CustomerId,
        recent: u32,
    ) -> Result<CustomerOverview, AppError> {
        let customer = self.get_customer(customer_id).await?;

        let mut accounts = Vec::new();
        for account in self.repo.list_accounts_for_customer(customer_id).await? {
            let balance = self.repo.account_balance(account.id).await?;
            accounts.push(AccountSummary { account, balance });
        }
        let net_worth = accounts.iter().map(|a| a.balance).sum();

        let mut active_loans = Vec::new();
        for loan in self.repo.list_loans_for_customer(customer_id).await? {
            let summary = self.loan_summary(loan.id).await?;
            if summary.debt > 0 {
                active_loans.push(summary);
            }
        }

        let mut cards = Vec::new();
        for card in self.repo.list_cards_for_customer(customer_id).await? {
            cards.push(self.card_summary(card.id).await?);
        }

        let recent_activity = self.repo.customer_history(customer_id, recent).await?;

        Ok(CustomerOverview {
            customer,
            accounts,
            net_worth,
            active_loans,
            cards,
            recent_activity,
        })
    }

    // ========================
    // Integrity
    // ========================

    /// Verify the structural invariants of the ledger.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let report = build_integrity_report(&stats);
        if report.is_healthy() {
            tracing::info!(entries = report.entry_count, "ledger integrity verified");
        } else {
            tracing::warn!(issues = report.issues.len(), "ledger integrity problems found");
        }
        Ok(report)
    }
}

async fn source_account(scope: &mut PostingScope, id: AccountId) -> Result<Account, MovementError> {
    Parties::account(scope.conn(), id)
        .await?
        .ok_or_else(|| Rejection::SourceAccountNotFound(id).into())
}

/// Reject unless the account view shows at least `required`.
async fn require_funds(
    scope: &mut PostingScope,
    account_id: AccountId,
    required: Cents,
) -> Result<(), MovementError> {
    let balance = BalanceView::account_balance(scope.conn(), account_id).await?;
    if balance < required {
        return Err(Rejection::InsufficientFunds { balance, required }.into());
    }
    Ok(())
}
