// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use bankledger::application::MoneyMovementService;
use bankledger::config::LedgerConfig;
use bankledger::domain::{Account, Cents, CreditCard, Customer, Loan};
use tempfile::TempDir;

/// Configuration pointing at a fresh database file inside `dir`.
pub fn test_config(dir: &TempDir) -> LedgerConfig {
    LedgerConfig::new(dir.path().join("test.db")).with_max_connections(8)
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(MoneyMovementService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = MoneyMovementService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Service whose postings give up quickly when the ledger is locked.
pub async fn impatient_service() -> Result<(MoneyMovementService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir).with_busy_timeout(Duration::from_millis(200));
    let service = MoneyMovementService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Test fixture: two customers and their accounts.
///
/// Alice holds `ACC-001` (checking) and `ACC-002` (savings); Bob holds `ACC-100`.
pub struct Household {
    pub alice: Customer,
    pub checking: Account,
    pub savings: Account,
    pub bob: Customer,
    pub bob_account: Account,
}

impl Household {
    pub async fn create(service: &MoneyMovementService) -> Result<Self> {
        let alice = service
            .register_customer("Alice Rossi".into(), "TIN-ALICE".into())
            .await?;
        let checking = service
            .open_account(alice.id, "ACC-001".into(), "EUR".into())
            .await?;
        let savings = service
            .open_account(alice.id, "ACC-002".into(), "EUR".into())
            .await?;

        let bob = service
            .register_customer("Bob Bianchi".into(), "TIN-BOB".into())
            .await?;
        let bob_account = service
            .open_account(bob.id, "ACC-100".into(), "EUR".into())
            .await?;

        Ok(Self {
            alice,
            checking,
            savings,
            bob,
            bob_account,
        })
    }

    /// Create the household and put `amount` into Alice's checking account.
    pub async fn funded(service: &MoneyMovementService, amount: Cents) -> Result<Self> {
        let household = Self::create(service).await?;
        fund(service, &household.checking, amount).await?;
        Ok(household)
    }

    pub async fn grant_loan(&self, service: &MoneyMovementService, principal: Cents) -> Result<Loan> {
        Ok(service
            .grant_loan(self.alice.id, "personal".into(), principal, None)
            .await?)
    }

    /// Issue Alice a card with `available` of `limit` left to spend.
    pub async fn issue_card(
        &self,
        service: &MoneyMovementService,
        number: &str,
        limit: Cents,
        available: Cents,
    ) -> Result<CreditCard> {
        Ok(service
            .issue_credit_card(self.alice.id, number.into(), limit, Some(available))
            .await?)
    }
}

/// Deposit `amount` into `account`.
pub async fn fund(service: &MoneyMovementService, account: &Account, amount: Cents) -> Result<()> {
    service.deposit(&account.number, amount).await?;
    Ok(())
}

pub async fn balance(service: &MoneyMovementService, account: &Account) -> Result<Cents> {
    Ok(service.account_summary(account.id).await?.balance)
}

pub async fn entry_count(service: &MoneyMovementService) -> Result<usize> {
    Ok(service.repository().list_posted_entries().await?.len())
}
