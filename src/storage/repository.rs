use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, AccountPosting, CardId, CardPosting, Cents, CreditCard, Customer,
    CustomerId, HistoryLine, IntegrityStats, LedgerEntry, Loan, LoanId, MovementType, PostedEntry,
    Posting,
};

use super::{BalanceView, MIGRATION_001_INITIAL, Parties, SequenceAllocator};

/// Repository for parties, ledger reads and integrity queries.
///
/// Ledger writes do not go through here; they belong to
/// [`LedgerPoster`](super::LedgerPoster) inside a [`PostingScope`](super::PostingScope).
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open an existing ledger database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        Self::connect_with(config, false).await
    }

    /// Create the database file if needed and apply the schema.
    pub async fn init(config: &LedgerConfig) -> Result<Self> {
        let repo = Self::connect_with(config, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn connect_with(config: &LedgerConfig, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to open ledger database {}", config.database_path.display())
            })?;

        tracing::debug!(path = %config.database_path.display(), "connected to ledger database");
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Party operations
    // ========================

    /// Insert a customer and fill in its id.
    pub async fn save_customer(&self, customer: &mut Customer) -> Result<()> {
        customer.id = sqlx::query_scalar(
            "INSERT INTO customers (name, tin, created_at) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&customer.name)
        .bind(&customer.tin)
        .bind(customer.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    /// Insert an account and fill in its id.
    pub async fn save_account(&self, account: &mut Account) -> Result<()> {
        account.id = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (number, customer_id, currency, opened_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&account.number)
        .bind(account.customer_id)
        .bind(&account.currency)
        .bind(account.opened_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    /// Insert a loan and fill in its id.
    pub async fn save_loan(&self, loan: &mut Loan) -> Result<()> {
        loan.id = sqlx::query_scalar(
            r#"
            INSERT INTO loans (customer_id, loan_type, principal_cents, expires_on, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(loan.customer_id)
        .bind(&loan.loan_type)
        .bind(loan.principal)
        .bind(loan.expires_on.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(loan.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save loan")?;
        Ok(())
    }

    /// Insert a credit card and fill in its id.
    pub async fn save_card(&self, card: &mut CreditCard) -> Result<()> {
        card.id = sqlx::query_scalar(
            r#"
            INSERT INTO credit_cards
                (customer_id, card_number, credit_limit_cents, opening_available_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(card.customer_id)
        .bind(&card.card_number)
        .bind(card.credit_limit)
        .bind(card.opening_available)
        .bind(card.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save credit card")?;
        Ok(())
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Parties::customer(&self.pool, id)
            .await
            .context("Failed to fetch customer")
    }

    pub async fn get_customer_by_tin(&self, tin: &str) -> Result<Option<Customer>> {
        Parties::customer_by_tin(&self.pool, tin)
            .await
            .context("Failed to fetch customer by TIN")
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        Parties::account(&self.pool, id)
            .await
            .context("Failed to fetch account")
    }

    pub async fn get_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        Parties::account_by_number(&self.pool, number)
            .await
            .context("Failed to fetch account by number")
    }

    pub async fn list_accounts_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        Parties::accounts_for_customer(&self.pool, customer_id)
            .await
            .context("Failed to list accounts")
    }

    pub async fn get_loan(&self, id: LoanId) -> Result<Option<Loan>> {
        Parties::loan(&self.pool, id).await.context("Failed to fetch loan")
    }

    pub async fn list_loans_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Loan>> {
        Parties::loans_for_customer(&self.pool, customer_id)
            .await
            .context("Failed to list loans")
    }

    pub async fn get_card(&self, id: CardId) -> Result<Option<CreditCard>> {
        Parties::card(&self.pool, id)
            .await
            .context("Failed to fetch credit card")
    }

    pub async fn get_card_by_number(&self, number: &str) -> Result<Option<CreditCard>> {
        Parties::card_by_number(&self.pool, number)
            .await
            .context("Failed to fetch credit card by number")
    }

    pub async fn list_cards_for_customer(&self, customer_id: CustomerId) -> Result<Vec<CreditCard>> {
        Parties::cards_for_customer(&self.pool, customer_id)
            .await
            .context("Failed to list credit cards")
    }

    // ========================
    // Balance reads
    // ========================

    pub async fn account_balance(&self, account_id: AccountId) -> Result<Cents> {
        BalanceView::account_balance(&self.pool, account_id)
            .await
            .context("Failed to compute account balance")
    }

    pub async fn loan_debt(&self, loan_id: LoanId) -> Result<Option<Cents>> {
        BalanceView::loan_debt(&self.pool, loan_id)
            .await
            .context("Failed to compute loan debt")
    }

    pub async fn card_available(&self, card_id: CardId) -> Result<Option<Cents>> {
        BalanceView::card_available(&self.pool, card_id)
            .await
            .context("Failed to compute card availability")
    }

    // ========================
    // Ledger reads
    // ========================

    /// Account postings of one account, newest first.
    pub async fn account_history(&self, account_id: AccountId, limit: u32) -> Result<Vec<HistoryLine>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.occurred_at, e.signed_amount_cents, p.account_id, p.movement_type, a.number
            FROM account_postings p
            JOIN ledger_entries e ON e.id = p.entry_id
            JOIN accounts a ON a.id = p.account_id
            WHERE p.account_id = ?
            ORDER BY e.id DESC
            LIMIT ?
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch account history")?;

        rows.iter().map(Self::row_to_history_line).collect()
    }

    /// Account postings across every account a customer holds, newest first.
    pub async fn customer_history(
        &self,
        customer_id: CustomerId,
        limit: u32,
    ) -> Result<Vec<HistoryLine>> {
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.occurred_at, e.signed_amount_cents, p.account_id, p.movement_type, a.number
            FROM account_postings p
            JOIN ledger_entries e ON e.id = p.entry_id
            JOIN accounts a ON a.id = p.account_id
            WHERE a.customer_id = ?
            ORDER BY e.id DESC
            LIMIT ?
            "#,
        )
        .bind(customer_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch customer history")?;

        rows.iter().map(Self::row_to_history_line).collect()
    }

    /// Every ledger entry with its posting, in id order.
    pub async fn list_posted_entries(&self) -> Result<Vec<PostedEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT
                e.id, e.occurred_at, e.signed_amount_cents,
                a.account_id AS posting_account_id, a.movement_type, a.loan_id,
                c.account_id AS card_account_id, c.card_id
            FROM ledger_entries e
            LEFT JOIN account_postings a ON a.entry_id = e.id
            LEFT JOIN card_postings c ON c.entry_id = e.id
            ORDER BY e.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter().map(Self::row_to_posted_entry).collect()
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let counts = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ledger_entries) AS entry_count,
                (SELECT COUNT(*) FROM account_postings) AS account_posting_count,
                (SELECT COUNT(*) FROM card_postings) AS card_posting_count,
                (SELECT MIN(id) FROM ledger_entries) AS min_id,
                (SELECT MAX(id) FROM ledger_entries) AS max_id
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count ledger rows")?;

        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        let sequence_value = SequenceAllocator::current(&mut conn)
            .await
            .context("Failed to read ledger sequence")?;

        let orphan_entries = self
            .count(
                r#"
                SELECT COUNT(*) FROM ledger_entries e
                WHERE NOT EXISTS (SELECT 1 FROM account_postings a WHERE a.entry_id = e.id)
                  AND NOT EXISTS (SELECT 1 FROM card_postings c WHERE c.entry_id = e.id)
                "#,
                "orphan entries",
            )
            .await?;

        let doubly_posted_entries = self
            .count(
                "SELECT COUNT(*) FROM account_postings a JOIN card_postings c ON c.entry_id = a.entry_id",
                "doubly posted entries",
            )
            .await?;

        // A transfer is OUT at n, IN at n + 1, opposite amounts, different accounts.
        let unbalanced_transfers = self
            .count(
                r#"
                SELECT
                    (SELECT COUNT(*)
                     FROM account_postings o JOIN ledger_entries oe ON oe.id = o.entry_id
                     WHERE o.movement_type = 'Transfer_OUT' AND NOT EXISTS (
                         SELECT 1
                         FROM account_postings i JOIN ledger_entries ie ON ie.id = i.entry_id
                         WHERE i.entry_id = o.entry_id + 1
                           AND i.movement_type = 'Transfer_IN'
                           AND i.account_id <> o.account_id
                           AND ie.signed_amount_cents = -oe.signed_amount_cents))
                  + (SELECT COUNT(*)
                     FROM account_postings i
                     WHERE i.movement_type = 'Transfer_IN' AND NOT EXISTS (
                         SELECT 1 FROM account_postings o
                         WHERE o.entry_id = i.entry_id - 1 AND o.movement_type = 'Transfer_OUT'))
                "#,
                "unbalanced transfers",
            )
            .await?;

        // A card repayment is +A on the card at n, then -2A on the same account at n + 1.
        let malformed_card_repayments = self
            .count(
                r#"
                SELECT
                    (SELECT COUNT(*)
                     FROM account_postings r JOIN ledger_entries re ON re.id = r.entry_id
                     WHERE r.movement_type = 'CC_Repayment' AND NOT EXISTS (
                         SELECT 1
                         FROM card_postings c JOIN ledger_entries ce ON ce.id = c.entry_id
                         WHERE c.entry_id = r.entry_id - 1
                           AND c.account_id = r.account_id
                           AND ce.signed_amount_cents * -2 = re.signed_amount_cents))
                  + (SELECT COUNT(*)
                     FROM card_postings c
                     WHERE NOT EXISTS (
                         SELECT 1 FROM account_postings r
                         WHERE r.entry_id = c.entry_id + 1 AND r.movement_type = 'CC_Repayment'))
                "#,
                "malformed card repayments",
            )
            .await?;

        let unlinked_loan_payments = self
            .count(
                r#"
                SELECT COUNT(*) FROM account_postings
                WHERE movement_type = 'LoanPayment'
                  AND (loan_id IS NULL OR NOT EXISTS (SELECT 1 FROM loans l WHERE l.id = loan_id))
                "#,
                "unlinked loan payments",
            )
            .await?;

        Ok(IntegrityStats {
            entry_count: counts.get("entry_count"),
            account_posting_count: counts.get("account_posting_count"),
            card_posting_count: counts.get("card_posting_count"),
            min_entry_id: counts.get("min_id"),
            max_entry_id: counts.get("max_id"),
            sequence_value,
            orphan_entries,
            doubly_posted_entries,
            unbalanced_transfers,
            malformed_card_repayments,
            unlinked_loan_payments,
        })
    }

    async fn count(&self, sql: &'static str, what: &str) -> Result<i64> {
        sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", what))
    }

    fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)
            .context("Invalid timestamp")?
            .with_timezone(&Utc))
    }

    fn parse_movement_type(value: &str) -> Result<MovementType> {
        MovementType::parse(value).ok_or_else(|| anyhow::anyhow!("Invalid movement type: {}", value))
    }

    fn row_to_history_line(row: &SqliteRow) -> Result<HistoryLine> {
        let occurred_at: String = row.get("occurred_at");
        let movement_type: String = row.get("movement_type");

        Ok(HistoryLine::new(
            row.get("id"),
            Self::parse_timestamp(&occurred_at)?,
            row.get("account_id"),
            row.get("number"),
            Self::parse_movement_type(&movement_type)?,
            row.get("signed_amount_cents"),
        ))
    }

    fn row_to_posted_entry(row: &SqliteRow) -> Result<PostedEntry> {
        let id: i64 = row.get("id");
        let occurred_at: String = row.get("occurred_at");
        let entry = LedgerEntry {
            id,
            occurred_at: Self::parse_timestamp(&occurred_at)?,
            signed_amount: row.get("signed_amount_cents"),
        };

        let movement_type: Option<String> = row.get("movement_type");
        let card_id: Option<CardId> = row.get("card_id");

        let posting = match (movement_type, card_id) {
            (Some(movement_type), _) => Posting::Account(AccountPosting {
                entry_id: id,
                account_id: row.get("posting_account_id"),
                movement_type: Self::parse_movement_type(&movement_type)?,
                loan_id: row.get("loan_id"),
            }),
            (None, Some(card_id)) => Posting::Card(CardPosting {
                entry_id: id,
                account_id: row.get("card_account_id"),
                card_id,
            }),
            (None, None) => bail!("Ledger entry {} has no posting", id),
        };

        Ok(PostedEntry { entry, posting })
    }
}
