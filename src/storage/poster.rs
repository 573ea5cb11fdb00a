use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use thiserror::Error;

use crate::domain::{EntryId, LegTarget, PostingLeg};

use super::SequenceAllocator;

// Primary SQLite result codes (extended codes keep these in the low byte).
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CONSTRAINT: i32 = 19;

/// Why a posting could not be written. Nothing from the failed attempt is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingFailure {
    /// Lock wait exceeded, pool exhausted, I/O trouble. Retrying later may succeed.
    #[error("ledger storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A row was refused by the schema, e.g. it references a missing account or card.
    #[error("ledger constraint violated: {0}")]
    ConstraintViolated(String),
}

impl PostingFailure {
    /// Posting failures are infrastructure trouble, never bad user input.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<sqlx::Error> for PostingFailure {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                let constraint = matches!(
                    db.kind(),
                    ErrorKind::UniqueViolation
                        | ErrorKind::ForeignKeyViolation
                        | ErrorKind::NotNullViolation
                        | ErrorKind::CheckViolation
                ) || primary == Some(SQLITE_CONSTRAINT);

                if constraint {
                    PostingFailure::ConstraintViolated(db.message().to_string())
                } else if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
                    PostingFailure::StorageUnavailable(format!(
                        "ledger is locked by another posting: {}",
                        db.message()
                    ))
                } else {
                    PostingFailure::StorageUnavailable(db.message().to_string())
                }
            }
            _ => PostingFailure::StorageUnavailable(err.to_string()),
        }
    }
}

/// One atomic, isolated unit of ledger work.
///
/// Opening a scope takes the database write lock, so reads made through it see the
/// latest committed ledger and stay valid until commit. Dropping the scope without
/// calling [`PostingScope::commit`] rolls everything back and releases the lock.
pub struct PostingScope {
    tx: Transaction<'static, Sqlite>,
}

impl PostingScope {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, PostingFailure> {
        let mut tx = pool.begin().await?;
        SequenceAllocator::lock(&mut tx).await?;
        Ok(Self { tx })
    }

    /// Connection bound to this scope, for reads that must share its isolation.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), PostingFailure> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), PostingFailure> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Writes ledger entries and their postings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerPoster;

impl LedgerPoster {
    pub fn new() -> Self {
        Self
    }

    /// Post `legs` in a scope of their own and commit.
    /// Returns the allocated ids in leg order.
    pub async fn post(
        &self,
        pool: &SqlitePool,
        legs: &[PostingLeg],
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<EntryId>, PostingFailure> {
        let mut scope = PostingScope::begin(pool).await?;
        let ids = self.post_in(&mut scope, legs, occurred_at).await?;
        scope.commit().await?;
        Ok(ids)
    }

    /// Post `legs` inside an already open scope. The caller decides whether to commit.
    ///
    /// Legs are allocated and written in order, so a two-leg posting receives
    /// consecutive ids `n, n + 1`.
    pub async fn post_in(
        &self,
        scope: &mut PostingScope,
        legs: &[PostingLeg],
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<EntryId>, PostingFailure> {
        if legs.is_empty() {
            return Err(PostingFailure::ConstraintViolated(
                "a posting needs at least one leg".to_string(),
            ));
        }

        let occurred_at = occurred_at.to_rfc3339();
        let mut ids = Vec::with_capacity(legs.len());

        for leg in legs {
            let id = SequenceAllocator::next(scope).await?;

            sqlx::query(
                "INSERT INTO ledger_entries (id, occurred_at, signed_amount_cents) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(&occurred_at)
            .bind(leg.signed_amount)
            .execute(scope.conn())
            .await?;

            match leg.target {
                LegTarget::Account {
                    account_id,
                    movement_type,
                    loan_id,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO account_postings (entry_id, account_id, movement_type, loan_id)
                        VALUES (?, ?, ?, ?)
                        "#,
                    )
                    .bind(id)
                    .bind(account_id)
                    .bind(movement_type.as_str())
                    .bind(loan_id)
                    .execute(scope.conn())
                    .await?;
                }
                LegTarget::Card {
                    account_id,
                    card_id,
                } => {
                    sqlx::query(
                        "INSERT INTO card_postings (entry_id, account_id, card_id) VALUES (?, ?, ?)",
                    )
                    .bind(id)
                    .bind(account_id)
                    .bind(card_id)
                    .execute(scope.conn())
                    .await?;
                }
            }

            tracing::debug!(entry_id = id, amount = leg.signed_amount, "ledger entry written");
            ids.push(id);
        }

        Ok(ids)
    }
}
