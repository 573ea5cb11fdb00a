use sqlx::SqliteConnection;

use crate::domain::EntryId;

use super::{PostingFailure, PostingScope};

const LEDGER_SEQUENCE: &str = "ledger_entry";

/// Hands out ledger entry ids from the `ledger_sequence` counter row.
///
/// The counter is only touched inside a [`PostingScope`], whose first statement
/// already holds the database write lock. Allocation therefore serialises with
/// every other posting, and an allocation made in a scope that rolls back is
/// rolled back with it.
pub struct SequenceAllocator;

impl SequenceAllocator {
    /// Take the write lock for the current transaction by touching the counter row.
    /// Waits up to the connection's busy timeout.
    pub(super) async fn lock(conn: &mut SqliteConnection) -> Result<(), PostingFailure> {
        let result = sqlx::query("UPDATE ledger_sequence SET value = value WHERE name = ?")
            .bind(LEDGER_SEQUENCE)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() != 1 {
            return Err(PostingFailure::StorageUnavailable(
                "ledger sequence is not initialised".to_string(),
            ));
        }
        Ok(())
    }

    /// Next entry id: strictly greater than both the counter and every persisted id.
    pub async fn next(scope: &mut PostingScope) -> Result<EntryId, PostingFailure> {
        let id: EntryId = sqlx::query_scalar(
            r#"
            UPDATE ledger_sequence
            SET value = MAX(value, (SELECT COALESCE(MAX(id), 0) FROM ledger_entries)) + 1
            WHERE name = ?
            RETURNING value
            "#,
        )
        .bind(LEDGER_SEQUENCE)
        .fetch_one(scope.conn())
        .await?;

        Ok(id)
    }

    /// Last id handed out by a committed scope.
    pub async fn current(conn: &mut SqliteConnection) -> Result<EntryId, sqlx::Error> {
        sqlx::query_scalar("SELECT value FROM ledger_sequence WHERE name = ?")
            .bind(LEDGER_SEQUENCE)
            .fetch_one(&mut *conn)
            .await
    }
}
