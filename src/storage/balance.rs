use std::sync::LazyLock;

use sqlx::{Executor, Sqlite};

use crate::domain::{
    ACCOUNT_VIEW_KINDS, AccountId, CARD_VIEW_KINDS, CardId, Cents, CustomerId, LoanId, PostingKind,
};

/// Derived balances, recomputed from the ledger on every call.
///
/// Each method runs on whatever executor it is given: the pool for plain reads, or
/// a [`PostingScope`](super::PostingScope) connection when the figure feeds a
/// check-then-post decision. The SQL mirrors the folds in `domain::ledger`.
pub struct BalanceView;

fn posting_table(kind: PostingKind) -> &'static str {
    match kind {
        PostingKind::Account => "account_postings",
        PostingKind::Card => "card_postings",
    }
}

/// Entry ids visible to a view, one `SELECT` per declared kind.
/// Every branch takes a single bound parameter on `column`.
fn view_entries(kinds: &[PostingKind], column: &str) -> String {
    kinds
        .iter()
        .map(|kind| format!("SELECT entry_id FROM {} WHERE {} = ?", posting_table(*kind), column))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

static ACCOUNT_BALANCE_SQL: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"
        SELECT COALESCE(SUM(e.signed_amount_cents), 0)
        FROM ledger_entries e
        JOIN ({}) v ON v.entry_id = e.id
        "#,
        view_entries(ACCOUNT_VIEW_KINDS, "account_id")
    )
});

static CARD_AVAILABLE_SQL: LazyLock<String> = LazyLock::new(|| {
    format!(
        r#"
        SELECT MIN(
            c.credit_limit_cents,
            c.opening_available_cents + COALESCE((
                SELECT SUM(ABS(e.signed_amount_cents))
                FROM ledger_entries e
                JOIN ({}) v ON v.entry_id = e.id
            ), 0)
        )
        FROM credit_cards c
        WHERE c.id = ?
        "#,
        view_entries(CARD_VIEW_KINDS, "card_id")
    )
});

impl BalanceView {
    /// Signed sum over every posting kind the account view declares.
    pub async fn account_balance<'e, E>(executor: E, account_id: AccountId) -> Result<Cents, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut query = sqlx::query_scalar::<Sqlite, Cents>(ACCOUNT_BALANCE_SQL.as_str());
        for _ in ACCOUNT_VIEW_KINDS {
            query = query.bind(account_id);
        }
        query.fetch_one(executor).await
    }

    /// Principal minus the magnitude of the loan's payments. `None` if the loan does not exist.
    pub async fn loan_debt<'e, E>(executor: E, loan_id: LoanId) -> Result<Option<Cents>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            r#"
            SELECT l.principal_cents - COALESCE((
                SELECT SUM(ABS(e.signed_amount_cents))
                FROM account_postings p
                JOIN ledger_entries e ON e.id = p.entry_id
                WHERE p.loan_id = l.id AND p.movement_type = 'LoanPayment'
            ), 0)
            FROM loans l
            WHERE l.id = ?
            "#,
        )
        .bind(loan_id)
        .fetch_optional(executor)
        .await
    }

    /// The customer's oldest loan that still carries debt, with that debt.
    pub async fn first_active_loan<'e, E>(
        executor: E,
        customer_id: CustomerId,
    ) -> Result<Option<(LoanId, Cents)>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as(
            r#"
            SELECT id, debt FROM (
                SELECT l.id AS id, l.principal_cents - COALESCE((
                    SELECT SUM(ABS(e.signed_amount_cents))
                    FROM account_postings p
                    JOIN ledger_entries e ON e.id = p.entry_id
                    WHERE p.loan_id = l.id AND p.movement_type = 'LoanPayment'
                ), 0) AS debt
                FROM loans l
                WHERE l.customer_id = ?
            )
            WHERE debt > 0
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(executor)
        .await
    }

    /// Opening availability plus the magnitude of the card view's postings, capped at the
    /// credit limit. `None` if the card does not exist.
    pub async fn card_available<'e, E>(executor: E, card_id: CardId) -> Result<Option<Cents>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut query = sqlx::query_scalar::<Sqlite, Cents>(CARD_AVAILABLE_SQL.as_str());
        for _ in CARD_VIEW_KINDS {
            query = query.bind(card_id);
        }
        query.bind(card_id).fetch_optional(executor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_view_unions_declared_kinds() {
        let sql = view_entries(ACCOUNT_VIEW_KINDS, "account_id");
        assert_eq!(
            sql,
            "SELECT entry_id FROM account_postings WHERE account_id = ? \
             UNION ALL SELECT entry_id FROM card_postings WHERE account_id = ?"
        );
    }

    #[test]
    fn test_card_view_reads_only_card_postings() {
        let sql = view_entries(CARD_VIEW_KINDS, "card_id");
        assert_eq!(sql, "SELECT entry_id FROM card_postings WHERE card_id = ?");
    }
}
