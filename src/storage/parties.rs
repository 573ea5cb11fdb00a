use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::domain::{Account, AccountId, CardId, CreditCard, Customer, CustomerId, Loan, LoanId};

/// Read access to customers, accounts, loans and cards.
///
/// Generic over the executor so the money-movement checks can resolve parties
/// through the same scope that will write the postings.
pub struct Parties;

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn row_to_customer(row: &SqliteRow) -> Result<Customer, sqlx::Error> {
    Ok(Customer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tin: row.try_get("tin")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn row_to_account(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        number: row.try_get("number")?,
        customer_id: row.try_get("customer_id")?,
        currency: row.try_get("currency")?,
        opened_at: parse_timestamp(&row.try_get::<String, _>("opened_at")?)?,
    })
}

fn row_to_loan(row: &SqliteRow) -> Result<Loan, sqlx::Error> {
    let expires_on: Option<String> = row.try_get("expires_on")?;
    Ok(Loan {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        loan_type: row.try_get("loan_type")?,
        principal: row.try_get("principal_cents")?,
        expires_on: expires_on
            .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn row_to_card(row: &SqliteRow) -> Result<CreditCard, sqlx::Error> {
    Ok(CreditCard {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        card_number: row.try_get("card_number")?,
        credit_limit: row.try_get("credit_limit_cents")?,
        opening_available: row.try_get("opening_available_cents")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

impl Parties {
    pub async fn customer<'e, E>(executor: E, id: CustomerId) -> Result<Option<Customer>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT id, name, tin, created_at FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn customer_by_tin<'e, E>(executor: E, tin: &str) -> Result<Option<Customer>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query("SELECT id, name, tin, created_at FROM customers WHERE tin = ?")
            .bind(tin.to_string())
            .fetch_optional(executor)
            .await?;
        row.as_ref().map(row_to_customer).transpose()
    }

    pub async fn account<'e, E>(executor: E, id: AccountId) -> Result<Option<Account>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT id, number, customer_id, currency, opened_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn account_by_number<'e, E>(executor: E, number: &str) -> Result<Option<Account>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT id, number, customer_id, currency, opened_at FROM accounts WHERE number = ?",
        )
        .bind(number.to_string())
        .fetch_optional(executor)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn accounts_for_customer<'e, E>(
        executor: E,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query(
            "SELECT id, number, customer_id, currency, opened_at FROM accounts WHERE customer_id = ? ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        rows.iter().map(row_to_account).collect()
    }

    pub async fn loan<'e, E>(executor: E, id: LoanId) -> Result<Option<Loan>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT id, customer_id, loan_type, principal_cents, expires_on, created_at FROM loans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        row.as_ref().map(row_to_loan).transpose()
    }

    pub async fn loans_for_customer<'e, E>(
        executor: E,
        customer_id: CustomerId,
    ) -> Result<Vec<Loan>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query(
            "SELECT id, customer_id, loan_type, principal_cents, expires_on, created_at FROM loans WHERE customer_id = ? ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        rows.iter().map(row_to_loan).collect()
    }

    pub async fn card<'e, E>(executor: E, id: CardId) -> Result<Option<CreditCard>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT id, customer_id, card_number, credit_limit_cents, opening_available_cents, created_at FROM credit_cards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        row.as_ref().map(row_to_card).transpose()
    }

    pub async fn card_by_number<'e, E>(executor: E, number: &str) -> Result<Option<CreditCard>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query(
            "SELECT id, customer_id, card_number, credit_limit_cents, opening_available_cents, created_at FROM credit_cards WHERE card_number = ?",
        )
        .bind(number.to_string())
        .fetch_optional(executor)
        .await?;
        row.as_ref().map(row_to_card).transpose()
    }

    pub async fn cards_for_customer<'e, E>(
        executor: E,
        customer_id: CustomerId,
    ) -> Result<Vec<CreditCard>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query(
            "SELECT id, customer_id, card_number, credit_limit_cents, opening_available_cents, created_at FROM credit_cards WHERE customer_id = ? ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        rows.iter().map(row_to_card).collect()
    }
}
