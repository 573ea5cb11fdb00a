use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{CustomerOverview, MoneyMovementService};
use crate::domain::{AccountId, CustomerId, format_cents};

/// Customer overview as written by the JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub overview: CustomerOverview,
}

/// Exporter for converting ledger views to CSV and JSON
pub struct Exporter<'a> {
    service: &'a MoneyMovementService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a MoneyMovementService) -> Self {
        Self { service }
    }

    /// Export an account's history to CSV, newest first.
    ///
    /// `amount` is what the account holder sees; `ledger_amount` is the stored value.
    pub async fn export_history_csv<W: Write>(
        &self,
        account_id: AccountId,
        limit: u32,
        writer: W,
    ) -> Result<usize> {
        let lines = self.service.account_history(account_id, limit).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "entry_id",
            "occurred_at",
            "account",
            "movement_type",
            "amount",
            "ledger_amount",
        ])?;

        for line in &lines {
            csv_writer.write_record([
                line.entry_id.to_string(),
                line.occurred_at.to_rfc3339(),
                line.account_number.clone(),
                line.movement_type.as_str().to_string(),
                format_cents(line.display_amount),
                format_cents(line.ledger_amount),
            ])?;
        }

        csv_writer.flush()?;
        Ok(lines.len())
    }

    /// Export the balances of every account a customer holds to CSV.
    pub async fn export_balances_csv<W: Write>(&self, customer_id: CustomerId, writer: W) -> Result<usize> {
        let overview = self.service.customer_overview(customer_id, 0).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account", "currency", "balance"])?;

        for summary in &overview.accounts {
            csv_writer.write_record([
                summary.account.number.as_str(),
                summary.account.currency.as_str(),
                format_cents(summary.balance).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(overview.accounts.len())
    }

    /// Export a customer overview as pretty-printed JSON.
    pub async fn export_overview_json<W: Write>(
        &self,
        customer_id: CustomerId,
        recent: u32,
        mut writer: W,
    ) -> Result<OverviewSnapshot> {
        let overview = self.service.customer_overview(customer_id, recent).await?;

        let snapshot = OverviewSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            overview,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
