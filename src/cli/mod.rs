use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{MoneyMovementService, MovementError, Receipt};
use crate::config::LedgerConfig;
use crate::domain::{format_cents, parse_cents, AccountId, Cents, CustomerId, HistoryLine};
use crate::telemetry;

/// Bankledger - append-only ledger posting engine for retail banking
#[derive(Parser)]
#[command(name = "bankledger")]
#[command(about = "Post transfers, loan payments and credit-card repayments to an append-only ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "BANKLEDGER_DATABASE", default_value = "bankledger.db", global = true)]
    pub database: PathBuf,

    /// How long a posting waits for the ledger lock, in milliseconds
    #[arg(long, env = "BANKLEDGER_BUSY_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub busy_timeout_ms: u64,

    /// How long to wait for a pooled connection, in milliseconds
    #[arg(long, env = "BANKLEDGER_ACQUIRE_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub acquire_timeout_ms: u64,

    /// Maximum number of pooled connections
    #[arg(long, env = "BANKLEDGER_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    pub max_connections: u32,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Loan management commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Credit card management commands
    #[command(subcommand)]
    Card(CardCommands),

    /// Credit an account with money from outside the bank
    Deposit {
        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,

        /// Destination account number
        #[arg(long)]
        to: String,
    },

    /// Transfer money between accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account number
        #[arg(long)]
        from: String,

        /// Destination account number
        #[arg(long)]
        to: String,
    },

    /// Pay off the account holder's oldest active loan
    PayLoan {
        /// Amount to pay
        amount: String,

        /// Source account number
        #[arg(long)]
        from: String,
    },

    /// Repay used credit on a credit card
    PayCard {
        /// Amount to repay
        amount: String,

        /// Source account number
        #[arg(long)]
        from: String,

        /// Card number
        #[arg(long)]
        card: String,
    },

    /// Show the balance of an account
    Balance {
        /// Account number
        account: String,
    },

    /// Show a customer's accounts, loans, cards and recent activity
    Overview {
        /// Customer TIN
        customer: String,

        /// Number of recent postings to show
        #[arg(short, long, default_value_t = 10)]
        recent: u32,
    },

    /// List the postings of an account, newest first
    History {
        /// Account number
        account: String,

        /// Maximum number of postings to show
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: history, balances, overview
        export_type: String,

        /// Account number (history)
        #[arg(long)]
        account: Option<String>,

        /// Customer TIN (balances, overview)
        #[arg(long)]
        customer: Option<String>,

        /// Maximum number of postings (history, overview)
        #[arg(short, long, default_value_t = 100)]
        limit: u32,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a new customer
    Create {
        /// Full name
        name: String,

        /// Tax identification number (must be unique)
        #[arg(long)]
        tin: String,
    },

    /// Show a customer by TIN
    Show {
        /// Tax identification number
        tin: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account for a customer
    Open {
        /// Account number (must be unique)
        number: String,

        /// Owner's TIN
        #[arg(long)]
        customer: String,

        /// Currency code (e.g., EUR, USD)
        #[arg(short, long, default_value = "EUR")]
        currency: String,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// Grant a loan to a customer
    Grant {
        /// Principal amount
        principal: String,

        /// Borrower's TIN
        #[arg(long)]
        customer: String,

        /// Loan type (e.g., mortgage, personal)
        #[arg(short = 't', long = "type", default_value = "personal")]
        loan_type: String,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CardCommands {
    /// Issue a credit card to a customer
    Issue {
        /// Card number (must be unique)
        number: String,

        /// Holder's TIN
        #[arg(long)]
        customer: String,

        /// Credit limit
        #[arg(long)]
        limit: String,

        /// Credit available at issue (defaults to the full limit)
        #[arg(long)]
        available: Option<String>,
    },
}

impl Cli {
    fn config(&self) -> LedgerConfig {
        LedgerConfig::new(&self.database)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
            .with_max_connections(self.max_connections)
    }

    pub async fn run(self) -> Result<()> {
        telemetry::init_tracing(if self.verbose { "debug" } else { "info" });
        let config = self.config();

        let service = match self.command {
            Commands::Init => {
                let service = MoneyMovementService::init(&config).await?;
                service.repository().close().await;
                println!("Database initialized: {}", config.database_path.display());
                return Ok(());
            }
            _ => MoneyMovementService::connect(&config).await?,
        };

        let result = run_command(&service, self.command).await;
        service.repository().close().await;
        result
    }
}

async fn run_command(service: &MoneyMovementService, command: Commands) -> Result<()> {
    match command {
        // Handled before connecting.
        Commands::Init => {}

        Commands::Customer(cmd) => {
            run_customer_command(service, cmd).await?;
        }

        Commands::Account(AccountCommands::Open {
            number,
            customer,
            currency,
        }) => {
            let customer = service.get_customer_by_tin(&customer).await?;
            let account = service.open_account(customer.id, number, currency).await?;
            println!(
                "Opened account {} ({}) for {}",
                account.number, account.currency, customer.name
            );
        }

        Commands::Loan(LoanCommands::Grant {
            principal,
            customer,
            loan_type,
            expires,
        }) => {
            let customer = service.get_customer_by_tin(&customer).await?;
            let principal = parse_amount(&principal)?;
            let expires_on = expires.map(|d| parse_date(&d)).transpose()?;
            let loan = service
                .grant_loan(customer.id, loan_type, principal, expires_on)
                .await?;
            println!(
                "Granted {} loan of {} to {}",
                loan.loan_type,
                format_cents(loan.principal),
                customer.name
            );
        }

        Commands::Card(CardCommands::Issue {
            number,
            customer,
            limit,
            available,
        }) => {
            let customer = service.get_customer_by_tin(&customer).await?;
            let limit = parse_amount(&limit)?;
            let available = available.map(|a| parse_amount(&a)).transpose()?;
            let card = service
                .issue_credit_card(customer.id, number, limit, available)
                .await?;
            println!(
                "Issued card {} to {} (limit {}, available {})",
                card.card_number,
                customer.name,
                format_cents(card.credit_limit),
                format_cents(card.opening_available)
            );
        }

        Commands::Deposit { amount, to } => {
            let amount = parse_amount(&amount)?;
            let receipt = confirmed(service.deposit(&to, amount).await)?;
            println!("Deposited {} into {}", format_cents(receipt.amount), to);
            print_receipt(&receipt);
        }

        Commands::Transfer { amount, from, to } => {
            let amount = parse_amount(&amount)?;
            let source = service.get_account_by_number(&from).await?;
            let receipt = confirmed(service.transfer(source.id, &to, amount).await)?;
            println!("Transferred {} from {} to {}", format_cents(receipt.amount), from, to);
            print_receipt(&receipt);
        }

        Commands::PayLoan { amount, from } => {
            let amount = parse_amount(&amount)?;
            let source = service.get_account_by_number(&from).await?;
            let receipt = confirmed(service.pay_loan(source.id, amount).await)?;
            println!("Paid {} towards loan from {}", format_cents(receipt.amount), from);
            print_receipt(&receipt);
        }

        Commands::PayCard { amount, from, card } => {
            let amount = parse_amount(&amount)?;
            let source = service.get_account_by_number(&from).await?;
            let card = service.get_card_by_number(&card).await?;
            let receipt =
                confirmed(service.repay_credit_card(source.id, card.id, amount).await)?;
            println!(
                "Repaid {} on card {} from {}",
                format_cents(receipt.amount),
                card.card_number,
                from
            );
            print_receipt(&receipt);
        }

        Commands::Balance { account } => {
            let account = service.get_account_by_number(&account).await?;
            let summary = service.account_summary(account.id).await?;
            println!(
                "{}: {} {}",
                summary.account.number,
                format_cents(summary.balance),
                summary.account.currency
            );
        }

        Commands::Overview { customer, recent } => {
            let customer = service.get_customer_by_tin(&customer).await?;
            run_overview_command(service, customer.id, recent).await?;
        }

        Commands::History { account, limit } => {
            let account = service.get_account_by_number(&account).await?;
            run_history_command(service, account.id, limit).await?;
        }

        Commands::Check => {
            run_check_command(service).await?;
        }

        Commands::Export {
            export_type,
            account,
            customer,
            limit,
            output,
        } => {
            run_export_command(
                service,
                &export_type,
                account.as_deref(),
                customer.as_deref(),
                limit,
                output.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}

/// Turn a movement error into the message meant for the person at the terminal.
fn confirmed(result: Result<Receipt, MovementError>) -> Result<Receipt> {
    result.map_err(|err| {
        if err.is_retryable() {
            anyhow::anyhow!("{} ({})", err.user_message(), err)
        } else {
            anyhow::anyhow!(err.user_message())
        }
    })
}

fn print_receipt(receipt: &Receipt) {
    let ids: Vec<String> = receipt.entry_ids.iter().map(|id| id.to_string()).collect();
    println!("  ledger entries: {}", ids.join(", "));
    println!("  operation:      {}", receipt.operation_id);
}

async fn run_customer_command(service: &MoneyMovementService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Create { name, tin } => {
            let customer = service.register_customer(name, tin).await?;
            println!("Registered customer {} ({})", customer.name, customer.tin);
        }
        CustomerCommands::Show { tin } => {
            let customer = service.get_customer_by_tin(&tin).await?;
            println!("Name:     {}", customer.name);
            println!("TIN:      {}", customer.tin);
            println!("Since:    {}", customer.created_at.format("%Y-%m-%d"));
        }
    }
    Ok(())
}

async fn run_overview_command(
    service: &MoneyMovementService,
    customer_id: CustomerId,
    recent: u32,
) -> Result<()> {
    let overview = service.customer_overview(customer_id, recent).await?;

    println!("{}\n", overview.customer.name);

    if overview.accounts.is_empty() {
        println!("No accounts.");
    } else {
        println!("{:<20} {:>12} {:<8}", "ACCOUNT", "BALANCE", "CURRENCY");
        println!("{}", "-".repeat(44));
        for summary in &overview.accounts {
            println!(
                "{:<20} {:>12} {:<8}",
                summary.account.number,
                format_cents(summary.balance),
                summary.account.currency
            );
        }
        println!("{:<20} {:>12}", "Net worth:", format_cents(overview.net_worth));
    }

    if !overview.active_loans.is_empty() {
        println!("\n{:<20} {:>12} {:>12}", "LOAN", "PRINCIPAL", "DEBT");
        println!("{}", "-".repeat(46));
        for summary in &overview.active_loans {
            println!(
                "{:<20} {:>12} {:>12}",
                summary.loan.loan_type,
                format_cents(summary.loan.principal),
                format_cents(summary.debt)
            );
        }
    }

    if !overview.cards.is_empty() {
        println!("\n{:<20} {:>12} {:>12} {:>12}", "CARD", "LIMIT", "AVAILABLE", "USED");
        println!("{}", "-".repeat(59));
        for summary in &overview.cards {
            println!(
                "{:<20} {:>12} {:>12} {:>12}",
                summary.card.card_number,
                format_cents(summary.card.credit_limit),
                format_cents(summary.available),
                format_cents(summary.used)
            );
        }
    }

    if !overview.recent_activity.is_empty() {
        println!("\nRecent activity:");
        print_history(&overview.recent_activity);
    }

    Ok(())
}

async fn run_history_command(service: &MoneyMovementService, account_id: AccountId, limit: u32) -> Result<()> {
    let lines = service.account_history(account_id, limit).await?;
    if lines.is_empty() {
        println!("No postings found.");
    } else {
        print_history(&lines);
    }
    Ok(())
}

fn print_history(lines: &[HistoryLine]) {
    println!(
        "{:>8} {:<20} {:<12} {:<14} {:>12}",
        "ENTRY", "DATE", "ACCOUNT", "TYPE", "AMOUNT"
    );
    println!("{}", "-".repeat(70));
    for line in lines {
        println!(
            "{:>8} {:<20} {:<12} {:<14} {:>12}",
            line.entry_id,
            line.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            line.account_number,
            line.movement_type.as_str(),
            format_cents(line.display_amount)
        );
    }
}

async fn run_check_command(service: &MoneyMovementService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Ledger entries:   {}", report.entry_count);
    println!("Account postings: {}", report.account_posting_count);
    println!("Card postings:    {}", report.card_posting_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &MoneyMovementService,
    export_type: &str,
    account: Option<&str>,
    customer: Option<&str>,
    limit: u32,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "history" => {
            let number = account.context("--account is required for a history export")?;
            let account = service.get_account_by_number(number).await?;
            let count = exporter.export_history_csv(account.id, limit, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} postings", count);
            }
        }
        "balances" => {
            let tin = customer.context("--customer is required for a balances export")?;
            let customer = service.get_customer_by_tin(tin).await?;
            let count = exporter.export_balances_csv(customer.id, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "overview" => {
            let tin = customer.context("--customer is required for an overview export")?;
            let customer = service.get_customer_by_tin(tin).await?;
            let snapshot = exporter.export_overview_json(customer.id, limit, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported overview: {} accounts, {} loans, {} cards",
                    snapshot.overview.accounts.len(),
                    snapshot.overview.active_loans.len(),
                    snapshot.overview.cards.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: history, balances, overview",
                export_type
            );
        }
    }

    Ok(())
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", input))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date_str))
}
