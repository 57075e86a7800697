use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::application::WalletService;
use crate::config::Config;
use crate::domain::{Cents, Transaction, TransactionType, format_cents, parse_cents};

/// ewallet - Multi-currency wallet ledger
#[derive(Parser)]
#[command(name = "ewallet")]
#[command(about = "A multi-currency wallet ledger backed by a key/value store")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

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

    /// Wallet management commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Add money to a wallet
    TopUp {
        /// Wallet ID
        wallet: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// ISO 4217 currency code
        currency: String,
    },

    /// Take money out of a wallet
    Withdraw {
        /// Wallet ID
        wallet: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// ISO 4217 currency code
        currency: String,
    },

    /// Move money between two wallets
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// ISO 4217 currency code
        currency: String,

        /// Source wallet ID
        #[arg(long)]
        from: String,

        /// Destination wallet ID
        #[arg(long)]
        to: String,
    },

    /// Show balances for a wallet
    Balance {
        /// Wallet ID
        wallet: String,
    },

    /// List a wallet's transactions
    Transactions {
        /// Wallet ID
        wallet: String,

        /// Only show one type: top_up, payment, transfer
        #[arg(long = "type")]
        transaction_type: Option<String>,
    },

    /// Mark a pending transaction as completed
    Complete {
        /// Wallet ID
        wallet: String,

        /// Transaction ID
        transaction: String,
    },

    /// Mark a pending transaction as failed
    Fail {
        /// Wallet ID
        wallet: String,

        /// Transaction ID
        transaction: String,
    },

    /// Process a withdrawal request body as the request handler would
    HandleWithdrawal {
        /// Wallet ID (path parameter)
        #[arg(long)]
        wallet: Option<String>,

        /// JSON request body
        body: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// Wallet ID to export as CSV (omit for a full JSON snapshot)
        #[arg(long)]
        wallet: Option<String>,

        /// Output file (omit for stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet
    Create {
        /// Wallet name
        name: String,
    },

    /// List all wallets
    List,

    /// Show wallet details
    Show {
        /// Wallet ID
        id: String,
    },
}

impl Cli {
    fn init_logging(&self) {
        let default_level = if self.verbose { "debug" } else { "info" };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
            )
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub async fn run(self) -> Result<()> {
        self.init_logging();

        if matches!(self.command, Commands::Init) {
            WalletService::init(&self.config).await?;
            println!("Database initialized: {}", self.config.database);
            return Ok(());
        }

        let service = WalletService::connect(&self.config).await?;

        match self.command {
            Commands::Init => {}

            Commands::Wallet(wallet_cmd) => {
                run_wallet_command(&service, wallet_cmd).await?;
            }

            Commands::TopUp {
                wallet,
                amount,
                currency,
            } => {
                let tx = service
                    .top_up(parse_id(&wallet)?, parse_amount(&amount)?, &currency)
                    .await?;
                println!("Topped up: {} {} ({})", format_cents(tx.amount), tx.currency, tx.id);
            }

            Commands::Withdraw {
                wallet,
                amount,
                currency,
            } => {
                let tx = service
                    .withdraw(parse_id(&wallet)?, parse_amount(&amount)?, &currency)
                    .await?;
                println!(
                    "Withdrew: {} {} ({})",
                    format_cents(-tx.amount),
                    tx.currency,
                    tx.id
                );
            }

            Commands::Transfer {
                amount,
                currency,
                from,
                to,
            } => {
                let outcome = service
                    .transfer(
                        parse_id(&from)?,
                        parse_id(&to)?,
                        parse_amount(&amount)?,
                        &currency,
                    )
                    .await?;
                println!(
                    "Recorded transfer: {} {} {} -> {}",
                    format_cents(outcome.incoming.amount),
                    outcome.incoming.currency,
                    from,
                    to
                );
            }

            Commands::Balance { wallet } => {
                let lines = service.list_balance(parse_id(&wallet)?).await?;
                if lines.is_empty() {
                    println!("No balances yet.");
                }
                for line in lines {
                    println!("{}", line);
                }
            }

            Commands::Transactions {
                wallet,
                transaction_type,
            } => {
                let filter = transaction_type
                    .map(|t| {
                        TransactionType::from_str(&t).with_context(|| {
                            format!(
                                "Invalid transaction type '{}'. Valid types: top_up, payment, transfer",
                                t
                            )
                        })
                    })
                    .transpose()?;
                let transactions = service.transactions(parse_id(&wallet)?, filter).await?;
                print_transactions(&transactions);
            }

            Commands::Complete {
                wallet,
                transaction,
            } => {
                let tx = service
                    .complete_transaction(parse_id(&wallet)?, parse_id(&transaction)?)
                    .await?;
                println!("Transaction {} is now {}", tx.id, tx.status);
            }

            Commands::Fail {
                wallet,
                transaction,
            } => {
                let tx = service
                    .fail_transaction(parse_id(&wallet)?, parse_id(&transaction)?)
                    .await?;
                println!("Transaction {} is now {}", tx.id, tx.status);
            }

            Commands::HandleWithdrawal { wallet, body } => {
                let response = service.handle_withdrawal(wallet.as_deref(), &body).await;
                println!("{}", response.status);
                println!("{}", serde_json::to_string_pretty(&response.body)?);
            }

            Commands::Export { wallet, output } => {
                run_export_command(&service, wallet.as_deref(), output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("Invalid ID '{}' (expected UUID)", input))
}

fn parse_amount(input: &str) -> Result<Cents> {
    parse_cents(input).context("Invalid amount format. Use '50.00' or '50'")
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found.");
        return;
    }

    println!(
        "{:<36} {:<20} {:<10} {:<10} {:<5} {:>12}",
        "ID", "DATE", "TYPE", "STATUS", "CCY", "AMOUNT"
    );
    println!("{}", "-".repeat(98));
    for tx in transactions {
        println!(
            "{:<36} {:<20} {:<10} {:<10} {:<5} {:>12}",
            tx.id.to_string(),
            tx.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.transaction_type.as_str(),
            tx.status.as_str(),
            tx.currency,
            format_cents(tx.amount)
        );
    }
}

async fn run_wallet_command(service: &WalletService, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Create { name } => {
            let wallet = service.create_wallet(&name).await?;
            let id = wallet.id.context("Wallet was saved without an ID")?;
            println!("Created wallet: {} ({})", wallet.name(), id);
        }

        WalletCommands::List => {
            let wallets = service.list_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!("{:<36} {:<20} {}", "ID", "NAME", "BALANCES");
                println!("{}", "-".repeat(80));
                for wallet in wallets {
                    let id = wallet.id.map(|id| id.to_string()).unwrap_or_default();
                    println!(
                        "{:<36} {:<20} {}",
                        id,
                        wallet.name(),
                        wallet.list_balance().join(", ")
                    );
                }
            }
        }

        WalletCommands::Show { id } => {
            let wallet = service.get_wallet(parse_id(&id)?).await?;

            println!("Wallet: {}", wallet.name());
            println!("  ID:             {}", id);
            println!("  Transactions:   {}", wallet.get_total_transactions());
            for kind in [
                TransactionType::TopUp,
                TransactionType::Payment,
                TransactionType::Transfer,
            ] {
                println!(
                    "    {:<12}   {}",
                    kind.as_str(),
                    wallet.filter_transactions(kind).len()
                );
            }
            println!();
            println!("  Balances:");
            for line in wallet.list_balance() {
                println!("    {}", line);
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &WalletService,
    wallet: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match wallet {
        Some(id) => {
            let count = exporter
                .export_transactions_csv(parse_id(id)?, writer)
                .await?;
            eprintln!("Exported {} transactions", count);
        }
        None => {
            let snapshot = exporter.export_full_json(writer).await?;
            eprintln!("Exported {} wallets", snapshot.wallets.len());
        }
    }

    Ok(())
}
