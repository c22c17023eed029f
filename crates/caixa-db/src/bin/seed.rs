//! # Demo Day Seeder
//!
//! Records a complete operational day and prints its reconciliation report.
//!
//! ## Usage
//! ```bash
//! # Seed today's operational day into the configured database
//! cargo run -p caixa-db --bin seed
//!
//! # Seed a specific day, with derived cash sales provisioned
//! cargo run -p caixa-db --bin seed -- --date 2024-03-09 --with-sales
//!
//! # Use another database or config file
//! cargo run -p caixa-db --bin seed -- --db ./data/caixa.db --config ./caixa.toml
//! ```
//!
//! ## Seeded Day
//! - Initial count: 2x 200.00 + 2x 100.00 = 600.00
//! - Reinforcement: 780.50
//! - Expenses: 186.00 (logistics), 20.00 (variable)
//! - Final count: 1174.50, so the day reconciles OK
//!
//! Every ledger entry carries an idempotency key: running the seeder twice
//! on the same day leaves the totals unchanged.

use caixa_core::{
    CountKind, DenominationCount, DerivedCashSale, Money, NewLedgerEntry, ReconciliationReport,
};
use caixa_db::{CaixaConfig, Database};
use chrono::{NaiveDate, Utc};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caixa=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn count(cents: i64, quantity: i64) -> DenominationCount {
    DenominationCount::new(Money::from_cents(cents), quantity)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut date_arg: Option<String> = None;
    let mut with_sales = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--date" => {
                if i + 1 < args.len() {
                    date_arg = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--with-sales" => with_sales = true,
            "--help" | "-h" => {
                println!("Caixa Demo Day Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: [database] path)");
                println!("  -c, --config <PATH>    Config file (default: platform config dir)");
                println!("      --date <YYYY-MM-DD> Operational date (default: current one)");
                println!("      --with-sales       Provision and fill derived cash sales");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = CaixaConfig::load(config_path)?;
    let clock = config.clock()?;
    let tenant_id = config.tenant_id().to_string();

    let date = match date_arg {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
        None => clock.resolve(Utc::now()),
    };

    let db_config = config.db_config_with_path(db_path);

    info!(
        db = %db_config.database_path.display(),
        tenant_id = %tenant_id,
        operational_date = %date,
        "Seeding demo day"
    );

    let db = Database::new(db_config)
        .await?
        .with_denominations(config.denomination_table()?);

    let session = db.sessions().ensure(&tenant_id, date).await?;
    let sessions = db.sessions();
    sessions
        .set_counts(&session.id, CountKind::Initial, &[count(20000, 2), count(10000, 2)])
        .await?;

    let key = |suffix: &str| format!("seed-{}-{}", date, suffix);
    let ledger = db.ledger();
    ledger
        .record(
            NewLedgerEntry::reinforcement(&session.id, Money::parse_decimal("780,50")?)
                .authorized_by("gerente")
                .idempotency_key(key("reinforcement")),
        )
        .await?;
    ledger
        .record(
            NewLedgerEntry::expense(&session.id, "logistics", Money::parse_decimal("186.00")?)
                .note("frete")
                .idempotency_key(key("logistics")),
        )
        .await?;
    ledger
        .record(
            NewLedgerEntry::expense(&session.id, "variable", Money::parse_decimal("20")?)
                .idempotency_key(key("variable")),
        )
        .await?;

    let mut final_counts = vec![
        count(20000, 5),
        count(10000, 1),
        count(5000, 1),
        count(2000, 1),
        count(200, 2),
        count(50, 1),
    ];

    if with_sales {
        let derived = db.derived_sales();
        derived.provision().await?;
        derived
            .insert(&DerivedCashSale {
                order_id: key("order-1"),
                tenant_id: tenant_id.clone(),
                operational_date: date,
                amount: Money::from_cents(4500),
            })
            .await?;
        // The drawer holds the sale too
        final_counts.push(count(2000, 2));
        final_counts.push(count(500, 1));
    }

    sessions
        .set_counts(&session.id, CountKind::Final, &final_counts)
        .await?;

    let report: ReconciliationReport = db
        .reconciliation()
        .with_break_threshold(config.break_threshold())
        .report(&tenant_id, date)
        .await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;
    Ok(())
}
