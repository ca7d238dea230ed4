use anyhow::{bail, Result};
use std::env;
use std::path::Path;

use hoa_ledger::config::AppConfig;
use hoa_ledger::{
    filter_by_type, import_batch, load_records, requirements, strength, validate,
    FinancialSummary, SqliteRepository, StrengthLabel, Transaction, TransactionRepository,
    TransactionType,
};

const USAGE: &str = "Usage:
  hoa-ledger import <file.json|file.csv>
  hoa-ledger list [income|expense]
  hoa-ledger summary
  hoa-ledger password <candidate>
  hoa-ledger delete <id>
  hoa-ledger events <id>";

fn main() -> Result<()> {
    hoa_ledger::log::init_logging("info");

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);
    let arg = args.get(2).map(String::as_str);

    match (command, arg) {
        // No database needed to check a password
        (Some("password"), Some(candidate)) => run_password(candidate),
        (Some("password"), None) => bail!("password needs a candidate\n\n{}", USAGE),
        (Some(command), arg) => {
            let config = AppConfig::from_env()?;
            let mut repo = SqliteRepository::open(&config.db_path(), &config.actor)?;

            match (command, arg) {
                ("import", Some(file)) => run_import(&mut repo, Path::new(file)),
                ("list", filter) => run_list(&repo, filter),
                ("summary", _) => run_summary(&repo),
                ("delete", Some(id)) => run_delete(&mut repo, id),
                ("events", Some(id)) => run_events(&repo, id),
                _ => bail!("Unknown command\n\n{}", USAGE),
            }
        }
        (None, _) => {
            println!("{}", USAGE);
            Ok(())
        }
    }
}

fn run_import(repo: &mut SqliteRepository, file: &Path) -> Result<()> {
    println!("📥 Importing transactions from {}", file.display());

    let records = load_records(file)?;
    println!("✓ Read {} records", records.len());

    let transactions = import_batch(&records);
    repo.prepend_batch(&transactions)?;

    let expenses = transactions.iter().filter(|tx| tx.is_expense()).count();
    println!(
        "✓ Stored {} transactions ({} income, {} expense)",
        transactions.len(),
        transactions.len() - expenses,
        expenses
    );
    println!("✓ Ledger now holds {} transactions", repo.count()?);

    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{:<36}  {:<24}  {:>12.2}  {:<7}  {:<16}  {}",
        tx.id,
        tx.date,
        tx.signed_amount(),
        tx.transaction_type,
        tx.category,
        tx.counterparty().unwrap_or("-"),
    );
}

fn run_list(repo: &SqliteRepository, filter: Option<&str>) -> Result<()> {
    let all = repo.list()?;
    let transactions = match filter {
        Some(kind) => filter_by_type(&all, kind.parse::<TransactionType>()?),
        None => all,
    };

    for tx in &transactions {
        print_transaction(tx);
    }
    println!("\n{} transactions", transactions.len());

    Ok(())
}

fn run_summary(repo: &SqliteRepository) -> Result<()> {
    let summary = FinancialSummary::from_transactions(&repo.list()?);

    println!("📊 Financial Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Balance:   {:>12.2}", summary.total_balance);
    println!("Income:    {:>12.2}", summary.total_income);
    println!("Expenses:  {:>12.2}", summary.total_expenses);

    if !summary.expenses_by_category.is_empty() {
        println!("\nExpenses by category:");
        for category in &summary.expenses_by_category {
            println!(
                "  {:<20} {:>12.2}  ({})",
                category.category, category.total, category.count
            );
        }
    }

    if !summary.recent_transactions.is_empty() {
        println!("\nRecent:");
        for tx in &summary.recent_transactions {
            print_transaction(tx);
        }
    }

    Ok(())
}

fn run_password(candidate: &str) -> Result<()> {
    let result = validate(candidate);
    let score = strength(candidate);

    for (rule, satisfied) in requirements(candidate) {
        let mark = if satisfied { "✓" } else { "✗" };
        println!("{} {}", mark, rule.label());
    }

    println!("\nStrength: {}/4 {}", score, StrengthLabel::from_score(score).name());
    if result.is_valid {
        println!("✅ Password meets all requirements");
    } else {
        for error in &result.errors {
            println!("❌ {}", error);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_delete(repo: &mut SqliteRepository, id: &str) -> Result<()> {
    if repo.delete(id)? {
        println!("✓ Deleted {}", id);
    } else {
        bail!("No transaction with id {}", id);
    }
    Ok(())
}

fn run_events(repo: &SqliteRepository, id: &str) -> Result<()> {
    let events = repo.events_for(id)?;
    if events.is_empty() {
        println!("No events for {}", id);
    }

    for event in events {
        println!(
            "{}  {:<20}  {:<10}  {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor,
            event.data
        );
    }
    Ok(())
}
