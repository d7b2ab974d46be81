mod categories;
mod cli;
mod config;
mod domain;
mod error;
mod report;
mod statement;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::categories::{CategoryStore, categorize, reassign};
use crate::cli::{
    AssignArgs, CategoryCmd, Cli, Command, DirectionFilter, ExportArgs, ImportArgs, KeywordCmd,
    OutputFormat, SummaryArgs,
};
use crate::config::{AppConfig, app_paths, categories_path, load_or_init_config};
use crate::domain::{Direction, Transaction};
use crate::report::{
    TRANSACTION_HEADERS, category_totals, format_amount, payments_summary, print_table, print_tsv,
    split_by_direction, transaction_cells, write_csv,
};
use crate::statement::{normalize, read_statement};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PESA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = app_paths(cli.home.clone())?;
    let (cfg, cfg_path) = load_or_init_config(&paths)?;
    let mut store = CategoryStore::load(categories_path(cli.categories.clone(), &cfg, &paths))?;
    debug!(config = %cfg_path.display(), store = %store.path().display(), "resolved paths");

    match cli.command {
        Command::Import(args) => handle_import(&store, args),
        Command::Summary(args) => handle_summary(&store, &cfg, args),
        Command::Export(args) => handle_export(&store, args),
        Command::Assign(args) => handle_assign(&mut store, args),
        Command::Category(args) => handle_category(&mut store, args.cmd),
        Command::Keyword(args) => handle_keyword(&mut store, args.cmd),
    }
}

/// Reads, normalizes, and categorizes a statement. Any failure rejects the whole file.
fn load_statement(path: &Path, store: &CategoryStore) -> Result<Vec<Transaction>> {
    let raw = read_statement(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let txns = normalize(&raw).with_context(|| format!("Failed to import {}", path.display()))?;
    Ok(categorize(&txns, store))
}

fn handle_import(store: &CategoryStore, args: ImportArgs) -> Result<()> {
    let txns = load_statement(&args.file, store)?;

    // Row numbers refer to the full statement so `assign` can address them.
    let rows: Vec<Vec<String>> = txns
        .iter()
        .enumerate()
        .filter(|(_, t)| match args.direction {
            DirectionFilter::All => true,
            DirectionFilter::Debit => t.direction == Direction::Debit,
            DirectionFilter::Credit => t.direction == Direction::Credit,
        })
        .map(|(i, t)| transaction_cells(i + 1, t))
        .collect();

    if rows.is_empty() {
        println!("(no transactions)");
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&TRANSACTION_HEADERS, &rows),
        OutputFormat::Tsv => print_tsv(&rows),
    }
    Ok(())
}

fn handle_summary(store: &CategoryStore, cfg: &AppConfig, args: SummaryArgs) -> Result<()> {
    let txns = load_statement(&args.file, store)?;
    let (debits, credits) = split_by_direction(&txns);

    println!("(expenses by category)");
    let totals = category_totals(&debits)?;
    if totals.is_empty() {
        println!("(no expenses)");
    }
    for t in &totals {
        println!("{}\t{}", t.category, format_amount(t.amount));
    }

    let top_n = args.top.unwrap_or(cfg.top_recipients);
    let payments = payments_summary(&credits, top_n)?;
    println!();
    println!("(payments)");
    println!("total\t{}", format_amount(payments.total));
    println!("count\t{}", payments.count);

    println!();
    println!("(top recipients)");
    if payments.top_recipients.is_empty() {
        println!("(no recipients)");
    }
    for (name, amount) in &payments.top_recipients {
        println!("{name}\t{}", format_amount(*amount));
    }
    Ok(())
}

fn handle_export(store: &CategoryStore, args: ExportArgs) -> Result<()> {
    let txns = load_statement(&args.file, store)?;
    let file = File::create(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    write_csv(BufWriter::new(file), &txns)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    println!("Wrote {} transactions to {}", txns.len(), args.out.display());
    Ok(())
}

fn handle_assign(store: &mut CategoryStore, args: AssignArgs) -> Result<()> {
    if args.row == 0 {
        return Err(anyhow!("Row numbers start at 1"));
    }
    let txns = load_statement(&args.file, store)?;
    let idx = args.row - 1;
    let already = txns
        .get(idx)
        .is_some_and(|t| t.category == args.category);

    let updated = reassign(&txns, idx, &args.category, store)?;
    let t = &updated[idx];
    if already {
        println!("Row {} is already in '{}'", args.row, t.category);
    } else {
        println!("Assigned row {} ({}) to '{}'", args.row, t.details, t.category);
    }
    Ok(())
}

fn handle_category(store: &mut CategoryStore, cmd: CategoryCmd) -> Result<()> {
    match cmd {
        CategoryCmd::Add { name } => {
            match store.try_add_category(&name)? {
                Ok(()) => println!("Added category: {}", name.trim()),
                Err(err) => eprintln!("warning: {err}"),
            }
        }
        CategoryCmd::List => {
            println!("category\tkeywords");
            for c in store.categories() {
                println!("{}\t{}", c.name, c.keywords.join(", "));
            }
        }
    }
    Ok(())
}

fn handle_keyword(store: &mut CategoryStore, cmd: KeywordCmd) -> Result<()> {
    match cmd {
        KeywordCmd::Add { category, keyword } => {
            match store.try_add_keyword(&category, &keyword)? {
                Ok(()) => println!("Keyword '{}' added to {category}", keyword.trim()),
                Err(err) => eprintln!("warning: {err}"),
            }
        }
    }
    Ok(())
}
