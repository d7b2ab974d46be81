use anyhow::{Result, anyhow};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::OnceLock;

use crate::domain::{DATE_FORMAT, Direction, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentsSummary {
    pub total: Decimal,
    pub count: usize,
    pub top_recipients: Vec<(String, Decimal)>,
}

fn recipient_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"to (.*)").expect("invalid recipient regex"))
}

/// (debits, credits), each in statement order.
pub fn split_by_direction(txns: &[Transaction]) -> (Vec<Transaction>, Vec<Transaction>) {
    txns.iter().cloned().partition(|t| t.direction == Direction::Debit)
}

/// Per-category sums, largest first; ties by name.
pub fn category_totals(txns: &[Transaction]) -> Result<Vec<CategoryTotal>> {
    Ok(ranked(txns.iter().map(|t| (t.category.as_str(), t.amount)))?
        .into_iter()
        .map(|(category, amount)| CategoryTotal { category, amount })
        .collect())
}

pub fn recipient(details: &str) -> Option<&str> {
    recipient_re()
        .captures(details)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn payments_summary(credits: &[Transaction], top_n: usize) -> Result<PaymentsSummary> {
    let total = credits
        .iter()
        .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.amount))
        .ok_or_else(|| anyhow!("Amount overflow while totaling payments"))?;
    let mut top_recipients = ranked(
        credits
            .iter()
            .filter_map(|t| recipient(&t.details).map(|r| (r, t.amount))),
    )?;
    top_recipients.truncate(top_n);

    Ok(PaymentsSummary {
        total,
        count: credits.len(),
        top_recipients,
    })
}

fn ranked<'a>(items: impl Iterator<Item = (&'a str, Decimal)>) -> Result<Vec<(String, Decimal)>> {
    let mut sums: BTreeMap<&str, Decimal> = BTreeMap::new();
    for (key, amount) in items {
        let sum = sums.entry(key).or_insert(Decimal::ZERO);
        *sum = sum
            .checked_add(amount)
            .ok_or_else(|| anyhow!("Amount overflow while totaling '{key}'"))?;
    }
    let mut out: Vec<(String, Decimal)> = sums
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    // BTreeMap order is by name, and the sort is stable, so ties stay alphabetical.
    out.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(out)
}

#[derive(Serialize)]
struct CsvOutRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Details")]
    details: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Debit/Credit")]
    direction: &'static str,
    #[serde(rename = "Balance")]
    balance: &'a str,
    #[serde(rename = "Category")]
    category: &'a str,
}

/// Writes the categorized table as CSV.
pub fn write_csv<W: Write>(w: W, txns: &[Transaction]) -> Result<()> {
    let mut wrt = csv::WriterBuilder::new().from_writer(w);
    for t in txns {
        wrt.serialize(CsvOutRow {
            date: t.date.format(DATE_FORMAT).to_string(),
            details: &t.details,
            amount: format_amount(t.amount),
            direction: t.direction.as_str(),
            balance: &t.balance,
            category: &t.category,
        })?;
    }
    wrt.flush()?;
    Ok(())
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{amount:.2}")
}

pub fn transaction_cells(row: usize, t: &Transaction) -> Vec<String> {
    vec![
        row.to_string(),
        t.date.format(DATE_FORMAT).to_string(),
        t.details.clone(),
        format_amount(t.amount),
        t.direction.to_string(),
        t.balance.clone(),
        t.category.clone(),
    ]
}

pub const TRANSACTION_HEADERS: [&str; 7] =
    ["#", "DATE", "DETAILS", "AMOUNT", "TYPE", "BALANCE", "CATEGORY"];

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if headers.is_empty() {
        println!("(no columns)");
        return;
    }

    let cols = headers.len();
    // Padding counts chars, so widths must too (details may carry non-ASCII).
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for row in rows {
        for (i, cell) in row.iter().take(cols).enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    fn print_row(cells: &[String], widths: &[usize]) {
        print!("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            print!(" {:width$} |", cell, width = *w);
        }
        println!();
    }

    fn print_sep(widths: &[usize]) {
        print!("|");
        for w in widths {
            print!("{}|", "-".repeat(w + 2));
        }
        println!();
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    print_row(&header_cells, &widths);
    print_sep(&widths);
    for row in rows {
        print_row(row, &widths);
    }
}

pub fn print_tsv(rows: &[Vec<String>]) {
    for row in rows {
        println!("{}", row.join("\t"));
    }
}
