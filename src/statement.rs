//! M-Pesa statement ingestion.
//!
//! A statement export is a CSV with (at least) these columns:
//! Receipt No.,Completion Time,Details,Transaction Status,Paid In,Withdrawn,Balance
//!
//! Rows are reduced to the canonical `Transaction` shape. Any bad row rejects
//! the whole statement.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use crate::domain::{DATE_FORMAT, Direction, Transaction, UNCATEGORIZED};
use crate::error::FormatError;

const COMPLETION_TIME: &str = "Completion Time";
const PAID_IN: &str = "Paid In";
const WITHDRAWN: &str = "Withdrawn";
const DETAILS: &str = "Details";
const BALANCE: &str = "Balance";

/// Header plus untyped records, as read from the file.
#[derive(Debug, Clone, Default)]
pub struct RawStatement {
    pub headers: Vec<String>,
    pub records: Vec<StringRecord>,
}

/// Hyphen, optional spaces, 3+ digits, mask run, digits: "- 254***678".
fn masked_phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\s*\d{3,}\*+\d+").expect("invalid masked phone regex"))
}

/// Decodes statement bytes as UTF-8, falling back to Latin-1. A leading UTF-8
/// BOM is dropped in both cases.
pub fn decode_statement(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            debug!("statement is not valid UTF-8; decoding as Latin-1");
            Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
        }
    }
}

pub fn parse_statement(text: &str) -> Result<RawStatement, FormatError> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

    debug!(rows = records.len(), "parsed statement CSV");
    Ok(RawStatement { headers, records })
}

pub fn read_statement(path: &Path) -> Result<RawStatement, FormatError> {
    let bytes = fs::read(path)?;
    parse_statement(&decode_statement(&bytes))
}

/// Positions of the relied-upon columns.
#[derive(Debug, Clone, Copy)]
struct Columns {
    completion_time: usize,
    paid_in: usize,
    withdrawn: usize,
    details: usize,
    balance: usize,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self, FormatError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| FormatError::Unrecognized(name.to_string()))
        };

        // Recognition first: without these two it is not an M-Pesa export at all.
        let completion_time = find(COMPLETION_TIME)?;
        let paid_in = find(PAID_IN)?;

        Ok(Self {
            completion_time,
            paid_in,
            withdrawn: find(WITHDRAWN)?,
            details: find(DETAILS)?,
            balance: find(BALANCE)?,
        })
    }
}

/// Reduces a raw statement to canonical transactions.
///
/// All-or-nothing: the first bad date or amount fails the whole call.
pub fn normalize(raw: &RawStatement) -> Result<Vec<Transaction>, FormatError> {
    let cols = Columns::locate(&raw.headers)?;

    let txns = raw
        .records
        .iter()
        .enumerate()
        .map(|(idx, record)| normalize_row(idx + 1, record, cols))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(rows = txns.len(), "normalized statement");
    Ok(txns)
}

fn normalize_row(row: usize, record: &StringRecord, cols: Columns) -> Result<Transaction, FormatError> {
    let cell = |idx: usize| record.get(idx).unwrap_or("");

    let raw_date = cell(cols.completion_time);
    let date = NaiveDateTime::parse_from_str(raw_date.trim(), DATE_FORMAT).map_err(|_| {
        FormatError::BadDate {
            row,
            value: raw_date.to_string(),
        }
    })?;

    // "Paid In" always takes precedence over "Withdrawn".
    let (amount, direction) = match parse_amount(cell(cols.paid_in), row, PAID_IN)? {
        Some(paid_in) => (paid_in, Direction::Credit),
        None => match parse_amount(cell(cols.withdrawn), row, WITHDRAWN)? {
            Some(withdrawn) => (withdrawn, Direction::Debit),
            None => (Decimal::ZERO, Direction::Debit),
        },
    };

    Ok(Transaction {
        date,
        details: clean_details(cell(cols.details)),
        amount,
        direction,
        balance: cell(cols.balance).to_string(),
        category: UNCATEGORIZED.to_string(),
    })
}

/// Empty cells yield `None`; everything else must be a decimal.
fn parse_amount(raw: &str, row: usize, field: &'static str) -> Result<Option<Decimal>, FormatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .replace(',', "")
        .parse::<Decimal>()
        .map(|d| Some(d.abs()))
        .map_err(|_| FormatError::BadAmount {
            row,
            field,
            value: raw.to_string(),
        })
}

/// Strips the first embedded masked phone number from a description.
pub fn clean_details(details: &str) -> String {
    masked_phone_re().replace(details, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    const HEADER: &str =
        "Receipt No.,Completion Time,Details,Transaction Status,Paid In,Withdrawn,Balance";

    fn statement(rows: &[&str]) -> RawStatement {
        let mut text = String::from(HEADER);
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        parse_statement(&text).expect("parse csv")
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn paid_in_row_is_credit() {
        let raw = statement(&["R1,2024-03-01 08:15:00,Funds received from JANE,Completed,500,,1500.00"]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, dec("500"));
        assert_eq!(txns[0].direction, Direction::Credit);
        assert_eq!(txns[0].balance, "1500.00");
        assert_eq!(txns[0].category, UNCATEGORIZED);
        assert_eq!(
            txns[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 15, 0)
                .unwrap()
        );
    }

    #[test]
    fn withdrawn_row_is_debit_with_positive_amount() {
        let raw = statement(&[
            "R1,2024-03-01 09:00:00,Pay Bill to KPLC,Completed,,120,880.00",
            "R2,2024-03-01 10:00:00,Merchant Payment,Completed,,-45.50,834.50",
        ]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].amount, dec("120"));
        assert_eq!(txns[0].direction, Direction::Debit);
        assert_eq!(txns[1].amount, dec("45.50"));
        assert_eq!(txns[1].direction, Direction::Debit);
    }

    #[test]
    fn paid_in_wins_when_both_populated() {
        let raw = statement(&["R1,2024-03-01 09:00:00,Odd row,Completed,10,20,100"]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].amount, dec("10"));
        assert_eq!(txns[0].direction, Direction::Credit);
    }

    #[test]
    fn both_empty_is_zero_debit() {
        let raw = statement(&["R1,2024-03-01 09:00:00,Reversal,Completed, ,,100"]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].amount, Decimal::ZERO);
        assert_eq!(txns[0].direction, Direction::Debit);
    }

    #[test]
    fn zero_paid_in_is_zero_credit() {
        let raw = statement(&["R1,2024-03-01 09:00:00,Zero,Completed,0,,100"]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].amount, Decimal::ZERO);
        assert_eq!(txns[0].direction, Direction::Credit);
    }

    #[test]
    fn thousands_separators_are_accepted() {
        let raw = statement(&["R1,2024-03-01 09:00:00,Salary,Completed,\"12,500.00\",,13000"]);
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].amount, dec("12500.00"));
    }

    #[test]
    fn non_numeric_amount_rejects_statement() {
        let raw = statement(&[
            "R1,2024-03-01 09:00:00,Ok,Completed,10,,100",
            "R2,2024-03-01 09:00:00,Bad,Completed,,abc,100",
        ]);
        match normalize(&raw) {
            Err(FormatError::BadAmount { row, field, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(field, WITHDRAWN);
            }
            other => panic!("expected BadAmount, got {other:?}"),
        }
    }

    #[test]
    fn bad_date_rejects_whole_statement() {
        let raw = statement(&[
            "R1,2024-03-01 09:00:00,Ok,Completed,10,,100",
            "R2,01/03/2024 09:00,Bad,Completed,10,,110",
        ]);
        match normalize(&raw) {
            Err(FormatError::BadDate { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "01/03/2024 09:00");
            }
            other => panic!("expected BadDate, got {other:?}"),
        }
    }

    #[test]
    fn missing_completion_time_is_unrecognized() {
        let raw = parse_statement("Date,Details,Paid In,Withdrawn,Balance\n2024-03-01,x,1,,1").unwrap();
        match normalize(&raw) {
            Err(FormatError::Unrecognized(col)) => assert_eq!(col, COMPLETION_TIME),
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn missing_paid_in_is_unrecognized() {
        let raw = parse_statement("Completion Time,Details,Withdrawn,Balance\n").unwrap();
        assert!(matches!(normalize(&raw), Err(FormatError::Unrecognized(c)) if c == PAID_IN));
    }

    #[test]
    fn header_whitespace_is_trimmed() {
        let raw = parse_statement(
            " Completion Time , Details ,Paid In , Withdrawn,Balance \n2024-03-01 09:00:00,Airtime,,20,80",
        )
        .unwrap();
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].details, "Airtime");
        assert_eq!(txns[0].amount, dec("20"));
        assert_eq!(txns[0].balance, "80");
    }

    #[test]
    fn masked_phone_is_removed_from_details() {
        assert_eq!(
            clean_details("Pay Bill to ABC Store- 254***678"),
            "Pay Bill to ABC Store"
        );
        assert_eq!(
            clean_details("Customer Transfer to -2547****123 JOHN DOE"),
            "Customer Transfer to  JOHN DOE"
        );
        // Too few leading digits: not a masked phone.
        assert_eq!(clean_details("Order - 25***9"), "Order - 25***9");
        assert_eq!(clean_details("Airtime Purchase"), "Airtime Purchase");
    }

    #[test]
    fn only_first_masked_phone_is_removed() {
        assert_eq!(
            clean_details("A- 254***111 B- 254***222"),
            "A B- 254***222"
        );
    }

    #[test]
    fn normalize_is_pure() {
        let raw = statement(&[
            "R1,2024-03-01 08:15:00,Funds received from JANE- 2547***001,Completed,500,,1500.00",
            "R2,2024-03-02 12:00:00,Pay Bill to KPLC,Completed,,120,1380.00",
        ]);
        assert_eq!(normalize(&raw).unwrap(), normalize(&raw).unwrap());
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let raw = parse_statement("Completion Time,Details,Paid In,Withdrawn,Balance\n2024-03-01 09:00:00,Tip,5").unwrap();
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].direction, Direction::Credit);
        assert_eq!(txns[0].balance, "");
    }

    #[test]
    fn latin1_bytes_are_decoded() {
        // "Café" with 0xE9 is invalid UTF-8.
        let bytes = b"Completion Time,Details,Paid In,Withdrawn,Balance\n2024-03-01 09:00:00,Caf\xe9,,10,90";
        let text = decode_statement(bytes);
        let txns = normalize(&parse_statement(&text).unwrap()).unwrap();
        assert_eq!(txns[0].details, "Café");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Completion Time,Details,Paid In,Withdrawn,Balance\n");
        let text = decode_statement(&bytes);
        assert!(text.starts_with("Completion Time"));
    }

    #[test]
    fn utf8_bom_is_stripped_before_latin1_fallback() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(HEADER.as_bytes());
        bytes.extend_from_slice(b"\nR1,2024-03-01 09:00:00,Caf\xe9,Completed,,50,100\n");
        let text = decode_statement(&bytes);
        assert!(text.starts_with("Receipt No."));

        let raw = parse_statement(&text).unwrap();
        let txns = normalize(&raw).unwrap();
        assert_eq!(txns[0].details, "Caf\u{e9}");
    }
}
