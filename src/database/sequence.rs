//! Human-readable reference numbers (`AE-C-003`, `INV-2024-0012`,
//! `PO-001-VEN-20240315`).
//!
//! Numbers are allocated inside the caller's transaction: the scope is locked
//! with a transaction-scoped advisory lock, the issued numbers in that scope
//! are scanned, and the highest numeric suffix is incremented. The unique
//! index on every number column remains the final guard.

use chrono::{Datelike, NaiveDate};
use sqlx::PgConnection;

use crate::database::manager::DatabaseError;

/// A numbering scope: which issued numbers count, and how to read their counter
pub trait NumberScheme {
    /// SQL `LIKE` pattern selecting every number issued in the scope of `date`
    fn like_pattern(&self, date: NaiveDate) -> String;

    /// Counter of an issued number, `None` when it is malformed or out of scope
    fn parse_seq(&self, number: &str, date: NaiveDate) -> Option<u32>;

    /// Highest counter in scope plus one, starting at 1
    fn next_seq<'a>(&self, issued: impl IntoIterator<Item = &'a str>, date: NaiveDate) -> u32 {
        issued
            .into_iter()
            .filter_map(|number| self.parse_seq(number, date))
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }
}

/// `PREFIX-NNN` or, when year scoped, `PREFIX-YYYY-NNN`
#[derive(Debug, Clone, Copy)]
pub struct SequenceFormat {
    pub prefix: &'static str,
    pub width: usize,
    pub year_scoped: bool,
}

impl SequenceFormat {
    pub const fn new(prefix: &'static str, width: usize, year_scoped: bool) -> Self {
        Self { prefix, width, year_scoped }
    }

    fn scope(&self, date: NaiveDate) -> String {
        if self.year_scoped {
            format!("{}-{:04}-", self.prefix, date.year())
        } else {
            format!("{}-", self.prefix)
        }
    }

    pub fn render(&self, seq: u32, date: NaiveDate) -> String {
        format!("{}{:0width$}", self.scope(date), seq, width = self.width)
    }

    pub fn next(&self, issued: &[String], date: NaiveDate) -> String {
        let seq = self.next_seq(issued.iter().map(String::as_str), date);
        self.render(seq, date)
    }
}

impl NumberScheme for SequenceFormat {
    fn like_pattern(&self, date: NaiveDate) -> String {
        format!("{}%", self.scope(date))
    }

    fn parse_seq(&self, number: &str, date: NaiveDate) -> Option<u32> {
        parse_digits(number.strip_prefix(&self.scope(date))?)
    }
}

pub const CLIENT: SequenceFormat = SequenceFormat::new("AE-C", 3, false);
pub const VENDOR: SequenceFormat = SequenceFormat::new("AE-V", 3, false);
pub const PROJECT: SequenceFormat = SequenceFormat::new("PRJ", 3, true);
pub const QUOTATION: SequenceFormat = SequenceFormat::new("QT", 3, true);
pub const TENDER: SequenceFormat = SequenceFormat::new("TND", 3, true);
pub const CLIENT_INVOICE: SequenceFormat = SequenceFormat::new("INV", 4, true);
pub const VENDOR_INVOICE: SequenceFormat = SequenceFormat::new("VINV", 3, true);
pub const PAYMENT: SequenceFormat = SequenceFormat::new("PAY", 4, true);
pub const SERVICE_CONTRACT: SequenceFormat = SequenceFormat::new("SC", 3, true);

/// `PO-{seq}-{VEN}-{YYYYMMDD}`, counted per calendar year across all vendors
#[derive(Debug, Clone, Copy)]
pub struct PurchaseOrderNumbers;

impl PurchaseOrderNumbers {
    pub fn render(&self, seq: u32, vendor_name: &str, date: NaiveDate) -> String {
        format!("PO-{:03}-{}-{}", seq, vendor_code(vendor_name), date.format("%Y%m%d"))
    }
}

impl NumberScheme for PurchaseOrderNumbers {
    fn like_pattern(&self, date: NaiveDate) -> String {
        format!("PO-%-%-{:04}%", date.year())
    }

    fn parse_seq(&self, number: &str, date: NaiveDate) -> Option<u32> {
        let mut parts = number.split('-');
        if parts.next()? != "PO" {
            return None;
        }
        let seq = parse_digits(parts.next()?)?;
        let _vendor = parts.next()?;
        let stamp = parts.next()?;
        if parts.next().is_some() || stamp.len() != 8 || parse_digits(stamp).is_none() {
            return None;
        }
        (stamp[..4] == format!("{:04}", date.year())).then_some(seq)
    }
}

/// First three ASCII alphanumerics of the vendor name, upper-cased, padded with `X`
pub fn vendor_code(vendor_name: &str) -> String {
    let mut code: String = vendor_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while code.len() < 3 {
        code.push('X');
    }
    code
}

/// `SC-2024-007-J03`
pub fn service_job_number(contract_number: &str, visit: usize) -> String {
    format!("{}-J{:02}", contract_number, visit)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Lock the scope and compute the next counter for `table.column`.
///
/// `table` and `column` are compile-time identifiers, never user input.
pub async fn next_sequence(
    conn: &mut PgConnection,
    table: &'static str,
    column: &'static str,
    scheme: &impl NumberScheme,
    date: NaiveDate,
) -> Result<u32, DatabaseError> {
    let pattern = scheme.like_pattern(date);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{}:{}", table, pattern))
        .execute(&mut *conn)
        .await?;

    let sql = format!("SELECT {column} FROM {table} WHERE {column} LIKE $1");
    let issued: Vec<String> = sqlx::query_scalar(&sql)
        .bind(&pattern)
        .fetch_all(&mut *conn)
        .await?;

    let seq = scheme.next_seq(issued.iter().map(String::as_str), date);
    tracing::debug!("Allocated {} #{} in scope {}", table, seq, pattern);
    Ok(seq)
}

/// Allocate the next `PREFIX-...` number for `table.column`
pub async fn allocate(
    conn: &mut PgConnection,
    table: &'static str,
    column: &'static str,
    format: &SequenceFormat,
    date: NaiveDate,
) -> Result<String, DatabaseError> {
    let seq = next_sequence(conn, table, column, format, date).await?;
    Ok(format.render(seq, date))
}

/// Allocate the next purchase order number for a vendor
pub async fn allocate_purchase_order(
    conn: &mut PgConnection,
    vendor_name: &str,
    order_date: NaiveDate,
) -> Result<String, DatabaseError> {
    let scheme = PurchaseOrderNumbers;
    let seq = next_sequence(conn, "purchase_orders", "po_number", &scheme, order_date).await?;
    Ok(scheme.render(seq, vendor_name, order_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn issued(numbers: &[&str]) -> Vec<String> {
        numbers.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_client_number_starts_at_one() {
        assert_eq!(CLIENT.next(&[], date(2024, 3, 15)), "AE-C-001");
    }

    #[test]
    fn client_number_increments_highest_suffix() {
        let existing = issued(&["AE-C-001", "AE-C-002", "AE-C-010"]);
        assert_eq!(CLIENT.next(&existing, date(2024, 3, 15)), "AE-C-011");
    }

    #[test]
    fn gaps_are_not_refilled() {
        let existing = issued(&["AE-C-001", "AE-C-005"]);
        assert_eq!(CLIENT.next(&existing, date(2024, 1, 1)), "AE-C-006");
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let existing = issued(&["AE-C-002", "AE-C-0x9", "AE-C-", "AE-CX-900", "legacy-77"]);
        assert_eq!(CLIENT.next(&existing, date(2024, 1, 1)), "AE-C-003");
    }

    #[test]
    fn counter_wider_than_width_is_not_truncated() {
        let existing = issued(&["AE-C-999"]);
        assert_eq!(CLIENT.next(&existing, date(2024, 1, 1)), "AE-C-1000");
    }

    #[test]
    fn year_scoped_numbers_restart_each_year() {
        let existing = issued(&["INV-2023-0041", "INV-2023-0042"]);
        assert_eq!(CLIENT_INVOICE.next(&existing, date(2024, 1, 2)), "INV-2024-0001");

        let existing = issued(&["INV-2023-0042", "INV-2024-0007"]);
        assert_eq!(CLIENT_INVOICE.next(&existing, date(2024, 6, 30)), "INV-2024-0008");
    }

    #[test]
    fn like_patterns_match_scope() {
        assert_eq!(CLIENT.like_pattern(date(2024, 1, 1)), "AE-C-%");
        assert_eq!(QUOTATION.like_pattern(date(2025, 5, 1)), "QT-2025-%");
        assert_eq!(PurchaseOrderNumbers.like_pattern(date(2024, 3, 15)), "PO-%-%-2024%");
    }

    #[test]
    fn purchase_order_number_format() {
        let n = PurchaseOrderNumbers.render(1, "Venture Supplies Ltd", date(2024, 3, 15));
        assert_eq!(n, "PO-001-VEN-20240315");
    }

    #[test]
    fn purchase_order_sequence_spans_vendors_within_year() {
        let scheme = PurchaseOrderNumbers;
        let existing = [
            "PO-001-VEN-20240102",
            "PO-002-ACM-20240215",
            "PO-009-ACM-20231230",
            "PO-abc-ACM-20240215",
        ];
        assert_eq!(scheme.next_seq(existing, date(2024, 3, 15)), 3);
        assert_eq!(scheme.next_seq(existing, date(2025, 1, 3)), 1);
    }

    #[test]
    fn vendor_code_pads_and_strips() {
        assert_eq!(vendor_code("acme"), "ACM");
        assert_eq!(vendor_code("3M"), "3MX");
        assert_eq!(vendor_code("  -- "), "XXX");
        assert_eq!(vendor_code("Ölwerk AG"), "LWE");
    }

    #[test]
    fn job_numbers_extend_contract_number() {
        assert_eq!(service_job_number("SC-2024-007", 3), "SC-2024-007-J03");
        assert_eq!(service_job_number("SC-2024-007", 120), "SC-2024-007-J120");
    }
}
