//! CSV exports for the operator: the per-session sheet and the bulk report list.
//!
//! Both files start with a UTF-8 byte-order mark so spreadsheet tools pick up
//! the accented headers.

pub mod bulk;
pub mod session_report;

pub use bulk::{bulk_csv, write_bulk, ReportFilter, BULK_FILE_NAME};
pub use session_report::SessionReport;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

pub const BOM: &str = "\u{feff}";

/// A CSV writer whose buffer already holds the byte-order mark.
fn sheet_writer(builder: &csv::WriterBuilder) -> csv::Writer<Vec<u8>> {
    builder.from_writer(BOM.as_bytes().to_vec())
}

fn finish_sheet(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("Failed to flush CSV rows")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// America/Lima has been UTC-05:00 year-round since 1994.
const LIMA_OFFSET_HOURS: i64 = 5;

/// Calendar date in Lima for an instant.
pub fn lima_date(instant: DateTime<Utc>) -> NaiveDate {
    (instant.naive_utc() - Duration::hours(LIMA_OFFSET_HOURS)).date()
}

pub fn lima_today() -> NaiveDate {
    lima_date(Utc::now())
}

/// `DD/MM/YYYY`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Parses a report timestamp. Offsets are honoured; naive timestamps are
/// taken as UTC, which is how the service stores them.
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
