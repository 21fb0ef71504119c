use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::models::Report;

use super::{finish_sheet, format_date, lima_date, parse_created_at, sheet_writer};

pub const BULK_FILE_NAME: &str = "Reportes.csv";

const DELIMITER: u8 = b';';

const COLUMNS: [&str; 11] = [
    "Nombre",
    "Apellido",
    "Correo Electrónico",
    "Teléfono",
    "DNI",
    "Estado",
    "Parpadeos Detectados",
    "Microsueños",
    "Bostezos Detectados",
    "Duración Bostezos (seg)",
    "Fecha",
];

/// Selection applied to the report list before export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Case-insensitive substring of first name, last name or username.
    pub name: Option<String>,
    /// Inclusive Lima-time date bounds.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.matches_name(report) && self.matches_dates(report)
    }

    pub fn apply<'a>(&self, reports: &'a [Report]) -> Vec<&'a Report> {
        reports.iter().filter(|report| self.matches(report)).collect()
    }

    fn matches_name(&self, report: &Report) -> bool {
        let Some(needle) = self.name.as_deref().map(str::to_lowercase) else {
            return true;
        };
        [&report.first_name, &report.last_name, &report.username]
            .iter()
            .any(|value| value.to_lowercase().contains(&needle))
    }

    fn matches_dates(&self, report: &Report) -> bool {
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        // Undated reports cannot fall inside a range.
        let Some(date) = report_date(report) else {
            return false;
        };
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

fn report_date(report: &Report) -> Option<NaiveDate> {
    report
        .created_at
        .as_deref()
        .and_then(parse_created_at)
        .map(lima_date)
}

/// Commas become spaces so the sheet stays readable in comma-locale tools.
fn text_cell(value: &str) -> String {
    value.replace(',', " ")
}

fn row_cells(report: &Report) -> [String; 11] {
    let status = if report.status == "active" {
        "Activo"
    } else {
        "Inactivo"
    };
    [
        text_cell(&report.first_name),
        text_cell(&report.last_name),
        text_cell(&report.email),
        text_cell(&report.phone_number),
        text_cell(&report.dni),
        status.to_string(),
        report.blinks_detected.to_string(),
        report.microsleeps.to_string(),
        report.yawns_detected.to_string(),
        report.yawns_duration.to_string(),
        report_date(report).map(format_date).unwrap_or_default(),
    ]
}

/// Semicolon-separated, fully quoted, CRLF rows under a header row.
pub fn bulk_csv<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Result<String> {
    let mut writer = sheet_writer(
        WriterBuilder::new()
            .delimiter(DELIMITER)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF),
    );
    writer
        .write_record(COLUMNS)
        .context("Failed to write report header")?;
    for report in reports {
        writer
            .write_record(row_cells(report))
            .with_context(|| format!("Failed to write report {}", report.id))?;
    }
    finish_sheet(writer)
}

pub fn write_bulk<'a>(reports: impl IntoIterator<Item = &'a Report>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory {}", parent.display()))?;
    }
    fs::write(path, bulk_csv(reports)?)
        .with_context(|| format!("Failed to write reports to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::BOM;

    fn report(id: i64, first_name: &str, username: &str, created_at: Option<&str>) -> Report {
        Report {
            id,
            user_id: id,
            username: username.into(),
            first_name: first_name.into(),
            last_name: "Huaman".into(),
            email: "x@example.com".into(),
            phone_number: "999 888 777".into(),
            dni: "11223344".into(),
            status: "active".into(),
            blinks_detected: 42,
            microsleeps: 1.25,
            yawns_detected: 3,
            yawns_duration: 7.5,
            created_at: created_at.map(String::from),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn writes_header_and_quoted_rows() {
        let mut inactive = report(2, "Ana \"La Jefa\", Sr", "ana", None);
        inactive.status = "inactive".into();
        let reports = vec![report(1, "Luis", "lhuaman", Some("2024-05-01T02:00:00")), inactive];

        let csv = bulk_csv(&reports).unwrap();
        let lines: Vec<&str> = csv.trim_start_matches(BOM).split_terminator("\r\n").collect();

        assert!(csv.starts_with(BOM));
        assert!(csv.ends_with("\r\n"));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("\"Nombre\";\"Apellido\";\"Correo Electrónico\""));
        assert!(lines[0].ends_with("\"Duración Bostezos (seg)\";\"Fecha\""));
        assert_eq!(
            lines[1],
            "\"Luis\";\"Huaman\";\"x@example.com\";\"999 888 777\";\"11223344\";\"Activo\";\"42\";\"1.25\";\"3\";\"7.5\";\"30/04/2024\""
        );
        assert!(lines[2].starts_with("\"Ana \"\"La Jefa\"\"  Sr\";"));
        assert!(lines[2].contains("\"Inactivo\""));
        assert!(lines[2].ends_with(";\"\""));
    }

    #[test]
    fn rows_read_back_with_the_semicolon_dialect() {
        let reports = vec![report(1, "Ana \"La Jefa\", Sr", "ana", Some("2024-06-10T05:00:00Z"))];
        let csv = bulk_csv(&reports).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .from_reader(csv.trim_start_matches(BOM).as_bytes());
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();

        assert_eq!(headers.iter().collect::<Vec<_>>(), COLUMNS.to_vec());
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "Ana \"La Jefa\"  Sr");
        assert_eq!(&rows[0][5], "Activo");
        assert_eq!(&rows[0][10], "10/06/2024");
    }

    #[test]
    fn filters_by_name_case_insensitively() {
        let reports = vec![
            report(1, "Luis", "lhuaman", None),
            report(2, "Carla", "cquispe", None),
        ];
        let filter = ReportFilter {
            name: Some("QUIS".into()),
            ..ReportFilter::default()
        };

        let ids: Vec<i64> = filter.apply(&reports).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(ReportFilter::default().apply(&reports).len(), 2);
    }

    #[test]
    fn date_range_is_inclusive_in_lima_time() {
        let reports = vec![
            report(1, "a", "a", Some("2024-06-10T04:59:00Z")),
            report(2, "b", "b", Some("2024-06-10T05:00:00Z")),
            report(3, "c", "c", Some("2024-06-12T12:00:00Z")),
            report(4, "d", "d", None),
        ];
        let filter = ReportFilter {
            name: None,
            from: Some(date(2024, 6, 10)),
            to: Some(date(2024, 6, 12)),
        };

        let ids: Vec<i64> = filter.apply(&reports).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn writes_to_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join(BULK_FILE_NAME);
        let reports = vec![report(1, "Luis", "lhuaman", None)];

        write_bulk(&reports, &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), bulk_csv(&reports).unwrap());
    }
}
