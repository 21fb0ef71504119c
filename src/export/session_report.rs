use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::models::{IndicatorSnapshot, SessionMode, User};

use super::{finish_sheet, format_date, lima_today, sheet_writer};

/// Field/value sheet describing one monitoring session. No header row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub date: NaiveDate,
    pub mode: SessionMode,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub dni: String,
    pub snapshot: IndicatorSnapshot,
}

impl SessionReport {
    pub fn new(subject: &User, mode: SessionMode, snapshot: IndicatorSnapshot, date: NaiveDate) -> Self {
        Self {
            date,
            mode,
            full_name: subject.full_name(),
            username: subject.username.clone(),
            email: subject.email.clone(),
            dni: subject.dni.clone(),
            snapshot,
        }
    }

    /// Report dated today in Lima.
    pub fn today(subject: &User, mode: SessionMode, snapshot: IndicatorSnapshot) -> Self {
        Self::new(subject, mode, snapshot, lima_today())
    }

    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Fecha", format_date(self.date)),
            ("Nombre", self.full_name.clone()),
            ("Username", self.username.clone()),
            ("Email", self.email.clone()),
            ("DNI", self.dni.clone()),
            ("Parpadeos detectados", self.snapshot.blinks.to_string()),
            ("Microsueños acumulados", self.snapshot.microsleeps.to_string()),
            ("Bostezos detectados", self.snapshot.yawns.to_string()),
            (
                "Duración total de los bostezos",
                format!("{} segundos", self.snapshot.yawn_duration_secs),
            ),
        ]
    }

    pub fn file_name(&self) -> String {
        match self.mode {
            SessionMode::Recorded => format!("reporte_{}.csv", self.username),
            SessionMode::Realtime => format!("reporte_tiempo_real_{}.csv", self.username),
        }
    }

    /// Comma-separated, quoted only where a field needs it.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = sheet_writer(&csv::WriterBuilder::new());
        for (field, value) in self.rows() {
            writer
                .write_record([field, value.as_str()])
                .with_context(|| format!("Failed to write row {field}"))?;
        }
        finish_sheet(writer)
    }

    /// Writes the sheet into `dir` under [`SessionReport::file_name`].
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_csv()?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::BOM;
    use crate::models::{UserRole, UserStatus};

    fn subject() -> User {
        User {
            id: 5,
            username: "rflores".into(),
            first_name: "Rosa".into(),
            last_name: "Flores, \"Rocky\"".into(),
            email: "rosa@example.com".into(),
            phone_number: "911".into(),
            dni: "70112233".into(),
            status: UserStatus::Active,
            role: UserRole::Driver,
            url_video: None,
        }
    }

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            blinks: 10,
            microsleeps: 2.5,
            yawns: 1,
            yawn_duration_secs: 3.5,
        }
    }

    fn read_rows(sheet: &str) -> Vec<(String, String)> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(sheet.trim_start_matches(BOM).as_bytes())
            .records()
            .map(|record| {
                let record = record.unwrap();
                (record[0].to_string(), record[1].to_string())
            })
            .collect()
    }

    #[test]
    fn round_trips_through_csv() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 9).unwrap();
        let report = SessionReport::new(&subject(), SessionMode::Recorded, snapshot(), date);

        let csv = report.to_csv().unwrap();
        assert!(csv.starts_with(BOM));
        assert!(csv.contains("Nombre,\"Rosa Flores, \"\"Rocky\"\"\"\n"));

        let expected: Vec<(String, String)> = report
            .rows()
            .into_iter()
            .map(|(field, value)| (field.to_string(), value))
            .collect();
        assert_eq!(read_rows(&csv), expected);
    }

    #[test]
    fn formats_counts_like_the_dashboard() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let report = SessionReport::new(&subject(), SessionMode::Realtime, snapshot(), date);
        let rows = report.rows();

        assert_eq!(rows[0], ("Fecha", "31/01/2024".to_string()));
        assert_eq!(rows[5], ("Parpadeos detectados", "10".to_string()));
        assert_eq!(rows[6], ("Microsueños acumulados", "2.5".to_string()));
        assert_eq!(
            rows[8],
            ("Duración total de los bostezos", "3.5 segundos".to_string())
        );
    }

    #[test]
    fn file_name_depends_on_mode() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let recorded = SessionReport::new(&subject(), SessionMode::Recorded, snapshot(), date);
        let realtime = SessionReport { mode: SessionMode::Realtime, ..recorded.clone() };

        assert_eq!(recorded.file_name(), "reporte_rflores.csv");
        assert_eq!(realtime.file_name(), "reporte_tiempo_real_rflores.csv");
    }

    #[test]
    fn writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let report = SessionReport::new(&subject(), SessionMode::Recorded, snapshot(), date);

        let path = report.write_to(&dir.path().join("out")).unwrap();

        assert_eq!(path.file_name().unwrap(), "reporte_rflores.csv");
        assert_eq!(fs::read_to_string(path).unwrap(), report.to_csv().unwrap());
    }
}
