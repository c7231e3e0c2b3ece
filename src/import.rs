//! Spreadsheet export adapter: CSV rows in, validated records out.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use crate::dates::{self, CellValue, ParseError};
use crate::models::Record;

/// One spreadsheet row keyed by normalized column name.
pub type RawRow = HashMap<String, CellValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Institution,
    Level,
    Start,
    End,
}

const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Name, &["nama", "nama lengkap", "nama peserta", "name", "full name"]),
    (
        Field::Institution,
        &[
            "instansi",
            "asal instansi",
            "asal sekolah",
            "sekolah",
            "universitas",
            "kampus",
            "institusi",
            "institution",
            "school",
        ],
    ),
    (
        Field::Level,
        &["jenjang", "jenjang pendidikan", "tingkat", "pendidikan", "level", "education level"],
    ),
    (
        Field::Start,
        &[
            "tanggal mulai",
            "tgl mulai",
            "mulai",
            "tanggal masuk",
            "start",
            "start date",
            "mulai magang",
        ],
    ),
    (
        Field::End,
        &[
            "tanggal selesai",
            "tgl selesai",
            "selesai",
            "tanggal keluar",
            "end",
            "end date",
            "selesai magang",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based data row number, header excluded.
    pub row: usize,
    pub error: ParseError,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub records: Vec<Record>,
    pub rejected: Vec<RejectedRow>,
}

/// Lower-cases a header and folds `_`, `-` and `.` into single spaces.
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['_', '-', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn read_csv_file(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_rows(file).with_context(|| format!("failed to read rows from {}", path.display()))
}

/// Reads rows without requiring UTF-8; spreadsheets saved in a legacy
/// codepage keep their rows, with undecodable bytes replaced.
pub fn read_rows<R: Read>(reader: R) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| normalize_column(&String::from_utf8_lossy(header)))
        .collect();

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| {
                (header.clone(), CellValue::from_field(&String::from_utf8_lossy(field)))
            })
            .collect();
        rows.push(row);
    }
    debug!(rows = rows.len(), columns = headers.len(), "read csv rows");
    Ok(rows)
}

fn cell<'a>(row: &'a RawRow, field: Field) -> Option<&'a CellValue> {
    let aliases = FIELD_ALIASES
        .iter()
        .find(|(candidate, _)| *candidate == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or_default();
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .find(|value| !value.is_blank())
}

fn text(row: &RawRow, field: Field) -> Option<String> {
    cell(row, field)
        .map(ToString::to_string)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds records from raw rows. Rows whose start date cannot be read are
/// rejected; an unreadable end date leaves the record ongoing.
pub fn normalize_rows(rows: &[RawRow]) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let start = match cell(row, Field::Start).map(dates::parse) {
            Some(Ok(date)) => date,
            Some(Err(error)) => {
                warn!(row = row_number, %error, "dropping row with unreadable start date");
                outcome.rejected.push(RejectedRow {
                    row: row_number,
                    error,
                });
                continue;
            }
            None => {
                warn!(row = row_number, "dropping row without a start date");
                outcome.rejected.push(RejectedRow {
                    row: row_number,
                    error: ParseError::Missing,
                });
                continue;
            }
        };

        let end = match cell(row, Field::End).map(dates::parse_optional) {
            Some(Ok(end)) => end,
            Some(Err(error)) => {
                warn!(row = row_number, %error, "unreadable end date, treating as ongoing");
                None
            }
            None => None,
        };

        outcome.records.push(Record {
            name: text(row, Field::Name),
            institution: text(row, Field::Institution),
            level: text(row, Field::Level),
            start,
            end,
        });
    }

    debug!(
        accepted = outcome.records.len(),
        rejected = outcome.rejected.len(),
        "normalized rows"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn headers_are_normalized() {
        assert_eq!(normalize_column("  Tanggal_Mulai "), "tanggal mulai");
        assert_eq!(normalize_column("Start-Date"), "start date");
        assert_eq!(normalize_column("Tgl.  Selesai"), "tgl selesai");
    }

    #[test]
    fn indonesian_headers_map_to_records() {
        let csv = "Nama,Asal Sekolah,Jenjang,Tanggal Mulai,Tanggal Selesai\n\
                   Ayu,SMKN 1 Bogor,SMK,2024-01-01,2024-03-31\n\
                   Bima,Universitas Indonesia,S1,45337,\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        let outcome = normalize_rows(&rows);
        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.records.len(), 2);

        let ayu = &outcome.records[0];
        assert_eq!(ayu.name.as_deref(), Some("Ayu"));
        assert_eq!(ayu.institution.as_deref(), Some("SMKN 1 Bogor"));
        assert_eq!(ayu.level.as_deref(), Some("SMK"));
        assert_eq!(ayu.start, ymd(2024, 1, 1));
        assert_eq!(ayu.end, Some(ymd(2024, 3, 31)));

        let bima = &outcome.records[1];
        assert_eq!(bima.start, ymd(2024, 2, 15));
        assert_eq!(bima.end, None);
    }

    #[test]
    fn english_headers_are_accepted() {
        let csv = "name,institution,education_level,start_date,end_date\n\
                   Citra,ITB,S1,15/02/2024,\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        let outcome = normalize_rows(&rows);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].start, ymd(2024, 2, 15));
        assert_eq!(outcome.records[0].level.as_deref(), Some("S1"));
    }

    #[test]
    fn rows_without_a_valid_start_are_rejected() {
        let csv = "nama,mulai,selesai\n\
                   Ayu,,2024-03-31\n\
                   Bima,kemarin,\n\
                   Citra,2024-02-01,bulan depan\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        let outcome = normalize_rows(&rows);

        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].row, 1);
        assert_eq!(outcome.rejected[0].error, ParseError::Missing);
        assert_eq!(outcome.rejected[1].row, 2);
        assert!(matches!(
            outcome.rejected[1].error,
            ParseError::InvalidDate { .. }
        ));

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name.as_deref(), Some("Citra"));
        assert!(outcome.records[0].is_ongoing());
    }

    #[test]
    fn legacy_codepage_bytes_do_not_abort_the_import() {
        let mut csv = b"nama,instansi,mulai\n".to_vec();
        csv.extend_from_slice(b"Andr\xe9,SMKN 1 Garut,2024-02-01\n");
        csv.extend_from_slice(b"Budi,Polban,2024-03-01\n");
        let rows = read_rows(csv.as_slice()).unwrap();
        let outcome = normalize_rows(&rows);

        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].name.as_deref(), Some("Andr\u{FFFD}"));
        assert_eq!(outcome.records[0].start, ymd(2024, 2, 1));
        assert_eq!(outcome.records[1].institution.as_deref(), Some("Polban"));
    }

    #[test]
    fn blank_text_fields_become_absent() {
        let csv = "nama,instansi,mulai\n  ,   ,2024-05-05\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        let outcome = normalize_rows(&rows);
        assert_eq!(outcome.records[0].name, None);
        assert_eq!(outcome.records[0].institution, None);
        assert_eq!(outcome.records[0].level, None);
    }
}
