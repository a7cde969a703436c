// respira-core/src/dataset.rs

//! Loads the hospitalization records (and optional auxiliary tables) from CSV.
//!
//! The data is read once at startup and shared read-only through an
//! `Arc<Dataset>` afterwards; nothing in the crate mutates it.

use crate::config::{DatasetConfig, TableConfig};
use crate::errors::DatasetError;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COL_DIAGNOSIS: &str = "DIAG_PRINC";
const COL_AGE: &str = "IDADE";
const COL_CITY: &str = "CIDADE_RESIDENCIA_PACIENTE";
const REQUIRED_COLUMNS: [&str; 3] = [COL_DIAGNOSIS, COL_AGE, COL_CITY];

/// ICD-10 chapter X (diseases of the respiratory system) codes start with this letter.
pub const RESPIRATORY_PREFIX: char = 'J';

/// Character encoding of a CSV file.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

/// One hospital admission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmissionRecord {
    pub diagnosis: Option<String>,
    pub age: Option<i64>,
    pub city: Option<String>,
    pub admitted_on: Option<NaiveDate>,
    pub discharged_on: Option<NaiveDate>,
    pub total_cost: Option<f64>,
    pub died: bool,
    pub year: Option<i32>,
}

impl AdmissionRecord {
    pub fn is_respiratory(&self) -> bool {
        self.diagnosis
            .as_deref()
            .and_then(|code| code.trim().chars().next())
            .is_some_and(|c| c.to_ascii_uppercase() == RESPIRATORY_PREFIX)
    }

    /// Trimmed, upper-cased residence city; `None` when missing or blank.
    pub fn normalized_city(&self) -> Option<String> {
        self.city
            .as_deref()
            .map(normalize_city)
            .filter(|c| !c.is_empty())
    }
}

pub fn normalize_city(city: &str) -> String {
    city.trim().to_uppercase()
}

/// A generic CSV table kept as strings (demographic and pollution side tables).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Immutable in-memory view of every loaded file.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    admissions: Vec<AdmissionRecord>,
    tables: Vec<Table>,
}

impl Dataset {
    pub fn new(admissions: Vec<AdmissionRecord>, tables: Vec<Table>) -> Self {
        Self { admissions, tables }
    }

    pub fn from_admissions(admissions: Vec<AdmissionRecord>) -> Self {
        Self::new(admissions, Vec::new())
    }

    pub fn load(config: &DatasetConfig) -> Result<Self, DatasetError> {
        let admissions = load_admissions(&config.admissions)?;
        let tables = config
            .auxiliary
            .iter()
            .map(load_table)
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            admissions = admissions.len(),
            auxiliary_tables = tables.len(),
            "Dataset loaded."
        );
        Ok(Self::new(admissions, tables))
    }

    pub fn admissions(&self) -> &[AdmissionRecord] {
        &self.admissions
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

#[derive(Debug, Deserialize)]
struct RawAdmission {
    #[serde(rename = "DIAG_PRINC", default)]
    diagnosis: Option<String>,
    #[serde(rename = "IDADE", default)]
    age: Option<String>,
    #[serde(rename = "CIDADE_RESIDENCIA_PACIENTE", default)]
    city: Option<String>,
    #[serde(rename = "DT_INTER", default)]
    admitted_on: Option<String>,
    #[serde(rename = "DT_SAIDA", default)]
    discharged_on: Option<String>,
    #[serde(rename = "VAL_TOT", default)]
    total_cost: Option<String>,
    #[serde(rename = "MORTE", default)]
    died: Option<String>,
    #[serde(rename = "ano", default)]
    year: Option<String>,
}

impl From<RawAdmission> for AdmissionRecord {
    fn from(raw: RawAdmission) -> Self {
        let admitted_on = raw.admitted_on.as_deref().and_then(parse_date);
        let year = raw
            .year
            .as_deref()
            .and_then(parse_integer)
            .and_then(|y| i32::try_from(y).ok())
            .or_else(|| admitted_on.map(|d| d.year()));
        AdmissionRecord {
            diagnosis: raw.diagnosis.filter(|d| !d.trim().is_empty()),
            age: raw.age.as_deref().and_then(parse_integer),
            city: raw.city.filter(|c| !c.trim().is_empty()),
            admitted_on,
            discharged_on: raw.discharged_on.as_deref().and_then(parse_date),
            total_cost: raw.total_cost.as_deref().and_then(parse_number),
            died: raw.died.as_deref().is_some_and(parse_flag),
            year,
        }
    }
}

/// Loads the admissions file (UTF-8, comma separated).
pub fn load_admissions(path: &Path) -> Result<Vec<AdmissionRecord>, DatasetError> {
    let text = read_text(path, TextEncoding::Utf8)?;
    let mut reader = csv_reader(&text, b',');

    let headers = reader.headers().map_err(|source| csv_error(path, source))?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<RawAdmission>() {
        let raw = row.map_err(|source| csv_error(path, source))?;
        records.push(AdmissionRecord::from(raw));
    }
    debug!(path = %path.display(), rows = records.len(), "Loaded admissions file.");
    Ok(records)
}

/// Loads an auxiliary table with its own delimiter and encoding.
pub fn load_table(config: &TableConfig) -> Result<Table, DatasetError> {
    let text = read_text(&config.path, config.encoding)?;
    // Validated as ASCII by the config loader.
    let mut reader = csv_reader(&text, config.delimiter as u8);

    let headers = reader
        .headers()
        .map_err(|source| csv_error(&config.path, source))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| csv_error(&config.path, source))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    debug!(table = %config.name, path = %config.path.display(), rows = rows.len(), "Loaded auxiliary table.");
    Ok(Table {
        name: config.name.clone(),
        headers,
        rows,
    })
}

fn csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn csv_error(path: &Path, source: csv::Error) -> DatasetError {
    DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn read_text(path: &Path, encoding: TextEncoding) -> Result<String, DatasetError> {
    let bytes = std::fs::read(path).map_err(|source| DatasetError::Io {
        path: PathBuf::from(path),
        source,
    })?;
    match encoding {
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
            String::from_utf8(bytes.to_vec()).map_err(|_| DatasetError::Encoding {
                path: path.to_path_buf(),
            })
        }
        // Every Latin-1 byte maps to the code point of the same value.
        TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Numeric coercion: anything that is not a finite number is missing.
/// Accepts a decimal comma when no decimal point is present.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`parse_number`], truncated toward zero.
pub(crate) fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_number(trimmed).map(|v| v.trunc() as i64))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

fn parse_flag(raw: &str) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "true" | "sim" | "s" | "yes" => true,
        other => parse_number(other).is_some_and(|v| v != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const ADMISSIONS_CSV: &str = "\
DIAG_PRINC,IDADE,CIDADE_RESIDENCIA_PACIENTE,DT_INTER,DT_SAIDA,VAL_TOT,MORTE,ano
J189,67,Porto Alegre,20190312,20190320,1520.35,0,2019
I10,45,Santa Maria,2020-01-05,2020-01-09,310.00,1,
J45, abc ,  ,20210701,,,0,2021
J12,47.8,PORTO ALEGRE,,,,1,2020
";

    #[test]
    fn coerces_numbers_like_a_dataframe() {
        assert_eq!(parse_integer("47"), Some(47));
        assert_eq!(parse_integer(" 47.9 "), Some(47));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_number("1520,35"), Some(1520.35));
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn parses_dates_and_flags() {
        assert_eq!(parse_date("20190312"), NaiveDate::from_ymd_opt(2019, 3, 12));
        assert_eq!(parse_date("2019-03-12"), NaiveDate::from_ymd_opt(2019, 3, 12));
        assert_eq!(parse_date("2019-03-12 00:00:00"), NaiveDate::from_ymd_opt(2019, 3, 12));
        assert_eq!(parse_date("12/03/2019"), None);
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("não"));
    }

    #[test]
    fn loads_admissions_with_missing_values() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("dados_sus3.csv");
        fs::write(&path, ADMISSIONS_CSV)?;

        let records = load_admissions(&path)?;
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].diagnosis.as_deref(), Some("J189"));
        assert_eq!(records[0].age, Some(67));
        assert_eq!(records[0].total_cost, Some(1520.35));
        assert_eq!(records[0].year, Some(2019));
        assert!(records[0].is_respiratory());

        assert!(!records[1].is_respiratory());
        assert!(records[1].died);
        // Year falls back to the admission date.
        assert_eq!(records[1].year, Some(2020));

        assert_eq!(records[2].age, None);
        assert_eq!(records[2].normalized_city(), None);
        assert_eq!(records[2].discharged_on, None);

        assert_eq!(records[3].age, Some(47));
        assert_eq!(records[3].normalized_city().as_deref(), Some("PORTO ALEGRE"));
        Ok(())
    }

    #[test]
    fn missing_required_column_is_reported() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.csv");
        fs::write(&path, "DIAG_PRINC,IDADE\nJ18,40\n")?;

        match load_admissions(&path) {
            Err(DatasetError::MissingColumn { column, .. }) => {
                assert_eq!(column, COL_CITY);
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_admissions(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }

    #[test]
    fn loads_latin1_semicolon_table() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("IDH_municipios_RS.csv");
        // "Município;IDHM\nSão Borja;0,736\n" in Latin-1.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"Munic\xEDpio;IDHM\n");
        bytes.extend_from_slice(b"S\xE3o Borja;0,736\n");
        fs::write(&path, bytes)?;

        let table = load_table(&TableConfig {
            name: "idh".to_string(),
            path: path.clone(),
            delimiter: ';',
            encoding: TextEncoding::Latin1,
        })?;
        assert_eq!(table.headers, vec!["Município", "IDHM"]);
        assert_eq!(table.rows, vec![vec!["São Borja".to_string(), "0,736".to_string()]]);

        // The same bytes are rejected when declared as UTF-8.
        let result = load_table(&TableConfig {
            name: "idh".to_string(),
            path,
            delimiter: ';',
            encoding: TextEncoding::Utf8,
        });
        assert!(matches!(result, Err(DatasetError::Encoding { .. })));
        Ok(())
    }

    #[test]
    fn dataset_load_reads_every_configured_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let admissions = dir.path().join("dados_sus3.csv");
        let pollution = dir.path().join("poluicao_do_ar_2014_2023.csv");
        fs::write(&admissions, ADMISSIONS_CSV)?;
        fs::write(&pollution, "city,year,pm25\nPorto Alegre,2019,12.5\n")?;

        let config = DatasetConfig {
            admissions,
            auxiliary: vec![TableConfig {
                name: "pollution".to_string(),
                path: pollution,
                delimiter: ',',
                encoding: TextEncoding::Utf8,
            }],
        };
        let dataset = Dataset::load(&config)?;
        assert_eq!(dataset.admissions().len(), 4);
        assert_eq!(dataset.tables().len(), 1);
        assert_eq!(dataset.tables()[0].headers, vec!["city", "year", "pm25"]);
        Ok(())
    }
}
