//! Tabular, spreadsheet and JSON export of canonical records.

use std::io::Write;
use std::path::Path;

use dealer_core::CanonicalDealerRecord;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

/// Worksheet name used for `.xlsx` exports.
pub const SHEET_NAME: &str = "Dealerships";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet write error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Pretty-printed JSON array with camelCase keys.
    #[default]
    Json,
    Csv,
    Tsv,
    /// One worksheet, header row first.
    Xlsx,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(format!(
                "unknown export format \"{other}\" (expected json, csv, tsv, or xlsx)"
            )),
        }
    }
}

/// Serialize `records` in `format`. Tabular formats start with the fixed
/// header row.
///
/// # Errors
///
/// Returns [`ExportError`] if serialization fails.
pub fn export(records: &[CanonicalDealerRecord], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Json => {
            let mut out = serde_json::to_vec_pretty(records)?;
            out.push(b'\n');
            Ok(out)
        }
        ExportFormat::Csv => write_delimited(records, b','),
        ExportFormat::Tsv => write_delimited(records, b'\t'),
        ExportFormat::Xlsx => write_xlsx(records),
    }
}

fn write_xlsx(records: &[CanonicalDealerRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in (0u16..).zip(CanonicalDealerRecord::COLUMNS) {
        sheet.write_string_with_format(0, col, title, &header)?;
    }
    for (row, record) in (1u32..).zip(records) {
        for (col, value) in (0u16..).zip(record.row()) {
            sheet.write_string(row, col, value)?;
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

fn write_delimited(records: &[CanonicalDealerRecord], delimiter: u8) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(CanonicalDealerRecord::COLUMNS)?;
    for record in records {
        writer.write_record(record.row())?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Write `records` to `path`.
///
/// # Errors
///
/// Returns [`ExportError`] on serialization or file failure.
pub fn export_to_path(
    records: &[CanonicalDealerRecord],
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    let bytes = export(records, format)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    tracing::info!(path = %path.display(), count = records.len(), ?format, "records exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use dealer_core::DealershipType;

    use super::*;

    fn record() -> CanonicalDealerRecord {
        CanonicalDealerRecord {
            dealership: "Lakeside Ford".to_string(),
            dealer_group: "Shore Auto, Inc.".to_string(),
            dealership_type: DealershipType::Franchised,
            car_brand: "Ford".to_string(),
            address: "12 Shore Dr".to_string(),
            city: "Austin".to_string(),
            state_province: "TX".to_string(),
            postal_code: "78701".to_string(),
            phone: "(512) 555-0100".to_string(),
            country: "USA".to_string(),
            website: "https://lakesideford.com".to_string(),
        }
    }

    #[test]
    fn csv_has_header_and_quoted_fields() {
        let out = String::from_utf8(export(&[record()], ExportFormat::Csv).unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Dealership,Dealer Group,Dealership Type,Car Brand,Address,City,State/Province,Postal Code,Phone,Country,Website"
        );
        assert!(lines.next().unwrap().starts_with("Lakeside Ford,\"Shore Auto, Inc.\",Franchised,Ford,"));
    }

    #[test]
    fn tsv_uses_tabs() {
        let out = String::from_utf8(export(&[record()], ExportFormat::Tsv).unwrap()).unwrap();
        let row = out.lines().nth(1).unwrap();
        assert_eq!(row.split('\t').count(), 11);
        assert!(row.contains("Shore Auto, Inc."));
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let out = export(&[record()], ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["dealerGroup"], "Shore Auto, Inc.");
        assert_eq!(value[0]["stateProvince"], "TX");
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::Xlsx.extension(), "xlsx");
        assert!("ods".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn xlsx_reads_back_header_and_rows() {
        use calamine::{open_workbook_from_rs, Reader, Xlsx};

        let bytes = export(&[record()], ExportFormat::Xlsx).unwrap();
        let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        let mut rows = range.rows();
        let header: Vec<String> = rows.next().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(header, CanonicalDealerRecord::COLUMNS);

        let first: Vec<String> = rows.next().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(first[0], "Lakeside Ford");
        assert_eq!(first[1], "Shore Auto, Inc.");
        assert_eq!(first[10], "https://lakesideford.com");
        assert!(rows.next().is_none());
    }
}
