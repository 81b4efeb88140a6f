// CSV encoding for export rows
use crate::application::document_store::StoreError;
use crate::domain::export::ExportRow;
use csv::{QuoteStyle, WriterBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no data to export")]
    NoRows,
    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV output failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build export response: {0}")]
    Http(#[from] axum::http::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Header line, written raw (unquoted) as the first line of every export.
pub fn header_line() -> String {
    let mut header = ExportRow::COLUMNS.join(",");
    header.push('\n');
    header
}

/// Encode a batch of rows without a header. Strings are quoted with inner
/// quotes doubled; numbers are written bare.
pub fn encode_rows(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());

    for row in rows {
        writer.serialize(row)?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// A complete CSV document. An empty export produces no file.
pub fn rows_to_csv(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoRows);
    }

    let mut document = header_line().into_bytes();
    document.extend(encode_rows(rows)?);
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tag_id: &str, battery_level: &str) -> ExportRow {
        ExportRow {
            timestamp: "10/01/2025 08:00:00".to_string(),
            temperature: 21.5,
            humidity: 40.25,
            tag_id: tag_id.to_string(),
            battery_level: battery_level.to_string(),
            battery_voltage: "N/A".to_string(),
        }
    }

    #[test]
    fn test_header_and_quoting() {
        let csv = String::from_utf8(rows_to_csv(&[row("A", "N/A")]).unwrap()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("timestamp,temperature,humidity,tag_id,battery_level,battery_voltage")
        );
        assert_eq!(
            lines.next(),
            Some(r#""10/01/2025 08:00:00",21.5,40.25,"A","N/A","N/A""#)
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_inner_quotes_are_doubled() {
        let encoded = String::from_utf8(encode_rows(&[row("tank \"b\", north", "N/A")]).unwrap()).unwrap();
        assert!(encoded.contains(r#""tank ""b"", north""#));
    }

    #[test]
    fn test_empty_export_produces_no_file() {
        assert!(matches!(rows_to_csv(&[]), Err(ExportError::NoRows)));
    }
}
