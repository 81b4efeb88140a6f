// HTTP response utilities for CSV downloads with optional Brotli encoding
use crate::infrastructure::csv_export::ExportError;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
};
use tokio::io::AsyncReadExt;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Whether the client advertised Brotli support.
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// `attachment` disposition with an ASCII fallback name and the exact name
/// percent-encoded in `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

pub async fn brotli_compress(bytes: Vec<u8>) -> std::io::Result<Vec<u8>> {
    let mut encoder = BrotliEncoder::new(std::io::Cursor::new(bytes));
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Buffered CSV download, Brotli-compressed when `compress` is set.
pub async fn csv_download_response(
    csv: Vec<u8>,
    filename: &str,
    compress: bool,
) -> Result<Response<Body>, ExportError> {
    let (body_bytes, content_encoding) = if compress {
        let original = csv.len();
        let compressed = brotli_compress(csv).await?;
        tracing::debug!(
            "Compressed CSV: {} -> {} bytes",
            original,
            compressed.len()
        );
        (compressed, Some("br"))
    } else {
        (csv, None)
    };

    let mut response_builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CSV_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, content_disposition(filename))
        .header(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    if let Some(encoding) = content_encoding {
        response_builder = response_builder
            .header(header::CONTENT_ENCODING, encoding)
            .header(header::VARY, "accept-encoding");
    }

    Ok(response_builder.body(Body::from(body_bytes))?)
}
