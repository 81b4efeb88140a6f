// Chunked CSV streaming for whole-collection exports
use crate::application::document_store::StoreError;
use crate::domain::export::ExportRow;
use crate::infrastructure::csv_export::{ExportError, encode_rows, header_line};
use crate::infrastructure::http_response::{CSV_CONTENT_TYPE, content_disposition};
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

/// Stream row batches as a chunked CSV download.
///
/// The stream is polled up to the first non-empty batch before the response
/// is built, so an empty collection yields `NoRows` and a store failure on
/// the first page is reported as an error status. Failures after that abort
/// the body mid-transfer.
pub async fn chunked_csv_stream<S>(batches: S, filename: &str) -> Result<Response<Body>, ExportError>
where
    S: Stream<Item = Result<Vec<ExportRow>, StoreError>> + Send + 'static,
{
    let mut batches = Box::pin(batches);

    let first = loop {
        match batches.next().await {
            Some(Ok(rows)) if rows.is_empty() => continue,
            Some(Ok(rows)) => break rows,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ExportError::NoRows),
        }
    };

    let mut opening = BytesMut::new();
    opening.put_slice(header_line().as_bytes());
    opening.put_slice(&encode_rows(&first)?);

    let rest = batches.filter_map(|batch| async move {
        match batch {
            Ok(rows) if rows.is_empty() => None,
            Ok(rows) => Some(encode_chunk(&rows)),
            Err(e) => {
                tracing::error!("Export stream aborted: {}", e);
                Some(Err(std::io::Error::other(e)))
            }
        }
    });

    let byte_stream = stream::once(async move { Ok::<_, std::io::Error>(opening.freeze()) }).chain(rest);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CSV_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, content_disposition(filename))
        .body(Body::from_stream(byte_stream))?)
}

fn encode_chunk(rows: &[ExportRow]) -> Result<Bytes, std::io::Error> {
    encode_rows(rows)
        .map(Bytes::from)
        .map_err(std::io::Error::other)
}
