// Pagination walker - Sequential cursor-driven page stream
use crate::application::document_store::{
    DocumentFilter, DocumentPage, DocumentStore, PageCursor, StoreError,
};
use crate::domain::document::RawDailyDocument;
use futures::stream::Stream;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Lazy, finite sequence of pages starting after `start` (or at the most
/// recent document).
///
/// Page N+1 is requested only once page N has been consumed and its cursor is
/// known. The stream ends after the first short page, or after a full page
/// whose successor comes back empty. A store error is yielded as the final
/// item. Restarting requires a fresh cursor.
pub fn walk_pages(
    store: Arc<dyn DocumentStore>,
    filter: DocumentFilter,
    page_size: usize,
    start: Option<PageCursor>,
) -> impl Stream<Item = Result<DocumentPage, StoreError>> + Send {
    async_stream::try_stream! {
        let mut cursor = start;
        let mut page_number = 0usize;

        loop {
            let page = store
                .fetch_documents(&filter, cursor.as_ref(), page_size)
                .await?;
            page_number += 1;

            tracing::debug!(
                "Fetched page {} with {} documents (has_more={})",
                page_number,
                page.documents.len(),
                page.has_more
            );

            let exhausted = !page.has_more || page.next_cursor.is_none();
            cursor = page.next_cursor.clone();

            // A full final page is followed by an empty one; don't surface it
            if !page.documents.is_empty() {
                yield page;
            }
            if exhausted {
                break;
            }
        }
    }
}

/// Drain every page matching `filter`, in store order (newest day first).
pub async fn collect_documents(
    store: Arc<dyn DocumentStore>,
    filter: DocumentFilter,
    page_size: usize,
) -> Result<Vec<RawDailyDocument>, StoreError> {
    let pages = walk_pages(store, filter, page_size, None);
    tokio::pin!(pages);

    let mut documents = Vec::new();
    while let Some(page) = pages.next().await {
        documents.extend(page?.documents);
    }
    Ok(documents)
}
