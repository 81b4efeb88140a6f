// Sensor service - Use cases over the reading pipeline
use crate::application::document_store::{
    DEFAULT_PAGE_SIZE, DocumentFilter, DocumentStore, PageCursor, StoreError,
};
use crate::application::measurement_parser::{declared_battery, parse_document, reading_at};
use crate::application::pagination::{collect_documents, walk_pages};
use crate::application::range_filter::normalize_documents;
use crate::domain::date_range::DateRange;
use crate::domain::document::RawDailyDocument;
use crate::domain::export::ExportRow;
use crate::domain::reading::{BatteryStatus, NormalizedReading, ReadingSeries};
use crate::domain::statistics::Statistics;
use crate::domain::time_basis::TimeBasis;
use futures::stream::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// How many of a day's newest measurements the recent feed shows.
const RECENT_PER_DOCUMENT: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub page_size: usize,
    pub export_page_size: usize,
    pub basis: TimeBasis,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            export_page_size: 100,
            basis: TimeBasis::Local,
        }
    }
}

/// A tag's sorted series and its latest battery status.
#[derive(Debug, Clone)]
pub struct TagSeries {
    pub tag_id: String,
    pub readings: ReadingSeries,
    pub battery: BatteryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentReadings {
    pub readings: Vec<NormalizedReading>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct SensorService {
    store: Arc<dyn DocumentStore>,
    settings: PipelineSettings,
}

impl SensorService {
    pub fn new(store: Arc<dyn DocumentStore>, settings: PipelineSettings) -> Self {
        Self { store, settings }
    }

    pub fn time_basis(&self) -> TimeBasis {
        self.settings.basis
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, StoreError> {
        let tags = self.store.list_tag_ids().await?;
        tracing::debug!("Discovered {} tags", tags.len());
        Ok(tags)
    }

    /// Sorted series of `tag_id` restricted to `range`.
    pub async fn get_series(&self, tag_id: &str, range: &DateRange) -> Result<TagSeries, StoreError> {
        self.load(tag_id, Some(range)).await
    }

    /// Sorted series over every document of `tag_id`.
    pub async fn load_unfiltered(&self, tag_id: &str) -> Result<TagSeries, StoreError> {
        self.load(tag_id, None).await
    }

    pub fn statistics(&self, series: &[NormalizedReading]) -> Statistics {
        Statistics::from_series(series)
    }

    pub async fn latest_battery(&self, tag_id: &str) -> Result<BatteryStatus, StoreError> {
        let documents = self.tag_documents(tag_id).await?;
        Ok(normalize_documents(&documents, None, self.settings.basis).battery)
    }

    /// One page of the newest readings, newest first.
    ///
    /// Each document contributes up to its last five measurements, converted
    /// one at a time with the battery values the document itself declares.
    pub async fn recent_readings(
        &self,
        tag_id: Option<&str>,
        cursor: Option<&PageCursor>,
        page_size: Option<usize>,
    ) -> Result<RecentReadings, StoreError> {
        let filter = DocumentFilter {
            tag_id: tag_id.map(str::to_string),
            date_range: None,
        };
        let page_size = page_size.unwrap_or(self.settings.page_size);
        let page = self.store.fetch_documents(&filter, cursor, page_size).await?;

        let readings = page
            .documents
            .iter()
            .flat_map(|document| self.newest_readings(document))
            .collect();

        Ok(RecentReadings {
            readings,
            next_cursor: page.next_cursor.map(|c| c.encode()),
            has_more: page.has_more,
        })
    }

    fn newest_readings(&self, document: &RawDailyDocument) -> Vec<NormalizedReading> {
        let len = document.measurements.len();
        (len.saturating_sub(RECENT_PER_DOCUMENT)..len)
            .rev()
            .filter_map(|index| match reading_at(document, index, self.settings.basis) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    tracing::warn!(
                        "Skipping recent measurement {} of {} for tag {}: {}",
                        index,
                        document.day,
                        document.tag_id,
                        e
                    );
                    None
                }
            })
            .collect()
    }

    /// Export projection of the filtered series of `tag_id`.
    pub async fn export_tag_rows(
        &self,
        tag_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ExportRow>, StoreError> {
        let series = self.get_series(tag_id, range).await?;
        Ok(self.to_rows(&series.readings))
    }

    pub fn to_rows(&self, series: &[NormalizedReading]) -> Vec<ExportRow> {
        series
            .iter()
            .map(|reading| ExportRow::from_reading(reading, self.settings.basis))
            .collect()
    }

    /// Row batches covering the whole collection, one batch per page.
    ///
    /// Documents are taken in store order; battery columns carry each
    /// document's own declared values.
    pub fn export_all_batches(
        &self,
    ) -> impl Stream<Item = Result<Vec<ExportRow>, StoreError>> + Send + use<> {
        let basis = self.settings.basis;
        walk_pages(
            self.store.clone(),
            DocumentFilter::default(),
            self.settings.export_page_size,
            None,
        )
        .map(move |page| {
            page.map(|page| {
                page.documents
                    .iter()
                    .flat_map(|document| parse_document(document, declared_battery(document), basis))
                    .map(|reading| ExportRow::from_reading(&reading, basis))
                    .collect()
            })
        })
    }

    async fn load(&self, tag_id: &str, range: Option<&DateRange>) -> Result<TagSeries, StoreError> {
        let documents = self.tag_documents(tag_id).await?;
        let batch = normalize_documents(&documents, range, self.settings.basis);

        tracing::info!(
            "Loaded {} readings from {} documents for tag {}",
            batch.readings.len(),
            documents.len(),
            tag_id
        );

        Ok(TagSeries {
            tag_id: tag_id.to_string(),
            readings: batch.readings,
            battery: batch.battery,
        })
    }

    /// All documents of a tag in chronological order.
    ///
    /// Battery values carry forward from older to newer days, so the
    /// walker's newest-first pages are reversed before folding.
    async fn tag_documents(&self, tag_id: &str) -> Result<Vec<RawDailyDocument>, StoreError> {
        let mut documents = collect_documents(
            self.store.clone(),
            DocumentFilter::for_tag(tag_id),
            self.settings.page_size,
        )
        .await?;
        documents.reverse();
        Ok(documents)
    }
}
