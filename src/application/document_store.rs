// Document store trait and pagination types
use crate::domain::date_range::DateRange;
use crate::domain::document::RawDailyDocument;
use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode store response: {0}")]
    Decode(String),
    #[error("malformed pagination cursor: {0}")]
    MalformedCursor(String),
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

impl StoreError {
    /// Caller contract violations, as opposed to store or transport failures.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, StoreError::MalformedCursor(_) | StoreError::InvalidPageSize)
    }
}

/// Restriction applied by the store before paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub tag_id: Option<String>,
    pub date_range: Option<DateRange>,
}

impl DocumentFilter {
    pub fn for_tag(tag_id: &str) -> Self {
        Self {
            tag_id: Some(tag_id.to_string()),
            date_range: None,
        }
    }

    pub fn matches(&self, document: &RawDailyDocument) -> bool {
        let tag_ok = self
            .tag_id
            .as_deref()
            .is_none_or(|tag| tag == document.tag_id);
        let day_ok = self
            .date_range
            .as_ref()
            .is_none_or(|range| range.contains_day(&document.day));
        tag_ok && day_ok
    }
}

/// Ordering key of the last document of a page.
///
/// Documents are ordered by `day` descending, then by document name
/// descending, so the pair identifies a resume point without the store
/// keeping any state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub day: String,
    pub document: String,
}

impl PageCursor {
    const SEPARATOR: char = '|';

    /// Opaque token handed to API clients.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            urlencoding::encode(&self.day),
            Self::SEPARATOR,
            urlencoding::encode(&self.document)
        )
    }

    /// Structural check only: the day is whatever the store held, so it is
    /// not validated as a calendar date.
    pub fn decode(token: &str) -> Result<Self, StoreError> {
        let malformed = || StoreError::MalformedCursor(token.to_string());

        let (day, document) = token.split_once(Self::SEPARATOR).ok_or_else(malformed)?;
        let day = urlencoding::decode(day).map_err(|_| malformed())?;
        let document = urlencoding::decode(document).map_err(|_| malformed())?;

        if document.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            day: day.into_owned(),
            document: document.into_owned(),
        })
    }
}

/// A document together with the store's name for it.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub document: RawDailyDocument,
}

#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub documents: Vec<RawDailyDocument>,
    pub next_cursor: Option<PageCursor>,
    /// True iff the page came back full. A hint only: a full final page
    /// reports `true` once and the following fetch returns an empty page.
    pub has_more: bool,
}

impl DocumentPage {
    /// Build a page from documents in store order, at most `page_size` long.
    pub fn from_stored(stored: Vec<StoredDocument>, page_size: usize) -> Self {
        let has_more = stored.len() == page_size;
        let next_cursor = stored.last().map(|last| PageCursor {
            day: last.document.day.clone(),
            document: last.name.clone(),
        });

        Self {
            documents: stored.into_iter().map(|s| s.document).collect(),
            next_cursor,
            has_more,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Distinct tag identifiers across the whole collection, sorted.
    async fn list_tag_ids(&self) -> Result<Vec<String>, StoreError>;

    /// One page of documents ordered by `day` descending, resuming after
    /// `cursor` or from the most recent document when it is `None`.
    async fn fetch_documents(
        &self,
        filter: &DocumentFilter,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<DocumentPage, StoreError>;
}
