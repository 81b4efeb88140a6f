// Firestore repository implementation over the REST runQuery endpoint
use crate::application::document_store::{
    DocumentFilter, DocumentPage, DocumentStore, PageCursor, StoreError, StoredDocument,
};
use crate::domain::document::RawDailyDocument;
use crate::infrastructure::config::FirestoreSettings;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FirestoreRepository {
    base_url: String,
    project_id: String,
    database: String,
    collection: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

/// One element of the runQuery response array. Elements without a document
/// only report progress (`readTime`).
#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<FirestoreDocument>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreRepository {
    pub fn new(settings: &FirestoreSettings, collection: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            project_id: settings.project_id.clone(),
            database: settings.database.clone(),
            collection: collection.to_string(),
            api_key: settings.api_key.clone(),
            access_token: settings.access_token.clone(),
            client,
        })
    }

    fn build_query_url(&self) -> String {
        let mut url = format!(
            "{}/v1/projects/{}/databases/{}/documents:runQuery",
            self.base_url,
            urlencoding::encode(&self.project_id),
            urlencoding::encode(&self.database)
        );
        if let Some(key) = &self.api_key {
            url.push_str("?key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }

    async fn run_query(&self, structured_query: Value) -> Result<Vec<FirestoreDocument>, StoreError> {
        let url = self.build_query_url();
        tracing::debug!("Executing Firestore query: {}", structured_query);

        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&json!({ "structuredQuery": structured_query }));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let items = response
            .json::<Vec<RunQueryItem>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(items.into_iter().filter_map(|item| item.document).collect())
    }
}

#[async_trait]
impl DocumentStore for FirestoreRepository {
    async fn list_tag_ids(&self) -> Result<Vec<String>, StoreError> {
        // Full collection scan with a projection; there is no distinct query
        let query = json!({
            "from": [{ "collectionId": self.collection }],
            "select": { "fields": [{ "fieldPath": "tag_id" }] },
        });
        let documents = self.run_query(query).await?;

        let tags: BTreeSet<String> = documents
            .iter()
            .filter_map(|doc| decode_value(doc.fields.get("tag_id")?).as_str().map(str::to_string))
            .filter(|tag| !tag.is_empty())
            .collect();

        tracing::debug!("Scanned {} documents for tag ids", documents.len());
        Ok(tags.into_iter().collect())
    }

    async fn fetch_documents(
        &self,
        filter: &DocumentFilter,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<DocumentPage, StoreError> {
        if page_size == 0 {
            return Err(StoreError::InvalidPageSize);
        }

        let query = build_structured_query(&self.collection, filter, cursor, page_size);
        let documents = self.run_query(query).await?;

        let stored = documents
            .into_iter()
            .map(decode_document)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentPage::from_stored(stored, page_size))
    }
}

/// Structured query for one page: filter, `day` desc then `__name__` desc,
/// resume strictly after the cursor, limit to the page size.
fn build_structured_query(
    collection: &str,
    filter: &DocumentFilter,
    cursor: Option<&PageCursor>,
    page_size: usize,
) -> Value {
    let mut conditions = Vec::new();
    if let Some(tag) = &filter.tag_id {
        conditions.push(field_filter("tag_id", "EQUAL", tag));
    }
    if let Some(range) = &filter.date_range {
        conditions.push(field_filter("day", "GREATER_THAN_OR_EQUAL", range.start()));
        conditions.push(field_filter("day", "LESS_THAN_OR_EQUAL", range.end()));
    }

    let mut query = json!({
        "from": [{ "collectionId": collection }],
        "orderBy": [
            { "field": { "fieldPath": "day" }, "direction": "DESCENDING" },
            { "field": { "fieldPath": "__name__" }, "direction": "DESCENDING" },
        ],
        "limit": page_size,
    });

    match conditions.len() {
        0 => {}
        1 => query["where"] = conditions.remove(0),
        _ => {
            query["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": conditions }
            })
        }
    }

    if let Some(cursor) = cursor {
        query["startAt"] = json!({
            "values": [
                { "stringValue": cursor.day },
                { "referenceValue": cursor.document },
            ],
            "before": false,
        });
    }

    query
}

fn field_filter(path: &str, op: &str, value: &str) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": path },
            "op": op,
            "value": { "stringValue": value },
        }
    })
}

fn decode_document(document: FirestoreDocument) -> Result<StoredDocument, StoreError> {
    let fields = Value::Object(decode_fields(&document.fields));
    let raw: RawDailyDocument = serde_json::from_value(fields)
        .map_err(|e| StoreError::Decode(format!("document {}: {}", document.name, e)))?;

    Ok(StoredDocument {
        name: document.name,
        document: raw,
    })
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Turn a Firestore typed value (`{"stringValue": "x"}`) into plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "booleanValue" | "doubleValue" => {
            inner.clone()
        }
        // 64-bit integers travel as JSON strings
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}
