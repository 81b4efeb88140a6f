// HTTP request handlers
use crate::application::display_session::{RunOutcome, SessionSnapshot};
use crate::application::document_store::PageCursor;
use crate::application::sensor_service::RecentReadings;
use crate::domain::date_range::DateRange;
use crate::domain::reading::{BatteryReport, ReadingSeries};
use crate::domain::statistics::Statistics;
use crate::infrastructure::chunked_csv::chunked_csv_stream;
use crate::infrastructure::csv_export::rows_to_csv;
use crate::infrastructure::http_response::{accepts_brotli, csv_download_response};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const EXPORT_ALL_FILENAME: &str = "all-sensor-data.csv";

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeQuery {
    /// Requested window, each missing bound taken from `default`.
    fn resolve(&self, default: &DateRange) -> Result<DateRange, ApiError> {
        let start = self.start.as_deref().unwrap_or(default.start());
        let end = self.end.as_deref().unwrap_or(default.end());
        Ok(DateRange::parse(start, end)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub tag: Option<String>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SelectTagRequest {
    pub tag_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRangeRequest {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub tag_id: String,
    pub range: DateRange,
    pub readings: ReadingSeries,
    pub statistics: Statistics,
    pub battery: BatteryReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Applied,
    Superseded,
    NoTags,
}

#[derive(Debug, Serialize)]
pub struct SessionRunResponse {
    pub status: RunStatus,
    pub session: SessionSnapshot,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Distinct tag ids known to the store
pub async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.sensor_service.list_tags().await?))
}

/// Filtered series of one tag with its statistics and latest battery
pub async fn get_series(
    Path(tag_id): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let range = query.resolve(&state.default_range)?;
    let series = state.sensor_service.get_series(&tag_id, &range).await?;
    let statistics = state.sensor_service.statistics(&series.readings);

    Ok(Json(SeriesResponse {
        tag_id: series.tag_id,
        range,
        readings: series.readings,
        statistics,
        battery: series.battery.into(),
    }))
}

pub async fn get_battery(
    Path(tag_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BatteryReport>, ApiError> {
    let battery = state.sensor_service.latest_battery(&tag_id).await?;
    Ok(Json(battery.into()))
}

/// One page of the newest readings, optionally for a single tag
pub async fn recent_readings(
    Query(query): Query<RecentQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RecentReadings>, ApiError> {
    let cursor = query.cursor.as_deref().map(PageCursor::decode).transpose()?;
    let page = state
        .sensor_service
        .recent_readings(query.tag.as_deref(), cursor.as_ref(), query.page_size)
        .await?;
    Ok(Json(page))
}

/// CSV download of one tag's filtered series
pub async fn export_tag_csv(
    Path(tag_id): Path<String>,
    Query(query): Query<RangeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let range = query.resolve(&state.default_range)?;
    let rows = state.sensor_service.export_tag_rows(&tag_id, &range).await?;
    let csv = rows_to_csv(&rows)?;

    tracing::info!("Exporting {} rows for tag {}", rows.len(), tag_id);
    let filename = format!("sensor-data-{}.csv", tag_id);
    Ok(csv_download_response(csv, &filename, accepts_brotli(&headers)).await?)
}

/// Streamed CSV download of every document in the store
pub async fn export_all_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let batches = state.sensor_service.export_all_batches();
    Ok(chunked_csv_stream(batches, EXPORT_ALL_FILENAME).await?)
}

/// Snapshot of an existing session; reading never opens one
pub async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or(ApiError::SessionNotFound(session_id))?;
    Ok(Json(session.snapshot()))
}

pub async fn reload_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionRunResponse>, ApiError> {
    let session = state.sessions.get_or_create(&session_id);
    let outcome = session.reload(&state.sensor_service).await?;
    Ok(Json(run_response(outcome, session.snapshot())))
}

pub async fn select_session_tag(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectTagRequest>,
) -> Result<Json<SessionRunResponse>, ApiError> {
    let session = state.sessions.get_or_create(&session_id);
    let outcome = session
        .select_tag(&state.sensor_service, &request.tag_id)
        .await?;
    Ok(Json(run_response(outcome, session.snapshot())))
}

pub async fn set_session_range(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetRangeRequest>,
) -> Result<Json<SessionRunResponse>, ApiError> {
    let range = DateRange::parse(&request.start, &request.end)?;
    let session = state.sessions.get_or_create(&session_id);
    let outcome = session.set_range(&state.sensor_service, range).await?;
    Ok(Json(run_response(outcome, session.snapshot())))
}

fn run_response(outcome: RunOutcome, session: SessionSnapshot) -> SessionRunResponse {
    let status = match outcome {
        RunOutcome::Applied(_) => RunStatus::Applied,
        RunOutcome::Superseded => RunStatus::Superseded,
        RunOutcome::NoTags => RunStatus::NoTags,
    };
    SessionRunResponse { status, session }
}
