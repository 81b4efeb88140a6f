// Display sessions - Per-client view state with stale-run suppression
use crate::application::calibration::RangeCalibrator;
use crate::application::document_store::StoreError;
use crate::application::range_filter::filter_series;
use crate::application::sensor_service::SensorService;
use crate::domain::date_range::DateRange;
use crate::domain::reading::{BatteryReport, ReadingSeries};
use crate::domain::statistics::Statistics;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// What the session currently displays for its selected tag.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub tag_id: String,
    pub range: DateRange,
    pub has_data: bool,
    pub readings: ReadingSeries,
    pub statistics: Statistics,
    pub battery: BatteryReport,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub selected_tag: Option<String>,
    pub range: DateRange,
    pub calibrated: bool,
    pub generation: u64,
    pub view: Option<SessionView>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Applied(SessionView),
    /// A newer run was started before this one finished; its result was dropped.
    Superseded,
    /// The store holds no tags to select.
    NoTags,
}

struct SessionState {
    selected_tag: Option<String>,
    range: DateRange,
    calibrator: RangeCalibrator,
    view: Option<SessionView>,
}

/// Inputs of one run, captured together with its ticket.
struct RunPlan {
    ticket: u64,
    tag_id: String,
    range: DateRange,
    calibrated: bool,
}

/// State of one display session.
///
/// Every state change issues a new generation ticket under the state lock.
/// A run applies its result only if its ticket is still the newest, so rapid
/// tag or range changes can never be overwritten by a slower earlier run.
///
/// The selected tag and range record the latest request and stay in place
/// when its load fails; `view` keeps the last applied result, so after a
/// failure the two may name different tags until a reload succeeds.
pub struct DisplaySession {
    generation: AtomicU64,
    state: Mutex<SessionState>,
}

impl DisplaySession {
    pub fn new(default_range: DateRange) -> Self {
        Self {
            generation: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                selected_tag: None,
                range: default_range,
                calibrator: RangeCalibrator::default(),
                view: None,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            selected_tag: state.selected_tag.clone(),
            range: state.range.clone(),
            calibrated: state.calibrator.is_calibrated(),
            generation: self.generation.load(Ordering::SeqCst),
            view: state.view.clone(),
        }
    }

    /// Switch to `tag_id`; the next load calibrates the range again.
    pub async fn select_tag(
        &self,
        service: &SensorService,
        tag_id: &str,
    ) -> Result<RunOutcome, StoreError> {
        let plan = self.plan(|state| {
            state.selected_tag = Some(tag_id.to_string());
            state.calibrator.reset();
        });
        self.execute(service, plan).await
    }

    /// Apply a user-chosen range; it is never overridden by calibration.
    pub async fn set_range(
        &self,
        service: &SensorService,
        range: DateRange,
    ) -> Result<RunOutcome, StoreError> {
        let plan = self.plan(|state| {
            state.range = range;
            state.calibrator.lock();
        });
        self.execute(service, plan).await
    }

    /// Re-run the pipeline, selecting the first known tag if none is selected.
    pub async fn reload(&self, service: &SensorService) -> Result<RunOutcome, StoreError> {
        let needs_tag = self.lock().selected_tag.is_none();
        let first_tag = if needs_tag {
            match service.list_tags().await?.into_iter().next() {
                Some(tag) => Some(tag),
                None => return Ok(RunOutcome::NoTags),
            }
        } else {
            None
        };

        let plan = self.plan(|state| {
            if state.selected_tag.is_none() {
                state.selected_tag = first_tag;
            }
        });
        self.execute(service, plan).await
    }

    fn plan(&self, change: impl FnOnce(&mut SessionState)) -> Option<RunPlan> {
        let mut state = self.lock();
        change(&mut state);
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        state.selected_tag.clone().map(|tag_id| RunPlan {
            ticket,
            tag_id,
            range: state.range.clone(),
            calibrated: state.calibrator.is_calibrated(),
        })
    }

    async fn execute(
        &self,
        service: &SensorService,
        plan: Option<RunPlan>,
    ) -> Result<RunOutcome, StoreError> {
        let Some(plan) = plan else {
            return Ok(RunOutcome::NoTags);
        };

        // The calibrator needs the full series; afterwards the store can filter
        let loaded = if plan.calibrated {
            service.get_series(&plan.tag_id, &plan.range).await
        } else {
            service.load_unfiltered(&plan.tag_id).await
        };

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(_) if !self.is_current(plan.ticket) => {
                tracing::debug!("Discarding failed run {} for tag {}", plan.ticket, plan.tag_id);
                return Ok(RunOutcome::Superseded);
            }
            Err(e) => {
                tracing::error!("Load for tag {} failed, keeping previous view: {}", plan.tag_id, e);
                return Err(e);
            }
        };

        let mut state = self.lock();
        if !self.is_current(plan.ticket) {
            tracing::debug!("Discarding stale run {} for tag {}", plan.ticket, plan.tag_id);
            return Ok(RunOutcome::Superseded);
        }

        let basis = service.time_basis();
        let readings = if plan.calibrated {
            loaded.readings
        } else {
            if let Some(span) = state.calibrator.calibrate(&loaded.readings) {
                if let Some(range) = DateRange::from_span(span.start, span.end, basis) {
                    tracing::info!(
                        "Calibrated range for tag {} to {}..{}",
                        plan.tag_id,
                        range.start(),
                        range.end()
                    );
                    state.range = range;
                }
            }
            filter_series(&loaded.readings, &state.range, basis)
        };

        let view = SessionView {
            tag_id: plan.tag_id,
            range: state.range.clone(),
            has_data: !readings.is_empty(),
            statistics: service.statistics(&readings),
            readings,
            battery: BatteryReport::from(loaded.battery),
            generation: plan.ticket,
        };
        state.view = Some(view.clone());

        Ok(RunOutcome::Applied(view))
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bounds on how many sessions are kept and for how long.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub capacity: usize,
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            capacity: 1024,
            idle_ttl: Duration::from_secs(3600),
        }
    }
}

struct SessionEntry {
    session: Arc<DisplaySession>,
    last_used: Instant,
    /// Recency order for eviction; larger is more recent.
    touched: u64,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

impl RegistryState {
    fn touch(&mut self, session_id: &str, now: Instant) -> Option<Arc<DisplaySession>> {
        self.clock += 1;
        let touched = self.clock;
        let entry = self.entries.get_mut(session_id)?;
        entry.last_used = now;
        entry.touched = touched;
        Some(entry.session.clone())
    }
}

/// In-memory sessions keyed by client-chosen id.
///
/// Sessions idle for longer than `idle_ttl` are dropped, and once `capacity`
/// is reached the least recently used session makes room for a new one.
pub struct SessionRegistry {
    default_range: DateRange,
    limits: SessionLimits,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new(default_range: DateRange, limits: SessionLimits) -> Self {
        Self {
            default_range,
            limits,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Existing live session, without creating one.
    pub fn get(&self, session_id: &str) -> Option<Arc<DisplaySession>> {
        let now = Instant::now();
        let mut state = self.lock();
        if self.is_expired(&state, session_id, now) {
            state.entries.remove(session_id);
            return None;
        }
        state.touch(session_id, now)
    }

    pub fn get_or_create(&self, session_id: &str) -> Arc<DisplaySession> {
        let now = Instant::now();
        let mut state = self.lock();

        if !self.is_expired(&state, session_id, now) {
            if let Some(session) = state.touch(session_id, now) {
                return session;
            }
        }

        let idle_ttl = self.limits.idle_ttl;
        state
            .entries
            .retain(|_, entry| now.duration_since(entry.last_used) < idle_ttl);

        let capacity = self.limits.capacity.max(1);
        while state.entries.len() >= capacity {
            let Some(oldest) = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            tracing::debug!("Evicting display session {}", oldest);
            state.entries.remove(&oldest);
        }

        tracing::debug!("Opening display session {}", session_id);
        let session = Arc::new(DisplaySession::new(self.default_range.clone()));
        state.clock += 1;
        let touched = state.clock;
        state.entries.insert(
            session_id.to_string(),
            SessionEntry {
                session: session.clone(),
                last_used: now,
                touched,
            },
        );
        session
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn is_expired(&self, state: &RegistryState, session_id: &str, now: Instant) -> bool {
        state
            .entries
            .get(session_id)
            .is_some_and(|entry| now.duration_since(entry.last_used) >= self.limits.idle_ttl)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::document_store::{DocumentFilter, DocumentPage, DocumentStore, PageCursor};
    use crate::application::sensor_service::PipelineSettings;
    use crate::domain::document::{RawDailyDocument, RawMeasurement};
    use crate::domain::time_basis::TimeBasis;
    use crate::infrastructure::json_store::JsonDocumentStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn documents() -> Vec<RawDailyDocument> {
        vec![
            RawDailyDocument::new(
                "2025-03-02",
                "A",
                vec![RawMeasurement::new("08:00:00", "20.0", "40.0")],
            ),
            RawDailyDocument::new(
                "2025-03-05",
                "A",
                vec![RawMeasurement::new("18:00:00", "22.0", "42.0")],
            )
            .with_battery_level("77"),
            RawDailyDocument::new(
                "2024-11-20",
                "B",
                vec![RawMeasurement::new("12:00:00", "5.0", "80.0")],
            ),
        ]
    }

    fn service_over(store: Arc<dyn DocumentStore>) -> SensorService {
        SensorService::new(
            store,
            PipelineSettings {
                basis: TimeBasis::utc(),
                ..PipelineSettings::default()
            },
        )
    }

    fn default_range() -> DateRange {
        DateRange::parse("2025-01-01", "2025-12-31").unwrap()
    }

    fn applied(outcome: RunOutcome) -> SessionView {
        match outcome {
            RunOutcome::Applied(view) => view,
            other => panic!("expected applied run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_load_calibrates_range() {
        let service = service_over(Arc::new(JsonDocumentStore::from_documents(documents())));
        let session = DisplaySession::new(default_range());

        let view = applied(session.reload(&service).await.unwrap());
        assert_eq!(view.tag_id, "A");
        assert_eq!(view.range, DateRange::parse("2025-03-02", "2025-03-05").unwrap());
        assert_eq!(view.readings.len(), 2);
        assert_eq!(view.battery.status.level, Some(77));
        assert!(session.snapshot().calibrated);
    }

    #[tokio::test]
    async fn test_calibration_is_not_repeated_on_reload() {
        let store = Arc::new(JsonDocumentStore::from_documents(documents()));
        let service = service_over(store.clone());
        let session = DisplaySession::new(default_range());
        applied(session.reload(&service).await.unwrap());

        store.insert(RawDailyDocument::new(
            "2025-04-01",
            "A",
            vec![RawMeasurement::new("08:00:00", "30.0", "50.0")],
        ));

        let view = applied(session.reload(&service).await.unwrap());
        assert_eq!(view.range, DateRange::parse("2025-03-02", "2025-03-05").unwrap());
        assert_eq!(view.readings.len(), 2);
    }

    #[tokio::test]
    async fn test_manual_range_locks_calibration() {
        let service = service_over(Arc::new(JsonDocumentStore::from_documents(documents())));
        let session = DisplaySession::new(default_range());
        session.select_tag(&service, "A").await.unwrap();

        let manual = DateRange::parse("2025-03-05", "2025-03-31").unwrap();
        let view = applied(session.set_range(&service, manual.clone()).await.unwrap());
        assert_eq!(view.range, manual);
        assert_eq!(view.readings.len(), 1);

        // Switching tags recalibrates
        let view = applied(session.select_tag(&service, "B").await.unwrap());
        assert_eq!(view.range, DateRange::parse("2024-11-20", "2024-11-20").unwrap());
    }

    #[tokio::test]
    async fn test_empty_tag_yields_no_data_view() {
        let service = service_over(Arc::new(JsonDocumentStore::from_documents(documents())));
        let session = DisplaySession::new(default_range());

        let view = applied(session.select_tag(&service, "missing").await.unwrap());
        assert!(!view.has_data);
        assert_eq!(view.statistics, Statistics::empty());
        assert_eq!(view.range, default_range());
        assert!(!session.snapshot().calibrated);
    }

    #[tokio::test]
    async fn test_no_tags_in_store() {
        let service = service_over(Arc::new(JsonDocumentStore::from_documents(Vec::new())));
        let session = DisplaySession::new(default_range());
        assert!(matches!(
            session.reload(&service).await.unwrap(),
            RunOutcome::NoTags
        ));
    }

    /// Holds fetches for tag "A" until released; may fail them.
    struct GatedStore {
        inner: JsonDocumentStore,
        gate: Notify,
        fail_gated: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn list_tag_ids(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_tag_ids().await
        }

        async fn fetch_documents(
            &self,
            filter: &DocumentFilter,
            cursor: Option<&PageCursor>,
            page_size: usize,
        ) -> Result<DocumentPage, StoreError> {
            if filter.tag_id.as_deref() == Some("A") {
                self.gate.notified().await;
                if self.fail_gated.load(Ordering::SeqCst) {
                    return Err(StoreError::Transport("timeout".to_string()));
                }
            }
            self.inner.fetch_documents(filter, cursor, page_size).await
        }
    }

    async fn race(fail_slow_run: bool) -> (RunOutcome, RunOutcome, SessionSnapshot) {
        let store = Arc::new(GatedStore {
            inner: JsonDocumentStore::from_documents(documents()),
            gate: Notify::new(),
            fail_gated: AtomicBool::new(fail_slow_run),
        });
        let service = service_over(store.clone());
        let session = Arc::new(DisplaySession::new(default_range()));

        let slow = {
            let session = session.clone();
            let service = service.clone();
            tokio::spawn(async move { session.select_tag(&service, "A").await })
        };
        // Let the slow run take its ticket and block on the store
        tokio::task::yield_now().await;
        while session.snapshot().generation < 1 {
            tokio::task::yield_now().await;
        }

        let fast = session.select_tag(&service, "B").await.unwrap();
        store.gate.notify_one();
        let slow = slow.await.unwrap().unwrap();

        (slow, fast, session.snapshot())
    }

    #[tokio::test]
    async fn test_superseded_run_is_discarded() {
        let (slow, fast, snapshot) = race(false).await;

        assert!(matches!(slow, RunOutcome::Superseded));
        assert_eq!(applied(fast).tag_id, "B");
        assert_eq!(snapshot.view.unwrap().tag_id, "B");
        assert_eq!(snapshot.selected_tag.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_superseded_failure_is_silent() {
        let (slow, _, snapshot) = race(true).await;

        assert!(matches!(slow, RunOutcome::Superseded));
        assert_eq!(snapshot.view.unwrap().tag_id, "B");
    }

    #[tokio::test]
    async fn test_current_failure_keeps_previous_view() {
        let store = Arc::new(GatedStore {
            inner: JsonDocumentStore::from_documents(documents()),
            gate: Notify::new(),
            fail_gated: AtomicBool::new(true),
        });
        let service = service_over(store.clone());
        let session = DisplaySession::new(default_range());
        applied(session.select_tag(&service, "B").await.unwrap());

        store.gate.notify_one();
        let result = session.select_tag(&service, "A").await;

        assert!(matches!(result, Err(StoreError::Transport(_))));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.selected_tag.as_deref(), Some("A"));
        assert_eq!(snapshot.view.unwrap().tag_id, "B");

        // The kept selection is retried by the next reload
        store.fail_gated.store(false, Ordering::SeqCst);
        store.gate.notify_one();
        let view = applied(session.reload(&service).await.unwrap());
        assert_eq!(view.tag_id, "A");
    }

    #[test]
    fn test_registry_reuses_sessions() {
        let registry = SessionRegistry::new(default_range(), SessionLimits::default());
        let first = registry.get_or_create("tab-1");
        let again = registry.get_or_create("tab-1");
        let other = registry.get_or_create("tab-2");

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(Arc::ptr_eq(&registry.get("tab-1").unwrap(), &first));
    }

    #[test]
    fn test_lookup_does_not_create_sessions() {
        let registry = SessionRegistry::new(default_range(), SessionLimits::default());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_evicts_least_recently_used_at_capacity() {
        let registry = SessionRegistry::new(
            default_range(),
            SessionLimits {
                capacity: 2,
                idle_ttl: Duration::from_secs(3600),
            },
        );
        registry.get_or_create("a");
        registry.get_or_create("b");
        registry.get("a");
        registry.get_or_create("c");

        assert_eq!(registry.len(), 2);
        assert!(registry.get("b").is_none());
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_some());

        for i in 0..1000 {
            registry.get_or_create(&format!("s{i}"));
        }
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_idle_sessions_expire() {
        let registry = SessionRegistry::new(
            default_range(),
            SessionLimits {
                capacity: 16,
                idle_ttl: Duration::ZERO,
            },
        );
        registry.get_or_create("a");
        assert!(registry.get("a").is_none());

        registry.get_or_create("b");
        registry.get_or_create("c");
        // Creating "c" swept the idle "b"
        assert_eq!(registry.len(), 1);
    }
}
