// Application state for HTTP handlers
use crate::application::display_session::{SessionLimits, SessionRegistry};
use crate::application::sensor_service::SensorService;
use crate::domain::date_range::DateRange;

pub struct AppState {
    pub sensor_service: SensorService,
    pub sessions: SessionRegistry,
    /// Window used when a request names no range.
    pub default_range: DateRange,
}

impl AppState {
    pub fn new(
        sensor_service: SensorService,
        default_range: DateRange,
        session_limits: SessionLimits,
    ) -> Self {
        Self {
            sensor_service,
            sessions: SessionRegistry::new(default_range.clone(), session_limits),
            default_range,
        }
    }
}
