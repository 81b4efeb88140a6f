// Domain layer - Sensor readings and derived values
pub mod date_range;
pub mod document;
pub mod export;
pub mod reading;
pub mod statistics;
pub mod time_basis;
