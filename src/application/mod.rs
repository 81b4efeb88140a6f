// Application layer - Pipeline stages and session orchestration
pub mod calibration;
pub mod display_session;
pub mod document_store;
pub mod measurement_parser;
pub mod pagination;
pub mod range_filter;
pub mod sensor_service;
