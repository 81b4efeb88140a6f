// Infrastructure layer - External dependencies and adapters
pub mod chunked_csv;
pub mod config;
pub mod csv_export;
pub mod firestore_repository;
pub mod http_response;
pub mod json_store;
