// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod credential_store;
pub mod event_stream;
pub mod file_dashboards;
pub mod http_response;
pub mod memory_store;
pub mod splunk_gateway;
