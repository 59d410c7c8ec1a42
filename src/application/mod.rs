// Application layer - Use cases and collaborator traits
pub mod base_search;
pub mod credentials;
pub mod dashboard_repository;
pub mod discovery;
pub mod error;
pub mod execution_store;
pub mod execution_tracker;
pub mod parameter_builder;
pub mod progress_publisher;
pub mod search_gateway;
pub mod token_extractor;
pub mod token_resolver;

#[cfg(test)]
pub mod test_support;
