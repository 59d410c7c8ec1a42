// Domain layer - Dashboard graph, execution records and lifecycle events
pub mod dashboard;
pub mod event;
pub mod execution;
pub mod refresh;
pub mod search;
pub mod token;
