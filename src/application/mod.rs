// Application layer - Use cases and collaborator traits
pub mod error;
pub mod history_provider;
pub mod measurement_store;
pub mod snapshot_service;
