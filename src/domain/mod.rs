// Domain layer - Pure data types
pub mod measurement;
pub mod snapshot;
pub mod station;
