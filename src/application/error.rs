// Error types shared by the collaborators and the snapshot service
use crate::domain::measurement::MeasurementType;
use std::fmt;

/// Failure reported by a MeasurementStore or HistoryProvider.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("reference station lookup failed: {0}")]
    LookupFailure(String),
    #[error("collaborator unavailable: {0}")]
    TransientUnavailable(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    LookupFailure,
    TransientUnavailable,
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::NotFound(_) => ErrorKind::NotFound,
            DataError::LookupFailure(_) => ErrorKind::LookupFailure,
            DataError::TransientUnavailable(_) => ErrorKind::TransientUnavailable,
        }
    }
}

/// Step of dataset assembly that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Station,
    NearestStation,
    SixMonthsAgo,
    OneYearAgo,
    Last,
    LastHourByMinute,
    LastDayByHour,
    LastMonthByDay,
    AllMonths,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Station => "station",
            Stage::NearestStation => "nearest-station",
            Stage::SixMonthsAgo => "six-months-ago",
            Stage::OneYearAgo => "one-year-ago",
            Stage::Last => "last",
            Stage::LastHourByMinute => "last-hour-by-minute",
            Stage::LastDayByHour => "last-day-by-hour",
            Stage::LastMonthByDay => "last-month-by-day",
            Stage::AllMonths => "all-months",
        };
        f.write_str(name)
    }
}

/// Snapshot failure, naming the species and stage that aborted it.
#[derive(Debug, thiserror::Error)]
#[error("snapshot of station {station_id} failed for {species} at {stage}: {source}")]
pub struct SnapshotError {
    pub station_id: i32,
    pub species: MeasurementType,
    pub stage: Stage,
    #[source]
    pub source: DataError,
}

impl SnapshotError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
