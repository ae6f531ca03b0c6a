// Lookup of external reference stations and their history
use crate::application::error::DataError;
use crate::domain::measurement::{HistoryType, MeasurementHistory};
use crate::domain::station::{Location, OtherMeasurementStation};
use async_trait::async_trait;

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Closest reference station; `DataError::LookupFailure` when none can be determined
    async fn nearest_station(&self, location: &Location)
        -> Result<OtherMeasurementStation, DataError>;

    async fn six_months_ago(
        &self,
        country: &str,
        city: &str,
        history_type: HistoryType,
    ) -> Result<MeasurementHistory, DataError>;

    async fn one_year_ago(
        &self,
        country: &str,
        city: &str,
        history_type: HistoryType,
    ) -> Result<MeasurementHistory, DataError>;
}
