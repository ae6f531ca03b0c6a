// Repository trait for local measurement data
use crate::application::error::DataError;
use crate::domain::measurement::{Measurement, MeasurementType};
use crate::domain::station::MeasurementStation;
use async_trait::async_trait;

#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Station metadata; `DataError::NotFound` for unknown ids
    async fn get_station(&self, station_id: i32) -> Result<MeasurementStation, DataError>;

    /// Most recent reading, if the station ever reported this species
    async fn get_last(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Option<Measurement>, DataError>;

    /// Per-minute aggregates over the last hour, oldest first
    async fn get_last_hour_by_minute(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError>;

    /// Per-hour aggregates over the last day, oldest first
    async fn get_last_day_by_hour(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError>;

    /// Per-day aggregates over the last month, oldest first
    async fn get_last_month_by_day(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError>;

    /// Per-month aggregates over the station's lifetime, oldest first.
    ///
    /// Implementations may cap how far back this reaches; the InfluxDB store
    /// stops at `influx.history_days` (default 3650 days).
    async fn get_all_months(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError>;
}
