// Snapshot domain models
use super::measurement::{Measurement, MeasurementType};
use serde::Serialize;
use std::collections::HashMap;

/// Local time series of one species at one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementDataSet {
    pub last: Option<Measurement>,
    pub last_hour_by_minute: Vec<Measurement>,
    pub last_day_by_hour: Vec<Measurement>,
    pub last_month_by_day: Vec<Measurement>,
    pub all_months: Vec<Measurement>,
}

/// One dataset per declared measurement type.
pub type Snapshot = HashMap<MeasurementType, MeasurementDataSet>;
