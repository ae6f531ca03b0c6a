// Measurement domain models
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Species tracked by a monitoring station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    #[serde(rename = "PM1_0")]
    Pm1_0,
    #[serde(rename = "PM2_5")]
    Pm2_5,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "OXIDISING")]
    Oxidising,
    #[serde(rename = "REDUCING")]
    Reducing,
    #[serde(rename = "NH3")]
    Nh3,
    #[serde(rename = "TEMPERATURE")]
    Temperature,
    #[serde(rename = "HUMIDITY")]
    Humidity,
    #[serde(rename = "PRESSURE")]
    Pressure,
}

/// Species the external provider keeps historical records for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryType {
    Pm25,
    Pm10,
    No2,
    Co,
    Temperature,
    Pressure,
}

/// Historical counterpart of every measurement type, if any.
const HISTORY_TYPES: [(MeasurementType, Option<HistoryType>); 9] = [
    (MeasurementType::Pm1_0, None),
    (MeasurementType::Pm2_5, Some(HistoryType::Pm25)),
    (MeasurementType::Pm10, Some(HistoryType::Pm10)),
    (MeasurementType::Oxidising, Some(HistoryType::No2)),
    (MeasurementType::Reducing, Some(HistoryType::Co)),
    (MeasurementType::Nh3, None),
    (MeasurementType::Temperature, Some(HistoryType::Temperature)),
    (MeasurementType::Humidity, None),
    (MeasurementType::Pressure, Some(HistoryType::Pressure)),
];

impl MeasurementType {
    pub const ALL: [MeasurementType; 9] = [
        MeasurementType::Pm1_0,
        MeasurementType::Pm2_5,
        MeasurementType::Pm10,
        MeasurementType::Oxidising,
        MeasurementType::Reducing,
        MeasurementType::Nh3,
        MeasurementType::Temperature,
        MeasurementType::Humidity,
        MeasurementType::Pressure,
    ];

    pub fn history_type(self) -> Option<HistoryType> {
        HISTORY_TYPES
            .iter()
            .find(|(species, _)| *species == self)
            .and_then(|(_, history)| *history)
    }

    /// Canonical name, also used as the `species` tag in the store
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementType::Pm1_0 => "PM1_0",
            MeasurementType::Pm2_5 => "PM2_5",
            MeasurementType::Pm10 => "PM10",
            MeasurementType::Oxidising => "OXIDISING",
            MeasurementType::Reducing => "REDUCING",
            MeasurementType::Nh3 => "NH3",
            MeasurementType::Temperature => "TEMPERATURE",
            MeasurementType::Humidity => "HUMIDITY",
            MeasurementType::Pressure => "PRESSURE",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HistoryType {
    /// Tag used by the history provider
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryType::Pm25 => "pm25",
            HistoryType::Pm10 => "pm10",
            HistoryType::No2 => "no2",
            HistoryType::Co => "co",
            HistoryType::Temperature => "temperature",
            HistoryType::Pressure => "pressure",
        }
    }
}

impl fmt::Display for HistoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of one monthly aggregate for a station and species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementId {
    pub station_id: i32,
    pub year: i32,
    pub month: u32,
    pub species: String,
}

impl MeasurementId {
    pub fn new(station_id: i32, year: i32, month: u32, species: MeasurementType) -> Self {
        Self {
            station_id,
            year,
            month,
            species: species.to_string(),
        }
    }

    /// Id for the calendar month `months_back` months before `now` (UTC).
    pub fn months_before(
        station_id: i32,
        species: MeasurementType,
        now: DateTime<Utc>,
        months_back: u32,
    ) -> Self {
        let (year, month) = shift_month(now.year(), now.month(), months_back);
        Self::new(station_id, year, month, species)
    }

    pub fn at(station_id: i32, species: MeasurementType, time: DateTime<Utc>) -> Self {
        Self::new(station_id, time.year(), time.month(), species)
    }
}

fn shift_month(year: i32, month: u32, months_back: u32) -> (i32, u32) {
    let total = year as i64 * 12 + (month as i64 - 1) - months_back as i64;
    (total.div_euclid(12) as i32, total.rem_euclid(12) as u32 + 1)
}

/// A single aggregated statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: MeasurementId,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: i64,
    /// Start of the bucket this aggregate covers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Measurement {
    pub fn new(id: MeasurementId, average: f64, min: f64, max: f64, count: i64) -> Self {
        Self {
            id,
            average,
            min,
            max,
            count,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The median of the external record becomes the average.
    pub fn from_history(id: MeasurementId, history: &MeasurementHistory) -> Self {
        Self::new(id, history.median, history.min, history.max, history.count)
    }
}

/// Aggregate returned by the external history provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasurementHistory {
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: i64,
}
