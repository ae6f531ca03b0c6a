// Station domain models
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A station whose readings live in the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementStation {
    pub id: i32,
    pub name: String,
    pub location: Location,
}

impl MeasurementStation {
    pub fn new(id: i32, name: String, location: Location) -> Self {
        Self { id, name, location }
    }
}

/// External reference station; country and city key its historical data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OtherMeasurementStation {
    pub country: String,
    pub city: String,
}

impl OtherMeasurementStation {
    #[allow(dead_code)] // Built from JSON outside of tests
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
        }
    }
}
