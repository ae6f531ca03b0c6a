// Registration service client - nearest reference station and its history
use crate::application::error::DataError;
use crate::application::history_provider::HistoryProvider;
use crate::domain::measurement::{HistoryType, MeasurementHistory};
use crate::domain::station::{Location, OtherMeasurementStation};
use crate::infrastructure::config::RegistrationSettings;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RegistrationClient {
    client: reqwest::Client,
    base_url: String,
}

/// Historical period offered by the registration service
#[derive(Debug, Clone, Copy)]
enum Period {
    SixMonthsAgo,
    OneYearAgo,
}

impl Period {
    fn path(self) -> &'static str {
        match self {
            Period::SixMonthsAgo => "six-months-ago",
            Period::OneYearAgo => "one-year-ago",
        }
    }
}

impl RegistrationClient {
    pub fn new(settings: RegistrationSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build registration service client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn nearest_station_url(&self, location: &Location) -> String {
        format!(
            "{}/v1/stations/nearest?latitude={}&longitude={}",
            self.base_url, location.latitude, location.longitude
        )
    }

    fn history_url(&self, country: &str, city: &str, history_type: HistoryType, period: Period) -> String {
        format!(
            "{}/v1/history/{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(country),
            urlencoding::encode(city),
            history_type,
            period.path()
        )
    }

    /// GET a JSON document; `Ok(None)` when the service answers 404.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> anyhow::Result<Option<T>> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to registration service")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Registration service failed with status {}: {}", status, body);
        }

        let data = response
            .json::<T>()
            .await
            .context("Failed to parse registration service response")?;

        Ok(Some(data))
    }

    async fn history(
        &self,
        country: &str,
        city: &str,
        history_type: HistoryType,
        period: Period,
    ) -> Result<MeasurementHistory, DataError> {
        let url = self.history_url(country, city, history_type, period);

        self.get_json::<MeasurementHistory>(&url)
            .await
            .map_err(DataError::TransientUnavailable)?
            .ok_or_else(|| {
                DataError::NotFound(format!(
                    "{} history for {}/{} {}",
                    history_type,
                    country,
                    city,
                    period.path()
                ))
            })
    }
}

#[async_trait]
impl HistoryProvider for RegistrationClient {
    async fn nearest_station(
        &self,
        location: &Location,
    ) -> Result<OtherMeasurementStation, DataError> {
        let url = self.nearest_station_url(location);

        match self.get_json::<OtherMeasurementStation>(&url).await {
            Ok(Some(station)) => Ok(station),
            Ok(None) => Err(DataError::LookupFailure(format!(
                "no reference station near ({}, {})",
                location.latitude, location.longitude
            ))),
            Err(e) => Err(DataError::TransientUnavailable(e)),
        }
    }

    async fn six_months_ago(
        &self,
        country: &str,
        city: &str,
        history_type: HistoryType,
    ) -> Result<MeasurementHistory, DataError> {
        self.history(country, city, history_type, Period::SixMonthsAgo)
            .await
    }

    async fn one_year_ago(
        &self,
        country: &str,
        city: &str,
        history_type: HistoryType,
    ) -> Result<MeasurementHistory, DataError> {
        self.history(country, city, history_type, Period::OneYearAgo)
            .await
    }
}
