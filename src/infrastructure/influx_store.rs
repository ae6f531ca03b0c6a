// InfluxDB-backed measurement store
use crate::application::error::DataError;
use crate::application::measurement_store::MeasurementStore;
use crate::domain::measurement::{Measurement, MeasurementId, MeasurementType};
use crate::domain::station::{Location, MeasurementStation};
use crate::infrastructure::config::InfluxSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct InfluxMeasurementStore {
    client: reqwest::Client,
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    measurement: String,
    station_measurement: String,
    history_days: u32,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxQLSeries {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

impl InfluxQLResponse {
    fn series(&self) -> impl Iterator<Item = &InfluxQLSeries> {
        self.results
            .first()
            .and_then(|r| r.series.as_ref())
            .into_iter()
            .flatten()
    }
}

/// Window, bucket width and bucket count of one aggregated series.
///
/// Buckets are aligned to the epoch while `now() - range` is not, so the
/// query can return one partial bucket more than `max_buckets`.
#[derive(Debug, Clone, Copy)]
struct Window {
    range: &'static str,
    bucket: &'static str,
    max_buckets: usize,
}

const LAST_HOUR_BY_MINUTE: Window = Window {
    range: "1h",
    bucket: "1m",
    max_buckets: 60,
};
const LAST_DAY_BY_HOUR: Window = Window {
    range: "24h",
    bucket: "1h",
    max_buckets: 24,
};
const LAST_MONTH_BY_DAY: Window = Window {
    range: "30d",
    bucket: "1d",
    max_buckets: 31,
};

impl InfluxMeasurementStore {
    pub fn new(settings: InfluxSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            measurement: settings.measurement,
            station_measurement: settings.station_measurement,
            history_days: settings.history_days,
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        tracing::debug!("Executing InfluxQL: {}", query);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        if let Some(error) = data.results.first().and_then(|r| r.error.as_ref()) {
            anyhow::bail!("InfluxDB query error: {}", error);
        }

        Ok(data)
    }

    async fn query(&self, query: &str) -> Result<InfluxQLResponse, DataError> {
        self.execute_query(query)
            .await
            .map_err(DataError::TransientUnavailable)
    }

    fn series_filter(&self, station_id: i32, species: MeasurementType) -> String {
        format!(
            "\"station_id\" = '{}' AND \"species\" = '{}'",
            station_id, species
        )
    }

    fn aggregate_query(
        &self,
        station_id: i32,
        species: MeasurementType,
        range: &str,
        bucket: &str,
    ) -> String {
        format!(
            "SELECT mean(\"value\") AS \"average\", min(\"value\") AS \"min\", max(\"value\") AS \"max\", count(\"value\") AS \"count\" \
             FROM \"{}\" WHERE {} AND time >= now() - {} GROUP BY time({}) fill(none)",
            self.measurement,
            self.series_filter(station_id, species),
            range,
            bucket
        )
    }

    async fn aggregates(
        &self,
        station_id: i32,
        species: MeasurementType,
        window: Window,
    ) -> Result<Vec<Measurement>, DataError> {
        let query = self.aggregate_query(station_id, species, window.range, window.bucket);
        let response = self.query(&query).await?;
        let measurements = parse_aggregates(&response, station_id, species);
        Ok(keep_latest(measurements, window.max_buckets))
    }
}

#[async_trait]
impl MeasurementStore for InfluxMeasurementStore {
    async fn get_station(&self, station_id: i32) -> Result<MeasurementStation, DataError> {
        let query = format!(
            "SELECT \"name\", \"latitude\", \"longitude\" FROM \"{}\" WHERE \"station_id\" = '{}' ORDER BY time DESC LIMIT 1",
            self.station_measurement, station_id
        );
        let response = self.query(&query).await?;

        parse_station(&response, station_id)
            .ok_or_else(|| DataError::NotFound(format!("station {}", station_id)))
    }

    async fn get_last(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Option<Measurement>, DataError> {
        let query = format!(
            "SELECT \"value\" FROM \"{}\" WHERE {} ORDER BY time DESC LIMIT 1",
            self.measurement,
            self.series_filter(station_id, species)
        );
        let response = self.query(&query).await?;
        Ok(parse_last(&response, station_id, species))
    }

    async fn get_last_hour_by_minute(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError> {
        self.aggregates(station_id, species, LAST_HOUR_BY_MINUTE).await
    }

    async fn get_last_day_by_hour(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError> {
        self.aggregates(station_id, species, LAST_DAY_BY_HOUR).await
    }

    async fn get_last_month_by_day(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError> {
        self.aggregates(station_id, species, LAST_MONTH_BY_DAY).await
    }

    async fn get_all_months(
        &self,
        station_id: i32,
        species: MeasurementType,
    ) -> Result<Vec<Measurement>, DataError> {
        // InfluxQL cannot bucket by calendar month, so daily buckets are folded here
        let range = format!("{}d", self.history_days);
        let query = self.aggregate_query(station_id, species, &range, "1d");
        let response = self.query(&query).await?;
        let days = parse_aggregates(&response, station_id, species);

        tracing::debug!(
            "Folding {} daily buckets into months for station {} {}",
            days.len(),
            station_id,
            species
        );
        Ok(fold_into_months(days))
    }
}

fn parse_time(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let time = DateTime::parse_from_rfc3339(value.as_str()?).ok()?;
    Some(time.with_timezone(&Utc))
}

fn parse_station(response: &InfluxQLResponse, station_id: i32) -> Option<MeasurementStation> {
    let series = response.series().next()?;
    let row = series.values.first()?;

    let latitude = row.get(series.column("latitude")?)?.as_f64()?;
    let longitude = row.get(series.column("longitude")?)?.as_f64()?;
    let name = series
        .column("name")
        .and_then(|idx| row.get(idx))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(MeasurementStation::new(
        station_id,
        name,
        Location::new(latitude, longitude),
    ))
}

fn parse_last(
    response: &InfluxQLResponse,
    station_id: i32,
    species: MeasurementType,
) -> Option<Measurement> {
    let series = response.series().next()?;
    let row = series.values.first()?;

    let time = parse_time(row.get(series.column("time")?)?)?;
    let value = row.get(series.column("value")?)?.as_f64()?;

    Some(
        Measurement::new(MeasurementId::at(station_id, species, time), value, value, value, 1)
            .with_timestamp(time),
    )
}

/// Rows of `time, average, min, max, count` in the order InfluxDB returned them.
fn parse_aggregates(
    response: &InfluxQLResponse,
    station_id: i32,
    species: MeasurementType,
) -> Vec<Measurement> {
    let mut measurements = Vec::new();

    for series in response.series() {
        let (Some(time_idx), Some(avg_idx), Some(min_idx), Some(max_idx), Some(count_idx)) = (
            series.column("time"),
            series.column("average"),
            series.column("min"),
            series.column("max"),
            series.column("count"),
        ) else {
            tracing::warn!("Unexpected aggregate columns: {:?}", series.columns);
            continue;
        };

        for row in &series.values {
            let field = |idx: usize| row.get(idx).and_then(|v| v.as_f64());

            if let (Some(time), Some(average), Some(min), Some(max), Some(count)) = (
                row.get(time_idx).and_then(parse_time),
                field(avg_idx),
                field(min_idx),
                field(max_idx),
                row.get(count_idx).and_then(|v| v.as_i64()),
            ) {
                let id = MeasurementId::at(station_id, species, time);
                measurements.push(Measurement::new(id, average, min, max, count).with_timestamp(time));
            }
        }
    }

    measurements
}

/// Drop the oldest buckets of a chronological series beyond `max_buckets`.
fn keep_latest(mut measurements: Vec<Measurement>, max_buckets: usize) -> Vec<Measurement> {
    let excess = measurements.len().saturating_sub(max_buckets);
    measurements.drain(..excess);
    measurements
}

/// Fold chronological daily aggregates into calendar months.
fn fold_into_months(days: Vec<Measurement>) -> Vec<Measurement> {
    let mut months: Vec<Measurement> = Vec::new();
    // Sum of average * count for the month under construction
    let mut weighted = 0.0;

    for day in days {
        let same_month = months
            .last()
            .is_some_and(|m| m.id.year == day.id.year && m.id.month == day.id.month);

        if same_month {
            if let Some(month) = months.last_mut() {
                weighted += day.average * day.count as f64;
                month.min = month.min.min(day.min);
                month.max = month.max.max(day.max);
                month.count += day.count;
                if month.count > 0 {
                    month.average = weighted / month.count as f64;
                }
            }
            continue;
        }

        weighted = day.average * day.count as f64;
        let start = Utc
            .with_ymd_and_hms(day.id.year, day.id.month, 1, 0, 0, 0)
            .single();
        months.push(Measurement {
            timestamp: start,
            ..day
        });
    }

    months
}
