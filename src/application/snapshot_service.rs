// Snapshot service - Use case for assembling a station snapshot
use crate::application::error::{DataError, SnapshotError, Stage};
use crate::application::history_provider::HistoryProvider;
use crate::application::measurement_store::MeasurementStore;
use crate::domain::measurement::{HistoryType, Measurement, MeasurementId, MeasurementType};
use crate::domain::snapshot::{MeasurementDataSet, Snapshot};
use crate::domain::station::OtherMeasurementStation;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;

const SIX_MONTHS: u32 = 6;
const ONE_YEAR: u32 = 12;

/// Comparison points taken from the reference station's history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalComparison {
    pub six_months_ago: Measurement,
    pub one_year_ago: Measurement,
}

#[derive(Clone)]
pub struct SnapshotService {
    store: Arc<dyn MeasurementStore>,
    history: Arc<dyn HistoryProvider>,
    parallel_species: bool,
}

impl SnapshotService {
    pub fn new(store: Arc<dyn MeasurementStore>, history: Arc<dyn HistoryProvider>) -> Self {
        Self {
            store,
            history,
            parallel_species: false,
        }
    }

    /// Build the per-species datasets concurrently instead of one after another.
    pub fn with_parallel_species(mut self, parallel_species: bool) -> Self {
        self.parallel_species = parallel_species;
        self
    }

    /// Build a dataset for every measurement type. Any failure aborts the whole snapshot.
    pub async fn build_snapshot(
        &self,
        station_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, SnapshotError> {
        tracing::debug!(
            "Building snapshot for station {} (parallel={})",
            station_id,
            self.parallel_species
        );

        if self.parallel_species {
            let datasets = try_join_all(MeasurementType::ALL.into_iter().map(|species| async move {
                let dataset = self.build_dataset(station_id, species, now).await?;
                Ok::<_, SnapshotError>((species, dataset))
            }))
            .await?;

            return Ok(datasets.into_iter().collect());
        }

        let mut snapshot = Snapshot::with_capacity(MeasurementType::ALL.len());
        for species in MeasurementType::ALL {
            let dataset = self.build_dataset(station_id, species, now).await?;
            snapshot.insert(species, dataset);
        }

        Ok(snapshot)
    }

    async fn build_dataset(
        &self,
        station_id: i32,
        species: MeasurementType,
        now: DateTime<Utc>,
    ) -> Result<MeasurementDataSet, SnapshotError> {
        let fail = |stage: Stage| {
            move |source: DataError| SnapshotError {
                station_id,
                species,
                stage,
                source,
            }
        };

        let station = self
            .store
            .get_station(station_id)
            .await
            .map_err(fail(Stage::Station))?;

        let reference = self
            .history
            .nearest_station(&station.location)
            .await
            .map_err(fail(Stage::NearestStation))?;

        if let Some(history_type) = species.history_type() {
            // Not part of the dataset; the lookups still have to succeed.
            let comparison = self
                .historical_comparison(station_id, species, history_type, &reference, now)
                .await?;
            tracing::debug!(
                "Historical comparison for station {} {} via {}/{}: {:?}",
                station_id,
                species,
                reference.country,
                reference.city,
                comparison
            );
        }

        let last = self
            .store
            .get_last(station_id, species)
            .await
            .map_err(fail(Stage::Last))?;
        let last_hour_by_minute = self
            .store
            .get_last_hour_by_minute(station_id, species)
            .await
            .map_err(fail(Stage::LastHourByMinute))?;
        let last_day_by_hour = self
            .store
            .get_last_day_by_hour(station_id, species)
            .await
            .map_err(fail(Stage::LastDayByHour))?;
        let last_month_by_day = self
            .store
            .get_last_month_by_day(station_id, species)
            .await
            .map_err(fail(Stage::LastMonthByDay))?;
        let all_months = self
            .store
            .get_all_months(station_id, species)
            .await
            .map_err(fail(Stage::AllMonths))?;

        Ok(MeasurementDataSet {
            last,
            last_hour_by_minute,
            last_day_by_hour,
            last_month_by_day,
            all_months,
        })
    }

    /// Six-months-ago and one-year-ago aggregates, keyed by the months they
    /// describe relative to `now`.
    async fn historical_comparison(
        &self,
        station_id: i32,
        species: MeasurementType,
        history_type: HistoryType,
        reference: &OtherMeasurementStation,
        now: DateTime<Utc>,
    ) -> Result<HistoricalComparison, SnapshotError> {
        let fail = |stage: Stage| {
            move |source: DataError| SnapshotError {
                station_id,
                species,
                stage,
                source,
            }
        };

        let six = self
            .history
            .six_months_ago(&reference.country, &reference.city, history_type)
            .await
            .map_err(fail(Stage::SixMonthsAgo))?;
        let six_months_ago = Measurement::from_history(
            MeasurementId::months_before(station_id, species, now, SIX_MONTHS),
            &six,
        );

        let year = self
            .history
            .one_year_ago(&reference.country, &reference.city, history_type)
            .await
            .map_err(fail(Stage::OneYearAgo))?;
        let one_year_ago = Measurement::from_history(
            MeasurementId::months_before(station_id, species, now, ONE_YEAR),
            &year,
        );

        Ok(HistoricalComparison {
            six_months_ago,
            one_year_ago,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::ErrorKind;
    use crate::domain::measurement::MeasurementHistory;
    use crate::domain::station::{Location, MeasurementStation};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum HistoryCall {
        Nearest(Location),
        SixMonthsAgo(String, String, HistoryType),
        OneYearAgo(String, String, HistoryType),
    }

    struct FakeStore {
        stations: HashMap<i32, MeasurementStation>,
        failing_stage: Option<Stage>,
    }

    impl FakeStore {
        fn with_station(id: i32, location: Location) -> Self {
            let mut stations = HashMap::new();
            stations.insert(id, MeasurementStation::new(id, format!("station-{}", id), location));
            Self {
                stations,
                failing_stage: None,
            }
        }

        fn series(station_id: i32, species: MeasurementType, len: usize) -> Vec<Measurement> {
            (0..len)
                .map(|i| {
                    Measurement::new(
                        MeasurementId::new(station_id, 2024, 3, species),
                        i as f64,
                        0.0,
                        i as f64 * 2.0,
                        1,
                    )
                })
                .collect()
        }

        fn check(&self, stage: Stage) -> Result<(), DataError> {
            if self.failing_stage == Some(stage) {
                return Err(DataError::TransientUnavailable(anyhow::anyhow!("store down")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MeasurementStore for FakeStore {
        async fn get_station(&self, station_id: i32) -> Result<MeasurementStation, DataError> {
            self.stations
                .get(&station_id)
                .cloned()
                .ok_or_else(|| DataError::NotFound(format!("station {}", station_id)))
        }

        async fn get_last(
            &self,
            station_id: i32,
            species: MeasurementType,
        ) -> Result<Option<Measurement>, DataError> {
            self.check(Stage::Last)?;
            Ok(Self::series(station_id, species, 1).pop())
        }

        async fn get_last_hour_by_minute(
            &self,
            station_id: i32,
            species: MeasurementType,
        ) -> Result<Vec<Measurement>, DataError> {
            self.check(Stage::LastHourByMinute)?;
            Ok(Self::series(station_id, species, 60))
        }

        async fn get_last_day_by_hour(
            &self,
            station_id: i32,
            species: MeasurementType,
        ) -> Result<Vec<Measurement>, DataError> {
            self.check(Stage::LastDayByHour)?;
            Ok(Self::series(station_id, species, 24))
        }

        async fn get_last_month_by_day(
            &self,
            station_id: i32,
            species: MeasurementType,
        ) -> Result<Vec<Measurement>, DataError> {
            self.check(Stage::LastMonthByDay)?;
            Ok(Self::series(station_id, species, 31))
        }

        async fn get_all_months(
            &self,
            station_id: i32,
            species: MeasurementType,
        ) -> Result<Vec<Measurement>, DataError> {
            self.check(Stage::AllMonths)?;
            Ok(Self::series(station_id, species, 5))
        }
    }

    struct FakeHistory {
        reference: Option<OtherMeasurementStation>,
        missing_six_months: Option<HistoryType>,
        calls: Mutex<Vec<HistoryCall>>,
    }

    impl FakeHistory {
        fn warsaw() -> Self {
            Self {
                reference: Some(OtherMeasurementStation::new("PL", "Warsaw")),
                missing_six_months: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<HistoryCall> {
            self.calls.lock().unwrap().clone()
        }

        fn history(history_type: HistoryType) -> MeasurementHistory {
            // Distinct values per type so results can't be mixed up
            let base = history_type.as_str().len() as f64;
            MeasurementHistory {
                median: base,
                min: base - 1.0,
                max: base + 1.0,
                count: 100,
            }
        }
    }

    #[async_trait]
    impl HistoryProvider for FakeHistory {
        async fn nearest_station(
            &self,
            location: &Location,
        ) -> Result<OtherMeasurementStation, DataError> {
            self.calls.lock().unwrap().push(HistoryCall::Nearest(*location));
            self.reference
                .clone()
                .ok_or_else(|| DataError::LookupFailure("empty registry".to_string()))
        }

        async fn six_months_ago(
            &self,
            country: &str,
            city: &str,
            history_type: HistoryType,
        ) -> Result<MeasurementHistory, DataError> {
            self.calls.lock().unwrap().push(HistoryCall::SixMonthsAgo(
                country.to_string(),
                city.to_string(),
                history_type,
            ));
            if self.missing_six_months == Some(history_type) {
                return Err(DataError::NotFound(format!("{} six months ago", history_type)));
            }
            Ok(Self::history(history_type))
        }

        async fn one_year_ago(
            &self,
            country: &str,
            city: &str,
            history_type: HistoryType,
        ) -> Result<MeasurementHistory, DataError> {
            self.calls.lock().unwrap().push(HistoryCall::OneYearAgo(
                country.to_string(),
                city.to_string(),
                history_type,
            ));
            Ok(Self::history(history_type))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    fn warsaw_station() -> Location {
        Location::new(52.1, 21.0)
    }

    fn service(store: FakeStore, history: Arc<FakeHistory>) -> SnapshotService {
        SnapshotService::new(Arc::new(store), history)
    }

    #[tokio::test]
    async fn test_snapshot_contains_every_type() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history);

        let snapshot = service.build_snapshot(42, now()).await.unwrap();

        let keys: HashSet<MeasurementType> = snapshot.keys().copied().collect();
        let expected: HashSet<MeasurementType> = MeasurementType::ALL.into_iter().collect();
        assert_eq!(keys, expected);
        assert_eq!(snapshot.len(), MeasurementType::ALL.len());
    }

    #[tokio::test]
    async fn test_datasets_come_from_the_store() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history);

        let snapshot = service.build_snapshot(42, now()).await.unwrap();

        for species in [MeasurementType::Pm10, MeasurementType::Humidity] {
            let dataset = &snapshot[&species];
            assert_eq!(
                dataset.last.as_ref().map(|m| m.id.species.as_str()),
                Some(species.as_str())
            );
            assert_eq!(dataset.last_hour_by_minute.len(), 60);
            assert_eq!(dataset.last_day_by_hour.len(), 24);
            assert_eq!(dataset.last_month_by_day.len(), 31);
            assert_eq!(dataset.all_months.len(), 5);
        }
    }

    #[tokio::test]
    async fn test_history_calls_only_for_types_with_history() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history.clone());

        service.build_snapshot(42, now()).await.unwrap();
        let calls = history.calls();

        for species in MeasurementType::ALL {
            let Some(history_type) = species.history_type() else {
                continue;
            };
            let six = HistoryCall::SixMonthsAgo("PL".into(), "Warsaw".into(), history_type);
            let year = HistoryCall::OneYearAgo("PL".into(), "Warsaw".into(), history_type);
            assert_eq!(calls.iter().filter(|c| **c == six).count(), 1, "{}", species);
            assert_eq!(calls.iter().filter(|c| **c == year).count(), 1, "{}", species);
        }

        let enriched = MeasurementType::ALL
            .iter()
            .filter(|s| s.history_type().is_some())
            .count();
        let history_calls = calls
            .iter()
            .filter(|c| !matches!(c, HistoryCall::Nearest(_)))
            .count();
        assert_eq!(history_calls, enriched * 2);
    }

    #[tokio::test]
    async fn test_nearest_station_uses_requesting_station_location() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history.clone());

        service.build_snapshot(42, now()).await.unwrap();

        let nearest: Vec<HistoryCall> = history
            .calls()
            .into_iter()
            .filter(|c| matches!(c, HistoryCall::Nearest(_)))
            .collect();
        assert_eq!(nearest.len(), MeasurementType::ALL.len());
        assert!(nearest.iter().all(|c| *c == HistoryCall::Nearest(warsaw_station())));
    }

    #[tokio::test]
    async fn test_unknown_station_fails_before_history_lookup() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history.clone());

        let err = service.build_snapshot(999, now()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.stage, Stage::Station);
        assert_eq!(err.station_id, 999);
        assert!(history.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_history_fails_whole_snapshot() {
        let history = Arc::new(FakeHistory {
            missing_six_months: Some(HistoryType::Pm10),
            ..FakeHistory::warsaw()
        });
        let service = service(FakeStore::with_station(42, warsaw_station()), history);

        let err = service.build_snapshot(42, now()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.species, MeasurementType::Pm10);
        assert_eq!(err.stage, Stage::SixMonthsAgo);
    }

    #[tokio::test]
    async fn test_missing_history_fails_parallel_snapshot() {
        let history = Arc::new(FakeHistory {
            missing_six_months: Some(HistoryType::Temperature),
            ..FakeHistory::warsaw()
        });
        let service = service(FakeStore::with_station(42, warsaw_station()), history)
            .with_parallel_species(true);

        let err = service.build_snapshot(42, now()).await.unwrap_err();

        assert_eq!(err.species, MeasurementType::Temperature);
        assert_eq!(err.stage, Stage::SixMonthsAgo);
    }

    #[tokio::test]
    async fn test_parallel_snapshot_contains_every_type() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history.clone())
            .with_parallel_species(true);

        let snapshot = service.build_snapshot(42, now()).await.unwrap();

        assert_eq!(snapshot.len(), MeasurementType::ALL.len());
        for species in MeasurementType::ALL {
            assert!(snapshot.contains_key(&species), "{}", species);
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let history = Arc::new(FakeHistory {
            reference: None,
            ..FakeHistory::warsaw()
        });
        let service = service(FakeStore::with_station(42, warsaw_station()), history);

        let err = service.build_snapshot(42, now()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LookupFailure);
        assert_eq!(err.stage, Stage::NearestStation);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = FakeStore {
            failing_stage: Some(Stage::AllMonths),
            ..FakeStore::with_station(42, warsaw_station())
        };
        let service = service(store, Arc::new(FakeHistory::warsaw()));

        let err = service.build_snapshot(42, now()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientUnavailable);
        assert_eq!(err.stage, Stage::AllMonths);
    }

    #[tokio::test]
    async fn test_comparison_ids_follow_now() {
        let history = Arc::new(FakeHistory::warsaw());
        let service = service(FakeStore::with_station(42, warsaw_station()), history);
        let reference = OtherMeasurementStation::new("PL", "Warsaw");

        let comparison = service
            .historical_comparison(42, MeasurementType::Pm10, HistoryType::Pm10, &reference, now())
            .await
            .unwrap();

        assert_eq!(
            comparison.six_months_ago.id,
            MeasurementId::new(42, 2023, 9, MeasurementType::Pm10)
        );
        assert_eq!(
            comparison.one_year_ago.id,
            MeasurementId::new(42, 2023, 3, MeasurementType::Pm10)
        );

        let expected = FakeHistory::history(HistoryType::Pm10);
        assert_eq!(comparison.six_months_ago.average, expected.median);
        assert_eq!(comparison.one_year_ago.count, expected.count);
    }
}
