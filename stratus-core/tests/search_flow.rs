use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use stratus_core::{
    ConfiguredLocation, Coordinates, KeyValueStore, Location, LocationError, LookupError,
    MemoryStore, RecencyStore, SearchEvent, SearchHandle, SearchOrchestrator, SearchSettings,
    UnitPreference, WeatherProvider,
    model::{Condition, ForecastSeries, WeatherSnapshot},
    recent::RECENT_SEARCHES_KEY,
    search::KeyCommand,
};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::sleep,
};

fn place(name: &str, state: &str, lat: f64, lon: f64) -> Location {
    Location {
        name: name.to_string(),
        state: state.to_string(),
        country: "US".to_string(),
        lat,
        lon,
    }
}

/// Geocoder with per-query canned answers and latencies.
#[derive(Debug, Default)]
struct FakeProvider {
    places: HashMap<String, Vec<Location>>,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, LookupError>,
    fail_next_lookup: Mutex<Option<LookupError>>,
    weather_failure: Option<LookupError>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn answer(mut self, query: &str, delay_ms: u64, places: Vec<Location>) -> Self {
        self.places.insert(query.to_string(), places);
        self.delays
            .insert(query.to_string(), Duration::from_millis(delay_ms));
        self
    }

    fn fail(mut self, query: &str, delay_ms: u64, error: LookupError) -> Self {
        self.failures.insert(query.to_string(), error);
        self.delays
            .insert(query.to_string(), Duration::from_millis(delay_ms));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn geocode(&self, query: &str, _limit: u32) -> Result<Vec<Location>, LookupError> {
        self.calls.lock().unwrap().push(query.to_string());
        let injected = self.fail_next_lookup.lock().unwrap().take();

        if let Some(delay) = self.delays.get(query) {
            sleep(*delay).await;
        }
        if let Some(error) = injected {
            return Err(error);
        }
        if let Some(error) = self.failures.get(query) {
            return Err(error.clone());
        }
        Ok(self.places.get(query).cloned().unwrap_or_default())
    }

    async fn current_weather(&self, at: Coordinates) -> Result<WeatherSnapshot, LookupError> {
        sleep(Duration::from_millis(40)).await;
        if let Some(error) = &self.weather_failure {
            return Err(error.clone());
        }
        Ok(WeatherSnapshot {
            name: format!("Station {:.0}", at.lat),
            country: "US".to_string(),
            observed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            timezone_offset: 0,
            temp_k: 290.0,
            feels_like_k: 289.0,
            temp_min_k: 288.0,
            temp_max_k: 292.0,
            humidity_pct: 50,
            condition: Condition::default(),
            wind_speed_mps: 3.0,
            wind_deg: 90.0,
        })
    }

    async fn forecast(&self, _at: Coordinates) -> Result<ForecastSeries, LookupError> {
        Ok(ForecastSeries {
            city_name: "Station".to_string(),
            country: "US".to_string(),
            timezone_offset: 0,
            samples: Vec::new(),
        })
    }
}

struct Harness {
    handle: SearchHandle,
    events: UnboundedReceiver<SearchEvent>,
    task: JoinHandle<()>,
    provider: Arc<FakeProvider>,
    storage: MemoryStore,
}

impl Harness {
    async fn start(provider: FakeProvider) -> Self {
        Self::start_with(provider, MemoryStore::new(), None).await
    }

    async fn start_with(
        provider: FakeProvider,
        storage: MemoryStore,
        home: Option<Coordinates>,
    ) -> Self {
        let provider = Arc::new(provider);
        let settings = SearchSettings::default();
        let recent = RecencyStore::load(storage.clone(), settings.max_recent);

        let (orchestrator, handle, mut events) = SearchOrchestrator::new(
            provider.clone(),
            Arc::new(ConfiguredLocation::new(home)),
            recent,
            settings,
        );
        let task = orchestrator.spawn();

        match events.recv().await {
            Some(SearchEvent::RecentChanged(_)) => {}
            other => panic!("expected initial recent list, got {other:?}"),
        }

        Self {
            handle,
            events,
            task,
            provider,
            storage,
        }
    }

    async fn type_keys(&self, keystrokes: &[&str], gap_ms: u64) {
        for (i, text) in keystrokes.iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(gap_ms)).await;
            }
            self.handle.on_query_changed(*text).unwrap();
        }
    }

    /// Let every pending timer and lookup run to completion.
    async fn settle(&mut self) -> Vec<SearchEvent> {
        sleep(Duration::from_secs(5)).await;
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    async fn shutdown(self) {
        drop(self.handle);
        self.task.await.expect("orchestrator task panicked");
    }
}

fn shown_queries(events: &[SearchEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::ResultsReady { query, .. } => Some(query.clone()),
            _ => None,
        })
        .collect()
}

fn raised_errors(events: &[SearchEvent]) -> Vec<(LookupError, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::ErrorRaised { error, retry } => Some((error.clone(), *retry)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn rapid_typing_issues_a_single_lookup() {
    let provider = FakeProvider::default().answer(
        "Lond",
        50,
        vec![place("London", "England", 51.5, -0.12)],
    );
    let mut h = Harness::start(provider).await;

    h.type_keys(&["L", "Lo", "Lon", "Lond"], 100).await;
    let events = h.settle().await;

    assert_eq!(h.provider.calls(), vec!["Lond"]);
    assert_eq!(shown_queries(&events), vec!["Lond"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn paced_typing_issues_one_lookup_per_pause() {
    let provider = FakeProvider::default()
        .answer("Par", 10, vec![place("Paris", "", 48.85, 2.35)])
        .answer("Paris", 10, vec![place("Paris", "", 48.85, 2.35)]);
    let mut h = Harness::start(provider).await;

    h.type_keys(&["Par", "Paris"], 400).await;
    let events = h.settle().await;

    assert_eq!(h.provider.calls(), vec!["Par", "Paris"]);
    assert_eq!(shown_queries(&events), vec!["Par", "Paris"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_stale_lookup_never_overwrites_newer_results() {
    let provider = FakeProvider::default()
        .answer("Lon", 500, vec![place("Long Beach", "California", 33.77, -118.19)])
        .answer("London", 50, vec![place("London", "England", 51.5, -0.12)]);
    let mut h = Harness::start(provider).await;

    // "Lon" fires at 300ms and lands at 800ms; "London" fires at 650ms and lands at 700ms.
    h.type_keys(&["Lon", "London"], 350).await;
    let events = h.settle().await;

    assert_eq!(h.provider.calls(), vec!["Lon", "London"]);
    assert_eq!(
        events,
        vec![SearchEvent::ResultsReady {
            query: "London".into(),
            results: vec![place("London", "England", 51.5, -0.12)],
        }]
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_stale_failure_raises_nothing() {
    let provider = FakeProvider::default()
        .fail("Lon", 500, LookupError::Network("connection reset".into()))
        .answer("London", 50, vec![place("London", "England", 51.5, -0.12)]);
    let mut h = Harness::start(provider).await;

    h.type_keys(&["Lon", "London"], 350).await;
    let events = h.settle().await;

    assert!(raised_errors(&events).is_empty());
    assert_eq!(shown_queries(&events), vec!["London"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn typed_city_is_selected_and_recorded() {
    let london = place("London", "England", 51.5, -0.12);
    let provider = FakeProvider::default()
        .answer("Lon", 500, vec![place("Long Beach", "California", 33.77, -118.19)])
        .answer("London", 50, vec![london.clone()]);
    let mut h = Harness::start(provider).await;

    h.type_keys(&["Lon", "London"], 350).await;
    h.settle().await;
    h.handle.on_select(0).unwrap();
    let events = h.settle().await;

    assert!(events.contains(&SearchEvent::QueryReplaced("London".into())));
    assert_eq!(
        events.last(),
        Some(&SearchEvent::RecentChanged(vec![london]))
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn typed_city_weather_failure_shows_error_and_keeps_recent() {
    let provider = FakeProvider {
        weather_failure: Some(LookupError::RateLimited),
        ..FakeProvider::default()
    }
    .answer("London", 50, vec![place("London", "England", 51.5, -0.12)]);
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("London").unwrap();
    h.settle().await;
    h.handle.on_select(0).unwrap();
    let events = h.settle().await;

    assert_eq!(raised_errors(&events), vec![(LookupError::RateLimited, true)]);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SearchEvent::RecentChanged(_)))
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dismiss_suppresses_in_flight_results() {
    let provider =
        FakeProvider::default().answer("Paris", 500, vec![place("Paris", "", 48.85, 2.35)]);
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("Paris").unwrap();
    sleep(Duration::from_millis(400)).await;
    h.handle.dismiss().unwrap();
    let events = h.settle().await;

    assert_eq!(h.provider.calls(), vec!["Paris"]);
    assert_eq!(events, vec![SearchEvent::ResultsCleared]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn short_query_clears_without_network() {
    let mut h = Harness::start(FakeProvider::default()).await;

    h.handle.on_query_changed("L").unwrap();
    let events = h.settle().await;

    assert!(h.provider.calls().is_empty());
    assert_eq!(events, vec![SearchEvent::ResultsCleared]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn surrounding_whitespace_is_ignored() {
    let provider =
        FakeProvider::default().answer("Oslo", 10, vec![place("Oslo", "", 59.91, 10.75)]);
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("  Oslo ").unwrap();
    let events = h.settle().await;

    assert_eq!(h.provider.calls(), vec!["Oslo"]);
    assert_eq!(shown_queries(&events), vec!["Oslo"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_matches_is_a_result_not_an_error() {
    let mut h = Harness::start(FakeProvider::default()).await;

    h.handle.on_query_changed("Xyzzyq").unwrap();
    let events = h.settle().await;

    assert_eq!(
        events,
        vec![SearchEvent::ResultsReady {
            query: "Xyzzyq".into(),
            results: Vec::new(),
        }]
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn keyboard_selection_loads_weather_and_records_recent() {
    let springfields = vec![
        place("Springfield", "Missouri", 37.21, -93.29),
        place("Springfield", "Illinois", 39.78, -89.65),
    ];
    let provider = FakeProvider::default().answer("Springfield", 20, springfields.clone());
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("Springfield").unwrap();
    h.settle().await;

    h.handle.on_key_command(KeyCommand::ArrowDown).unwrap();
    h.handle.on_key_command(KeyCommand::ArrowDown).unwrap();
    h.handle.on_key_command(KeyCommand::Enter).unwrap();
    let events = h.settle().await;

    let chosen = springfields[1].clone();
    assert_eq!(events[0], SearchEvent::SelectionChanged(0));
    assert_eq!(events[1], SearchEvent::SelectionChanged(1));
    assert_eq!(events[2], SearchEvent::ResultsCleared);
    assert_eq!(events[3], SearchEvent::QueryReplaced("Springfield".into()));
    assert_eq!(events[4], SearchEvent::Loading);
    match &events[5] {
        SearchEvent::WeatherReady { location, report } => {
            assert_eq!(location, &chosen);
            assert_eq!(report.current.name, "Station 40");
        }
        other => panic!("expected weather, got {other:?}"),
    }
    assert_eq!(events[6], SearchEvent::RecentChanged(vec![chosen.clone()]));

    let persisted = h.storage.get(RECENT_SEARCHES_KEY).unwrap().unwrap();
    let stored: Vec<Location> = serde_json::from_str(&persisted).unwrap();
    assert_eq!(stored, vec![chosen]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn selecting_a_recent_entry_moves_it_to_the_front() {
    let storage = MemoryStore::new();
    let oslo = place("Oslo", "", 59.91, 10.75);
    let rome = place("Rome", "", 41.9, 12.5);
    storage
        .set(
            RECENT_SEARCHES_KEY,
            &serde_json::to_string(&vec![rome.clone(), oslo.clone()]).unwrap(),
        )
        .unwrap();
    let mut h = Harness::start_with(FakeProvider::default(), storage, None).await;

    h.handle.select_location(oslo.clone()).unwrap();
    let events = h.settle().await;

    assert_eq!(events[0], SearchEvent::ResultsCleared);
    assert_eq!(events[1], SearchEvent::QueryReplaced("Oslo".into()));
    assert_eq!(events[2], SearchEvent::Loading);
    assert_eq!(
        events.last(),
        Some(&SearchEvent::RecentChanged(vec![oslo, rome]))
    );
    assert!(h.provider.calls().is_empty());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn picking_a_recent_entry_mid_typing_cancels_the_pending_lookup() {
    let provider =
        FakeProvider::default().answer("Par", 10, vec![place("Paris", "", 48.85, 2.35)]);
    let mut h = Harness::start(provider).await;
    let oslo = place("Oslo", "", 59.91, 10.75);

    h.handle.on_query_changed("Par").unwrap();
    sleep(Duration::from_millis(100)).await;
    h.handle.select_location(oslo.clone()).unwrap();
    let events = h.settle().await;

    assert!(h.provider.calls().is_empty());
    assert!(shown_queries(&events).is_empty());
    assert_eq!(events[0], SearchEvent::ResultsCleared);
    assert_eq!(
        events.last(),
        Some(&SearchEvent::RecentChanged(vec![oslo]))
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn weather_error_is_cleared_when_typing_starts_a_lookup() {
    let provider = FakeProvider {
        weather_failure: Some(LookupError::RateLimited),
        ..FakeProvider::default()
    }
    .answer("Paris", 20, vec![place("Paris", "", 48.85, 2.35)]);
    let mut h = Harness::start(provider).await;

    h.handle
        .select_location(place("Oslo", "", 59.91, 10.75))
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    h.handle.on_query_changed("Paris").unwrap();
    let events = h.settle().await;

    let raised = events
        .iter()
        .position(|e| matches!(e, SearchEvent::ErrorRaised { .. }))
        .expect("weather failure was not raised");
    let cleared = events
        .iter()
        .position(|e| *e == SearchEvent::ErrorCleared)
        .expect("error was never cleared");
    let shown = events
        .iter()
        .position(|e| matches!(e, SearchEvent::ResultsReady { query, .. } if query == "Paris"))
        .expect("results were not shown");

    assert!(raised < cleared && cleared < shown, "{events:?}");
    assert_eq!(shown_queries(&events), vec!["Paris"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retry_reruns_the_failed_query() {
    let provider =
        FakeProvider::default().answer("Paris", 20, vec![place("Paris", "", 48.85, 2.35)]);
    *provider.fail_next_lookup.lock().unwrap() = Some(LookupError::RateLimited);
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("Paris").unwrap();
    let events = h.settle().await;
    assert_eq!(raised_errors(&events), vec![(LookupError::RateLimited, true)]);

    h.handle.retry().unwrap();
    let events = h.settle().await;

    assert_eq!(events[0], SearchEvent::ErrorCleared);
    assert_eq!(shown_queries(&events), vec!["Paris"]);
    assert_eq!(h.provider.calls(), vec!["Paris", "Paris"]);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn bad_credentials_do_not_offer_retry() {
    let provider = FakeProvider::default().fail("Paris", 10, LookupError::InvalidCredentials);
    let mut h = Harness::start(provider).await;

    h.handle.on_query_changed("Paris").unwrap();
    let events = h.settle().await;

    assert_eq!(
        raised_errors(&events),
        vec![(LookupError::InvalidCredentials, false)]
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_weather_fetch_leaves_recent_untouched() {
    let provider = FakeProvider {
        weather_failure: Some(LookupError::Network("timeout".into())),
        ..FakeProvider::default()
    };
    let mut h = Harness::start(provider).await;

    h.handle
        .select_location(place("Oslo", "", 59.91, 10.75))
        .unwrap();
    let events = h.settle().await;

    assert_eq!(
        raised_errors(&events),
        vec![(LookupError::Network("timeout".into()), true)]
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SearchEvent::RecentChanged(_)))
    );
    assert_eq!(h.storage.get(RECENT_SEARCHES_KEY).unwrap(), None);
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn current_position_weather_is_named_after_the_station() {
    let home = Coordinates::new(59.91, 10.75);
    let mut h = Harness::start_with(FakeProvider::default(), MemoryStore::new(), Some(home)).await;

    h.handle.use_current_location().unwrap();
    let events = h.settle().await;

    let expected = Location {
        name: "Station 60".into(),
        state: String::new(),
        country: "US".into(),
        lat: 59.91,
        lon: 10.75,
    };
    assert_eq!(events[0], SearchEvent::Loading);
    assert!(matches!(&events[1], SearchEvent::WeatherReady { location, .. } if location == &expected));
    assert_eq!(events[2], SearchEvent::RecentChanged(vec![expected]));
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_position_raises_location_error() {
    let mut h = Harness::start(FakeProvider::default()).await;

    h.handle.use_current_location().unwrap();
    let events = h.settle().await;

    assert_eq!(
        raised_errors(&events),
        vec![(
            LookupError::LocationUnavailable(LocationError::NotSupported),
            false
        )]
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unit_and_clear_commands_are_announced() {
    let storage = MemoryStore::new();
    storage
        .set(
            RECENT_SEARCHES_KEY,
            &serde_json::to_string(&vec![place("Oslo", "", 59.91, 10.75)]).unwrap(),
        )
        .unwrap();
    let mut h = Harness::start_with(FakeProvider::default(), storage, None).await;

    h.handle.set_unit(UnitPreference::Metric).unwrap();
    h.handle.clear_recent().unwrap();
    let events = h.settle().await;

    assert_eq!(
        events,
        vec![
            SearchEvent::UnitChanged(UnitPreference::Metric),
            SearchEvent::RecentChanged(Vec::new()),
        ]
    );
    assert_eq!(
        h.storage.get(RECENT_SEARCHES_KEY).unwrap().as_deref(),
        Some("[]")
    );
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn handles_report_shutdown_after_orchestrator_stops() {
    let h = Harness::start(FakeProvider::default()).await;
    let spare = h.handle.clone();
    h.task.abort();
    let _ = h.task.await;

    assert!(spare.on_query_changed("Paris").is_err());
}
