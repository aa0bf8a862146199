//! Debounced, race-safe autocomplete search.
//!
//! A [`SearchOrchestrator`] owns every piece of mutable search state and runs
//! as a single task. The presentation layer drives it through a cloneable
//! [`SearchHandle`] and listens on the [`SearchEvent`] receiver returned by
//! [`SearchOrchestrator::new`].
//!
//! Keystrokes restart a debounce deadline; when it passes, a geocoding lookup
//! is spawned tagged with the session's generation counter. Any later
//! keystroke, dismissal or selection bumps the generation, so a lookup that
//! completes afterwards is dropped instead of overwriting newer results.
//! Nothing is aborted; stale work is simply ignored when it lands.

use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    config::SearchSettings,
    error::LookupError,
    events::{EventSink, SearchEvent},
    geolocation::Geolocator,
    model::{Location, UnitPreference, WeatherReport},
    provider::WeatherProvider,
    recent::RecencyStore,
    storage::KeyValueStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

/// Where the search pipeline currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    /// A keystroke arrived; waiting for the input to go quiet.
    Debouncing,
    AwaitingResults,
    Displaying,
    /// A result is highlighted or has been chosen and its weather is loading.
    Selecting,
    Error(LookupError),
}

/// Per-input state of the autocomplete box.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    query: String,
    results: Vec<Location>,
    selected: Option<usize>,
    generation: u64,
}

impl SearchSession {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[Location] {
        &self.results
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the query. Outstanding lookups become stale.
    pub fn set_query(&mut self, query: String) -> u64 {
        self.query = query;
        self.next_generation()
    }

    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn show(&mut self, results: Vec<Location>) {
        self.results = results;
        self.selected = None;
    }

    /// Hide the list. Outstanding lookups become stale.
    pub fn dismiss(&mut self) {
        self.results.clear();
        self.selected = None;
        self.next_generation();
    }

    /// Move the highlight, clamped to the list with no wraparound. Returns
    /// the new index, or `None` when there is nothing to highlight.
    pub fn move_selection(&mut self, key: KeyCommand) -> Option<usize> {
        let last = self.results.len().checked_sub(1)?;
        let next = match (key, self.selected) {
            (KeyCommand::ArrowDown, None) | (KeyCommand::ArrowUp, None) => 0,
            (KeyCommand::ArrowDown, Some(i)) => (i + 1).min(last),
            (KeyCommand::ArrowUp, Some(i)) => i.saturating_sub(1),
            (KeyCommand::Enter | KeyCommand::Escape, current) => return current,
        };
        self.selected = Some(next);
        Some(next)
    }
}

#[derive(Debug)]
enum Command {
    QueryChanged(String),
    Key(KeyCommand),
    Select(usize),
    SelectLocation(Location),
    UseCurrentLocation,
    Retry,
    Dismiss,
    ClearRecent,
    SetUnit(UnitPreference),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("search orchestrator has stopped")]
pub struct OrchestratorStopped;

/// Entry points for the presentation layer. Dropping every handle stops the
/// orchestrator.
#[derive(Debug, Clone)]
pub struct SearchHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SearchHandle {
    fn send(&self, command: Command) -> Result<(), OrchestratorStopped> {
        self.tx.send(command).map_err(|_| OrchestratorStopped)
    }

    /// The query text changed (one call per keystroke).
    pub fn on_query_changed(&self, query: impl Into<String>) -> Result<(), OrchestratorStopped> {
        self.send(Command::QueryChanged(query.into()))
    }

    pub fn on_key_command(&self, key: KeyCommand) -> Result<(), OrchestratorStopped> {
        self.send(Command::Key(key))
    }

    /// Pick the result at `index` of the displayed list.
    pub fn on_select(&self, index: usize) -> Result<(), OrchestratorStopped> {
        self.send(Command::Select(index))
    }

    /// Show weather for a known place, e.g. an entry of the recent list.
    pub fn select_location(&self, location: Location) -> Result<(), OrchestratorStopped> {
        self.send(Command::SelectLocation(location))
    }

    pub fn use_current_location(&self) -> Result<(), OrchestratorStopped> {
        self.send(Command::UseCurrentLocation)
    }

    pub fn retry(&self) -> Result<(), OrchestratorStopped> {
        self.send(Command::Retry)
    }

    /// Focus left the search area.
    pub fn dismiss(&self) -> Result<(), OrchestratorStopped> {
        self.send(Command::Dismiss)
    }

    pub fn clear_recent(&self) -> Result<(), OrchestratorStopped> {
        self.send(Command::ClearRecent)
    }

    pub fn set_unit(&self, unit: UnitPreference) -> Result<(), OrchestratorStopped> {
        self.send(Command::SetUnit(unit))
    }
}

enum Completion {
    Lookup {
        generation: u64,
        query: String,
        result: Result<Vec<Location>, LookupError>,
    },
    Weather {
        ticket: u64,
        result: Result<(Location, WeatherReport), LookupError>,
    },
}

pub struct SearchOrchestrator<S> {
    provider: Arc<dyn WeatherProvider>,
    locator: Arc<dyn Geolocator>,
    recent: RecencyStore<S>,
    settings: SearchSettings,
    session: SearchSession,
    phase: Phase,
    unit: UnitPreference,
    events: EventSink,
    commands: mpsc::UnboundedReceiver<Command>,
    debounce_deadline: Option<Instant>,
    weather_ticket: u64,
    tasks: JoinSet<Completion>,
}

impl<S: KeyValueStore + 'static> SearchOrchestrator<S> {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        locator: Arc<dyn Geolocator>,
        mut recent: RecencyStore<S>,
        settings: SearchSettings,
    ) -> (Self, SearchHandle, mpsc::UnboundedReceiver<SearchEvent>) {
        let (events, event_rx) = EventSink::channel();
        let (tx, commands) = mpsc::unbounded_channel();
        recent.attach(events.clone());

        let orchestrator = Self {
            provider,
            locator,
            recent,
            settings,
            session: SearchSession::default(),
            phase: Phase::Idle,
            unit: UnitPreference::default(),
            events,
            commands,
            debounce_deadline: None,
            weather_ticket: 0,
            tasks: JoinSet::new(),
        };

        (orchestrator, SearchHandle { tx }, event_rx)
    }

    pub fn with_unit(mut self, unit: UnitPreference) -> Self {
        self.unit = unit;
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn unit(&self) -> UnitPreference {
        self.unit
    }

    pub fn recent(&self) -> &[Location] {
        self.recent.entries()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands, timers and completions until every handle is dropped.
    pub async fn run(mut self) {
        info!(recent = self.recent.entries().len(), "Search orchestrator started");
        self.events
            .emit(SearchEvent::RecentChanged(self.recent.entries().to_vec()));

        loop {
            let deadline = self.debounce_deadline;

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.handle_completion(completion),
                    Err(e) => warn!(error = %e, "Search task failed"),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.debounce_deadline = None;
                    self.fire_lookup();
                }
            }
        }

        info!("Search orchestrator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::QueryChanged(raw) => self.query_changed(raw),
            Command::Key(key) => self.key_command(key),
            Command::Select(index) => self.select_result(index),
            Command::SelectLocation(location) => self.choose(location),
            Command::UseCurrentLocation => self.start_weather_here(),
            Command::Retry => self.retry(),
            Command::Dismiss => self.dismiss(),
            Command::ClearRecent => self.recent.clear(),
            Command::SetUnit(unit) => {
                self.unit = unit;
                self.events.emit(SearchEvent::UnitChanged(unit));
            }
        }
    }

    fn query_changed(&mut self, raw: String) {
        self.clear_error();
        self.session.set_query(raw.trim().to_string());
        self.debounce_deadline = Some(Instant::now() + self.settings.debounce());
        self.phase = Phase::Debouncing;
    }

    fn fire_lookup(&mut self) {
        self.clear_error();
        let query = self.session.query().to_string();

        if query.chars().count() < self.settings.min_search_chars {
            debug!(%query, "Query below minimum length; clearing results");
            self.session.dismiss();
            self.phase = Phase::Idle;
            self.events.emit(SearchEvent::ResultsCleared);
            return;
        }

        let generation = self.session.next_generation();
        let provider = Arc::clone(&self.provider);
        let limit = self.settings.max_results;
        self.phase = Phase::AwaitingResults;
        debug!(%query, generation, "Issuing lookup");

        self.tasks.spawn(async move {
            let result = provider.geocode(&query, limit).await;
            Completion::Lookup {
                generation,
                query,
                result,
            }
        });
    }

    fn key_command(&mut self, key: KeyCommand) {
        match key {
            KeyCommand::Escape => self.dismiss(),
            KeyCommand::Enter => {
                if let Some(index) = self.session.selected() {
                    self.select_result(index);
                }
            }
            KeyCommand::ArrowDown | KeyCommand::ArrowUp => {
                if let Some(index) = self.session.move_selection(key) {
                    if self.phase == Phase::Displaying {
                        self.phase = Phase::Selecting;
                    }
                    self.events.emit(SearchEvent::SelectionChanged(index));
                }
            }
        }
    }

    fn select_result(&mut self, index: usize) {
        let Some(location) = self.session.results().get(index).cloned() else {
            debug!(index, "Ignoring selection outside the result list");
            return;
        };

        self.choose(location);
    }

    /// Close the list, drop any pending keystroke, then load the place.
    fn choose(&mut self, location: Location) {
        self.session.dismiss();
        self.debounce_deadline = None;
        self.events.emit(SearchEvent::ResultsCleared);
        self.replace_query(location.name.clone());
        self.start_weather(location);
    }

    fn replace_query(&mut self, text: String) {
        self.session.set_query(text.clone());
        self.events.emit(SearchEvent::QueryReplaced(text));
    }

    fn next_weather_ticket(&mut self) -> u64 {
        self.clear_error();
        self.weather_ticket += 1;
        self.phase = Phase::Selecting;
        self.events.emit(SearchEvent::Loading);
        self.weather_ticket
    }

    fn start_weather(&mut self, location: Location) {
        let ticket = self.next_weather_ticket();
        let provider = Arc::clone(&self.provider);
        info!(location = %location.display_name(), "Fetching weather");

        self.tasks.spawn(async move {
            let result = provider
                .weather_by_coords(location.coordinates())
                .await
                .map(|report| (location, report));
            Completion::Weather { ticket, result }
        });
    }

    fn start_weather_here(&mut self) {
        let ticket = self.next_weather_ticket();
        let provider = Arc::clone(&self.provider);
        let locator = Arc::clone(&self.locator);
        info!("Fetching weather for current position");

        self.tasks.spawn(async move {
            let result = async {
                let at = locator.locate().await?;
                let report = provider.weather_by_coords(at).await?;
                let location = Location {
                    name: report.current.name.clone(),
                    state: String::new(),
                    country: report.current.country.clone(),
                    lat: at.lat,
                    lon: at.lon,
                };
                Ok::<_, LookupError>((location, report))
            }
            .await;
            Completion::Weather { ticket, result }
        });
    }

    fn retry(&mut self) {
        self.clear_error();
        self.phase = Phase::Idle;
        if !self.session.query().is_empty() {
            self.debounce_deadline = None;
            self.fire_lookup();
        }
    }

    fn dismiss(&mut self) {
        self.session.dismiss();
        self.debounce_deadline = None;
        if !matches!(self.phase, Phase::Error(_)) {
            self.phase = Phase::Idle;
        }
        self.events.emit(SearchEvent::ResultsCleared);
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Lookup {
                generation,
                query,
                result,
            } => {
                if !self.session.is_current(generation) {
                    debug!(%query, generation, current = self.session.generation(), "Discarding stale lookup");
                    return;
                }

                match result {
                    Ok(results) => {
                        debug!(%query, count = results.len(), "Lookup results ready");
                        self.session.show(results.clone());
                        self.phase = Phase::Displaying;
                        self.events
                            .emit(SearchEvent::ResultsReady { query, results });
                    }
                    Err(e) => self.raise(e),
                }
            }
            Completion::Weather { ticket, result } => {
                if ticket != self.weather_ticket {
                    debug!(ticket, current = self.weather_ticket, "Discarding superseded weather");
                    return;
                }

                match result {
                    Ok((location, report)) => {
                        if self.phase == Phase::Selecting {
                            self.phase = Phase::Idle;
                        }
                        self.events.emit(SearchEvent::WeatherReady {
                            location: location.clone(),
                            report: Box::new(report),
                        });
                        self.recent.add_search(location);
                    }
                    Err(e) => self.raise(e),
                }
            }
        }
    }

    fn clear_error(&mut self) {
        if matches!(self.phase, Phase::Error(_)) {
            self.phase = Phase::Idle;
            self.events.emit(SearchEvent::ErrorCleared);
        }
    }

    fn raise(&mut self, error: LookupError) {
        warn!(error = %error, "Search action failed");
        let retry = error.offers_retry();
        self.phase = Phase::Error(error.clone());
        self.events.emit(SearchEvent::ErrorRaised { error, retry });
    }
}
