use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use stratus_core::{
    Config, ConfiguredLocation, FileStore, Location, LookupError, RecencyStore, SearchEvent,
    SearchHandle, SearchOrchestrator, UnitPreference, WeatherProvider, WeatherReport,
    provider::default_provider_from_config,
};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::debug;

/// What a wait on the event stream produced.
pub enum Outcome<T> {
    Ready(T),
    Failed { error: LookupError, retry: bool },
}

/// A running orchestrator plus the receiving end of its events.
pub struct Session {
    handle: SearchHandle,
    events: UnboundedReceiver<SearchEvent>,
    task: JoinHandle<()>,
}

impl Session {
    pub fn start(config: &Config, unit: UnitPreference) -> Result<Self> {
        let provider: Arc<dyn WeatherProvider> = Arc::from(default_provider_from_config(config)?);
        let recent = RecencyStore::load(
            FileStore::new(Config::data_dir()?),
            config.search.max_recent,
        );
        let locator = Arc::new(ConfiguredLocation::new(config.home));

        let (orchestrator, handle, events) =
            SearchOrchestrator::new(provider, locator, recent, config.search.clone());
        let task = orchestrator.with_unit(unit).spawn();

        Ok(Self {
            handle,
            events,
            task,
        })
    }

    pub fn handle(&self) -> &SearchHandle {
        &self.handle
    }

    async fn next_event(&mut self) -> Result<SearchEvent> {
        self.events
            .recv()
            .await
            .ok_or_else(|| anyhow!("Search stopped unexpectedly"))
    }

    /// Wait for the autocomplete list. `None` means the query was too short
    /// to search.
    pub async fn wait_for_results(&mut self) -> Result<Outcome<Option<Vec<Location>>>> {
        loop {
            match self.next_event().await? {
                SearchEvent::ResultsReady { results, .. } => return Ok(Outcome::Ready(Some(results))),
                SearchEvent::ResultsCleared => return Ok(Outcome::Ready(None)),
                SearchEvent::ErrorRaised { error, retry } => {
                    return Ok(Outcome::Failed { error, retry });
                }
                other => debug!(event = ?other, "Ignoring event while waiting for results"),
            }
        }
    }

    pub async fn wait_for_weather(&mut self) -> Result<Outcome<(Location, WeatherReport)>> {
        loop {
            match self.next_event().await? {
                SearchEvent::Loading => eprintln!("Loading weather..."),
                SearchEvent::WeatherReady { location, report } => {
                    return Ok(Outcome::Ready((location, *report)));
                }
                SearchEvent::ErrorRaised { error, retry } => {
                    return Ok(Outcome::Failed { error, retry });
                }
                other => debug!(event = ?other, "Ignoring event while waiting for weather"),
            }
        }
    }

    /// Stop the orchestrator and wait for it to finish its pending writes.
    pub async fn finish(self) -> Result<()> {
        let Self { handle, task, .. } = self;
        drop(handle);
        task.await.context("Search task failed")
    }
}

/// Turn a surfaced lookup failure into a user-facing error.
pub fn failure(error: LookupError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}
