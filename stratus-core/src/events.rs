//! Notifications flowing from the core to the presentation layer.

use tokio::sync::mpsc;

use crate::{
    error::LookupError,
    model::{Location, UnitPreference, WeatherReport},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// Autocomplete list for `query`. Empty means "no results".
    ResultsReady { query: String, results: Vec<Location> },
    /// The autocomplete list should be hidden.
    ResultsCleared,
    /// Keyboard highlight moved to this index.
    SelectionChanged(usize),
    /// The query field should now read this text.
    QueryReplaced(String),
    /// A weather fetch started.
    Loading,
    WeatherReady {
        location: Location,
        report: Box<WeatherReport>,
    },
    ErrorRaised { error: LookupError, retry: bool },
    ErrorCleared,
    RecentChanged(Vec<Location>),
    UnitChanged(UnitPreference),
}

/// Sending half of the event stream. Sends never block and are dropped
/// silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SearchEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SearchEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped; discarding event");
        }
    }
}
