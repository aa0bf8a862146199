//! Bounded, coordinate-deduplicated, most-recent-first history of viewed places.

use tracing::{debug, warn};

use crate::{
    error::StorageError,
    events::{EventSink, SearchEvent},
    model::Location,
    storage::KeyValueStore,
};

pub const RECENT_SEARCHES_KEY: &str = "stratus_recent_searches";

/// Owns the recent searches list and its persisted copy.
///
/// Storage failures never escape: a missing or unreadable blob loads as an
/// empty list and failed writes are logged, leaving the in-memory list as
/// the source of truth for the session.
#[derive(Debug)]
pub struct RecencyStore<S> {
    storage: S,
    entries: Vec<Location>,
    max_recent: usize,
    notifier: Option<EventSink>,
}

impl<S: KeyValueStore> RecencyStore<S> {
    pub fn load(storage: S, max_recent: usize) -> Self {
        let entries = match read_entries(&storage) {
            Ok(entries) => normalize(entries, max_recent),
            Err(e) => {
                warn!(error = %e, "Failed to load recent searches; starting empty");
                Vec::new()
            }
        };
        debug!(count = entries.len(), "Loaded recent searches");

        Self {
            storage,
            entries,
            max_recent,
            notifier: None,
        }
    }

    /// Emit [`SearchEvent::RecentChanged`] on every mutation.
    pub fn with_notifier(mut self, sink: EventSink) -> Self {
        self.notifier = Some(sink);
        self
    }

    pub(crate) fn attach(&mut self, sink: EventSink) {
        self.notifier = Some(sink);
    }

    pub fn entries(&self) -> &[Location] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Location> {
        self.entries.get(index)
    }

    pub fn max_recent(&self) -> usize {
        self.max_recent
    }

    /// Move `location` to the front, dropping any entry at the same
    /// coordinates and evicting from the tail past capacity.
    pub fn add_search(&mut self, location: Location) {
        self.entries.retain(|e| !e.same_place(&location));
        self.entries.insert(0, location);
        self.entries.truncate(self.max_recent);
        self.persist();
        self.notify();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
        self.notify();
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(StorageError::from)
            .and_then(|blob| self.storage.set(RECENT_SEARCHES_KEY, &blob));

        if let Err(e) = result {
            warn!(error = %e, "Failed to save recent searches");
        }
    }

    fn notify(&self) {
        if let Some(sink) = &self.notifier {
            sink.emit(SearchEvent::RecentChanged(self.entries.clone()));
        }
    }
}

fn read_entries(storage: &impl KeyValueStore) -> Result<Vec<Location>, StorageError> {
    match storage.get(RECENT_SEARCHES_KEY)? {
        Some(blob) => Ok(serde_json::from_str(&blob)?),
        None => Ok(Vec::new()),
    }
}

/// Enforce the list invariants on data that came from outside.
fn normalize(entries: Vec<Location>, max_recent: usize) -> Vec<Location> {
    let mut out: Vec<Location> = Vec::with_capacity(entries.len().min(max_recent));
    for entry in entries {
        if out.len() == max_recent {
            break;
        }
        if !out.iter().any(|e| e.same_place(&entry)) {
            out.push(entry);
        }
    }
    out
}
