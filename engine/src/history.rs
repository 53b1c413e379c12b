//! Bounded speed test history

use crate::constants::HISTORY_LIMIT;
use crate::types::SpeedResult;
use tracing::warn;

/// Read/write access to the persisted history list.
///
/// The list is stored flat, most recent first, and always rewritten in full.
pub trait HistoryStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Vec<SpeedResult>, Self::Error>;

    fn save(&mut self, entries: &[SpeedResult]) -> Result<(), Self::Error>;
}

/// The most recent internet results, newest first, capped at
/// [`HISTORY_LIMIT`] entries.
pub struct History<S: HistoryStore> {
    store: S,
    entries: Vec<SpeedResult>,
}

impl<S: HistoryStore> History<S> {
    /// Read the store once
    pub fn open(store: S) -> Result<Self, S::Error> {
        let mut entries = store.load()?;
        entries.truncate(HISTORY_LIMIT);
        Ok(Self { store, entries })
    }

    /// Like [`History::open`], but an unreadable store starts empty
    pub fn open_or_empty(store: S) -> Self {
        match store.load() {
            Ok(mut entries) => {
                entries.truncate(HISTORY_LIMIT);
                Self { store, entries }
            }
            Err(e) => {
                warn!("Failed to load history, starting empty: {}", e);
                Self {
                    store,
                    entries: Vec::new(),
                }
            }
        }
    }

    /// Prepend `result`, evict the oldest beyond the limit and persist
    pub fn record(&mut self, result: SpeedResult) -> Result<(), S::Error> {
        self.entries.insert(0, result);
        self.entries.truncate(HISTORY_LIMIT);
        self.store.save(&self.entries)
    }

    pub fn entries(&self) -> &[SpeedResult] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&SpeedResult> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// In-process store, used by tests and when persistence is disabled
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    saved: Vec<SpeedResult>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<SpeedResult>) -> Self {
        Self {
            saved: entries,
            writes: 0,
        }
    }

    pub fn saved(&self) -> &[SpeedResult] {
        &self.saved
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl HistoryStore for MemoryStore {
    type Error = std::convert::Infallible;

    fn load(&self) -> Result<Vec<SpeedResult>, Self::Error> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, entries: &[SpeedResult]) -> Result<(), Self::Error> {
        self.saved = entries.to_vec();
        self.writes += 1;
        Ok(())
    }
}
