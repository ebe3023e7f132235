//! Sliding-window state keyed by subject or community.
//!
//! Lock order: DashMap shard lock → per-key `Mutex`. The shard lock is only
//! held long enough to fetch or insert the `Arc`; all window mutation happens
//! under the per-key mutex, so different keys never contend on one lock and
//! the same key is mutated by one caller at a time.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Windowed state that can tell when it has gone quiet.
pub trait IdleState: Default + Send {
    /// Timestamp of the most recent activity, if any.
    fn last_activity(&self) -> Option<DateTime<Utc>>;

    fn is_idle(&self, now: DateTime<Utc>, idle_after: TimeDelta) -> bool {
        match self.last_activity() {
            Some(last) => now - last >= idle_after,
            None => true,
        }
    }
}

/// Shared handle to one key's state.
pub type Slot<W> = Arc<Mutex<W>>;

/// Concurrent map of per-key windows with create-on-first-use and
/// evict-on-idle lifecycle.
pub struct WindowStore<W> {
    windows: DashMap<String, Slot<W>>,
}

impl<W: IdleState> WindowStore<W> {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Fetch the slot for `key`, creating an empty window on first use.
    pub fn slot(&self, key: &str) -> Slot<W> {
        if let Some(slot) = self.windows.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(
            self.windows
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(W::default())))
                .value(),
        )
    }

    /// Fetch the slot for `key` without creating one.
    pub fn get(&self, key: &str) -> Option<Slot<W>> {
        self.windows.get(key).map(|slot| Arc::clone(slot.value()))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Snapshot of the current keys. Sweeps walk this list one key at a time.
    pub fn keys(&self) -> Vec<String> {
        self.windows.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop `key` if its window is idle and nobody else holds the slot.
    ///
    /// A caller mid-evaluation keeps its `Arc` alive, so a slot in use is
    /// never removed out from under it.
    pub fn remove_if_idle(&self, key: &str, now: DateTime<Utc>, idle_after: TimeDelta) -> bool {
        self.windows
            .remove_if(key, |_, slot| {
                Arc::strong_count(slot) == 1 && slot.lock().is_idle(now, idle_after)
            })
            .is_some()
    }
}

impl<W: IdleState> Default for WindowStore<W> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Subject windows
// ============================================================================

/// One remembered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

/// Per-subject message history and warning state.
#[derive(Debug, Default)]
pub struct SubjectWindow {
    recent_messages: VecDeque<WindowEntry>,
    warning_count: u32,
    last_warning_at: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
}

impl SubjectWindow {
    /// Append a message and evict everything outside `window` as of
    /// `occurred_at`.
    ///
    /// At most `max_entries` of the newest entries are kept; that is enough
    /// for every heuristic as long as it exceeds the burst threshold.
    pub fn record(
        &mut self,
        content: &str,
        occurred_at: DateTime<Utc>,
        window: TimeDelta,
        max_entries: usize,
    ) -> WindowView<'_> {
        self.recent_messages.push_back(WindowEntry {
            content: content.to_string(),
            occurred_at,
        });
        self.evict(occurred_at, window);
        while self.recent_messages.len() > max_entries.max(1) {
            self.recent_messages.pop_front();
        }
        self.last_activity = Some(match self.last_activity {
            Some(last) if last > occurred_at => last,
            _ => occurred_at,
        });
        self.view()
    }

    /// Remove entries that are `window` or more older than `now`.
    ///
    /// Uses `retain` rather than popping from the front so out-of-order
    /// timestamps cannot leave a stale entry behind a fresh one.
    pub fn evict(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        self.recent_messages.retain(|entry| now - entry.occurred_at < window);
    }

    pub fn view(&self) -> WindowView<'_> {
        WindowView {
            entries: &self.recent_messages,
            warning_count: self.warning_count,
        }
    }

    #[inline]
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    #[inline]
    pub fn last_warning_at(&self) -> Option<DateTime<Utc>> {
        self.last_warning_at
    }

    /// Count one more warning. Returns the new count.
    pub(crate) fn register_warning(&mut self, at: DateTime<Utc>) -> u32 {
        self.warning_count = self.warning_count.saturating_add(1);
        self.last_warning_at = Some(at);
        self.warning_count
    }

    /// Zero the warning count if the last warning is older than `after`.
    pub fn reset_warnings_if_stale(&mut self, now: DateTime<Utc>, after: TimeDelta) -> bool {
        match self.last_warning_at {
            Some(last) if self.warning_count > 0 && now - last > after => {
                self.warning_count = 0;
                self.last_warning_at = None;
                true
            }
            _ => false,
        }
    }
}

impl IdleState for SubjectWindow {
    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }
}

/// Read-only view of a subject's surviving entries.
#[derive(Debug, Clone, Copy)]
pub struct WindowView<'a> {
    entries: &'a VecDeque<WindowEntry>,
    warning_count: u32,
}

impl<'a> WindowView<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &'a WindowEntry> + 'a {
        self.entries.iter()
    }

    /// The newest `n` entries, newest first.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &'a WindowEntry> + 'a {
        self.entries.iter().rev().take(n)
    }
}
