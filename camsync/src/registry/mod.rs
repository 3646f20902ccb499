//! Authoritative set of known sessions.
//!
//! One lock guards both reconciliation and every read, so a reader sees a
//! batch either fully applied or not at all. Entries keep the order in which
//! they were first seen.

use std::collections::hash_map::Entry as MapEntry;

use camsync_platforms::{SessionState, Uid};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, trace};

/// Outcome of one [`SessionRegistry::reconcile`] call, uids in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<Uid>,
    pub updated: Vec<Uid>,
    pub removed: Vec<Uid>,
}

impl ReconcileReport {
    /// True when the batch changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
struct Entry {
    state: SessionState,
    revision: u64,
    first_seen: DateTime<Utc>,
    missed: u32,
}

impl Entry {
    fn new(state: SessionState) -> Self {
        Self {
            state,
            revision: 0,
            first_seen: Utc::now(),
            missed: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    index: FxHashMap<Uid, usize>,
}

impl Inner {
    fn insert_or_merge(&mut self, state: SessionState) -> Option<usize> {
        match self.index.entry(state.uid()) {
            MapEntry::Occupied(slot) => {
                let entry = &mut self.entries[*slot.get()];
                let changed = entry.state.update(&state);
                entry.missed = 0;
                if changed > 0 {
                    entry.revision += 1;
                }
                Some(changed)
            }
            MapEntry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push(Entry::new(state));
                None
            }
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            self.index.insert(entry.state.uid(), position);
        }
    }

    fn get(&self, uid: Uid) -> Option<&Entry> {
        self.index.get(&uid).map(|&position| &self.entries[position])
    }
}

pub struct SessionRegistry {
    inner: Mutex<Inner>,
    missing_cycles_before_removal: u32,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SessionRegistry {
    /// `missing_cycles_before_removal` is the number of consecutive batches a
    /// session may be absent from before it is dropped; `1` drops it on the
    /// first absence. Zero is treated as one.
    pub fn new(missing_cycles_before_removal: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            missing_cycles_before_removal: missing_cycles_before_removal.max(1),
        }
    }

    /// Merges a freshly fetched batch.
    ///
    /// Unknown uids are appended, known ones updated in place, and entries
    /// missing from the batch age out according to the removal policy.
    /// Duplicate uids inside one batch are merged in batch order.
    pub fn reconcile(&self, batch: Vec<SessionState>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut seen = FxHashSet::default();
        let mut added = FxHashSet::default();
        let mut updated = FxHashSet::default();

        let mut inner = self.inner.lock();
        for state in batch {
            let uid = state.uid();
            seen.insert(uid);
            match inner.insert_or_merge(state) {
                None => {
                    added.insert(uid);
                    report.added.push(uid);
                }
                // merging a duplicate into an entry added by this batch is still an addition
                Some(changed) if changed > 0 && !added.contains(&uid) && updated.insert(uid) => {
                    report.updated.push(uid);
                }
                Some(_) => {}
            }
        }

        let threshold = self.missing_cycles_before_removal;
        let mut any_removed = false;
        for entry in inner.entries.iter_mut() {
            if !seen.contains(&entry.state.uid()) {
                entry.missed += 1;
                if entry.missed >= threshold {
                    report.removed.push(entry.state.uid());
                    any_removed = true;
                } else {
                    trace!(uid = entry.state.uid(), missed = entry.missed, "Session missing from batch");
                }
            }
        }
        if any_removed {
            inner.entries.retain(|entry| entry.missed < threshold);
            inner.reindex();
        }
        let total = inner.entries.len();
        drop(inner);

        debug!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            total,
            "Batch reconciled"
        );
        report
    }

    /// Seeds the registry from persisted records. Records whose uid is
    /// already known are merged into the existing entry.
    ///
    /// Returns the number of entries created.
    pub fn restore(&self, records: Vec<SessionState>) -> usize {
        let mut inner = self.inner.lock();
        let created = records
            .into_iter()
            .map(|state| inner.insert_or_merge(state))
            .filter(Option::is_none)
            .count();
        debug!(created, total = inner.entries.len(), "Registry restored");
        created
    }

    /// Deep copy of every entry in first-seen order.
    pub fn snapshot(&self) -> Vec<SessionState> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|entry| entry.state.clone())
            .collect()
    }

    pub fn get(&self, uid: Uid) -> Option<SessionState> {
        self.inner.lock().get(uid).map(|entry| entry.state.clone())
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.inner.lock().index.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Number of updates that changed at least one field of the entry.
    pub fn revision(&self, uid: Uid) -> Option<u64> {
        self.inner.lock().get(uid).map(|entry| entry.revision)
    }

    pub fn first_seen(&self, uid: Uid) -> Option<DateTime<Utc>> {
        self.inner.lock().get(uid).map(|entry| entry.first_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camsync_platforms::OnlineState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn session(uid: Uid, name: &str, online: bool) -> SessionState {
        SessionState::new(uid)
            .with_name(name)
            .with_online_state(OnlineState::from_online(online))
    }

    #[test]
    fn second_batch_updates_and_adds() {
        let registry = SessionRegistry::default();

        let report = registry.reconcile(vec![session(1, "A", true)]);
        assert_eq!(report.added, vec![1]);
        let first_seen = registry.first_seen(1).unwrap();

        let report = registry.reconcile(vec![session(1, "A", false), session(2, "B", true)]);
        assert_eq!(report.added, vec![2]);
        assert_eq!(report.updated, vec![1]);
        assert!(report.removed.is_empty());

        assert_eq!(registry.len(), 2);
        let one = registry.get(1).unwrap();
        assert_eq!(one.online_state, OnlineState::Offline);
        assert_eq!(registry.revision(1), Some(1));
        assert_eq!(registry.first_seen(1), Some(first_seen));
        assert_eq!(registry.revision(2), Some(0));
    }

    fn from_payload(json: &str) -> SessionState {
        serde_json::from_str::<camsync_platforms::session::RawSession>(json)
            .unwrap()
            .into_state()
            .unwrap()
    }

    #[test]
    fn unmapped_status_code_replaces_known_state() {
        let registry = SessionRegistry::default();
        registry.reconcile(vec![from_payload(r#"{"uid": 1, "vs": 0}"#)]);
        assert_eq!(registry.get(1).unwrap().online_state, OnlineState::Online);

        let report = registry.reconcile(vec![from_payload(r#"{"uid": 1, "vs": 55}"#)]);
        assert_eq!(report.updated, vec![1]);
        assert_eq!(registry.get(1).unwrap().online_state, OnlineState::Unknown);

        // no status code at all keeps what is known
        registry.reconcile(vec![from_payload(r#"{"uid": 1, "vs": 90}"#)]);
        let report = registry.reconcile(vec![from_payload(r#"{"uid": 1}"#)]);
        assert!(report.updated.is_empty());
        assert_eq!(registry.get(1).unwrap().online_state, OnlineState::Offline);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let registry = SessionRegistry::default();
        let batch = vec![session(1, "A", true), session(2, "B", false)];

        registry.reconcile(batch.clone());
        let before = registry.snapshot();
        let report = registry.reconcile(batch);

        assert!(report.is_empty());
        assert_eq!(registry.snapshot(), before);
        assert_eq!(registry.revision(1), Some(0));
    }

    #[test]
    fn absent_sessions_are_removed() {
        let registry = SessionRegistry::default();
        registry.reconcile(vec![session(1, "A", true), session(2, "B", true)]);

        let report = registry.reconcile(vec![session(2, "B", true), session(3, "C", true)]);
        assert_eq!(report.removed, vec![1]);
        assert!(!registry.contains(1));
        assert!(registry.contains(2));
        assert!(registry.contains(3));

        let uids: Vec<Uid> = registry.snapshot().iter().map(|s| s.uid()).collect();
        assert_eq!(uids, vec![2, 3]);
    }

    #[test]
    fn empty_batch_clears_registry() {
        let registry = SessionRegistry::default();
        registry.reconcile(vec![session(1, "A", true)]);
        let report = registry.reconcile(Vec::new());
        assert_eq!(report.removed, vec![1]);
        assert!(registry.is_empty());
    }

    #[test]
    fn missing_tolerance_delays_removal() {
        let registry = SessionRegistry::new(2);
        registry.reconcile(vec![session(1, "A", true), session(2, "B", true)]);

        let report = registry.reconcile(vec![session(2, "B", true)]);
        assert!(report.removed.is_empty());
        assert!(registry.contains(1));

        // seen again: the miss counter starts over
        registry.reconcile(vec![session(1, "A", true), session(2, "B", true)]);
        registry.reconcile(vec![session(2, "B", true)]);
        assert!(registry.contains(1));

        let report = registry.reconcile(vec![session(2, "B", true)]);
        assert_eq!(report.removed, vec![1]);
        assert!(!registry.contains(1));
    }

    #[test]
    fn duplicate_uids_in_batch_merge_in_order() {
        let registry = SessionRegistry::default();
        let report = registry.reconcile(vec![
            session(7, "first", true),
            session(7, "second", false),
        ]);

        assert_eq!(report.added, vec![7]);
        assert!(report.updated.is_empty());
        assert_eq!(registry.len(), 1);
        let entry = registry.get(7).unwrap();
        assert_eq!(entry.name.as_deref(), Some("second"));
        assert_eq!(entry.online_state, OnlineState::Offline);
    }

    #[test]
    fn unchanged_values_do_not_bump_revision() {
        let registry = SessionRegistry::default();
        registry.reconcile(vec![session(1, "A", true).with_topic("hi")]);
        registry.reconcile(vec![session(1, "A", true).with_topic("hi")]);
        assert_eq!(registry.revision(1), Some(0));

        registry.reconcile(vec![session(1, "A", true).with_topic("bye")]);
        assert_eq!(registry.revision(1), Some(1));
    }

    #[test]
    fn restore_collapses_duplicates() {
        let registry = SessionRegistry::default();
        let created = registry.restore(vec![
            session(1, "A", true),
            session(2, "B", true),
            session(1, "A2", true),
        ]);
        assert_eq!(created, 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().name.as_deref(), Some("A2"));

        // restored entries take part in reconciliation like any other
        let report = registry.reconcile(vec![session(2, "B", true)]);
        assert_eq!(report.removed, vec![1]);
    }

    #[test]
    fn readers_never_see_partial_batches() {
        let registry = Arc::new(SessionRegistry::default());
        let low: Vec<SessionState> = (0..200).map(|uid| session(uid, "low", true)).collect();
        let high: Vec<SessionState> = (1000..1200).map(|uid| session(uid, "high", true)).collect();
        registry.reconcile(low.clone());

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let registry = registry.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = registry.snapshot();
                    assert_eq!(snapshot.len(), 200);
                    let low_count = snapshot.iter().filter(|s| s.uid() < 1000).count();
                    assert!(low_count == 0 || low_count == 200);
                }
            })
        };

        for round in 0..200 {
            let batch = if round % 2 == 0 { high.clone() } else { low.clone() };
            registry.reconcile(batch);
        }
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }
}
