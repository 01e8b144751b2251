use std::collections::HashMap;

use serde::Serialize;

use crate::person::{PersonObservation, UNKNOWN_IDENTITY};

/// First/last-seen timestamps for one re-identified identity, in seconds
/// relative to the caller's epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PresenceRecord {
    pub first_seen: f64,
    pub last_seen: f64,
}

/// Tracks how long each re-identified person has been observed.
///
/// Owned by the caller: create one per session, feed it every frame's
/// observations, drop it when the session ends. Records are keyed on the
/// re-identification identity (`reid_id`); observations still tagged
/// [`UNKNOWN_IDENTITY`] never touch the table. Records are created once and
/// updated forever after, never evicted, which is fine for demo-length
/// sessions.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    records: HashMap<String, PresenceRecord>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the table with one frame's observations.
    ///
    /// Callers must supply non-decreasing `now` values across calls;
    /// out-of-order timestamps are not detected and leave the records in an
    /// unspecified state.
    pub fn update(&mut self, people: &[PersonObservation], now: f64) {
        for person in people {
            if person.reid_id == UNKNOWN_IDENTITY {
                continue;
            }
            self.records
                .entry(person.reid_id.clone())
                .and_modify(|record| record.last_seen = now)
                .or_insert(PresenceRecord { first_seen: now, last_seen: now });
        }
    }

    /// Identity label with its elapsed presence, e.g. `"alice (2m 5s)"`.
    /// Identities without a record come back unchanged.
    pub fn elapsed_label(&self, identity: &str, now: f64) -> String {
        match self.records.get(identity) {
            Some(record) => {
                let elapsed = (now - record.first_seen) as i64;
                format!("{} ({}m {}s)", identity, elapsed / 60, elapsed % 60)
            }
            None => identity.to_string(),
        }
    }

    pub fn record(&self, identity: &str) -> Option<&PresenceRecord> {
        self.records.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PresenceRecord)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::BoundingBox;

    fn seen(reid_id: &str) -> PersonObservation {
        PersonObservation {
            track_id: 1,
            reid_id: reid_id.into(),
            face_id: None,
            bbox: BoundingBox::new(0, 0, 50, 100),
            repspoint: (25, 50),
            keypoints: Vec::new(),
        }
    }

    #[test]
    fn new_identity_creates_one_record() {
        let mut tracker = PresenceTracker::new();
        tracker.update(&[seen("alice")], 7.0);
        assert_eq!(tracker.len(), 1);
        let record = tracker.record("alice").unwrap();
        assert_eq!(record.first_seen, 7.0);
        assert_eq!(record.last_seen, 7.0);

        // Same identity at the same instant changes nothing.
        tracker.update(&[seen("alice")], 7.0);
        assert_eq!(tracker.len(), 1);
        assert_eq!(*tracker.record("alice").unwrap(), PresenceRecord { first_seen: 7.0, last_seen: 7.0 });
    }

    #[test]
    fn presence_is_monotonic() {
        let mut tracker = PresenceTracker::new();
        for now in [1.0, 2.5, 9.0, 42.0] {
            tracker.update(&[seen("bob")], now);
        }
        let record = tracker.record("bob").unwrap();
        assert_eq!(record.first_seen, 1.0);
        assert_eq!(record.last_seen, 42.0);
    }

    #[test]
    fn unknown_identity_bypasses_table() {
        let mut tracker = PresenceTracker::new();
        tracker.update(&[seen(UNKNOWN_IDENTITY)], 3.0);
        assert!(tracker.is_empty());
        assert_eq!(tracker.elapsed_label(UNKNOWN_IDENTITY, 10.0), "Unknown");
    }

    #[test]
    fn elapsed_label_formats_minutes_and_seconds() {
        let mut tracker = PresenceTracker::new();
        tracker.update(&[seen("carol")], 0.0);
        assert_eq!(tracker.elapsed_label("carol", 125.0), "carol (2m 5s)");
        assert_eq!(tracker.elapsed_label("carol", 59.0), "carol (0m 59s)");
    }

    #[test]
    fn unseen_identity_label_is_unmodified() {
        let tracker = PresenceTracker::new();
        assert_eq!(tracker.elapsed_label("dave", 500.0), "dave");
    }
}
