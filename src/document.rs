use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::prayer::{localize, EventKey, Prayer, PrayerEvent};

/// The working set of events, ordered by start time. The key set is the
/// dedup index: an event whose `(start, prayer)` is already present is
/// never inserted twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDocument {
    events: BTreeMap<EventKey, PrayerEvent>,
}

impl CalendarDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.events.contains_key(key)
    }

    /// Returns `false` if an event with the same key is already recorded.
    pub fn insert(&mut self, event: PrayerEvent) -> bool {
        let key = event.key();
        if self.events.contains_key(&key) {
            return false;
        }

        self.events.insert(key, event);
        true
    }

    /// Moves every event of `other` not already present into `self` and
    /// returns how many were new.
    pub fn merge(&mut self, other: CalendarDocument) -> usize {
        other
            .events
            .into_values()
            .map(|event| self.insert(event))
            .filter(|&inserted| inserted)
            .count()
    }

    pub fn events(&self) -> impl Iterator<Item = &PrayerEvent> {
        self.events.values()
    }

    pub fn latest_start(&self) -> Option<DateTime<Tz>> {
        self.events.keys().next_back().map(|key| key.start)
    }

    /// Whether every one of `prayers` already has an event starting on the
    /// local `date` in `zone`.
    pub fn covers(&self, date: NaiveDate, zone: Tz, prayers: &[Prayer]) -> bool {
        let Some(next) = date.succ_opt() else {
            return false;
        };
        let (Ok(from), Ok(to)) = (
            localize(date, NaiveTime::MIN, zone),
            localize(next, NaiveTime::MIN, zone),
        ) else {
            return false;
        };

        let lower = EventKey {
            start: from,
            prayer: Prayer::Fajr,
        };
        let upper = EventKey {
            start: to,
            prayer: Prayer::Fajr,
        };

        prayers.iter().all(|prayer| {
            self.events
                .range(lower..upper)
                .any(|(key, _)| key.prayer == *prayer)
        })
    }
}

impl FromIterator<PrayerEvent> for CalendarDocument {
    fn from_iter<I: IntoIterator<Item = PrayerEvent>>(iter: I) -> Self {
        let mut document = CalendarDocument::new();
        for event in iter {
            document.insert(event);
        }
        document
    }
}
