use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

/// The six daily markers, in the order the API lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Sunrise => "Sunrise",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown prayer name `{0}`")]
pub struct UnknownPrayer(pub String);

impl FromStr for Prayer {
    type Err = UnknownPrayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prayer::ALL
            .into_iter()
            .find(|prayer| prayer.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPrayer(s.to_string()))
    }
}

/// Identity of an event for deduplication. Orders by start first so a
/// document keyed by it iterates chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub start: DateTime<Tz>,
    pub prayer: Prayer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrayerEvent {
    pub prayer: Prayer,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl PrayerEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            start: self.start,
            prayer: self.prayer,
        }
    }
}

/// How a day's times become calendar events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStyle {
    /// One event per prayer lasting `duration`.
    Point { duration: Duration },
    /// Fajr until Sunrise, then each prayer until just before the next one,
    /// Isha until 23:59.
    Interval,
}

impl EventStyle {
    /// Gap left between an interval event and the next one's start.
    pub fn epsilon() -> Duration {
        Duration::minutes(1)
    }

    pub fn prayers(self) -> &'static [Prayer] {
        match self {
            EventStyle::Point { .. } => &Prayer::ALL,
            EventStyle::Interval => &[
                Prayer::Fajr,
                Prayer::Dhuhr,
                Prayer::Asr,
                Prayer::Maghrib,
                Prayer::Isha,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DayError {
    #[error("invalid time `{0}`")]
    InvalidTime(String),
    #[error("{date} {time} does not exist in {zone}")]
    NonexistentLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        zone: Tz,
    },
    #[error("expected {expected} times, got {actual}")]
    TooFewTimes { expected: usize, actual: usize },
    #[error("{prayer} would not end after it starts")]
    NonIncreasing { prayer: Prayer },
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, DayError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| DayError::InvalidTime(raw.to_string()))
}

pub fn localize(date: NaiveDate, time: NaiveTime, zone: Tz) -> Result<DateTime<Tz>, DayError> {
    zone.from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or(DayError::NonexistentLocalTime { date, time, zone })
}

/// Turns one day's `vakat` list into events of the given style.
pub fn day_events<S: AsRef<str>>(
    date: NaiveDate,
    times: &[S],
    zone: Tz,
    style: EventStyle,
) -> Result<Vec<PrayerEvent>, DayError> {
    let starts = times
        .iter()
        .take(Prayer::ALL.len())
        .map(|raw| localize(date, parse_time(raw.as_ref())?, zone))
        .collect::<Result<Vec<_>, _>>()?;

    let events = match style {
        EventStyle::Point { duration } => Prayer::ALL
            .into_iter()
            .zip(starts)
            .map(|(prayer, start)| PrayerEvent {
                prayer,
                start,
                end: start + duration,
            })
            .collect::<Vec<_>>(),

        EventStyle::Interval => {
            let [fajr, sunrise, dhuhr, asr, maghrib, isha] = starts[..] else {
                return Err(DayError::TooFewTimes {
                    expected: Prayer::ALL.len(),
                    actual: starts.len(),
                });
            };

            let end_of_day = localize(date, parse_time("23:59")?, zone)?;

            let interval = |prayer, start, end| PrayerEvent { prayer, start, end };

            vec![
                interval(Prayer::Fajr, fajr, sunrise),
                interval(Prayer::Dhuhr, dhuhr, asr - EventStyle::epsilon()),
                interval(Prayer::Asr, asr, maghrib - EventStyle::epsilon()),
                interval(Prayer::Maghrib, maghrib, isha - EventStyle::epsilon()),
                interval(Prayer::Isha, isha, end_of_day),
            ]
        }
    };

    if let Some(event) = events.iter().find(|event| event.end <= event.start) {
        return Err(DayError::NonIncreasing {
            prayer: event.prayer,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNE_FIRST: [&str; 6] = ["04:30", "06:10", "12:45", "16:20", "19:55", "21:25"];

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        localize(date(), time, Tz::Europe__Sarajevo).unwrap()
    }

    #[test]
    fn point_events_last_one_minute() {
        let style = EventStyle::Point {
            duration: Duration::minutes(1),
        };
        let events = day_events(date(), &JUNE_FIRST, Tz::Europe__Sarajevo, style).unwrap();

        assert_eq!(events.len(), 6);
        assert_eq!(
            events.iter().map(|event| event.prayer).collect::<Vec<_>>(),
            Prayer::ALL
        );
        for event in &events {
            assert_eq!(event.end - event.start, Duration::minutes(1));
            assert_eq!(event.start.timezone(), Tz::Europe__Sarajevo);
        }
        assert_eq!(events[0].start, at(4, 30));
        assert_eq!(events[0].start.to_rfc3339(), "2024-06-01T04:30:00+02:00");
        assert_eq!(events[5].start, at(21, 25));
    }

    #[test]
    fn interval_events_end_before_next_boundary() {
        let events =
            day_events(date(), &JUNE_FIRST, Tz::Europe__Sarajevo, EventStyle::Interval).unwrap();

        let spans = events
            .iter()
            .map(|event| (event.prayer, event.start, event.end))
            .collect::<Vec<_>>();

        assert_eq!(
            spans,
            vec![
                (Prayer::Fajr, at(4, 30), at(6, 10)),
                (Prayer::Dhuhr, at(12, 45), at(16, 19)),
                (Prayer::Asr, at(16, 20), at(19, 54)),
                (Prayer::Maghrib, at(19, 55), at(21, 24)),
                (Prayer::Isha, at(21, 25), at(23, 59)),
            ]
        );
        assert!(events.iter().all(|event| event.end > event.start));
    }

    #[test]
    fn interval_needs_all_six_times() {
        let err = day_events(
            date(),
            &JUNE_FIRST[..4],
            Tz::Europe__Sarajevo,
            EventStyle::Interval,
        )
        .unwrap_err();
        assert_eq!(
            err,
            DayError::TooFewTimes {
                expected: 6,
                actual: 4
            }
        );
    }

    #[test]
    fn repeated_boundary_rejects_interval_day() {
        let times = ["04:30", "06:10", "12:45", "16:20", "19:55", "19:55"];
        let err = day_events(date(), &times, Tz::Europe__Sarajevo, EventStyle::Interval)
            .unwrap_err();
        assert_eq!(
            err,
            DayError::NonIncreasing {
                prayer: Prayer::Maghrib
            }
        );
    }

    #[test]
    fn zero_length_point_events_are_rejected() {
        let style = EventStyle::Point {
            duration: Duration::zero(),
        };
        let err = day_events(date(), &JUNE_FIRST, Tz::Europe__Sarajevo, style).unwrap_err();
        assert_eq!(
            err,
            DayError::NonIncreasing {
                prayer: Prayer::Fajr
            }
        );
    }

    #[test]
    fn malformed_time_rejects_day() {
        let times = ["04:30", "6.10", "12:45", "16:20", "19:55", "21:25"];
        let style = EventStyle::Point {
            duration: Duration::minutes(10),
        };
        let err = day_events(date(), &times, Tz::Europe__Sarajevo, style).unwrap_err();
        assert_eq!(err, DayError::InvalidTime("6.10".into()));
    }

    #[test]
    fn prayer_names_round_trip_case_insensitively() {
        assert_eq!("maghrib".parse::<Prayer>(), Ok(Prayer::Maghrib));
        assert_eq!(" Isha ".parse::<Prayer>(), Ok(Prayer::Isha));
        assert!("Jumuah".parse::<Prayer>().is_err());
    }
}
