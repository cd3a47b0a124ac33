use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ics::{
    parameters::TzIDParam,
    properties::{DtEnd, DtStart, RRule, Summary, TzName},
    Daylight, ICalendar, Standard, TimeZone,
};
use log::info;
use thiserror::Error;

use crate::{CalendarDocument, Config, PrayerEvent};

const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Error)]
#[error("failed to write calendar to {}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Central European rules, which is what Sarajevo observes.
fn timezone(zone: Tz) -> TimeZone<'static> {
    let mut cet_standard = Standard::new("19701025T030000", "+0200", "+0100");
    cet_standard.push(TzName::new("CET"));
    cet_standard.push(RRule::new("FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU"));

    let mut cest_daylight = Daylight::new("19700329T020000", "+0100", "+0200");
    cest_daylight.push(TzName::new("CEST"));
    cest_daylight.push(RRule::new("FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU"));

    let mut timezone = TimeZone::daylight(zone.name(), cest_daylight);
    timezone.add_standard(cet_standard);
    timezone
}

fn local_property(time: &DateTime<Tz>) -> String {
    time.format(LOCAL_FORMAT).to_string()
}

impl PrayerEvent {
    pub fn uid(&self, location_id: u32) -> String {
        format!(
            "{}_{}_{}",
            self.start.with_timezone(&Utc).format(UTC_FORMAT),
            self.prayer,
            location_id
        )
    }

    #[must_use]
    pub fn to_ics(&self, location_id: u32) -> ics::Event<'_> {
        let zone = self.start.timezone().name();
        let stamp = self.start.with_timezone(&Utc).format(UTC_FORMAT).to_string();

        let mut ics_event = ics::Event::new(self.uid(location_id), stamp);

        let mut start = DtStart::new(local_property(&self.start));
        start.add(TzIDParam::new(zone));
        ics_event.push(start);

        let mut end = DtEnd::new(local_property(&self.end));
        end.add(TzIDParam::new(zone));
        ics_event.push(end);

        ics_event.push(Summary::new(self.prayer.name()));

        ics_event
    }
}

impl CalendarDocument {
    #[must_use]
    pub fn to_ics(&self, config: &Config) -> ICalendar<'_> {
        let mut icalendar = ICalendar::new("2.0", config.product_id());
        icalendar.add_timezone(timezone(config.timezone));

        for event in self.events() {
            icalendar.add_event(event.to_ics(config.location_id));
        }

        icalendar
    }
}

/// Overwrites `path` with the full document. The text goes to a sibling
/// temp file first and is renamed into place, so readers only ever see a
/// complete calendar.
pub fn save(document: &CalendarDocument, config: &Config, path: &Path) -> Result<(), WriteError> {
    let contents = document.to_ics(config).to_string();
    let staging = path.with_extension("ics.tmp");

    fs::write(&staging, contents)
        .and_then(|()| fs::rename(&staging, path))
        .map_err(|source| WriteError {
            path: path.to_path_buf(),
            source,
        })?;

    info!("Wrote {} events to {}", document.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::prayer::{day_events, EventStyle};

    fn document() -> CalendarDocument {
        let style = EventStyle::Point {
            duration: Duration::minutes(1),
        };
        let times = ["04:30", "06:10", "12:45", "16:20", "19:55", "21:25"];
        day_events(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            &times,
            Tz::Europe__Sarajevo,
            style,
        )
        .unwrap()
        .into_iter()
        .collect()
    }

    #[test]
    fn events_carry_local_times_with_tzid() {
        let text = document().to_ics(&Config::default()).to_string();

        assert_eq!(text.matches("BEGIN:VEVENT").count(), 6);
        assert_eq!(text.matches("BEGIN:VCALENDAR").count(), 1);
        assert!(text.contains("TZID:Europe/Sarajevo"));
        assert!(text.contains("DTSTART;TZID=Europe/Sarajevo:20240601T043000"));
        assert!(text.contains("DTEND;TZID=Europe/Sarajevo:20240601T043100"));
        assert!(text.contains("SUMMARY:Maghrib"));
        assert!(text.contains("UID:20240601T023000Z_Fajr_77"));
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaktija.ics");
        fs::write(&path, "garbage").unwrap();

        save(&document(), &Config::default(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("BEGIN:VCALENDAR"));
        assert!(!text.contains("garbage"));
        assert!(!path.with_extension("ics.tmp").exists());
    }

    #[test]
    fn save_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("vaktija.ics");

        let err = save(&document(), &Config::default(), &path).unwrap_err();
        assert_eq!(err.path, path);
    }
}
