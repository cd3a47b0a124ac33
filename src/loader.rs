use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use icalendar::{parser, CalendarComponent, Component};
use log::{debug, info, warn};

use crate::prayer::{localize, Prayer, PrayerEvent};
use crate::CalendarDocument;

/// Which step of the fallback chain produced the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// No file, or a file with nothing but whitespace.
    Empty,
    /// A single well-formed VCALENDAR.
    Single,
    /// Several documents (or one plus junk) merged into one; `skipped`
    /// counts the fragments that could not be used.
    Recovered { documents: usize, skipped: usize },
    /// Nothing usable; the run starts from scratch.
    Discarded { fragments: usize },
}

#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: CalendarDocument,
    pub source: LoadSource,
}

impl Loaded {
    fn empty(source: LoadSource) -> Self {
        Self {
            document: CalendarDocument::new(),
            source,
        }
    }
}

/// Reads the calendar at `path`. Only I/O errors other than a missing file
/// are returned; malformed content is recovered or dropped.
pub fn load(path: &Path, zone: Tz) -> io::Result<Loaded> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!("No calendar at {}, starting empty", path.display());
            return Ok(Loaded::empty(LoadSource::Empty));
        }
        Err(err) => return Err(err),
    };

    let loaded = recover(&String::from_utf8_lossy(&bytes), zone);

    match loaded.source {
        LoadSource::Empty | LoadSource::Single => info!(
            "Loaded {} events from {}",
            loaded.document.len(),
            path.display()
        ),
        LoadSource::Recovered { documents, skipped } => warn!(
            "{} was not a single calendar; merged {} events from {} documents, skipped {} fragments",
            path.display(),
            loaded.document.len(),
            documents,
            skipped
        ),
        LoadSource::Discarded { fragments } => warn!(
            "{} could not be parsed ({} fragments), previous events are lost",
            path.display(),
            fragments
        ),
    }

    Ok(loaded)
}

/// Tries the text as one calendar, then as a sequence of calendars, then
/// gives up with an empty document.
pub fn recover(text: &str, zone: Tz) -> Loaded {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Loaded::empty(LoadSource::Empty);
    }

    let split = split_documents(text);

    if let ([single], 0) = (split.documents.as_slice(), split.fragments) {
        if let Ok(document) = parse_document(single, zone) {
            return Loaded {
                document,
                source: LoadSource::Single,
            };
        }
    }

    let mut document = CalendarDocument::new();
    let mut documents = 0;
    let mut skipped = split.fragments;

    for text in &split.documents {
        match parse_document(text, zone) {
            Ok(parsed) => {
                documents += 1;
                let added = parsed.len();
                let new = document.merge(parsed);
                debug!("Recovered document with {added} events, {new} new");
            }
            Err(err) => {
                debug!("Skipping unparsable document: {err}");
                skipped += 1;
            }
        }
    }

    if documents == 0 {
        return Loaded::empty(LoadSource::Discarded { fragments: skipped });
    }

    Loaded {
        document,
        source: LoadSource::Recovered { documents, skipped },
    }
}

struct Split<'a> {
    documents: Vec<&'a str>,
    /// Unterminated documents and runs of text outside any document.
    fragments: usize,
}

fn split_documents(text: &str) -> Split<'_> {
    let mut documents = Vec::new();
    let mut fragments = 0;
    let mut open = None;
    let mut in_stray = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim();
        let line_end = offset + line.len();

        if content.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
            if open.replace(offset).is_some() {
                fragments += 1;
            }
            in_stray = false;
        } else if content.eq_ignore_ascii_case("END:VCALENDAR") {
            match open.take() {
                Some(start) => documents.push(&text[start..line_end]),
                None => fragments += 1,
            }
        } else if open.is_none() && !content.is_empty() {
            if !in_stray {
                fragments += 1;
            }
            in_stray = true;
        }

        offset = line_end;
    }

    if open.is_some() {
        fragments += 1;
    }

    Split {
        documents,
        fragments,
    }
}

fn parse_document(text: &str, zone: Tz) -> Result<CalendarDocument, String> {
    let unfolded = parser::unfold(text);
    let calendar = parser::read_calendar(&unfolded)?;

    Ok(calendar
        .components
        .into_iter()
        .filter_map(|component| match CalendarComponent::from(component) {
            CalendarComponent::Event(event) => Some(event),
            _ => None,
        })
        .filter_map(|event| {
            let parsed = parse_event(&event, zone);
            if parsed.is_none() {
                debug!("Ignoring event {:?}", event.property_value("UID"));
            }
            parsed
        })
        .collect())
}

fn parse_event(event: &icalendar::Event, zone: Tz) -> Option<PrayerEvent> {
    let prayer = event.property_value("SUMMARY")?.parse::<Prayer>().ok()?;
    let start = parse_stamp(event.property_value("DTSTART")?, zone)?;
    let end = parse_stamp(event.property_value("DTEND")?, zone)?;

    (end > start).then_some(PrayerEvent { prayer, start, end })
}

/// `TZID` parameters are not consulted: everything not in UTC is taken to
/// be in the configured zone.
fn parse_stamp(value: &str, zone: Tz) -> Option<DateTime<Tz>> {
    let value = value.trim();

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(naive.and_utc().with_timezone(&zone));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    localize(naive.date(), naive.time(), zone).ok()
}
