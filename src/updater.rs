use std::io;
use std::mem;
use std::path::PathBuf;

use chrono::{Datelike, Days, NaiveDate};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::config::{Config, Mode};
use crate::ics::{self, WriteError};
use crate::loader;
use crate::prayer::day_events;
use crate::vaktija::{FetchError, VaktijaClient};
use crate::CalendarDocument;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to read calendar from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up HTTP client")]
    Client(#[source] FetchError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub requests: usize,
    /// Days (or months) already present in the calendar.
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
    pub added: usize,
    pub total: usize,
}

/// Fixed pause between consecutive upstream requests.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
    primed: bool,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            primed: false,
        }
    }

    /// Sleeps before every request except the first.
    pub async fn wait(&mut self) {
        if self.primed && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.primed = true;
    }
}

/// Inclusive range of days.
pub struct DayRange(NaiveDate, NaiveDate);

impl DayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self(start, end)
    }
}

impl Iterator for DayRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let next = self.0.succ_opt()?;
            Some(mem::replace(&mut self.0, next))
        } else {
            None
        }
    }
}

/// Inclusive range of `(year, month)` pairs.
pub struct MonthRange((i32, u32), (i32, u32));

impl MonthRange {
    pub fn new(start: (i32, u32), end: (i32, u32)) -> Self {
        Self(start, end)
    }
}

impl Iterator for MonthRange {
    type Item = (i32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 <= self.1 {
            let (year, month) = self.0;
            let next = if month >= 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            Some(mem::replace(&mut self.0, next))
        } else {
            None
        }
    }
}

fn month_days(year: i32, month: u32) -> Option<DayRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(chrono::Months::new(1))?.pred_opt()?;
    Some(DayRange::new(first, last))
}

/// The first day an incremental run asks for: the day after the latest
/// recorded event, or `today` for an empty calendar.
pub fn resume_date(document: &CalendarDocument, today: NaiveDate) -> NaiveDate {
    document
        .latest_start()
        .and_then(|start| start.date_naive().succ_opt())
        .unwrap_or(today)
}

pub struct Updater<'a> {
    config: &'a Config,
    client: VaktijaClient,
    limiter: RateLimiter,
    document: CalendarDocument,
    summary: Summary,
}

impl<'a> Updater<'a> {
    pub fn new(config: &'a Config, document: CalendarDocument) -> Result<Self, UpdateError> {
        Ok(Self {
            config,
            client: VaktijaClient::new(config).map_err(UpdateError::Client)?,
            limiter: RateLimiter::new(config.request_delay),
            document,
            summary: Summary::default(),
        })
    }

    /// Fetches day by day from `start` through `end`, persisting after
    /// every day that added events.
    pub async fn run_days(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), WriteError> {
        let prayers = self.config.style.prayers();

        for date in DayRange::new(start, end) {
            if self.document.covers(date, self.config.timezone, prayers) {
                debug!("{date} already recorded");
                self.summary.skipped += 1;
                continue;
            }

            self.limiter.wait().await;
            self.summary.requests += 1;
            info!("Fetching {}", self.client.day_url(date));

            let times = match self.client.fetch_day(date).await {
                Ok(Some(times)) => times,
                Ok(None) => {
                    info!("No vakat for {date}, skipping");
                    self.summary.empty += 1;
                    continue;
                }
                Err(err) => {
                    warn!("Skipping {date}: {err}");
                    self.summary.failed += 1;
                    continue;
                }
            };

            if self.add_day(date, &times) > 0 {
                self.persist()?;
            }
        }

        Ok(())
    }

    /// Fetches whole months, persisting after every month that added
    /// events.
    pub async fn run_months(&mut self, start: (i32, u32), end: (i32, u32)) -> Result<(), WriteError> {
        let prayers = self.config.style.prayers();

        for (year, month) in MonthRange::new(start, end) {
            let Some(mut days) = month_days(year, month) else {
                continue;
            };

            if days.all(|date| self.document.covers(date, self.config.timezone, prayers)) {
                debug!("{year}-{month:02} already recorded");
                self.summary.skipped += 1;
                continue;
            }

            self.limiter.wait().await;
            self.summary.requests += 1;
            info!("Fetching {}", self.client.month_url(year, month));

            let days = match self.client.fetch_month(year, month).await {
                Ok(Some(days)) => days,
                Ok(None) => {
                    info!("No vakat for {year}-{month:02}, skipping");
                    self.summary.empty += 1;
                    continue;
                }
                Err(err) => {
                    warn!("Skipping {year}-{month:02}: {err}");
                    self.summary.failed += 1;
                    continue;
                }
            };

            let mut added = 0;
            for (index, times) in days.iter().enumerate() {
                let Some(date) = u32::try_from(index + 1)
                    .ok()
                    .and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
                else {
                    warn!("{year}-{month:02} has more entries than days, ignoring the rest");
                    break;
                };
                added += self.add_day(date, times);
            }

            if added > 0 {
                self.persist()?;
            }
        }

        Ok(())
    }

    /// Inserts the events for one day and returns how many were new.
    fn add_day(&mut self, date: NaiveDate, times: &[String]) -> usize {
        let events = match day_events(date, times, self.config.timezone, self.config.style) {
            Ok(events) => events,
            Err(err) => {
                warn!("Skipping {date}: {err}");
                self.summary.failed += 1;
                return 0;
            }
        };

        let mut added = 0;
        for event in events {
            let key = event.key();
            if self.document.insert(event) {
                added += 1;
            } else {
                debug!("{} at {} already recorded", key.prayer, key.start);
            }
        }

        self.summary.added += added;
        added
    }

    fn persist(&self) -> Result<(), WriteError> {
        ics::save(&self.document, self.config, &self.config.output)
    }

    pub fn finish(mut self) -> (CalendarDocument, Summary) {
        self.summary.total = self.document.len();
        (self.document, self.summary)
    }
}

/// One full load, fetch and persist cycle for `config`. `today` anchors the
/// fetch window.
pub async fn run(config: &Config, today: NaiveDate) -> Result<Summary, UpdateError> {
    let loaded = loader::load(&config.output, config.timezone).map_err(|source| UpdateError::Read {
        path: config.output.clone(),
        source,
    })?;

    if let loader::LoadSource::Recovered { .. } = loaded.source {
        info!("Rewriting {} as a single calendar", config.output.display());
        ics::save(&loaded.document, config, &config.output)?;
    }

    let start = resume_date(&loaded.document, today);
    let mut updater = Updater::new(config, loaded.document)?;

    match config.mode {
        Mode::Incremental { horizon_days } => {
            let end = today
                .checked_add_days(Days::new(horizon_days.into()))
                .unwrap_or(NaiveDate::MAX);

            if start > end {
                info!("Calendar already reaches {end}, nothing to fetch");
            } else {
                info!("Fetching {start} through {end}");
                updater.run_days(start, end).await?;
            }
        }
        Mode::Bulk { years_forward } => {
            let last_year = today.year().saturating_add_unsigned(years_forward);
            info!("Fetching {} through {}", today.year(), last_year);
            updater.run_months((today.year(), 1), (last_year, 12)).await?;
        }
    }

    let (_, summary) = updater.finish();
    info!(
        "Done: {} requests, {} new events, {} total",
        summary.requests, summary.added, summary.total
    );

    Ok(summary)
}
