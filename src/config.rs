use std::path::PathBuf;

use chrono::Duration;
use chrono_tz::Tz;
use tokio::time::Duration as Delay;

use crate::prayer::EventStyle;

pub const DEFAULT_API: &str = "https://api.vaktija.ba/vaktija/v1";
pub const DEFAULT_LOCATION: u32 = 77;
pub const DEFAULT_OUTPUT: &str = "Vaktija_Sarajevo.ics";
pub const DEFAULT_TIMEZONE: Tz = Tz::Europe__Sarajevo;

/// How far the fetch loop reaches and how it talks to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One request per day, resuming after the latest recorded event and
    /// stopping `horizon_days` after today.
    Incremental { horizon_days: u32 },
    /// One request per month, from January of the current year through
    /// December of `current + years_forward`.
    Bulk { years_forward: u32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub location_id: u32,
    pub timezone: Tz,
    pub output: PathBuf,
    pub api_base: String,
    pub mode: Mode,
    pub style: EventStyle,
    pub request_delay: Delay,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location_id: DEFAULT_LOCATION,
            timezone: DEFAULT_TIMEZONE,
            output: PathBuf::from(DEFAULT_OUTPUT),
            api_base: DEFAULT_API.to_string(),
            mode: Mode::Incremental { horizon_days: 60 },
            style: EventStyle::Point {
                duration: Duration::minutes(1),
            },
            request_delay: Delay::from_secs(2),
        }
    }
}

impl Config {
    /// `PRODID` of the written calendar.
    pub fn product_id(&self) -> String {
        format!(
            "-//{}//{} {}//BS",
            env!("CARGO_PKG_NAME"),
            self.location_id,
            self.timezone.name()
        )
    }
}
