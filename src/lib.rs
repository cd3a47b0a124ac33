//! Keeps an iCalendar file of daily prayer times from the vaktija.ba API up
//! to date.

pub mod cli;
pub mod config;
mod document;
pub mod ics;
pub mod loader;
pub mod prayer;
pub mod updater;
pub mod vaktija;

pub use config::{Config, Mode};
pub use document::CalendarDocument;
pub use loader::{load, LoadSource, Loaded};
pub use prayer::{EventKey, EventStyle, Prayer, PrayerEvent};
pub use updater::{run, Summary, UpdateError};
pub use vaktija::{FetchError, VaktijaClient};
